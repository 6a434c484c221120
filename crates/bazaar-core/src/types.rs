//! # Domain Types
//!
//! Core domain types used throughout Bazaar.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Order       │   │     Report      │   │   Withdrawal    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  buyer_id       │   │  order_id (1:1) │   │  seller_id      │       │
//! │  │  items (frozen) │   │  seller_id      │   │  order_ids      │       │
//! │  │  status         │   │  status         │   │  fee / actual   │       │
//! │  │  can_withdraw   │   │  evidence_urls  │   │  bank_info      │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Wallet      │   │ PaymentHistory  │   │  Notification   │       │
//! │  │  balance ≥ 0    │   │  type / status  │   │  kind / link    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Identifiers are UUID v4 strings. Monetary fields are minor units
//! (`*_cents`), see [`crate::money`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{FeeRate, Money};

/// Implements `as_str` + `Display` for the snake_case status enums.
macro_rules! status_names {
    ($ty:ident { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Stable lowercase name as stored in the database and sent over JSON.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = crate::error::ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(crate::error::ValidationError::InvalidFormat {
                        field: stringify!($ty).to_string(),
                        reason: format!("unknown value '{}'", other),
                    }),
                }
            }
        }
    };
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle of an order.
///
/// ```text
/// pending ──► completed ──► ready_for_withdrawal ──► withdrawing ──► withdrawn
///    │            │                 ▲                     │
///    ▼            ▼                 │ (report rejected)   │ (withdrawal rejected)
///  failed     reported ─────────────┘◄────────────────────┘
///                 │
///                 ▼ (report approved)
///             refunded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
    Reported,
    ReadyForWithdrawal,
    Withdrawing,
    Withdrawn,
}

status_names!(OrderStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Refunded => "refunded",
    Reported => "reported",
    ReadyForWithdrawal => "ready_for_withdrawal",
    Withdrawing => "withdrawing",
    Withdrawn => "withdrawn",
});

impl OrderStatus {
    /// Statuses in which `can_withdraw` may be true.
    pub const fn past_report_window(&self) -> bool {
        matches!(
            self,
            OrderStatus::ReadyForWithdrawal | OrderStatus::Withdrawing | OrderStatus::Withdrawn
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

// =============================================================================
// Payment Method / Transaction Type / Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Paid from the in-app wallet.
    Wallet,
    /// Paid out to a bank card.
    BankTransfer,
    /// External payment gateway (wallet top-ups).
    Gateway,
}

status_names!(PaymentMethod {
    Wallet => "wallet",
    BankTransfer => "bank_transfer",
    Gateway => "gateway",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Deposit,
    Payment,
    Refund,
    Withdrawal,
}

status_names!(TransactionType {
    Deposit => "deposit",
    Payment => "payment",
    Refund => "refund",
    Withdrawal => "withdrawal",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

status_names!(PaymentStatus {
    Pending => "pending",
    Completed => "completed",
    Failed => "failed",
    Cancelled => "cancelled",
});

// =============================================================================
// Product & Cart
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Blocked,
}

status_names!(ProductStatus {
    Active => "active",
    Blocked => "blocked",
});

/// A product listed by a seller.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub seller_id: String,
    pub title: String,
    pub price_cents: i64,
    pub status: ProductStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    #[inline]
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active
    }
}

/// A line in a buyer's cart. The unit price is captured when the item is added.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub user_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl CartItem {
    /// Unit price times quantity. Fails instead of wrapping on overflow.
    pub fn line_total(&self) -> CoreResult<Money> {
        Money::from_cents(self.unit_price_cents)
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| CoreError::InvalidAmount {
                reason: format!("line total of product {} overflows", self.product_id),
            })
    }
}

/// Cart contents with derived totals.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartItem>,
    pub total_cents: i64,
    pub count: usize,
}

impl CartView {
    pub fn new(items: Vec<CartItem>) -> CoreResult<Self> {
        let lines = items.iter().map(CartItem::line_total).collect::<CoreResult<Vec<_>>>()?;
        let total = Money::checked_sum(lines).ok_or_else(|| CoreError::InvalidAmount {
            reason: "cart total overflows".to_string(),
        })?;
        Ok(CartView {
            count: items.len(),
            total_cents: total.cents(),
            items,
        })
    }
}

// =============================================================================
// Order
// =============================================================================

/// A frozen line item of an order.
///
/// Snapshot pattern: title, price and seller are copied at checkout and never
/// change afterwards, even if the catalog does.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    /// Product title at time of checkout (frozen).
    pub product_title: String,
    pub quantity: i64,
    /// Unit price at time of checkout (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub subtotal_cents: i64,
    pub seller_id: String,
}

impl OrderItem {
    #[inline]
    pub fn subtotal(&self) -> Money {
        Money::from_cents(self.subtotal_cents)
    }
}

/// A buyer's order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub buyer_id: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub items: Vec<OrderItem>,
    pub can_withdraw: bool,
    #[ts(as = "String")]
    pub withdrawable_at: DateTime<Utc>,
    pub report_id: Option<String>,
    pub cancel_reason: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Sum of item subtotals (equals `total` for every persisted order).
    pub fn items_total(&self) -> Money {
        self.items.iter().map(OrderItem::subtotal).sum()
    }

    /// Items sold by `seller_id`.
    pub fn items_of_seller<'a>(&'a self, seller_id: &'a str) -> impl Iterator<Item = &'a OrderItem> {
        self.items.iter().filter(move |item| item.seller_id == seller_id)
    }

    pub fn has_seller(&self, seller_id: &str) -> bool {
        self.items.iter().any(|item| item.seller_id == seller_id)
    }

    /// The seller's earnings in this order.
    pub fn seller_share(&self, seller_id: &str) -> Money {
        self.items_of_seller(seller_id).map(OrderItem::subtotal).sum()
    }

    pub fn item_for_product(&self, product_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}

/// An order seen from one seller: their items and earnings only.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SellerOrderView {
    pub order: Order,
    pub seller_items: Vec<OrderItem>,
    pub seller_earnings_cents: i64,
}

impl SellerOrderView {
    pub fn new(order: Order, seller_id: &str) -> Self {
        let seller_items: Vec<OrderItem> = order.items_of_seller(seller_id).cloned().collect();
        let seller_earnings_cents = seller_items.iter().map(|i| i.subtotal_cents).sum();
        SellerOrderView {
            order,
            seller_items,
            seller_earnings_cents,
        }
    }
}

/// An order item joined with the current catalog entry.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderProduct {
    pub item: OrderItem,
    /// `None` when the product has been removed from the catalog.
    pub product_details: Option<Product>,
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OrderProducts {
    pub order_id: String,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub products: Vec<OrderProduct>,
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Approved,
    Rejected,
    /// Admin asked the buyer for more evidence.
    NeedMoreInfo,
}

status_names!(ReportStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
    NeedMoreInfo => "need_more_info",
});

impl ReportStatus {
    /// Whether an admin may still act on the report.
    pub const fn is_open(&self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::NeedMoreInfo)
    }
}

/// Admin decision on a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReportAction {
    Approved,
    Rejected,
    NeedMoreInfo,
}

/// A buyer dispute against a completed order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub order_id: String,
    pub buyer_id: String,
    pub seller_id: String,
    pub product_id: String,
    pub status: ReportStatus,
    pub reason: String,
    pub evidence_urls: Vec<String>,
    pub admin_response: Option<String>,
    pub admin_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub resolved_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Withdrawal
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

status_names!(WithdrawalStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalAction {
    Approved,
    Rejected,
}

/// Bank details copied onto a withdrawal at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BankInfo {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
}

/// A seller payout request.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Withdrawal {
    pub id: String,
    pub seller_id: String,
    pub bank_card_id: String,
    /// Gross: the seller's subtotal across all orders.
    pub amount_cents: i64,
    pub fee_cents: i64,
    /// amount − fee.
    pub actual_amount_cents: i64,
    pub fee_rate_bps: u32,
    pub status: WithdrawalStatus,
    pub order_ids: Vec<String>,
    pub bank_info: BankInfo,
    pub note: Option<String>,
    pub admin_id: Option<String>,
    pub admin_response: Option<String>,
    pub payment_proof_urls: Vec<String>,
    #[ts(as = "Option<String>")]
    pub processed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Withdrawal {
    #[inline]
    pub fn fee_rate(&self) -> FeeRate {
        FeeRate::from_bps(self.fee_rate_bps)
    }
}

/// Approved withdrawals aggregated for one month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyWithdrawals {
    pub year: i32,
    pub month: u32,
    pub count: i64,
    pub amount_cents: i64,
    pub fee_cents: i64,
    pub actual_amount_cents: i64,
}

/// Approved withdrawal totals for a seller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalStats {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub count: i64,
    pub amount_cents: i64,
    pub fee_cents: i64,
    pub actual_amount_cents: i64,
    pub by_month: Vec<MonthlyWithdrawals>,
}

// =============================================================================
// Bank Card
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BankCard {
    pub id: String,
    pub user_id: String,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub is_default: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl BankCard {
    pub fn bank_info(&self) -> BankInfo {
        BankInfo {
            bank_name: self.bank_name.clone(),
            account_number: self.account_number.clone(),
            account_holder: self.account_holder.clone(),
        }
    }
}

// =============================================================================
// Wallet & Payment History
// =============================================================================

/// One wallet per user; created lazily with a zero balance.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: String,
    pub user_id: String,
    pub balance_cents: i64,
    pub currency: String,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    #[inline]
    pub fn balance(&self) -> Money {
        Money::from_cents(self.balance_cents)
    }
}

/// A monetary event on a user's account.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHistory {
    pub id: String,
    pub user_id: String,
    pub order_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_type: TransactionType,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    /// External or generated reference (`WALLET-…`, `RECHARGE-…`, withdrawal id).
    pub transaction_id: Option<String>,
    pub description: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: serde_json::Value,
    pub balance_before_cents: Option<i64>,
    pub balance_after_cents: Option<i64>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Input for a new payment history row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: String,
    pub order_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub transaction_type: TransactionType,
    pub amount: Money,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub balance_before: Option<Money>,
    pub balance_after: Option<Money>,
}

/// Totals over a user's completed payment rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStats {
    pub total_deposit_cents: i64,
    pub total_payment_cents: i64,
    pub total_refund_cents: i64,
    pub total_withdrawal_cents: i64,
    pub transaction_count: i64,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub limit: u32,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderReadyForWithdrawal,
    ReportCreated,
    ReportApproved,
    ReportRejected,
    ReportNeedInfo,
    ReportEvidenceAdded,
    WithdrawalApproved,
    WithdrawalRejected,
}

status_names!(NotificationKind {
    OrderReadyForWithdrawal => "order_ready_for_withdrawal",
    ReportCreated => "report_created",
    ReportApproved => "report_approved",
    ReportRejected => "report_rejected",
    ReportNeedInfo => "report_need_info",
    ReportEvidenceAdded => "report_evidence_added",
    WithdrawalApproved => "withdrawal_approved",
    WithdrawalRejected => "withdrawal_rejected",
});

/// A user-facing notification and its delivery state.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Deep link into the storefront (`/orders/sold`, `/reports/{id}`, ...).
    pub action_url: Option<String>,
    #[ts(type = "Record<string, unknown>")]
    pub metadata: serde_json::Value,
    pub read: bool,
    pub attempts: i64,
    pub last_error: Option<String>,
    #[ts(as = "Option<String>")]
    pub dispatched_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Input for a new notification.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub user_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub metadata: serde_json::Value,
}

// =============================================================================
// Users & Configuration
// =============================================================================

/// Profile data mirrored from the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A runtime-tunable numeric setting.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SystemVariable {
    pub key: String,
    pub value: f64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(seller: &str, product: &str, unit: i64, qty: i64) -> OrderItem {
        OrderItem {
            id: format!("item-{}", product),
            order_id: "order-1".to_string(),
            product_id: product.to_string(),
            product_title: format!("Product {}", product),
            quantity: qty,
            unit_price_cents: unit,
            subtotal_cents: unit * qty,
            seller_id: seller.to_string(),
        }
    }

    fn order(items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        Order {
            id: "order-1".to_string(),
            buyer_id: "buyer".to_string(),
            total_cents: items.iter().map(|i| i.subtotal_cents).sum(),
            status: OrderStatus::Completed,
            payment_method: PaymentMethod::Wallet,
            transaction_id: None,
            items,
            can_withdraw: false,
            withdrawable_at: now,
            report_id: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn cart_line(product: &str, unit: i64, qty: i64) -> CartItem {
        CartItem {
            id: format!("line-{product}"),
            user_id: "buyer".to_string(),
            product_id: product.to_string(),
            quantity: qty,
            unit_price_cents: unit,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_cart_view_totals() {
        let view = CartView::new(vec![cart_line("p1", 1_000, 2), cart_line("p2", 500, 1)]).unwrap();
        assert_eq!(view.total_cents, 2_500);
        assert_eq!(view.count, 2);

        let err = CartView::new(vec![cart_line("p1", i64::MAX, 2)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));

        let err = CartView::new(vec![cart_line("p1", i64::MAX, 1), cart_line("p2", 1, 1)]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidAmount { .. }));
    }

    #[test]
    fn test_seller_share_only_counts_own_items() {
        let order = order(vec![
            item("alice", "p1", 1_000, 2),
            item("bob", "p2", 500, 1),
            item("alice", "p3", 300, 1),
        ]);
        assert_eq!(order.seller_share("alice").cents(), 2_300);
        assert_eq!(order.seller_share("bob").cents(), 500);
        assert_eq!(order.seller_share("carol").cents(), 0);
        assert_eq!(order.items_total(), order.total());
    }

    #[test]
    fn test_seller_view() {
        let view = SellerOrderView::new(
            order(vec![item("alice", "p1", 1_000, 1), item("bob", "p2", 700, 1)]),
            "bob",
        );
        assert_eq!(view.seller_items.len(), 1);
        assert_eq!(view.seller_earnings_cents, 700);
    }

    #[test]
    fn test_status_names_round_trip_through_str() {
        assert_eq!(OrderStatus::ReadyForWithdrawal.as_str(), "ready_for_withdrawal");
        assert_eq!(
            "need_more_info".parse::<ReportStatus>().unwrap(),
            ReportStatus::NeedMoreInfo
        );
        assert!("shipped".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serde_matches_as_str() {
        let json = serde_json::to_string(&OrderStatus::ReadyForWithdrawal).unwrap();
        assert_eq!(json, "\"ready_for_withdrawal\"");
        let json = serde_json::to_string(&NotificationKind::OrderReadyForWithdrawal).unwrap();
        assert_eq!(json, "\"order_ready_for_withdrawal\"");
    }

    #[test]
    fn test_past_report_window() {
        assert!(OrderStatus::Withdrawn.past_report_window());
        assert!(!OrderStatus::Reported.past_report_window());
        assert!(ReportStatus::NeedMoreInfo.is_open());
        assert!(!ReportStatus::Rejected.is_open());
    }
}
