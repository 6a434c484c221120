//! # Error Types
//!
//! Domain-specific error types for bazaar-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  bazaar-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  bazaar-db errors                                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  bazaar-market errors                                                  │
//! │  └── MarketError      - CoreError | DbError                            │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - What HTTP clients see (code + message)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Business rule violations raised by the workflows.
///
/// Every variant is a caller-visible failure with a stable kind. Storage and
/// transport failures are never represented here.
#[derive(Debug, Error)]
pub enum CoreError {
    // -------------------------------------------------------------------------
    // Checkout
    // -------------------------------------------------------------------------
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Cart item not found: {0}")]
    CartItemNotFound(String),

    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The product was blocked by an admin.
    #[error("Product {title} is not available for purchase")]
    ProductUnavailable { title: String },

    /// Digital goods are bought once per buyer.
    #[error("You have already purchased the product: {title}")]
    AlreadyPurchased { title: String },

    /// Wallet balance is below the amount to debit.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (total: 200,000)
    ///      │
    ///      ▼
    /// Wallet balance: 150,000
    ///      │
    ///      ▼
    /// InsufficientBalance { required, available }
    ///      │
    ///      ▼
    /// Nothing persisted, wallet untouched
    /// ```
    #[error("Insufficient balance. Required: {required}, Available: {available}")]
    InsufficientBalance { required: i64, available: i64 },

    // -------------------------------------------------------------------------
    // Orders
    // -------------------------------------------------------------------------
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// A conditional status update found the order in another state.
    ///
    /// ## When This Occurs
    /// - A report and a withdrawal raced for the same order
    /// - The scheduler promoted an order while a caller held a stale copy
    #[error("Order {order_id} is no longer {expected}")]
    OrderStateConflict { order_id: String, expected: OrderStatus },

    // -------------------------------------------------------------------------
    // Reports
    // -------------------------------------------------------------------------
    #[error("Order {order_id} is {status}, only completed orders can be reported")]
    OrderNotCompleted { order_id: String, status: OrderStatus },

    #[error("Report window for order {order_id} has expired")]
    ReportWindowExpired { order_id: String },

    #[error("Order {order_id} has already been reported")]
    AlreadyReported { order_id: String },

    #[error("Product {product_id} is not part of order {order_id}")]
    ProductNotInOrder { product_id: String, order_id: String },

    #[error("Report not found: {0}")]
    ReportNotFound(String),

    #[error("Report {report_id} has already been resolved ({status})")]
    ReportAlreadyResolved { report_id: String, status: String },

    #[error("Report {report_id} is not waiting for more information")]
    ReportNotAwaitingInfo { report_id: String },

    // -------------------------------------------------------------------------
    // Withdrawals
    // -------------------------------------------------------------------------
    #[error("Bank card not found: {0}")]
    BankCardNotFound(String),

    #[error("No default bank card found. Please add a bank card first.")]
    NoDefaultBankCard,

    #[error("Some orders not found: {}", .missing.join(", "))]
    OrdersNotFound { missing: Vec<String> },

    /// One or more requested orders cannot be withdrawn.
    ///
    /// All violations across the batch are reported together.
    #[error("Some orders cannot be withdrawn: {}", format_ineligible(.0))]
    IneligibleOrders(Vec<OrderIneligibility>),

    #[error("Total withdrawal amount must be greater than 0")]
    ZeroAmount,

    #[error("Withdrawal not found: {0}")]
    WithdrawalNotFound(String),

    #[error("Withdrawal {withdrawal_id} has already been processed ({status})")]
    AlreadyProcessed { withdrawal_id: String, status: String },

    #[error("Payment proof image is required to approve a withdrawal")]
    ProofRequired,

    #[error("Year is required when filtering by month")]
    YearRequiredForMonthFilter,

    // -------------------------------------------------------------------------
    // Wallet & Payments
    // -------------------------------------------------------------------------
    #[error("Wallet not found for user {0}")]
    WalletNotFound(String),

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    #[error("Payment {transaction_id} has already been settled")]
    PaymentAlreadySettled { transaction_id: String },

    #[error("Amount mismatch for {transaction_id}: expected {expected}, got {actual}")]
    AmountMismatch {
        transaction_id: String,
        expected: i64,
        actual: i64,
    },

    // -------------------------------------------------------------------------
    // Misc
    // -------------------------------------------------------------------------
    #[error("Notification not found: {0}")]
    NotificationNotFound(String),

    /// Caller is authenticated but may not see this resource.
    #[error("Access denied to {resource}")]
    AccessDenied { resource: String },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn format_ineligible(items: &[OrderIneligibility]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Withdrawal Eligibility
// =============================================================================

/// Why a single order cannot be included in a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Ineligibility {
    /// The seller has no line items in the order.
    NotOrderSeller,
    /// Status is not `ready_for_withdrawal`.
    OrderNotReady { status: OrderStatus },
    /// `can_withdraw` is still false.
    OrderNotWithdrawable,
}

/// An [`Ineligibility`] tied to the order it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderIneligibility {
    pub order_id: String,
    #[serde(flatten)]
    pub reason: Ineligibility,
}

impl fmt::Display for OrderIneligibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Ineligibility::NotOrderSeller => {
                write!(f, "order {} has no items sold by you", self.order_id)
            }
            Ineligibility::OrderNotReady { status } => {
                write!(f, "order {} is {}, not ready for withdrawal", self.order_id, status)
            }
            Ineligibility::OrderNotWithdrawable => {
                write!(f, "order {} is not withdrawable yet", self.order_id)
            }
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    #[error("{field} must contain at most {max} entries")]
    TooMany { field: String, max: usize },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientBalance {
            required: 20_000_000,
            available: 15_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient balance. Required: 20000000, Available: 15000000"
        );

        let err = CoreError::OrderStateConflict {
            order_id: "o-1".to_string(),
            expected: OrderStatus::ReadyForWithdrawal,
        };
        assert_eq!(err.to_string(), "Order o-1 is no longer ready_for_withdrawal");
    }

    #[test]
    fn test_ineligible_orders_lists_every_violation() {
        let err = CoreError::IneligibleOrders(vec![
            OrderIneligibility {
                order_id: "a".to_string(),
                reason: Ineligibility::NotOrderSeller,
            },
            OrderIneligibility {
                order_id: "b".to_string(),
                reason: Ineligibility::OrderNotReady {
                    status: OrderStatus::Withdrawing,
                },
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("order a has no items sold by you"));
        assert!(msg.contains("order b is withdrawing"));
    }

    #[test]
    fn test_ineligibility_serializes_flat() {
        let item = OrderIneligibility {
            order_id: "b".to_string(),
            reason: Ineligibility::OrderNotReady {
                status: OrderStatus::Completed,
            },
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["orderId"], "b");
        assert_eq!(json["reason"], "order_not_ready");
        assert_eq!(json["status"], "completed");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err: CoreError = ValidationError::Required {
            field: "reason".to_string(),
        }
        .into();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
