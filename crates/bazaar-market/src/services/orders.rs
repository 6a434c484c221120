//! # Order Workflow
//!
//! Checkout turns a cart into a paid order in one transaction.
//!
//! ## Checkout
//! ```text
//!  cart rows ──► validate ──► BEGIN ─────────────────────────────────┐
//!  (selected)    products      │ 1. debit wallet (balance >= total)  │
//!                 blocked?     │ 2. insert order + item snapshot     │
//!                 bought?      │ 3. payment history (completed)      │
//!                 balance?     │ 4. pending → completed (WALLET-…)   │
//!                              │ 5. delete checked-out cart rows     │
//!                              └──────────────────────────── COMMIT ─┘
//! ```
//!
//! The debit is the first statement, so SQLite takes the write lock before
//! anything else is read inside the transaction. Any failure drops the
//! transaction: a debit never exists without its order.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use bazaar_core::settlement::withdrawable_at;
use bazaar_core::{
    CoreError, Money, NewPayment, Order, OrderItem, OrderProduct, OrderProducts, OrderStatus, PaymentMethod,
    PaymentStatus, Product, SellerOrderView, TransactionType,
};
use bazaar_db::{CartRepository, Database, OrderRepository, PaymentHistoryRepository, WalletRepository};

use crate::clock::Clock;
use crate::error::MarketResult;

#[derive(Debug, Clone)]
pub struct OrderService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl OrderService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        OrderService { db, clock }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Buys the cart, or only `product_ids` from it when given.
    ///
    /// ## Errors
    /// - `EmptyCart` when nothing is selected
    /// - `ProductNotFound` / `ProductUnavailable` per cart line
    /// - `AlreadyPurchased` when an earlier order holds one of the products
    /// - `InsufficientBalance` when the wallet can't cover the total
    pub async fn checkout(&self, buyer_id: &str, product_ids: Option<&[String]>) -> MarketResult<Order> {
        let mut lines = self.db.carts().list(buyer_id).await?;
        if let Some(selected) = product_ids {
            lines.retain(|line| selected.contains(&line.product_id));
        }
        if lines.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let ids: Vec<String> = lines.iter().map(|l| l.product_id.clone()).collect();
        let products: HashMap<String, Product> = self
            .db
            .products()
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        for id in &ids {
            let product = products
                .get(id)
                .ok_or_else(|| CoreError::ProductNotFound(id.clone()))?;
            if !product.is_purchasable() {
                return Err(CoreError::ProductUnavailable {
                    title: product.title.clone(),
                }
                .into());
            }
        }

        let owned = self.db.orders().purchased_products(buyer_id, &ids).await?;
        if let Some(first) = owned.first() {
            let title = products.get(first).map_or_else(|| first.clone(), |p| p.title.clone());
            return Err(CoreError::AlreadyPurchased { title }.into());
        }

        let now = self.clock.now();
        let order_id = Uuid::new_v4().to_string();
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let Some(product) = products.get(&line.product_id) else {
                continue;
            };
            items.push(OrderItem {
                id: Uuid::new_v4().to_string(),
                order_id: order_id.clone(),
                product_id: product.id.clone(),
                product_title: product.title.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price_cents,
                subtotal_cents: line.line_total()?.cents(),
                seller_id: product.seller_id.clone(),
            });
        }
        let total = Money::checked_sum(items.iter().map(OrderItem::subtotal)).ok_or_else(|| {
            CoreError::InvalidAmount {
                reason: "order total overflows".to_string(),
            }
        })?;

        let wallet = self.db.wallets().get_or_create(buyer_id, now).await?;
        if wallet.balance() < total {
            return Err(insufficient(total, wallet.balance()));
        }

        let order = Order {
            id: order_id,
            buyer_id: buyer_id.to_string(),
            total_cents: total.cents(),
            status: OrderStatus::Pending,
            payment_method: PaymentMethod::Wallet,
            transaction_id: None,
            items,
            can_withdraw: false,
            withdrawable_at: withdrawable_at(now),
            report_id: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        let transaction_id = format!("WALLET-{}", now.timestamp_millis());

        let mut tx = self.db.begin().await?;

        let Some(change) = WalletRepository::debit(&mut *tx, buyer_id, total, now).await? else {
            drop(tx);
            let available = self.db.wallets().get_by_user(buyer_id).await?.map_or(Money::zero(), |w| w.balance());
            return Err(insufficient(total, available));
        };

        OrderRepository::insert(&mut *tx, &order).await?;

        PaymentHistoryRepository::insert(
            &mut *tx,
            &NewPayment {
                user_id: buyer_id.to_string(),
                order_id: Some(order.id.clone()),
                payment_method: PaymentMethod::Wallet,
                transaction_type: TransactionType::Payment,
                amount: total,
                status: PaymentStatus::Completed,
                transaction_id: Some(transaction_id.clone()),
                description: Some(format!("Payment for order #{}", order.id)),
                metadata: json!({ "itemCount": order.items.len() }),
                balance_before: Some(change.before),
                balance_after: Some(change.after),
            },
            now,
        )
        .await?;

        if !OrderRepository::complete_payment(&mut *tx, &order.id, &transaction_id, now).await? {
            return Err(CoreError::OrderStateConflict {
                order_id: order.id.clone(),
                expected: OrderStatus::Pending,
            }
            .into());
        }

        let bought: Vec<String> = order.items.iter().map(|i| i.product_id.clone()).collect();
        CartRepository::remove_products(&mut *tx, buyer_id, &bought).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            buyer_id = %buyer_id,
            total = total.cents(),
            items = order.items.len(),
            balance = change.after.cents(),
            "Checkout completed"
        );

        self.load(&order.id).await
    }

    // =========================================================================
    // Status updates
    // =========================================================================

    /// Unconditional status change (payment callbacks, admin tooling).
    pub async fn update_order_status(
        &self,
        order_id: &str,
        status: OrderStatus,
        transaction_id: Option<&str>,
    ) -> MarketResult<Order> {
        if !self
            .db
            .orders()
            .set_status(order_id, status, transaction_id, self.clock.now())
            .await?
        {
            return Err(CoreError::OrderNotFound(order_id.to_string()).into());
        }
        info!(order_id = %order_id, %status, "Order status set");
        self.load(order_id).await
    }

    /// Batch form of [`Self::update_order_status`]. Returns rows changed.
    pub async fn update_orders_status(&self, order_ids: &[String], status: OrderStatus) -> MarketResult<u64> {
        let changed = self
            .db
            .orders()
            .set_status_many(order_ids, status, self.clock.now())
            .await?;
        if changed < order_ids.len() as u64 {
            warn!(requested = order_ids.len(), changed, %status, "Some orders were not updated");
        }
        Ok(changed)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_orders(&self, buyer_id: &str) -> MarketResult<Vec<Order>> {
        Ok(self.db.orders().list_by_buyer(buyer_id).await?)
    }

    /// The buyer's order; someone else's order is reported as missing.
    pub async fn get_order(&self, order_id: &str, buyer_id: &str) -> MarketResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }

    /// Order items joined with the current catalog entries.
    pub async fn get_order_products(&self, order_id: &str, buyer_id: &str) -> MarketResult<OrderProducts> {
        let order = self.get_order(order_id, buyer_id).await?;
        let ids: Vec<String> = order.items.iter().map(|i| i.product_id.clone()).collect();
        let mut catalog: HashMap<String, Product> = self
            .db
            .products()
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let products = order
            .items
            .iter()
            .map(|item| OrderProduct {
                item: item.clone(),
                product_details: catalog.remove(&item.product_id),
            })
            .collect();

        Ok(OrderProducts {
            order_id: order.id,
            status: order.status,
            total_cents: order.total_cents,
            products,
        })
    }

    /// Every order containing the seller's items.
    pub async fn get_sold_orders(&self, seller_id: &str) -> MarketResult<Vec<SellerOrderView>> {
        let orders = self.db.orders().list_by_seller(seller_id, None).await?;
        Ok(orders.into_iter().map(|o| SellerOrderView::new(o, seller_id)).collect())
    }

    pub async fn get_ready_for_withdrawal(&self, seller_id: &str) -> MarketResult<Vec<SellerOrderView>> {
        let orders = self
            .db
            .orders()
            .list_by_seller(seller_id, Some(OrderStatus::ReadyForWithdrawal))
            .await?;
        Ok(orders
            .into_iter()
            .filter(|o| o.can_withdraw)
            .map(|o| SellerOrderView::new(o, seller_id))
            .collect())
    }

    async fn load(&self, order_id: &str) -> MarketResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()).into())
    }
}

fn insufficient(required: Money, available: Money) -> crate::MarketError {
    CoreError::InsufficientBalance {
        required: required.cents(),
        available: available.cents(),
    }
    .into()
}
