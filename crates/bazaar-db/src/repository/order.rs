//! # Order Repository
//!
//! Orders and their frozen line items.
//!
//! ## Status Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every workflow transition is a compare-and-swap:                       │
//! │                                                                         │
//! │    UPDATE orders SET status = :to, can_withdraw = :flag                 │
//! │    WHERE id = :id AND status = :from                                    │
//! │                                                                         │
//! │  rows_affected = 1 → moved                                             │
//! │  rows_affected = 0 → someone else moved it first (caller reports a     │
//! │                      state conflict)                                    │
//! │                                                                         │
//! │  can_withdraw is derived from the target status, so the flag and the   │
//! │  status can never disagree.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Item Snapshot
//! `order_items` rows are written once at checkout and never updated. The
//! `seller_id` index serves the seller-side queries.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use super::placeholders;
use crate::error::DbResult;
use bazaar_core::{Order, OrderItem, OrderStatus, PaymentMethod};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRecord {
    id: String,
    buyer_id: String,
    total_cents: i64,
    status: OrderStatus,
    payment_method: PaymentMethod,
    transaction_id: Option<String>,
    can_withdraw: bool,
    withdrawable_at: DateTime<Utc>,
    report_id: Option<String>,
    cancel_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRecord {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            buyer_id: self.buyer_id,
            total_cents: self.total_cents,
            status: self.status,
            payment_method: self.payment_method,
            transaction_id: self.transaction_id,
            items,
            can_withdraw: self.can_withdraw,
            withdrawable_at: self.withdrawable_at,
            report_id: self.report_id,
            cancel_reason: self.cancel_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRecord {
    id: String,
    order_id: String,
    product_id: String,
    product_title: String,
    quantity: i64,
    unit_price_cents: i64,
    subtotal_cents: i64,
    seller_id: String,
}

impl From<OrderItemRecord> for OrderItem {
    fn from(r: OrderItemRecord) -> Self {
        OrderItem {
            id: r.id,
            order_id: r.order_id,
            product_id: r.product_id,
            product_title: r.product_title,
            quantity: r.quantity,
            unit_price_cents: r.unit_price_cents,
            subtotal_cents: r.subtotal_cents,
            seller_id: r.seller_id,
        }
    }
}

const ORDER_COLUMNS: &str = "o.id, o.buyer_id, o.total_cents, o.status, o.payment_method, \
     o.transaction_id, o.can_withdraw, o.withdrawable_at, o.report_id, o.cancel_reason, \
     o.created_at, o.updated_at";

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let mut orders = self.get_many(&[id.to_string()]).await?;
        Ok(orders.pop())
    }

    /// Loads several orders with their items. Missing ids are absent.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Order>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id IN ({}) ORDER BY o.created_at DESC",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, OrderRecord>(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let records = query.fetch_all(&self.pool).await?;

        self.attach_items(records).await
    }

    /// A buyer's orders, newest first.
    pub async fn list_by_buyer(&self, buyer_id: &str) -> DbResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders o WHERE o.buyer_id = ?1 ORDER BY o.created_at DESC"
        ))
        .bind(buyer_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(records).await
    }

    /// Orders containing at least one item of `seller_id`, optionally
    /// filtered by status, newest first.
    pub async fn list_by_seller(&self, seller_id: &str, status: Option<OrderStatus>) -> DbResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            WHERE o.id IN (SELECT DISTINCT order_id FROM order_items WHERE seller_id = ?1)
              AND (?2 IS NULL OR o.status = ?2)
            ORDER BY o.created_at DESC
            "#
        ))
        .bind(seller_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(records).await
    }

    /// Which of `product_ids` the buyer already has in any order.
    pub async fn purchased_products(&self, buyer_id: &str, product_ids: &[String]) -> DbResult<Vec<String>> {
        if product_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT DISTINCT oi.product_id FROM order_items oi \
             JOIN orders o ON o.id = oi.order_id \
             WHERE o.buyer_id = ? AND oi.product_id IN ({})",
            placeholders(product_ids.len())
        );
        let mut query = sqlx::query_scalar::<_, String>(&sql).bind(buyer_id);
        for id in product_ids {
            query = query.bind(id);
        }

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Orders the scheduler should promote at `now`, oldest first.
    pub async fn find_due_for_promotion(&self, now: DateTime<Utc>, limit: u32) -> DbResult<Vec<Order>> {
        let records = sqlx::query_as::<_, OrderRecord>(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            WHERE o.status = 'completed'
              AND o.can_withdraw = 0
              AND o.report_id IS NULL
              AND o.withdrawable_at < ?1
            ORDER BY o.withdrawable_at
            LIMIT ?2
            "#
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(records).await
    }

    /// Promotes one order if it still matches the sweep predicate.
    ///
    /// The whole predicate is repeated in the WHERE clause, so a report filed
    /// after the sweep selected the order wins.
    pub async fn promote_if_due(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'ready_for_withdrawal', can_withdraw = 1, updated_at = ?2
            WHERE id = ?1
              AND status = 'completed'
              AND can_withdraw = 0
              AND report_id IS NULL
              AND withdrawable_at < ?2
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unconditional status change for payment callbacks and admin tooling.
    pub async fn set_status(
        &self,
        id: &str,
        status: OrderStatus,
        transaction_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?2,
                can_withdraw = ?3,
                transaction_id = COALESCE(?4, transaction_id),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(status.past_report_window())
        .bind(transaction_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Unconditional status change for a batch. Returns rows changed.
    pub async fn set_status_many(&self, ids: &[String], status: OrderStatus, now: DateTime<Utc>) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "UPDATE orders SET status = ?, can_withdraw = ?, updated_at = ? WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql)
            .bind(status)
            .bind(status.past_report_window())
            .bind(now);
        for id in ids {
            query = query.bind(id);
        }

        Ok(query.execute(&self.pool).await?.rows_affected())
    }

    async fn attach_items(&self, records: Vec<OrderRecord>) -> DbResult<Vec<Order>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let sql = format!(
            "SELECT id, order_id, product_id, product_title, quantity, unit_price_cents, \
             subtotal_cents, seller_id \
             FROM order_items WHERE order_id IN ({}) ORDER BY order_id, position",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, OrderItemRecord>(&sql);
        for id in &ids {
            query = query.bind(*id);
        }
        let item_records = query.fetch_all(&self.pool).await?;

        let mut by_order: HashMap<String, Vec<OrderItem>> = HashMap::new();
        for item in item_records {
            by_order
                .entry(item.order_id.clone())
                .or_default()
                .push(item.into());
        }

        Ok(records
            .into_iter()
            .map(|r| {
                let items = by_order.remove(&r.id).unwrap_or_default();
                r.into_order(items)
            })
            .collect())
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Inserts an order with its item snapshot.
    pub async fn insert(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, buyer_id = %order.buyer_id, total = order.total_cents, "Inserting order");

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_id, total_cents, status, payment_method, transaction_id,
                can_withdraw, withdrawable_at, report_id, cancel_reason,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&order.id)
        .bind(&order.buyer_id)
        .bind(order.total_cents)
        .bind(order.status)
        .bind(order.payment_method)
        .bind(&order.transaction_id)
        .bind(order.can_withdraw)
        .bind(order.withdrawable_at)
        .bind(&order.report_id)
        .bind(&order.cancel_reason)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    id, order_id, position, product_id, product_title,
                    quantity, unit_price_cents, subtotal_cents, seller_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
            )
            .bind(&item.id)
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.product_id)
            .bind(&item.product_title)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.subtotal_cents)
            .bind(&item.seller_id)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Compare-and-swap `from` → `to`.
    pub async fn transition(
        conn: &mut SqliteConnection,
        id: &str,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?3, can_withdraw = ?4, updated_at = ?5
            WHERE id = ?1 AND status = ?2
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(to.past_report_window())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        let moved = result.rows_affected() > 0;
        debug!(order_id = %id, %from, %to, moved, "Order transition");
        Ok(moved)
    }

    /// pending → completed, recording the payment reference.
    pub async fn complete_payment(
        conn: &mut SqliteConnection,
        id: &str,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'completed', transaction_id = ?2, updated_at = ?3
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(transaction_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// completed → reported, linking the report.
    pub async fn mark_reported(
        conn: &mut SqliteConnection,
        id: &str,
        report_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = 'reported', report_id = ?2, can_withdraw = 0, updated_at = ?3
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(id)
        .bind(report_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
