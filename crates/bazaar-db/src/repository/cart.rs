//! # Cart Repository
//!
//! One row per (user, product). The unit price is captured the first time the
//! product is added; adding it again only raises the quantity.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::placeholders;
use crate::error::DbResult;
use bazaar_core::CartItem;

#[derive(Debug, sqlx::FromRow)]
struct CartItemRecord {
    id: String,
    user_id: String,
    product_id: String,
    quantity: i64,
    unit_price_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<CartItemRecord> for CartItem {
    fn from(r: CartItemRecord) -> Self {
        CartItem {
            id: r.id,
            user_id: r.user_id,
            product_id: r.product_id,
            quantity: r.quantity,
            unit_price_cents: r.unit_price_cents,
            created_at: r.created_at,
        }
    }
}

/// Repository for cart items.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Items in insertion order.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<CartItem>> {
        let records = sqlx::query_as::<_, CartItemRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, unit_price_cents, created_at
            FROM cart_items
            WHERE user_id = ?1
            ORDER BY created_at, id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(CartItem::from).collect())
    }

    pub async fn find(&self, user_id: &str, product_id: &str) -> DbResult<Option<CartItem>> {
        let record = sqlx::query_as::<_, CartItemRecord>(
            r#"
            SELECT id, user_id, product_id, quantity, unit_price_cents, created_at
            FROM cart_items
            WHERE user_id = ?1 AND product_id = ?2
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(CartItem::from))
    }

    pub async fn count(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Adds `quantity` of a product, merging with an existing line.
    pub async fn add(
        &self,
        user_id: &str,
        product_id: &str,
        quantity: i64,
        unit_price_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<CartItem> {
        debug!(user_id = %user_id, product_id = %product_id, quantity, "Adding to cart");

        let record = sqlx::query_as::<_, CartItemRecord>(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity, unit_price_cents, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id, product_id)
                DO UPDATE SET quantity = cart_items.quantity + excluded.quantity
            RETURNING id, user_id, product_id, quantity, unit_price_cents, created_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(product_id)
        .bind(quantity)
        .bind(unit_price_cents)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(record.into())
    }

    /// Removes one line. `false` if it isn't the user's.
    pub async fn remove(&self, user_id: &str, item_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = ?1 AND user_id = ?2")
            .bind(item_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Deletes the checked-out lines.
    pub async fn remove_products(
        conn: &mut SqliteConnection,
        user_id: &str,
        product_ids: &[String],
    ) -> DbResult<u64> {
        if product_ids.is_empty() {
            return Ok(0);
        }

        let sql = format!(
            "DELETE FROM cart_items WHERE user_id = ? AND product_id IN ({})",
            placeholders(product_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(user_id);
        for id in product_ids {
            query = query.bind(id);
        }

        let result = query.execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }
}
