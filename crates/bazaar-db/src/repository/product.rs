//! # Product Repository
//!
//! Minimal catalog: enough for checkout to price, snapshot and block items.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use super::placeholders;
use crate::error::DbResult;
use bazaar_core::{Product, ProductStatus};

#[derive(Debug, sqlx::FromRow)]
struct ProductRecord {
    id: String,
    seller_id: String,
    title: String,
    price_cents: i64,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for Product {
    fn from(r: ProductRecord) -> Self {
        Product {
            id: r.id,
            seller_id: r.seller_id,
            title: r.title,
            price_cents: r.price_cents,
            status: r.status,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Creates an active product.
    pub async fn create(
        &self,
        seller_id: &str,
        title: &str,
        price_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Product> {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            seller_id: seller_id.to_string(),
            title: title.to_string(),
            price_cents,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.insert(&product).await?;
        Ok(product)
    }

    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, seller_id = %product.seller_id, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (id, seller_id, title, price_cents, status, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&product.id)
        .bind(&product.seller_id)
        .bind(&product.title)
        .bind(product.price_cents)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let record = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, seller_id, title, price_cents, status, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(Product::from))
    }

    /// Fetches several products at once. Missing ids are simply absent.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, seller_id, title, price_cents, status, created_at, updated_at \
             FROM products WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query_as::<_, ProductRecord>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let records = query.fetch_all(&self.pool).await?;
        Ok(records.into_iter().map(Product::from).collect())
    }

    /// Blocks or unblocks a product. `false` if it doesn't exist.
    pub async fn set_status(&self, id: &str, status: ProductStatus, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query("UPDATE products SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};

    #[tokio::test]
    async fn test_create_get_block() {
        let db = db().await;
        let repo = db.products();

        let p = repo.create("seller", "Rust ebook", 10_000_000, t0()).await.unwrap();
        assert!(p.is_purchasable());

        assert!(repo.set_status(&p.id, ProductStatus::Blocked, t0()).await.unwrap());
        let p = repo.get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(p.status, ProductStatus::Blocked);

        assert!(!repo.set_status("missing", ProductStatus::Active, t0()).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_get_many_skips_missing() {
        let db = db().await;
        let repo = db.products();
        let a = repo.create("s", "A", 100, t0()).await.unwrap();
        let b = repo.create("s", "B", 200, t0()).await.unwrap();

        let found = repo
            .get_many(&[a.id.clone(), "nope".to_string(), b.id.clone()])
            .await
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(repo.get_many(&[]).await.unwrap().is_empty());
    }
}
