//! # System Variable Repository
//!
//! Named numeric settings editable at runtime (e.g. the withdrawal fee
//! percentage under `discountRate`).

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use bazaar_core::SystemVariable;

#[derive(Debug, sqlx::FromRow)]
struct SystemVariableRecord {
    key: String,
    value: f64,
    updated_at: DateTime<Utc>,
}

impl From<SystemVariableRecord> for SystemVariable {
    fn from(r: SystemVariableRecord) -> Self {
        SystemVariable {
            key: r.key,
            value: r.value,
            updated_at: r.updated_at,
        }
    }
}

/// Repository for system variables.
#[derive(Debug, Clone)]
pub struct SystemVariableRepository {
    pool: SqlitePool,
}

impl SystemVariableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SystemVariableRepository { pool }
    }

    pub async fn get(&self, key: &str) -> DbResult<Option<SystemVariable>> {
        let record = sqlx::query_as::<_, SystemVariableRecord>(
            "SELECT key, value, updated_at FROM system_variables WHERE key = ?1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(SystemVariable::from))
    }

    /// Inserts or replaces a value.
    pub async fn set(&self, key: &str, value: f64, now: DateTime<Utc>) -> DbResult<SystemVariable> {
        let record = sqlx::query_as::<_, SystemVariableRecord>(
            r#"
            INSERT INTO system_variables (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT (key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            RETURNING key, value, updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        info!(key = %key, value = value, "System variable updated");
        Ok(record.into())
    }

    pub async fn list(&self) -> DbResult<Vec<SystemVariable>> {
        let records = sqlx::query_as::<_, SystemVariableRecord>(
            "SELECT key, value, updated_at FROM system_variables ORDER BY key",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(SystemVariable::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};
    use bazaar_core::DISCOUNT_RATE_KEY;
    use chrono::Duration;

    #[tokio::test]
    async fn test_set_overwrites() {
        let db = db().await;
        let repo = db.system_variables();

        assert!(repo.get(DISCOUNT_RATE_KEY).await.unwrap().is_none());

        repo.set(DISCOUNT_RATE_KEY, 17.0, t0()).await.unwrap();
        let updated = repo
            .set(DISCOUNT_RATE_KEY, 12.5, t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(updated.value, 12.5);

        let loaded = repo.get(DISCOUNT_RATE_KEY).await.unwrap().unwrap();
        assert_eq!(loaded.value, 12.5);
        assert_eq!(loaded.updated_at, t0() + Duration::hours(1));
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
