//! # Payment History Repository
//!
//! Append-mostly log of money movements. Rows are inserted once; only a
//! pending row ever changes, moving to `completed` or `failed` with its
//! metadata merged.
//!
//! ```text
//!   deposit     RECHARGE-…   pending ──► completed | failed   (gateway webhook)
//!   payment     WALLET-…     completed                        (checkout)
//!   refund      order id     completed                        (report approved)
//!   withdrawal  withdrawal   completed                        (payout approved)
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{from_json, page_offset, to_json};
use crate::error::{DbError, DbResult};
use bazaar_core::{
    Money, NewPayment, Page, PaymentHistory, PaymentMethod, PaymentStats, PaymentStatus,
    TransactionType, DEFAULT_CURRENCY,
};

#[derive(Debug, sqlx::FromRow)]
struct PaymentRecord {
    id: String,
    user_id: String,
    order_id: Option<String>,
    payment_method: PaymentMethod,
    transaction_type: TransactionType,
    amount_cents: i64,
    currency: String,
    status: PaymentStatus,
    transaction_id: Option<String>,
    description: Option<String>,
    metadata: String,
    balance_before_cents: Option<i64>,
    balance_after_cents: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRecord> for PaymentHistory {
    type Error = DbError;

    fn try_from(r: PaymentRecord) -> DbResult<Self> {
        Ok(PaymentHistory {
            id: r.id,
            user_id: r.user_id,
            order_id: r.order_id,
            payment_method: r.payment_method,
            transaction_type: r.transaction_type,
            amount_cents: r.amount_cents,
            currency: r.currency,
            status: r.status,
            transaction_id: r.transaction_id,
            description: r.description,
            metadata: from_json(&r.metadata)?,
            balance_before_cents: r.balance_before_cents,
            balance_after_cents: r.balance_after_cents,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn convert(records: Vec<PaymentRecord>) -> DbResult<Vec<PaymentHistory>> {
    records.into_iter().map(PaymentHistory::try_from).collect()
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, order_id, payment_method, transaction_type, amount_cents,
           currency, status, transaction_id, description, metadata,
           balance_before_cents, balance_after_cents, created_at, updated_at
    FROM payment_history
"#;

/// Repository for payment history rows.
#[derive(Debug, Clone)]
pub struct PaymentHistoryRepository {
    pool: SqlitePool,
}

impl PaymentHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentHistoryRepository { pool }
    }

    /// Inserts a row outside of any larger transaction.
    pub async fn create(&self, entry: &NewPayment, now: DateTime<Utc>) -> DbResult<PaymentHistory> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, entry, now).await
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PaymentHistory>> {
        let record = sqlx::query_as::<_, PaymentRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(PaymentHistory::try_from).transpose()
    }

    /// Finds the row carrying an external transaction reference.
    pub async fn find_by_transaction_id(&self, transaction_id: &str) -> DbResult<Option<PaymentHistory>> {
        let record = sqlx::query_as::<_, PaymentRecord>(&format!(
            "{SELECT_COLUMNS} WHERE transaction_id = ?1 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        record.map(PaymentHistory::try_from).transpose()
    }

    /// Newest-first page of a user's history.
    pub async fn list_by_user(&self, user_id: &str, page: u32, limit: u32) -> DbResult<Page<PaymentHistory>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM payment_history WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let records = sqlx::query_as::<_, PaymentRecord>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC LIMIT ?2 OFFSET ?3"
        ))
        .bind(user_id)
        .bind(limit as i64)
        .bind(page_offset(page, limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            data: convert(records)?,
            total,
            page,
            limit,
        })
    }

    pub async fn list_by_order(&self, order_id: &str) -> DbResult<Vec<PaymentHistory>> {
        let records = sqlx::query_as::<_, PaymentRecord>(&format!(
            "{SELECT_COLUMNS} WHERE order_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        convert(records)
    }

    /// Unconditional status update with metadata merge.
    ///
    /// `transaction_id` replaces the stored reference only when given.
    pub async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        metadata: Option<&Value>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let patch = to_json(metadata.unwrap_or(&Value::Object(Default::default())))?;

        let result = sqlx::query(
            r#"
            UPDATE payment_history
            SET status = ?2,
                transaction_id = COALESCE(?3, transaction_id),
                metadata = json_patch(metadata, ?4),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(transaction_id)
        .bind(patch)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Totals over the user's completed rows.
    pub async fn stats(&self, user_id: &str) -> DbResult<PaymentStats> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(CASE WHEN transaction_type = 'deposit' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'payment' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'refund' THEN amount_cents END), 0),
                COALESCE(SUM(CASE WHEN transaction_type = 'withdrawal' THEN amount_cents END), 0),
                COUNT(*)
            FROM payment_history
            WHERE user_id = ?1 AND status = 'completed'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(PaymentStats {
            total_deposit_cents: row.0,
            total_payment_cents: row.1,
            total_refund_cents: row.2,
            total_withdrawal_cents: row.3,
            transaction_count: row.4,
        })
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    pub async fn insert(
        conn: &mut SqliteConnection,
        entry: &NewPayment,
        now: DateTime<Utc>,
    ) -> DbResult<PaymentHistory> {
        let row = PaymentHistory {
            id: Uuid::new_v4().to_string(),
            user_id: entry.user_id.clone(),
            order_id: entry.order_id.clone(),
            payment_method: entry.payment_method,
            transaction_type: entry.transaction_type,
            amount_cents: entry.amount.cents(),
            currency: DEFAULT_CURRENCY.to_string(),
            status: entry.status,
            transaction_id: entry.transaction_id.clone(),
            description: entry.description.clone(),
            metadata: if entry.metadata.is_null() {
                Value::Object(Default::default())
            } else {
                entry.metadata.clone()
            },
            balance_before_cents: entry.balance_before.map(|m| m.cents()),
            balance_after_cents: entry.balance_after.map(|m| m.cents()),
            created_at: now,
            updated_at: now,
        };

        debug!(
            id = %row.id,
            user_id = %row.user_id,
            kind = %row.transaction_type,
            amount = row.amount_cents,
            "Recording payment history"
        );

        sqlx::query(
            r#"
            INSERT INTO payment_history (
                id, user_id, order_id, payment_method, transaction_type,
                amount_cents, currency, status, transaction_id, description,
                metadata, balance_before_cents, balance_after_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&row.id)
        .bind(&row.user_id)
        .bind(&row.order_id)
        .bind(row.payment_method)
        .bind(row.transaction_type)
        .bind(row.amount_cents)
        .bind(&row.currency)
        .bind(row.status)
        .bind(&row.transaction_id)
        .bind(&row.description)
        .bind(to_json(&row.metadata)?)
        .bind(row.balance_before_cents)
        .bind(row.balance_after_cents)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Moves a pending row to `to`, merging `metadata` and storing balances.
    ///
    /// Returns `false` if the row is no longer pending.
    pub async fn settle_pending(
        conn: &mut SqliteConnection,
        id: &str,
        to: PaymentStatus,
        balances: Option<(Money, Money)>,
        metadata: &Value,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE payment_history
            SET status = ?2,
                balance_before_cents = COALESCE(?3, balance_before_cents),
                balance_after_cents = COALESCE(?4, balance_after_cents),
                metadata = json_patch(metadata, ?5),
                updated_at = ?6
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(to)
        .bind(balances.map(|(before, _)| before.cents()))
        .bind(balances.map(|(_, after)| after.cents()))
        .bind(to_json(metadata)?)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};
    use chrono::Duration;
    use serde_json::json;

    fn deposit(user: &str, cents: i64, txn: &str) -> NewPayment {
        NewPayment {
            user_id: user.to_string(),
            order_id: None,
            payment_method: PaymentMethod::Gateway,
            transaction_type: TransactionType::Deposit,
            amount: Money::from_cents(cents),
            status: PaymentStatus::Pending,
            transaction_id: Some(txn.to_string()),
            description: Some("Wallet top-up".to_string()),
            metadata: json!({ "source": "test" }),
            balance_before: None,
            balance_after: None,
        }
    }

    #[tokio::test]
    async fn test_paging_is_newest_first() {
        let db = db().await;
        let repo = db.payment_history();
        for i in 0..5 {
            repo.create(&deposit("u1", 100 * (i + 1), &format!("T{}", i)), t0() + Duration::minutes(i))
                .await
                .unwrap();
        }
        repo.create(&deposit("u2", 1, "X"), t0()).await.unwrap();

        let page = repo.list_by_user("u1", 1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0].transaction_id.as_deref(), Some("T4"));

        let last = repo.list_by_user("u1", 3, 2).await.unwrap();
        assert_eq!(last.data.len(), 1);
        assert_eq!(last.data[0].transaction_id.as_deref(), Some("T0"));
    }

    #[tokio::test]
    async fn test_settle_pending_only_once() {
        let db = db().await;
        let repo = db.payment_history();
        let row = repo.create(&deposit("u1", 500, "RECHARGE-1"), t0()).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let patch = json!({ "reference": "FT123" });
        let balances = Some((Money::zero(), Money::from_cents(500)));
        assert!(PaymentHistoryRepository::settle_pending(
            &mut conn, &row.id, PaymentStatus::Completed, balances, &patch, t0()
        )
        .await
        .unwrap());
        assert!(!PaymentHistoryRepository::settle_pending(
            &mut conn, &row.id, PaymentStatus::Failed, None, &patch, t0()
        )
        .await
        .unwrap());
        drop(conn);

        let row = repo.find_by_transaction_id("RECHARGE-1").await.unwrap().unwrap();
        assert_eq!(row.status, PaymentStatus::Completed);
        assert_eq!(row.balance_after_cents, Some(500));
        assert_eq!(row.metadata["source"], "test");
        assert_eq!(row.metadata["reference"], "FT123");
    }

    #[tokio::test]
    async fn test_stats_count_only_completed() {
        let db = db().await;
        let repo = db.payment_history();
        let pending = repo.create(&deposit("u1", 500, "A"), t0()).await.unwrap();
        let done = repo.create(&deposit("u1", 700, "B"), t0()).await.unwrap();
        repo.update_status(&done.id, PaymentStatus::Completed, None, Some(&json!({"ok": true})), t0())
            .await
            .unwrap();

        let mut refund = deposit("u1", 200, "C");
        refund.transaction_type = TransactionType::Refund;
        refund.status = PaymentStatus::Completed;
        repo.create(&refund, t0()).await.unwrap();

        let stats = repo.stats("u1").await.unwrap();
        assert_eq!(stats.total_deposit_cents, 700);
        assert_eq!(stats.total_refund_cents, 200);
        assert_eq!(stats.transaction_count, 2);

        let untouched = repo.get_by_id(&pending.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, PaymentStatus::Pending);
    }
}
