//! # Withdrawal Repository
//!
//! Seller payout requests and the orders each one consumes.
//!
//! ```text
//!   withdrawals                     withdrawal_orders
//!   ┌──────────────────────┐        ┌───────────────┬──────────┐
//!   │ id, seller_id        │ 1    * │ withdrawal_id │ order_id │
//!   │ amount / fee / actual│───────►│ position      │          │
//!   │ bank snapshot        │        └───────────────┴──────────┘
//!   │ status, proof urls   │
//!   └──────────────────────┘
//! ```
//!
//! The link rows are written once with the withdrawal and never change.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::debug;

use super::{from_json, placeholders, to_json};
use crate::error::{DbError, DbResult};
use bazaar_core::{BankInfo, MonthlyWithdrawals, Withdrawal, WithdrawalStats, WithdrawalStatus};

#[derive(Debug, sqlx::FromRow)]
struct WithdrawalRecord {
    id: String,
    seller_id: String,
    bank_card_id: String,
    amount_cents: i64,
    fee_cents: i64,
    actual_amount_cents: i64,
    fee_rate_bps: i64,
    status: WithdrawalStatus,
    bank_name: String,
    account_number: String,
    account_holder: String,
    note: Option<String>,
    admin_id: Option<String>,
    admin_response: Option<String>,
    payment_proof_urls: String,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WithdrawalRecord {
    fn into_withdrawal(self, order_ids: Vec<String>) -> DbResult<Withdrawal> {
        Ok(Withdrawal {
            id: self.id,
            seller_id: self.seller_id,
            bank_card_id: self.bank_card_id,
            amount_cents: self.amount_cents,
            fee_cents: self.fee_cents,
            actual_amount_cents: self.actual_amount_cents,
            fee_rate_bps: u32::try_from(self.fee_rate_bps)
                .map_err(|e| DbError::Serialization(format!("fee_rate_bps: {e}")))?,
            status: self.status,
            order_ids,
            bank_info: BankInfo {
                bank_name: self.bank_name,
                account_number: self.account_number,
                account_holder: self.account_holder,
            },
            note: self.note,
            admin_id: self.admin_id,
            admin_response: self.admin_response,
            payment_proof_urls: from_json(&self.payment_proof_urls)?,
            processed_at: self.processed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MonthRow {
    year: i64,
    month: i64,
    count: i64,
    amount_cents: i64,
    fee_cents: i64,
    actual_amount_cents: i64,
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, seller_id, bank_card_id, amount_cents, fee_cents, actual_amount_cents,
           fee_rate_bps, status, bank_name, account_number, account_holder, note,
           admin_id, admin_response, payment_proof_urls, processed_at, created_at, updated_at
    FROM withdrawals
"#;

/// Repository for withdrawals.
#[derive(Debug, Clone)]
pub struct WithdrawalRepository {
    pool: SqlitePool,
}

impl WithdrawalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WithdrawalRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Withdrawal>> {
        let record = sqlx::query_as::<_, WithdrawalRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match record {
            Some(record) => Ok(self.attach_orders(vec![record]).await?.pop()),
            None => Ok(None),
        }
    }

    /// A seller's withdrawals, newest first.
    pub async fn list_by_seller(&self, seller_id: &str) -> DbResult<Vec<Withdrawal>> {
        let records = sqlx::query_as::<_, WithdrawalRecord>(&format!(
            "{SELECT_COLUMNS} WHERE seller_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        self.attach_orders(records).await
    }

    /// All withdrawals, optionally by status, newest first.
    pub async fn list_all(&self, status: Option<WithdrawalStatus>) -> DbResult<Vec<Withdrawal>> {
        let records = sqlx::query_as::<_, WithdrawalRecord>(&format!(
            "{SELECT_COLUMNS} WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        self.attach_orders(records).await
    }

    /// Approved withdrawals of a seller grouped by the month they were
    /// processed in, optionally limited to one year or one month.
    pub async fn approved_stats(
        &self,
        seller_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> DbResult<WithdrawalStats> {
        let rows = sqlx::query_as::<_, MonthRow>(
            r#"
            SELECT
                CAST(substr(processed_at, 1, 4) AS INTEGER) AS year,
                CAST(substr(processed_at, 6, 2) AS INTEGER) AS month,
                COUNT(*) AS count,
                SUM(amount_cents) AS amount_cents,
                SUM(fee_cents) AS fee_cents,
                SUM(actual_amount_cents) AS actual_amount_cents
            FROM withdrawals
            WHERE seller_id = ?1
              AND status = 'approved'
              AND processed_at IS NOT NULL
              AND (?2 IS NULL OR CAST(substr(processed_at, 1, 4) AS INTEGER) = ?2)
              AND (?3 IS NULL OR CAST(substr(processed_at, 6, 2) AS INTEGER) = ?3)
            GROUP BY year, month
            ORDER BY year, month
            "#,
        )
        .bind(seller_id)
        .bind(year)
        .bind(month.map(i64::from))
        .fetch_all(&self.pool)
        .await?;

        let by_month: Vec<MonthlyWithdrawals> = rows
            .into_iter()
            .map(|r| MonthlyWithdrawals {
                year: r.year as i32,
                month: r.month as u32,
                count: r.count,
                amount_cents: r.amount_cents,
                fee_cents: r.fee_cents,
                actual_amount_cents: r.actual_amount_cents,
            })
            .collect();

        Ok(WithdrawalStats {
            year,
            month,
            count: by_month.iter().map(|m| m.count).sum(),
            amount_cents: by_month.iter().map(|m| m.amount_cents).sum(),
            fee_cents: by_month.iter().map(|m| m.fee_cents).sum(),
            actual_amount_cents: by_month.iter().map(|m| m.actual_amount_cents).sum(),
            by_month,
        })
    }

    async fn attach_orders(&self, records: Vec<WithdrawalRecord>) -> DbResult<Vec<Withdrawal>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT withdrawal_id, order_id FROM withdrawal_orders \
             WHERE withdrawal_id IN ({}) ORDER BY withdrawal_id, position",
            placeholders(records.len())
        );
        let mut query = sqlx::query_as::<_, (String, String)>(&sql);
        for record in &records {
            query = query.bind(record.id.as_str());
        }
        let links = query.fetch_all(&self.pool).await?;

        let mut by_withdrawal: HashMap<String, Vec<String>> = HashMap::new();
        for (withdrawal_id, order_id) in links {
            by_withdrawal.entry(withdrawal_id).or_default().push(order_id);
        }

        records
            .into_iter()
            .map(|r| {
                let order_ids = by_withdrawal.remove(&r.id).unwrap_or_default();
                r.into_withdrawal(order_ids)
            })
            .collect()
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Inserts a withdrawal and its order links.
    pub async fn insert(conn: &mut SqliteConnection, w: &Withdrawal) -> DbResult<()> {
        debug!(
            id = %w.id,
            seller_id = %w.seller_id,
            amount = w.amount_cents,
            orders = w.order_ids.len(),
            "Inserting withdrawal"
        );

        sqlx::query(
            r#"
            INSERT INTO withdrawals (
                id, seller_id, bank_card_id, amount_cents, fee_cents, actual_amount_cents,
                fee_rate_bps, status, bank_name, account_number, account_holder, note,
                admin_id, admin_response, payment_proof_urls, processed_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&w.id)
        .bind(&w.seller_id)
        .bind(&w.bank_card_id)
        .bind(w.amount_cents)
        .bind(w.fee_cents)
        .bind(w.actual_amount_cents)
        .bind(w.fee_rate_bps as i64)
        .bind(w.status)
        .bind(&w.bank_info.bank_name)
        .bind(&w.bank_info.account_number)
        .bind(&w.bank_info.account_holder)
        .bind(&w.note)
        .bind(&w.admin_id)
        .bind(&w.admin_response)
        .bind(to_json(&w.payment_proof_urls)?)
        .bind(w.processed_at)
        .bind(w.created_at)
        .bind(w.updated_at)
        .execute(&mut *conn)
        .await?;

        for (position, order_id) in w.order_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO withdrawal_orders (withdrawal_id, order_id, position) VALUES (?1, ?2, ?3)",
            )
            .bind(&w.id)
            .bind(order_id)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// pending → approved with proof.
    pub async fn approve(
        conn: &mut SqliteConnection,
        id: &str,
        admin_id: &str,
        admin_response: Option<&str>,
        proof_urls: &[String],
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'approved', admin_id = ?2, admin_response = ?3,
                payment_proof_urls = ?4, processed_at = ?5, updated_at = ?5
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(admin_id)
        .bind(admin_response)
        .bind(to_json(proof_urls)?)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// pending → rejected.
    pub async fn reject(
        conn: &mut SqliteConnection,
        id: &str,
        admin_id: &str,
        admin_response: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'rejected', admin_id = ?2, admin_response = ?3,
                processed_at = ?4, updated_at = ?4
            WHERE id = ?1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .bind(admin_id)
        .bind(admin_response)
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
    use crate::{Database, OrderRepository};
    use bazaar_core::{Order, OrderStatus, PaymentMethod};
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    async fn seed_order(db: &Database) -> String {
        let id = Uuid::new_v4().to_string();
        let order = Order {
            id: id.clone(),
            buyer_id: "buyer".to_string(),
            total_cents: 0,
            status: OrderStatus::Withdrawing,
            payment_method: PaymentMethod::Wallet,
            transaction_id: None,
            items: Vec::new(),
            can_withdraw: true,
            withdrawable_at: t0(),
            report_id: None,
            cancel_reason: None,
            created_at: t0(),
            updated_at: t0(),
        };
        let mut conn = db.pool().acquire().await.unwrap();
        OrderRepository::insert(&mut conn, &order).await.unwrap();
        id
    }

    fn withdrawal(order_ids: Vec<String>, amount: i64, fee: i64) -> Withdrawal {
        Withdrawal {
            id: Uuid::new_v4().to_string(),
            seller_id: "seller".to_string(),
            bank_card_id: "card".to_string(),
            amount_cents: amount,
            fee_cents: fee,
            actual_amount_cents: amount - fee,
            fee_rate_bps: 1700,
            status: WithdrawalStatus::Pending,
            order_ids,
            bank_info: BankInfo {
                bank_name: "VCB".to_string(),
                account_number: "0123456789".to_string(),
                account_holder: "SELLER".to_string(),
            },
            note: None,
            admin_id: None,
            admin_response: None,
            payment_proof_urls: Vec::new(),
            processed_at: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[tokio::test]
    async fn test_insert_keeps_order_links_in_sequence() {
        let db = db().await;
        let a = seed_order(&db).await;
        let b = seed_order(&db).await;
        let w = withdrawal(vec![b.clone(), a.clone()], 20_000_000, 3_400_000);
        {
            let mut conn = db.pool().acquire().await.unwrap();
            WithdrawalRepository::insert(&mut conn, &w).await.unwrap();
        }

        let loaded = db.withdrawals().get_by_id(&w.id).await.unwrap().unwrap();
        assert_eq!(loaded.order_ids, vec![b, a]);
        assert_eq!(loaded.fee_rate_bps, 1700);
        assert_eq!(loaded.bank_info.account_number, "0123456789");
        assert_eq!(loaded.actual_amount_cents, 16_600_000);
    }

    #[tokio::test]
    async fn test_approve_only_once() {
        let db = db().await;
        let order = seed_order(&db).await;
        let w = withdrawal(vec![order], 1000, 170);
        let proof = vec!["https://cdn.example.com/proof.png".to_string()];

        let mut conn = db.pool().acquire().await.unwrap();
        WithdrawalRepository::insert(&mut conn, &w).await.unwrap();
        assert!(WithdrawalRepository::approve(&mut conn, &w.id, "admin", Some("paid"), &proof, t0())
            .await
            .unwrap());
        assert!(!WithdrawalRepository::reject(&mut conn, &w.id, "admin", None, t0())
            .await
            .unwrap());
        drop(conn);

        let loaded = db.withdrawals().get_by_id(&w.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, WithdrawalStatus::Approved);
        assert_eq!(loaded.payment_proof_urls, proof);
        assert_eq!(loaded.processed_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_stats_by_processed_month() {
        let db = db().await;
        let march = t0();
        let april = Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap();
        let next_year = Utc.with_ymd_and_hms(2025, 1, 5, 9, 0, 0).unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        for (when, amount, fee) in [(march, 1000, 170), (march + Duration::days(1), 2000, 340), (april, 500, 85), (next_year, 100, 17)] {
            let w = withdrawal(Vec::new(), amount, fee);
            WithdrawalRepository::insert(&mut conn, &w).await.unwrap();
            WithdrawalRepository::approve(&mut conn, &w.id, "admin", None, &["https://p".to_string()], when)
                .await
                .unwrap();
        }
        // Pending and rejected rows never count
        WithdrawalRepository::insert(&mut conn, &withdrawal(Vec::new(), 9999, 0)).await.unwrap();
        drop(conn);

        let repo = db.withdrawals();
        let all = repo.approved_stats("seller", None, None).await.unwrap();
        assert_eq!(all.count, 4);
        assert_eq!(all.amount_cents, 3600);
        assert_eq!(all.by_month.len(), 3);

        let y2024 = repo.approved_stats("seller", Some(2024), None).await.unwrap();
        assert_eq!(y2024.count, 3);
        assert_eq!(y2024.fee_cents, 595);

        let march_only = repo.approved_stats("seller", Some(2024), Some(3)).await.unwrap();
        assert_eq!(march_only.count, 2);
        assert_eq!(march_only.actual_amount_cents, 2490);
        assert_eq!(march_only.by_month[0].month, 3);

        let nobody = repo.approved_stats("other", None, None).await.unwrap();
        assert_eq!(nobody.count, 0);
        assert!(nobody.by_month.is_empty());
    }
}
