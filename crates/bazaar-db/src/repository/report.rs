//! # Report Repository
//!
//! Buyer disputes. At most one report per order (UNIQUE on `order_id`).
//!
//! ```text
//!            ┌──────── need_more_info ◄───┐
//!            │  (buyer adds evidence)     │ (admin asks)
//!            ▼                            │
//!  create ─► pending ─────────────────────┤
//!                                         ├──► approved   (terminal)
//!                                         └──► rejected   (terminal)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use super::{from_json, to_json};
use crate::error::{DbError, DbResult};
use bazaar_core::{Report, ReportStatus};

#[derive(Debug, sqlx::FromRow)]
struct ReportRecord {
    id: String,
    order_id: String,
    buyer_id: String,
    seller_id: String,
    product_id: String,
    status: ReportStatus,
    reason: String,
    evidence_urls: String,
    admin_response: Option<String>,
    admin_id: Option<String>,
    resolved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ReportRecord> for Report {
    type Error = DbError;

    fn try_from(r: ReportRecord) -> DbResult<Self> {
        Ok(Report {
            id: r.id,
            order_id: r.order_id,
            buyer_id: r.buyer_id,
            seller_id: r.seller_id,
            product_id: r.product_id,
            status: r.status,
            reason: r.reason,
            evidence_urls: from_json(&r.evidence_urls)?,
            admin_response: r.admin_response,
            admin_id: r.admin_id,
            resolved_at: r.resolved_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, order_id, buyer_id, seller_id, product_id, status, reason, evidence_urls,
           admin_response, admin_id, resolved_at, created_at, updated_at
    FROM reports
"#;

/// Field name reported by SQLite when a second report hits the same order.
pub const ORDER_UNIQUE_FIELD: &str = "reports.order_id";

/// Repository for reports.
#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Report>> {
        let record = sqlx::query_as::<_, ReportRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Report::try_from).transpose()
    }

    pub async fn get_by_order(&self, order_id: &str) -> DbResult<Option<Report>> {
        let record = sqlx::query_as::<_, ReportRecord>(&format!("{SELECT_COLUMNS} WHERE order_id = ?1"))
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Report::try_from).transpose()
    }

    /// Reports where the user is buyer or seller, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Report>> {
        let records = sqlx::query_as::<_, ReportRecord>(&format!(
            "{SELECT_COLUMNS} WHERE buyer_id = ?1 OR seller_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Report::try_from).collect()
    }

    /// All reports, optionally filtered by status, newest first.
    pub async fn list_all(&self, status: Option<ReportStatus>) -> DbResult<Vec<Report>> {
        let records = sqlx::query_as::<_, ReportRecord>(&format!(
            "{SELECT_COLUMNS} WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at DESC"
        ))
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Report::try_from).collect()
    }

    /// Buyer resubmits evidence: need_more_info → pending with the new list.
    ///
    /// `false` if the report isn't the buyer's or isn't waiting for info.
    pub async fn resubmit_evidence(
        &self,
        id: &str,
        buyer_id: &str,
        evidence_urls: &[String],
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'pending', evidence_urls = ?3, updated_at = ?4
            WHERE id = ?1 AND buyer_id = ?2 AND status = 'need_more_info'
            "#,
        )
        .bind(id)
        .bind(buyer_id)
        .bind(to_json(evidence_urls)?)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Inserts a report. A duplicate order yields
    /// `DbError::UniqueViolation` on [`ORDER_UNIQUE_FIELD`].
    pub async fn insert(conn: &mut SqliteConnection, report: &Report) -> DbResult<()> {
        debug!(id = %report.id, order_id = %report.order_id, "Inserting report");

        sqlx::query(
            r#"
            INSERT INTO reports (
                id, order_id, buyer_id, seller_id, product_id, status, reason,
                evidence_urls, admin_response, admin_id, resolved_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&report.id)
        .bind(&report.order_id)
        .bind(&report.buyer_id)
        .bind(&report.seller_id)
        .bind(&report.product_id)
        .bind(report.status)
        .bind(&report.reason)
        .bind(to_json(&report.evidence_urls)?)
        .bind(&report.admin_response)
        .bind(&report.admin_id)
        .bind(report.resolved_at)
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Records an admin decision if the report is still open.
    ///
    /// `resolved_at` is set only for terminal outcomes.
    pub async fn record_decision(
        conn: &mut SqliteConnection,
        id: &str,
        to: ReportStatus,
        admin_id: &str,
        admin_response: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let resolved_at = (!to.is_open()).then_some(now);

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = ?2,
                admin_id = ?3,
                admin_response = COALESCE(?4, admin_response),
                resolved_at = ?5,
                updated_at = ?6
            WHERE id = ?1 AND status IN ('pending', 'need_more_info')
            "#,
        )
        .bind(id)
        .bind(to)
        .bind(admin_id)
        .bind(admin_response)
        .bind(resolved_at)
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
    use uuid::Uuid;

    async fn seed_order(db: &Database) -> String {
        let id = Uuid::new_v4().to_string();
        let order = Order {
            id: id.clone(),
            buyer_id: "buyer".to_string(),
            total_cents: 0,
            status: OrderStatus::Completed,
            payment_method: PaymentMethod::Wallet,
            transaction_id: None,
            items: Vec::new(),
            can_withdraw: false,
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

    fn report(order_id: &str) -> Report {
        Report {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            buyer_id: "buyer".to_string(),
            seller_id: "seller".to_string(),
            product_id: "p1".to_string(),
            status: ReportStatus::Pending,
            reason: "File is corrupted".to_string(),
            evidence_urls: vec!["https://cdn.example.com/1.png".to_string()],
            admin_response: None,
            admin_id: None,
            resolved_at: None,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[tokio::test]
    async fn test_one_report_per_order() {
        let db = db().await;
        let order_id = seed_order(&db).await;

        let mut conn = db.pool().acquire().await.unwrap();
        ReportRepository::insert(&mut conn, &report(&order_id)).await.unwrap();
        let err = ReportRepository::insert(&mut conn, &report(&order_id))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation_on(ORDER_UNIQUE_FIELD), "{err:?}");
    }

    #[tokio::test]
    async fn test_decision_only_while_open() {
        let db = db().await;
        let order_id = seed_order(&db).await;
        let r = report(&order_id);

        let mut conn = db.pool().acquire().await.unwrap();
        ReportRepository::insert(&mut conn, &r).await.unwrap();

        assert!(ReportRepository::record_decision(
            &mut conn, &r.id, ReportStatus::NeedMoreInfo, "admin", Some("Need a video"), t0()
        )
        .await
        .unwrap());
        assert!(ReportRepository::record_decision(
            &mut conn, &r.id, ReportStatus::Rejected, "admin", None, t0()
        )
        .await
        .unwrap());
        assert!(!ReportRepository::record_decision(
            &mut conn, &r.id, ReportStatus::Approved, "admin", None, t0()
        )
        .await
        .unwrap());
        drop(conn);

        let loaded = db.reports().get_by_id(&r.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReportStatus::Rejected);
        assert_eq!(loaded.admin_response.as_deref(), Some("Need a video"));
        assert_eq!(loaded.resolved_at, Some(t0()));
    }

    #[tokio::test]
    async fn test_resubmit_evidence() {
        let db = db().await;
        let order_id = seed_order(&db).await;
        let r = report(&order_id);
        {
            let mut conn = db.pool().acquire().await.unwrap();
            ReportRepository::insert(&mut conn, &r).await.unwrap();
        }

        let repo = db.reports();
        let urls = vec!["https://a".to_string(), "https://b".to_string()];
        // Not waiting for info yet
        assert!(!repo.resubmit_evidence(&r.id, "buyer", &urls, t0()).await.unwrap());

        {
            let mut conn = db.pool().acquire().await.unwrap();
            ReportRepository::record_decision(&mut conn, &r.id, ReportStatus::NeedMoreInfo, "admin", None, t0())
                .await
                .unwrap();
        }
        assert!(!repo.resubmit_evidence(&r.id, "stranger", &urls, t0()).await.unwrap());
        assert!(repo.resubmit_evidence(&r.id, "buyer", &urls, t0()).await.unwrap());

        let loaded = repo.get_by_id(&r.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ReportStatus::Pending);
        assert_eq!(loaded.evidence_urls, urls);
        assert!(loaded.resolved_at.is_none());
    }

    #[tokio::test]
    async fn test_listing() {
        let db = db().await;
        let order_id = seed_order(&db).await;
        {
            let mut conn = db.pool().acquire().await.unwrap();
            ReportRepository::insert(&mut conn, &report(&order_id)).await.unwrap();
        }
        let repo = db.reports();

        assert_eq!(repo.list_for_user("buyer").await.unwrap().len(), 1);
        assert_eq!(repo.list_for_user("seller").await.unwrap().len(), 1);
        assert!(repo.list_for_user("other").await.unwrap().is_empty());
        assert_eq!(repo.list_all(None).await.unwrap().len(), 1);
        assert!(repo.list_all(Some(ReportStatus::Approved)).await.unwrap().is_empty());
        assert!(repo.get_by_order(&order_id).await.unwrap().is_some());
    }
}
