//! # Report Workflow
//!
//! Buyers dispute a completed order inside the report window; admins decide.
//!
//! ## Report Lifecycle
//! ```text
//!                 create (order completed → reported)
//!                              │
//!                              ▼
//!   add_evidence  ┌────────► pending ◄────────┐
//!   (buyer)       │            │              │
//!                 │    ┌───────┼──────────┐   │
//!                 │    ▼       ▼          ▼   │
//!          need_more_info   approved   rejected
//!                           order →    order →
//!                           refunded   ready_for_withdrawal
//!                           + refund
//! ```
//!
//! Approval credits the buyer and records the refund in the same transaction
//! that moves the order, so a refund never happens twice.

use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use bazaar_core::settlement::is_within_report_window;
use bazaar_core::validation::{validate_optional_text, validate_text, validate_urls};
use bazaar_core::{
    CoreError, NewPayment, OrderStatus, PaymentMethod, PaymentStatus, Report, ReportAction, ReportStatus,
    TransactionType, ValidationError,
};
use bazaar_db::repository::report::ORDER_UNIQUE_FIELD;
use bazaar_db::{Database, OrderRepository, PaymentHistoryRepository, ReportRepository, WalletRepository};

use crate::clock::Clock;
use crate::directory::NameLookup;
use crate::error::{MarketError, MarketResult};
use crate::notifier::{self, Notifier};

/// A buyer's dispute.
#[derive(Debug, Clone)]
pub struct NewReport {
    pub order_id: String,
    pub product_id: String,
    pub reason: String,
    pub evidence_urls: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ReportService {
    db: Database,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    names: NameLookup,
}

impl ReportService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, notifier: Notifier, names: NameLookup) -> Self {
        ReportService {
            db,
            clock,
            notifier,
            names,
        }
    }

    // =========================================================================
    // Buyer actions
    // =========================================================================

    /// Files a report against one product of a completed order.
    ///
    /// ## Errors
    /// - `OrderNotFound` if the order isn't the buyer's
    /// - `AlreadyReported` if the order has a report (also on a lost race)
    /// - `OrderNotCompleted`, `ReportWindowExpired`, `ProductNotInOrder`
    pub async fn create_report(&self, buyer_id: &str, input: NewReport) -> MarketResult<Report> {
        let reason = validate_text("reason", &input.reason)?;
        let evidence_urls = validate_urls("evidence", &input.evidence_urls)?;

        let order = self
            .db
            .orders()
            .get_by_id(&input.order_id)
            .await?
            .filter(|o| o.buyer_id == buyer_id)
            .ok_or_else(|| CoreError::OrderNotFound(input.order_id.clone()))?;

        if self.db.reports().get_by_order(&order.id).await?.is_some() {
            return Err(already_reported(&order.id));
        }
        if order.status != OrderStatus::Completed {
            return Err(CoreError::OrderNotCompleted {
                order_id: order.id.clone(),
                status: order.status,
            }
            .into());
        }

        let now = self.clock.now();
        if !is_within_report_window(order.created_at, now) {
            return Err(CoreError::ReportWindowExpired { order_id: order.id.clone() }.into());
        }

        let item = order
            .item_for_product(&input.product_id)
            .ok_or_else(|| CoreError::ProductNotInOrder {
                product_id: input.product_id.clone(),
                order_id: order.id.clone(),
            })?;

        let report = Report {
            id: Uuid::new_v4().to_string(),
            order_id: order.id.clone(),
            buyer_id: buyer_id.to_string(),
            seller_id: item.seller_id.clone(),
            product_id: item.product_id.clone(),
            status: ReportStatus::Pending,
            reason,
            evidence_urls,
            admin_response: None,
            admin_id: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        match ReportRepository::insert(&mut *tx, &report).await {
            Err(e) if e.is_unique_violation_on(ORDER_UNIQUE_FIELD) => return Err(already_reported(&order.id)),
            other => other?,
        }
        if !OrderRepository::mark_reported(&mut *tx, &order.id, &report.id, now).await? {
            return Err(CoreError::OrderStateConflict {
                order_id: order.id.clone(),
                expected: OrderStatus::Completed,
            }
            .into());
        }
        tx.commit().await?;

        info!(
            report_id = %report.id,
            order_id = %report.order_id,
            seller_id = %report.seller_id,
            "Report created"
        );

        let buyer_name = self.names.name_of(buyer_id).await;
        self.notifier
            .send(vec![notifier::report_created(&report, &buyer_name)])
            .await;

        Ok(report)
    }

    /// Buyer answers a `need_more_info` request. The new URLs are appended
    /// and the report goes back to `pending`.
    pub async fn add_evidence(
        &self,
        report_id: &str,
        buyer_id: &str,
        urls: &[String],
        note: Option<&str>,
    ) -> MarketResult<Report> {
        let added = validate_urls("evidence", urls)?;
        if added.is_empty() {
            return Err(ValidationError::Required {
                field: "evidence".to_string(),
            }
            .into());
        }
        let note = validate_optional_text("note", note)?;

        let report = self.load(report_id).await?;
        if report.buyer_id != buyer_id {
            return Err(access_denied(report_id));
        }
        if report.status != ReportStatus::NeedMoreInfo {
            return Err(CoreError::ReportNotAwaitingInfo {
                report_id: report_id.to_string(),
            }
            .into());
        }

        let mut evidence = report.evidence_urls.clone();
        evidence.extend(added);
        let evidence = validate_urls("evidence", &evidence)?;

        if !self
            .db
            .reports()
            .resubmit_evidence(report_id, buyer_id, &evidence, self.clock.now())
            .await?
        {
            return Err(CoreError::ReportNotAwaitingInfo {
                report_id: report_id.to_string(),
            }
            .into());
        }

        let report = self.load(report_id).await?;
        info!(report_id = %report_id, evidence = report.evidence_urls.len(), "Evidence resubmitted");

        let buyer_name = self.names.name_of(buyer_id).await;
        self.notifier
            .send(vec![notifier::report_evidence_added(&report, &buyer_name, note.as_deref())])
            .await;

        Ok(report)
    }

    // =========================================================================
    // Admin actions
    // =========================================================================

    /// Applies an admin decision to an open report.
    pub async fn handle_admin_action(
        &self,
        report_id: &str,
        admin_id: &str,
        action: ReportAction,
        response: Option<&str>,
    ) -> MarketResult<Report> {
        let response = validate_optional_text("adminResponse", response)?;
        let report = self.load(report_id).await?;
        if !report.status.is_open() {
            return Err(already_resolved(&report));
        }

        match action {
            ReportAction::Approved => self.approve(&report, admin_id, response.as_deref()).await,
            ReportAction::Rejected => self.reject(&report, admin_id, response.as_deref()).await,
            ReportAction::NeedMoreInfo => self.request_info(&report, admin_id, response.as_deref()).await,
        }
    }

    async fn approve(&self, report: &Report, admin_id: &str, response: Option<&str>) -> MarketResult<Report> {
        let order = self
            .db
            .orders()
            .get_by_id(&report.order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(report.order_id.clone()))?;
        let refund = order.total();
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        if !ReportRepository::record_decision(&mut *tx, &report.id, ReportStatus::Approved, admin_id, response, now)
            .await?
        {
            return Err(already_resolved(report));
        }
        if !OrderRepository::transition(&mut *tx, &order.id, OrderStatus::Reported, OrderStatus::Refunded, now).await? {
            return Err(CoreError::OrderStateConflict {
                order_id: order.id.clone(),
                expected: OrderStatus::Reported,
            }
            .into());
        }
        let change = WalletRepository::credit(&mut *tx, &order.buyer_id, refund, now).await?;
        PaymentHistoryRepository::insert(
            &mut *tx,
            &NewPayment {
                user_id: order.buyer_id.clone(),
                order_id: Some(order.id.clone()),
                payment_method: PaymentMethod::Wallet,
                transaction_type: TransactionType::Refund,
                amount: refund,
                status: PaymentStatus::Completed,
                transaction_id: Some(format!("REFUND-{}", report.id)),
                description: Some(format!("Refund for order #{}", order.id)),
                metadata: json!({ "reportId": report.id, "adminId": admin_id }),
                balance_before: Some(change.before),
                balance_after: Some(change.after),
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            report_id = %report.id,
            order_id = %order.id,
            buyer_id = %order.buyer_id,
            refund = refund.cents(),
            "Report approved, buyer refunded"
        );

        let report = self.load(&report.id).await?;
        self.notifier.send(notifier::report_approved(&report, refund)).await;
        Ok(report)
    }

    async fn reject(&self, report: &Report, admin_id: &str, response: Option<&str>) -> MarketResult<Report> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        if !ReportRepository::record_decision(&mut *tx, &report.id, ReportStatus::Rejected, admin_id, response, now)
            .await?
        {
            return Err(already_resolved(report));
        }
        if !OrderRepository::transition(
            &mut *tx,
            &report.order_id,
            OrderStatus::Reported,
            OrderStatus::ReadyForWithdrawal,
            now,
        )
        .await?
        {
            return Err(CoreError::OrderStateConflict {
                order_id: report.order_id.clone(),
                expected: OrderStatus::Reported,
            }
            .into());
        }
        tx.commit().await?;

        info!(report_id = %report.id, order_id = %report.order_id, "Report rejected, order released");

        let report = self.load(&report.id).await?;
        self.notifier.send(notifier::report_rejected(&report, response)).await;
        Ok(report)
    }

    async fn request_info(&self, report: &Report, admin_id: &str, response: Option<&str>) -> MarketResult<Report> {
        let mut conn = self.db.pool().acquire().await?;
        let recorded = ReportRepository::record_decision(
            &mut *conn,
            &report.id,
            ReportStatus::NeedMoreInfo,
            admin_id,
            response,
            self.clock.now(),
        )
        .await?;
        drop(conn);
        if !recorded {
            return Err(already_resolved(report));
        }

        info!(report_id = %report.id, "More information requested");

        let report = self.load(&report.id).await?;
        self.notifier.send(vec![notifier::report_need_info(&report, response)]).await;
        Ok(report)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Reports the user filed or received.
    pub async fn get_my_reports(&self, user_id: &str) -> MarketResult<Vec<Report>> {
        Ok(self.db.reports().list_for_user(user_id).await?)
    }

    /// A report visible to its buyer and seller.
    pub async fn get_report(&self, report_id: &str, user_id: &str) -> MarketResult<Report> {
        let report = self.load(report_id).await?;
        if report.buyer_id != user_id && report.seller_id != user_id {
            return Err(access_denied(report_id));
        }
        Ok(report)
    }

    pub async fn get_all_reports(&self, status: Option<ReportStatus>) -> MarketResult<Vec<Report>> {
        Ok(self.db.reports().list_all(status).await?)
    }

    async fn load(&self, report_id: &str) -> MarketResult<Report> {
        self.db
            .reports()
            .get_by_id(report_id)
            .await?
            .ok_or_else(|| CoreError::ReportNotFound(report_id.to_string()).into())
    }
}

fn already_reported(order_id: &str) -> MarketError {
    CoreError::AlreadyReported {
        order_id: order_id.to_string(),
    }
    .into()
}

fn already_resolved(report: &Report) -> MarketError {
    CoreError::ReportAlreadyResolved {
        report_id: report.id.clone(),
        status: report.status.to_string(),
    }
    .into()
}

fn access_denied(report_id: &str) -> MarketError {
    CoreError::AccessDenied {
        resource: format!("report {report_id}"),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{buy, market, pooled_market};
    use bazaar_core::{Money, NotificationKind};
    use chrono::Duration;

    fn dispute(order: &bazaar_core::Order) -> NewReport {
        NewReport {
            order_id: order.id.clone(),
            product_id: order.items[0].product_id.clone(),
            reason: "File is corrupted".to_string(),
            evidence_urls: vec!["https://cdn.example.com/shot.png".to_string()],
        }
    }

    #[tokio::test]
    async fn test_report_window_boundaries() {
        let (market, clock) = market().await;

        let early = buy(&market, "buyer", "seller", 10_000).await;
        clock.advance(Duration::days(3) - Duration::seconds(1));
        let report = market.reports().create_report("buyer", dispute(&early)).await.unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.seller_id, "seller");

        let order = market.orders().get_order(&early.id, "buyer").await.unwrap();
        assert_eq!(order.status, OrderStatus::Reported);
        assert_eq!(order.report_id.as_deref(), Some(report.id.as_str()));

        let late = buy(&market, "buyer", "seller", 10_000).await;
        clock.advance(Duration::days(3) + Duration::seconds(1));
        let err = market.reports().create_report("buyer", dispute(&late)).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::ReportWindowExpired { .. })));
    }

    #[tokio::test]
    async fn test_one_report_per_order() {
        let (market, _clock) = market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;

        market.reports().create_report("buyer", dispute(&order)).await.unwrap();
        let err = market.reports().create_report("buyer", dispute(&order)).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::AlreadyReported { .. })));

        let err = market.reports().create_report("stranger", dispute(&order)).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::OrderNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_reports_single_winner() {
        let (market, _db_file) = pooled_market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;

        let reports = market.reports();
        let (first, second) = tokio::join!(
            reports.create_report("buyer", dispute(&order)),
            reports.create_report("buyer", dispute(&order)),
        );
        let (won, lost): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
        assert_eq!(won.len(), 1);
        assert!(matches!(
            lost[0],
            Err(MarketError::Core(CoreError::AlreadyReported { .. }))
        ));

        assert_eq!(reports.get_my_reports("buyer").await.unwrap().len(), 1);
        let order = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(order.status, OrderStatus::Reported);
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let (market, _clock) = market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;

        let mut input = dispute(&order);
        input.product_id = "other-product".to_string();
        let err = market.reports().create_report("buyer", input).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::ProductNotInOrder { .. })));

        let mut input = dispute(&order);
        input.reason = "   ".to_string();
        let err = market.reports().create_report("buyer", input).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::Validation(_))));

        market
            .orders()
            .update_order_status(&order.id, OrderStatus::ReadyForWithdrawal, None)
            .await
            .unwrap();
        let err = market.reports().create_report("buyer", dispute(&order)).await.unwrap_err();
        assert!(matches!(
            err,
            MarketError::Core(CoreError::OrderNotCompleted {
                status: OrderStatus::ReadyForWithdrawal,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_approval_refunds_exactly_once() {
        let (market, _clock) = market().await;
        let order = buy(&market, "buyer", "seller", 25_000).await;
        let before = market.wallets().get_balance("buyer").await.unwrap();
        let report = market.reports().create_report("buyer", dispute(&order)).await.unwrap();

        let approved = market
            .reports()
            .handle_admin_action(&report.id, "admin", ReportAction::Approved, Some("confirmed"))
            .await
            .unwrap();
        assert_eq!(approved.status, ReportStatus::Approved);
        assert_eq!(approved.admin_id.as_deref(), Some("admin"));
        assert!(approved.resolved_at.is_some());

        let after = market.wallets().get_balance("buyer").await.unwrap();
        assert_eq!(after, before + Money::from_cents(25_000));
        let order = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert!(!order.can_withdraw);

        let err = market
            .reports()
            .handle_admin_action(&report.id, "admin", ReportAction::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::ReportAlreadyResolved { .. })));
        assert_eq!(market.wallets().get_balance("buyer").await.unwrap(), after);

        let refunds: Vec<_> = market
            .payments()
            .list_by_order(&order.id, "buyer")
            .await
            .unwrap()
            .into_iter()
            .filter(|p| p.transaction_type == TransactionType::Refund)
            .collect();
        assert_eq!(refunds.len(), 1);
        assert_eq!(refunds[0].amount_cents, 25_000);

        let buyer_inbox = market.notifications().list("buyer", false).await.unwrap();
        assert!(buyer_inbox.iter().any(|n| n.kind == NotificationKind::ReportApproved));
    }

    #[tokio::test]
    async fn test_need_more_info_round_trip() {
        let (market, _clock) = market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;
        let report = market.reports().create_report("buyer", dispute(&order)).await.unwrap();

        let err = market
            .reports()
            .add_evidence(&report.id, "buyer", &["https://cdn.example.com/2.png".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::ReportNotAwaitingInfo { .. })));

        let waiting = market
            .reports()
            .handle_admin_action(&report.id, "admin", ReportAction::NeedMoreInfo, Some("Send a video"))
            .await
            .unwrap();
        assert_eq!(waiting.status, ReportStatus::NeedMoreInfo);
        assert!(waiting.resolved_at.is_none());
        let order_now = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(order_now.status, OrderStatus::Reported);

        let err = market
            .reports()
            .add_evidence(&report.id, "seller", &["https://cdn.example.com/2.png".to_string()], None)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::AccessDenied { .. })));

        let resubmitted = market
            .reports()
            .add_evidence(
                &report.id,
                "buyer",
                &["https://cdn.example.com/2.mp4".to_string()],
                Some("Recording attached"),
            )
            .await
            .unwrap();
        assert_eq!(resubmitted.status, ReportStatus::Pending);
        assert_eq!(resubmitted.evidence_urls.len(), 2);

        let seller_inbox = market.notifications().list("seller", false).await.unwrap();
        let evidence = seller_inbox
            .iter()
            .find(|n| n.kind == NotificationKind::ReportEvidenceAdded)
            .unwrap();
        assert!(evidence.message.contains("Recording attached"));
    }

    #[tokio::test]
    async fn test_report_visibility() {
        let (market, _clock) = market().await;
        let order = buy(&market, "buyer", "seller", 10_000).await;
        let report = market.reports().create_report("buyer", dispute(&order)).await.unwrap();

        assert!(market.reports().get_report(&report.id, "buyer").await.is_ok());
        assert!(market.reports().get_report(&report.id, "seller").await.is_ok());
        let err = market.reports().get_report(&report.id, "third").await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::AccessDenied { .. })));

        assert_eq!(market.reports().get_my_reports("seller").await.unwrap().len(), 1);
        assert_eq!(
            market
                .reports()
                .get_all_reports(Some(ReportStatus::Pending))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(market
            .reports()
            .get_all_reports(Some(ReportStatus::Approved))
            .await
            .unwrap()
            .is_empty());
    }
}
