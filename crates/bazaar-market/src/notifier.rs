//! # Notifier
//!
//! Records notifications in the outbox after a workflow commits. Recording
//! is best effort: a failure is logged and never undoes the committed
//! state. Delivery happens later in the
//! [`NotificationDispatcher`](crate::dispatcher::NotificationDispatcher).
//!
//! ```text
//!  workflow ── tx.commit() ──► Notifier::send ──► notifications table
//!                                                      │
//!                                         dispatcher ◄─┘
//! ```

use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use bazaar_core::{Money, NewNotification, NotificationKind, Report, Withdrawal};
use bazaar_db::Database;

use crate::clock::Clock;

#[derive(Debug, Clone)]
pub struct Notifier {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl Notifier {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Notifier { db, clock }
    }

    /// Records each notification. Never fails.
    pub async fn send(&self, notifications: Vec<NewNotification>) {
        let now = self.clock.now();
        for notification in notifications {
            if let Err(e) = self.db.notifications().create(&notification, now).await {
                warn!(
                    user_id = %notification.user_id,
                    kind = %notification.kind,
                    error = %e,
                    "Failed to record notification"
                );
            }
        }
    }
}

// =============================================================================
// Messages
// =============================================================================

pub(crate) fn order_ready_for_withdrawal(order_id: &str, seller_id: &str, amount: Money) -> NewNotification {
    NewNotification {
        user_id: seller_id.to_string(),
        kind: NotificationKind::OrderReadyForWithdrawal,
        title: "Earnings ready for withdrawal".to_string(),
        message: format!("Order #{order_id} is now ready for withdrawal. Amount: {amount}"),
        action_url: Some("/orders/sold".to_string()),
        metadata: json!({ "orderId": order_id, "amount": amount.cents() }),
    }
}

pub(crate) fn report_created(report: &Report, buyer_name: &str) -> NewNotification {
    NewNotification {
        user_id: report.seller_id.clone(),
        kind: NotificationKind::ReportCreated,
        title: "Your product has been reported".to_string(),
        message: format!(
            "{buyer_name} has reported order #{}. The order is under review.",
            report.order_id
        ),
        action_url: Some(format!("/reports/{}", report.id)),
        metadata: report_metadata(report),
    }
}

pub(crate) fn report_approved(report: &Report, refunded: Money) -> Vec<NewNotification> {
    vec![
        NewNotification {
            user_id: report.buyer_id.clone(),
            kind: NotificationKind::ReportApproved,
            title: "Your report has been approved".to_string(),
            message: format!("Your report has been approved. {refunded} has been refunded to your wallet."),
            action_url: Some(format!("/orders/{}", report.order_id)),
            metadata: report_metadata(report),
        },
        NewNotification {
            user_id: report.seller_id.clone(),
            kind: NotificationKind::ReportApproved,
            title: "Report against your product was approved".to_string(),
            message: format!(
                "The report for order #{} has been approved. The buyer has been refunded.",
                report.order_id
            ),
            action_url: Some(format!("/reports/{}", report.id)),
            metadata: report_metadata(report),
        },
    ]
}

pub(crate) fn report_rejected(report: &Report, reason: Option<&str>) -> Vec<NewNotification> {
    vec![
        NewNotification {
            user_id: report.buyer_id.clone(),
            kind: NotificationKind::ReportRejected,
            title: "Your report has been rejected".to_string(),
            message: format!(
                "Your report has been rejected. Reason: {}",
                reason.unwrap_or("No reason given")
            ),
            action_url: Some(format!("/reports/{}", report.id)),
            metadata: report_metadata(report),
        },
        NewNotification {
            user_id: report.seller_id.clone(),
            kind: NotificationKind::ReportRejected,
            title: "Report against your product was rejected".to_string(),
            message: format!(
                "The report for order #{} has been rejected. You can now withdraw your earnings.",
                report.order_id
            ),
            action_url: Some(format!("/orders/{}", report.order_id)),
            metadata: report_metadata(report),
        },
    ]
}

pub(crate) fn report_need_info(report: &Report, request: Option<&str>) -> NewNotification {
    NewNotification {
        user_id: report.buyer_id.clone(),
        kind: NotificationKind::ReportNeedInfo,
        title: "More information needed for your report".to_string(),
        message: format!(
            "Admin needs more information: {}",
            request.unwrap_or("please add more evidence")
        ),
        action_url: Some(format!("/reports/{}", report.id)),
        metadata: report_metadata(report),
    }
}

pub(crate) fn report_evidence_added(report: &Report, buyer_name: &str, note: Option<&str>) -> NewNotification {
    let mut message = format!(
        "{buyer_name} added evidence to the report on order #{}. It is back under review.",
        report.order_id
    );
    if let Some(note) = note {
        message.push_str(&format!("\n\nNote from buyer: {note}"));
    }

    let mut metadata = report_metadata(report);
    metadata["evidenceCount"] = json!(report.evidence_urls.len());

    NewNotification {
        user_id: report.seller_id.clone(),
        kind: NotificationKind::ReportEvidenceAdded,
        title: "New evidence on a report".to_string(),
        message,
        action_url: Some(format!("/reports/{}", report.id)),
        metadata,
    }
}

pub(crate) fn withdrawal_approved(w: &Withdrawal) -> NewNotification {
    let mut message = format!(
        "Your withdrawal request has been approved:\n\
         • Order total: {}\n\
         • Platform fee ({}%): {}\n\
         • Amount received: {}\n\n\
         The money will be transferred to {} - {} ({}) within 1-3 business days.",
        Money::from_cents(w.amount_cents),
        w.fee_rate().percentage(),
        Money::from_cents(w.fee_cents),
        Money::from_cents(w.actual_amount_cents),
        w.bank_info.bank_name,
        w.bank_info.account_number,
        w.bank_info.account_holder,
    );
    if let Some(note) = &w.admin_response {
        message.push_str(&format!("\n\nNote from admin: {note}"));
    }

    NewNotification {
        user_id: w.seller_id.clone(),
        kind: NotificationKind::WithdrawalApproved,
        title: "Withdrawal approved".to_string(),
        message,
        action_url: Some(format!("/withdrawals/{}", w.id)),
        metadata: json!({
            "withdrawalId": w.id,
            "totalAmount": w.amount_cents,
            "fee": w.fee_cents,
            "actualAmount": w.actual_amount_cents,
            "bankInfo": w.bank_info,
            "paymentProofUrls": w.payment_proof_urls,
        }),
    }
}

pub(crate) fn withdrawal_rejected(w: &Withdrawal) -> NewNotification {
    NewNotification {
        user_id: w.seller_id.clone(),
        kind: NotificationKind::WithdrawalRejected,
        title: "Withdrawal rejected".to_string(),
        message: format!(
            "Your withdrawal request of {} has been rejected. Reason: {}. \
             Please check your bank card details or contact an admin.",
            Money::from_cents(w.amount_cents),
            w.admin_response.as_deref().unwrap_or("No reason given"),
        ),
        action_url: Some(format!("/withdrawals/{}", w.id)),
        metadata: json!({
            "withdrawalId": w.id,
            "amount": w.amount_cents,
            "reason": w.admin_response,
        }),
    }
}

fn report_metadata(report: &Report) -> serde_json::Value {
    json!({ "reportId": report.id, "orderId": report.order_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::{BankInfo, WithdrawalStatus};
    use chrono::Utc;

    fn withdrawal() -> Withdrawal {
        let now = Utc::now();
        Withdrawal {
            id: "w1".to_string(),
            seller_id: "seller".to_string(),
            bank_card_id: "card".to_string(),
            amount_cents: 20_000_000,
            fee_cents: 3_400_000,
            actual_amount_cents: 16_600_000,
            fee_rate_bps: 1700,
            status: WithdrawalStatus::Approved,
            order_ids: vec!["o1".to_string()],
            bank_info: BankInfo {
                bank_name: "VCB".to_string(),
                account_number: "0123456789".to_string(),
                account_holder: "SELLER".to_string(),
            },
            note: None,
            admin_id: Some("admin".to_string()),
            admin_response: Some("paid".to_string()),
            payment_proof_urls: vec!["https://cdn.example.com/p.png".to_string()],
            processed_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_withdrawal_approved_breakdown() {
        let n = withdrawal_approved(&withdrawal());
        assert_eq!(n.kind, NotificationKind::WithdrawalApproved);
        assert!(n.message.contains("Platform fee (17%): 34000.00 VND"));
        assert!(n.message.contains("Amount received: 166000.00 VND"));
        assert!(n.message.contains("Note from admin: paid"));
        assert_eq!(n.action_url.as_deref(), Some("/withdrawals/w1"));
        assert_eq!(n.metadata["actualAmount"], 16_600_000);
    }

    #[test]
    fn test_order_ready_metadata() {
        let n = order_ready_for_withdrawal("o1", "seller", Money::from_cents(500));
        assert_eq!(n.user_id, "seller");
        assert_eq!(n.action_url.as_deref(), Some("/orders/sold"));
        assert_eq!(n.metadata["orderId"], "o1");
        assert_eq!(n.metadata["amount"], 500);
    }
}
