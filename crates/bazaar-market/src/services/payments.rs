//! # Payment Service
//!
//! Payment history queries and wallet deposits.
//!
//! ## Deposit Flow
//! ```text
//!  POST /wallet/deposits          gateway             POST /payments/webhook
//!  ─────────────────────          ───────             ──────────────────────
//!  create_deposit ──► pending  ── user pays ──►  settle_deposit(txn, success)
//!  RECHARGE-{millis}  row                          │
//!                                                  ├─ success: one transaction
//!                                                  │    credit wallet
//!                                                  │    pending → completed
//!                                                  │    (balances + reference)
//!                                                  └─ failure: pending → failed
//! ```

use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use bazaar_core::validation::normalize_page;
use bazaar_core::{
    CoreError, Money, NewPayment, Page, PaymentHistory, PaymentMethod, PaymentStats, PaymentStatus,
    TransactionType,
};
use bazaar_db::{Database, PaymentHistoryRepository, WalletRepository};

use crate::clock::Clock;
use crate::error::MarketResult;
use crate::services::wallet::ensure_positive;

/// Gateway callback for a deposit.
#[derive(Debug, Clone)]
pub struct DepositSettlement {
    pub transaction_id: String,
    pub success: bool,
    /// Gateway-side reference, merged into the row metadata.
    pub reference: Option<String>,
    /// Amount the gateway says was paid; checked when present.
    pub amount: Option<Money>,
}

#[derive(Debug, Clone)]
pub struct PaymentService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl PaymentService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        PaymentService { db, clock }
    }

    // =========================================================================
    // History
    // =========================================================================

    pub async fn create(&self, entry: &NewPayment) -> MarketResult<PaymentHistory> {
        Ok(self.db.payment_history().create(entry, self.clock.now()).await?)
    }

    /// Newest first; page defaults to 1, limit to 20 (max 100).
    pub async fn list_by_user(
        &self,
        user_id: &str,
        page: Option<u32>,
        limit: Option<u32>,
    ) -> MarketResult<Page<PaymentHistory>> {
        let (page, limit) = normalize_page(page, limit);
        Ok(self.db.payment_history().list_by_user(user_id, page, limit).await?)
    }

    /// Rows of one of the user's orders.
    pub async fn list_by_order(&self, order_id: &str, user_id: &str) -> MarketResult<Vec<PaymentHistory>> {
        let rows = self.db.payment_history().list_by_order(order_id).await?;
        Ok(rows.into_iter().filter(|p| p.user_id == user_id).collect())
    }

    pub async fn update_status(
        &self,
        id: &str,
        status: PaymentStatus,
        transaction_id: Option<&str>,
        metadata: Option<&serde_json::Value>,
    ) -> MarketResult<PaymentHistory> {
        let repo = self.db.payment_history();
        if !repo.update_status(id, status, transaction_id, metadata, self.clock.now()).await? {
            return Err(CoreError::PaymentNotFound(id.to_string()).into());
        }
        repo.get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(id.to_string()).into())
    }

    pub async fn stats(&self, user_id: &str) -> MarketResult<PaymentStats> {
        Ok(self.db.payment_history().stats(user_id).await?)
    }

    // =========================================================================
    // Deposits
    // =========================================================================

    /// Records a pending deposit the gateway will settle later.
    pub async fn create_deposit(&self, user_id: &str, amount: Money) -> MarketResult<PaymentHistory> {
        ensure_positive(amount)?;
        let now = self.clock.now();
        let transaction_id = format!("RECHARGE-{}", now.timestamp_millis());

        let entry = NewPayment {
            user_id: user_id.to_string(),
            order_id: None,
            payment_method: PaymentMethod::Gateway,
            transaction_type: TransactionType::Deposit,
            amount,
            status: PaymentStatus::Pending,
            transaction_id: Some(transaction_id.clone()),
            description: Some(format!("Wallet deposit {amount}")),
            metadata: json!({}),
            balance_before: None,
            balance_after: None,
        };
        let row = self.db.payment_history().create(&entry, now).await?;

        info!(user_id = %user_id, transaction_id = %transaction_id, amount = amount.cents(), "Deposit created");
        Ok(row)
    }

    /// Applies the gateway's verdict to a pending deposit.
    ///
    /// ## Errors
    /// - `PaymentNotFound` for an unknown transaction id
    /// - `AmountMismatch` when the gateway amount differs
    /// - `PaymentAlreadySettled` when the row is no longer pending
    pub async fn settle_deposit(&self, settlement: DepositSettlement) -> MarketResult<PaymentHistory> {
        let txn = settlement.transaction_id.as_str();
        let row = self
            .db
            .payment_history()
            .find_by_transaction_id(txn)
            .await?
            .filter(|p| p.transaction_type == TransactionType::Deposit)
            .ok_or_else(|| CoreError::PaymentNotFound(txn.to_string()))?;

        if let Some(paid) = settlement.amount {
            if paid.cents() != row.amount_cents {
                return Err(CoreError::AmountMismatch {
                    transaction_id: txn.to_string(),
                    expected: row.amount_cents,
                    actual: paid.cents(),
                }
                .into());
            }
        }
        if row.status != PaymentStatus::Pending {
            return Err(already_settled(txn));
        }

        let now = self.clock.now();
        let metadata = json!({
            "gatewayReference": settlement.reference,
            "settledAt": now,
        });

        let mut tx = self.db.begin().await?;
        if settlement.success {
            let amount = Money::from_cents(row.amount_cents);
            let change = WalletRepository::credit(&mut *tx, &row.user_id, amount, now).await?;
            let settled = PaymentHistoryRepository::settle_pending(
                &mut *tx,
                &row.id,
                PaymentStatus::Completed,
                Some((change.before, change.after)),
                &metadata,
                now,
            )
            .await?;
            if !settled {
                // Dropping the transaction undoes the credit
                return Err(already_settled(txn));
            }
            tx.commit().await?;
            info!(
                user_id = %row.user_id,
                transaction_id = %txn,
                amount = amount.cents(),
                balance = change.after.cents(),
                "Deposit completed"
            );
        } else {
            let settled =
                PaymentHistoryRepository::settle_pending(&mut *tx, &row.id, PaymentStatus::Failed, None, &metadata, now)
                    .await?;
            if !settled {
                return Err(already_settled(txn));
            }
            tx.commit().await?;
            warn!(user_id = %row.user_id, transaction_id = %txn, "Deposit failed at gateway");
        }

        self.db
            .payment_history()
            .get_by_id(&row.id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound(txn.to_string()).into())
    }
}

fn already_settled(transaction_id: &str) -> crate::MarketError {
    CoreError::PaymentAlreadySettled {
        transaction_id: transaction_id.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::market;
    use crate::MarketError;

    fn settle(txn: &str, success: bool, amount: Option<i64>) -> DepositSettlement {
        DepositSettlement {
            transaction_id: txn.to_string(),
            success,
            reference: Some("GW-991".to_string()),
            amount: amount.map(Money::from_cents),
        }
    }

    #[tokio::test]
    async fn test_deposit_success_credits_once() {
        let (market, _clock) = market().await;
        let payments = market.payments();

        let pending = payments.create_deposit("u1", Money::from_cents(50_000)).await.unwrap();
        let txn = pending.transaction_id.clone().unwrap();
        assert!(txn.starts_with("RECHARGE-"));
        assert_eq!(pending.status, PaymentStatus::Pending);

        let done = payments.settle_deposit(settle(&txn, true, Some(50_000))).await.unwrap();
        assert_eq!(done.status, PaymentStatus::Completed);
        assert_eq!(done.balance_before_cents, Some(0));
        assert_eq!(done.balance_after_cents, Some(50_000));
        assert_eq!(done.metadata["gatewayReference"], "GW-991");

        let again = payments.settle_deposit(settle(&txn, true, None)).await.unwrap_err();
        assert!(matches!(again, MarketError::Core(CoreError::PaymentAlreadySettled { .. })));
        assert_eq!(market.wallets().get_balance("u1").await.unwrap().cents(), 50_000);

        let stats = payments.stats("u1").await.unwrap();
        assert_eq!(stats.total_deposit_cents, 50_000);
        assert_eq!(stats.transaction_count, 1);
    }

    #[tokio::test]
    async fn test_deposit_failure_and_mismatch() {
        let (market, _clock) = market().await;
        let payments = market.payments();
        let pending = payments.create_deposit("u1", Money::from_cents(10_000)).await.unwrap();
        let txn = pending.transaction_id.clone().unwrap();

        let err = payments.settle_deposit(settle(&txn, true, Some(9_999))).await.unwrap_err();
        assert!(matches!(
            err,
            MarketError::Core(CoreError::AmountMismatch { expected: 10_000, actual: 9_999, .. })
        ));

        let failed = payments.settle_deposit(settle(&txn, false, None)).await.unwrap();
        assert_eq!(failed.status, PaymentStatus::Failed);
        assert_eq!(market.wallets().get_balance("u1").await.unwrap(), Money::zero());

        let err = payments.settle_deposit(settle("RECHARGE-0", true, None)).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_history_paging() {
        let (market, clock) = market().await;
        let payments = market.payments();
        for _ in 0..3 {
            payments.create_deposit("u1", Money::from_cents(100)).await.unwrap();
            clock.advance(chrono::Duration::seconds(1));
        }

        let page = payments.list_by_user("u1", Some(1), Some(2)).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.limit, 2);

        let page = payments.list_by_user("u1", None, Some(500)).await.unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.data.len(), 3);
    }
}
