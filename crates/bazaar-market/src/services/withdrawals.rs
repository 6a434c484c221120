//! # Withdrawal Workflow
//!
//! Sellers cash out orders that passed the report window.
//!
//! ## Withdrawal Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_withdrawal(seller, card, orders)                                │
//! │    card owned? ─► orders exist? ─► every order eligible? (all collected)│
//! │    amount = Σ seller's item subtotals     fee = amount × rate (half-up) │
//! │                                                                         │
//! │    BEGIN                                                                │
//! │      orders  ready_for_withdrawal ──► withdrawing   (any miss: rollback)│
//! │      insert withdrawal + order links                                    │
//! │    COMMIT                                                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │  admin approve (proof required)     │  admin reject                     │
//! │    withdrawal pending → approved    │    withdrawal pending → rejected  │
//! │    orders withdrawing → withdrawn   │    orders withdrawing →           │
//! │    payment history: withdrawal row  │           ready_for_withdrawal    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use bazaar_core::settlement::{dedup_ids, quote_withdrawal};
use bazaar_core::validation::{validate_optional_text, validate_period, validate_urls};
use bazaar_core::{
    CoreError, Money, NewPayment, Order, OrderStatus, PaymentMethod, PaymentStatus, TransactionType,
    ValidationError, Withdrawal, WithdrawalAction, WithdrawalStats, WithdrawalStatus,
};
use bazaar_db::{Database, OrderRepository, PaymentHistoryRepository, WithdrawalRepository};
use sqlx::SqliteConnection;

use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::notifier::{self, Notifier};
use crate::services::system_variables::SystemVariables;

/// A seller's payout request.
#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub bank_card_id: String,
    pub order_ids: Vec<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WithdrawalService {
    db: Database,
    clock: Arc<dyn Clock>,
    variables: SystemVariables,
    notifier: Notifier,
}

impl WithdrawalService {
    pub fn new(db: Database, clock: Arc<dyn Clock>, variables: SystemVariables, notifier: Notifier) -> Self {
        WithdrawalService {
            db,
            clock,
            variables,
            notifier,
        }
    }

    // =========================================================================
    // Seller request
    // =========================================================================

    /// Locks the orders and records a pending withdrawal.
    ///
    /// ## Errors
    /// - `BankCardNotFound` if the card isn't the seller's
    /// - `OrdersNotFound` listing every unknown id
    /// - `IneligibleOrders` listing every violation across the batch
    /// - `ZeroAmount` when the seller earned nothing in these orders
    /// - `OrderStateConflict` when another request locked an order first
    pub async fn create_withdrawal(&self, seller_id: &str, input: NewWithdrawal) -> MarketResult<Withdrawal> {
        let note = validate_optional_text("note", input.note.as_deref())?;
        let order_ids = dedup_ids(&input.order_ids);
        if order_ids.is_empty() {
            return Err(ValidationError::Required {
                field: "orderIds".to_string(),
            }
            .into());
        }

        let card = self
            .db
            .bank_cards()
            .get_for_user(&input.bank_card_id, seller_id)
            .await?
            .ok_or_else(|| CoreError::BankCardNotFound(input.bank_card_id.clone()))?;

        let orders = self.load_orders(&order_ids).await?;
        let rate = self.variables.fee_rate().await?;
        let quote = quote_withdrawal(&orders, seller_id, rate)?;

        let now = self.clock.now();
        let withdrawal = Withdrawal {
            id: Uuid::new_v4().to_string(),
            seller_id: seller_id.to_string(),
            bank_card_id: card.id.clone(),
            amount_cents: quote.split.gross.cents(),
            fee_cents: quote.split.fee.cents(),
            actual_amount_cents: quote.split.net.cents(),
            fee_rate_bps: quote.rate.bps(),
            status: WithdrawalStatus::Pending,
            order_ids,
            bank_info: card.bank_info(),
            note,
            admin_id: None,
            admin_response: None,
            payment_proof_urls: Vec::new(),
            processed_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        move_orders(
            &mut *tx,
            &withdrawal.order_ids,
            OrderStatus::ReadyForWithdrawal,
            OrderStatus::Withdrawing,
            now,
        )
        .await?;
        WithdrawalRepository::insert(&mut *tx, &withdrawal).await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %withdrawal.id,
            seller_id = %seller_id,
            orders = withdrawal.order_ids.len(),
            amount = withdrawal.amount_cents,
            fee = withdrawal.fee_cents,
            rate_bps = withdrawal.fee_rate_bps,
            "Withdrawal requested"
        );

        self.load(&withdrawal.id).await
    }

    // =========================================================================
    // Admin decision
    // =========================================================================

    /// Approves (proof required) or rejects a pending withdrawal.
    pub async fn handle_admin_action(
        &self,
        withdrawal_id: &str,
        admin_id: &str,
        action: WithdrawalAction,
        response: Option<&str>,
        proof_urls: &[String],
    ) -> MarketResult<Withdrawal> {
        let response = validate_optional_text("adminResponse", response)?;
        let withdrawal = self.load(withdrawal_id).await?;
        if withdrawal.status != WithdrawalStatus::Pending {
            return Err(already_processed(&withdrawal));
        }

        match action {
            WithdrawalAction::Approved => {
                let proof = validate_urls("paymentProofUrls", proof_urls)?;
                if proof.is_empty() {
                    return Err(CoreError::ProofRequired.into());
                }
                self.approve(&withdrawal, admin_id, response.as_deref(), &proof).await
            }
            WithdrawalAction::Rejected => self.reject(&withdrawal, admin_id, response.as_deref()).await,
        }
    }

    async fn approve(
        &self,
        withdrawal: &Withdrawal,
        admin_id: &str,
        response: Option<&str>,
        proof: &[String],
    ) -> MarketResult<Withdrawal> {
        let now = self.clock.now();
        let payout = Money::from_cents(withdrawal.actual_amount_cents);

        let mut tx = self.db.begin().await?;
        if !WithdrawalRepository::approve(&mut *tx, &withdrawal.id, admin_id, response, proof, now).await? {
            return Err(already_processed(withdrawal));
        }
        move_orders(
            &mut *tx,
            &withdrawal.order_ids,
            OrderStatus::Withdrawing,
            OrderStatus::Withdrawn,
            now,
        )
        .await?;
        PaymentHistoryRepository::insert(
            &mut *tx,
            &NewPayment {
                user_id: withdrawal.seller_id.clone(),
                order_id: None,
                payment_method: PaymentMethod::BankTransfer,
                transaction_type: TransactionType::Withdrawal,
                amount: payout,
                status: PaymentStatus::Completed,
                transaction_id: Some(withdrawal.id.clone()),
                description: Some(format!(
                    "Withdrawal to {} - {}",
                    withdrawal.bank_info.bank_name, withdrawal.bank_info.account_number
                )),
                metadata: json!({
                    "amount": withdrawal.amount_cents,
                    "fee": withdrawal.fee_cents,
                    "actualAmount": withdrawal.actual_amount_cents,
                    "feeRateBps": withdrawal.fee_rate_bps,
                    "orderIds": withdrawal.order_ids,
                }),
                balance_before: None,
                balance_after: None,
            },
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %withdrawal.id,
            seller_id = %withdrawal.seller_id,
            admin_id = %admin_id,
            payout = payout.cents(),
            "Withdrawal approved"
        );

        let approved = self.load(&withdrawal.id).await?;
        self.notifier.send(vec![notifier::withdrawal_approved(&approved)]).await;
        Ok(approved)
    }

    async fn reject(&self, withdrawal: &Withdrawal, admin_id: &str, response: Option<&str>) -> MarketResult<Withdrawal> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        if !WithdrawalRepository::reject(&mut *tx, &withdrawal.id, admin_id, response, now).await? {
            return Err(already_processed(withdrawal));
        }
        move_orders(
            &mut *tx,
            &withdrawal.order_ids,
            OrderStatus::Withdrawing,
            OrderStatus::ReadyForWithdrawal,
            now,
        )
        .await?;
        tx.commit().await?;

        info!(
            withdrawal_id = %withdrawal.id,
            seller_id = %withdrawal.seller_id,
            admin_id = %admin_id,
            "Withdrawal rejected, orders released"
        );

        let rejected = self.load(&withdrawal.id).await?;
        self.notifier.send(vec![notifier::withdrawal_rejected(&rejected)]).await;
        Ok(rejected)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_my_withdrawals(&self, seller_id: &str) -> MarketResult<Vec<Withdrawal>> {
        Ok(self.db.withdrawals().list_by_seller(seller_id).await?)
    }

    /// The seller's withdrawal; other sellers' withdrawals are reported missing.
    pub async fn get_withdrawal(&self, withdrawal_id: &str, seller_id: &str) -> MarketResult<Withdrawal> {
        let withdrawal = self.load(withdrawal_id).await?;
        if withdrawal.seller_id != seller_id {
            return Err(CoreError::WithdrawalNotFound(withdrawal_id.to_string()).into());
        }
        Ok(withdrawal)
    }

    pub async fn get_all_withdrawals(&self, status: Option<WithdrawalStatus>) -> MarketResult<Vec<Withdrawal>> {
        Ok(self.db.withdrawals().list_all(status).await?)
    }

    /// Approved payouts of a seller, optionally narrowed to a year or month.
    pub async fn statistics(
        &self,
        seller_id: &str,
        year: Option<i32>,
        month: Option<u32>,
    ) -> MarketResult<WithdrawalStats> {
        if month.is_some() && year.is_none() {
            return Err(CoreError::YearRequiredForMonthFilter.into());
        }
        validate_period(year, month)?;
        Ok(self.db.withdrawals().approved_stats(seller_id, year, month).await?)
    }

    async fn load(&self, withdrawal_id: &str) -> MarketResult<Withdrawal> {
        self.db
            .withdrawals()
            .get_by_id(withdrawal_id)
            .await?
            .ok_or_else(|| CoreError::WithdrawalNotFound(withdrawal_id.to_string()).into())
    }

    /// Orders in request order; fails listing every unknown id.
    async fn load_orders(&self, ids: &[String]) -> MarketResult<Vec<Order>> {
        let mut found: HashMap<String, Order> = self
            .db
            .orders()
            .get_many(ids)
            .await?
            .into_iter()
            .map(|o| (o.id.clone(), o))
            .collect();

        let missing: Vec<String> = ids.iter().filter(|id| !found.contains_key(*id)).cloned().collect();
        if !missing.is_empty() {
            return Err(CoreError::OrdersNotFound { missing }.into());
        }

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }
}

/// CAS every order `from` → `to`; the first miss aborts the transaction.
async fn move_orders(
    conn: &mut SqliteConnection,
    order_ids: &[String],
    from: OrderStatus,
    to: OrderStatus,
    now: chrono::DateTime<chrono::Utc>,
) -> MarketResult<()> {
    for order_id in order_ids {
        if !OrderRepository::transition(conn, order_id, from, to, now).await? {
            return Err(CoreError::OrderStateConflict {
                order_id: order_id.clone(),
                expected: from,
            }
            .into());
        }
    }
    Ok(())
}

fn already_processed(withdrawal: &Withdrawal) -> MarketError {
    CoreError::AlreadyProcessed {
        withdrawal_id: withdrawal.id.clone(),
        status: withdrawal.status.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{bank_card, buy, market, pooled_market, ready};
    use bazaar_core::{Ineligibility, DISCOUNT_RATE_KEY};

    fn request(card: &str, orders: &[&Order]) -> NewWithdrawal {
        NewWithdrawal {
            bank_card_id: card.to_string(),
            order_ids: orders.iter().map(|o| o.id.clone()).collect(),
            note: None,
        }
    }

    fn proof() -> Vec<String> {
        vec!["https://cdn.example.com/transfer.png".to_string()]
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_withdrawals_lock_order_once() {
        let (market, _db_file) = pooled_market().await;
        let card = bank_card(&market, "seller").await;
        let order = ready(&market, buy(&market, "buyer", "seller", 50_000).await).await;

        let withdrawals = market.withdrawals();
        let (first, second) = tokio::join!(
            withdrawals.create_withdrawal("seller", request(&card.id, &[&order])),
            withdrawals.create_withdrawal("seller", request(&card.id, &[&order])),
        );
        let (won, lost): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
        assert_eq!(won.len(), 1);
        // The loser either saw the lock before starting or lost the flip.
        assert!(matches!(
            lost[0],
            Err(MarketError::Core(
                CoreError::OrderStateConflict { .. } | CoreError::IneligibleOrders(_)
            ))
        ));

        assert_eq!(withdrawals.get_my_withdrawals("seller").await.unwrap().len(), 1);
        let order = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(order.status, OrderStatus::Withdrawing);
    }

    #[tokio::test]
    async fn test_fee_split_and_order_lock() {
        let (market, _clock) = market().await;
        let card = bank_card(&market, "seller").await;
        let a = ready(&market, buy(&market, "buyer-1", "seller", 100_000).await).await;
        let b = ready(&market, buy(&market, "buyer-2", "seller", 33_333).await).await;

        let w = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&a, &b]))
            .await
            .unwrap();
        assert_eq!(w.status, WithdrawalStatus::Pending);
        assert_eq!(w.amount_cents, 133_333);
        assert_eq!(w.fee_cents, 22_667);
        assert_eq!(w.fee_cents + w.actual_amount_cents, w.amount_cents);
        assert_eq!(w.order_ids, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(w.bank_info, card.bank_info());

        let locked = market.orders().get_order(&a.id, "buyer-1").await.unwrap();
        assert_eq!(locked.status, OrderStatus::Withdrawing);

        let err = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&a]))
            .await
            .unwrap_err();
        let MarketError::Core(CoreError::IneligibleOrders(problems)) = err else {
            panic!("expected IneligibleOrders");
        };
        assert_eq!(
            problems[0].reason,
            Ineligibility::OrderNotReady {
                status: OrderStatus::Withdrawing
            }
        );
    }

    #[tokio::test]
    async fn test_fee_rate_read_per_request() {
        let (market, _clock) = market().await;
        let card = bank_card(&market, "seller").await;
        market.system_variables().set(DISCOUNT_RATE_KEY, 10.0).await.unwrap();
        let order = ready(&market, buy(&market, "buyer", "seller", 50_000).await).await;

        let w = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&order]))
            .await
            .unwrap();
        assert_eq!(w.fee_rate_bps, 1000);
        assert_eq!(w.fee_cents, 5_000);
        assert_eq!(w.actual_amount_cents, 45_000);
    }

    #[tokio::test]
    async fn test_request_rejections() {
        let (market, _clock) = market().await;
        let card = bank_card(&market, "seller").await;
        let other_card = bank_card(&market, "someone-else").await;
        let fresh = buy(&market, "buyer", "seller", 10_000).await;

        let err = market
            .withdrawals()
            .create_withdrawal("seller", request(&other_card.id, &[&fresh]))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::BankCardNotFound(_))));

        let mut missing = request(&card.id, &[&fresh]);
        missing.order_ids.push("ghost".to_string());
        let err = market.withdrawals().create_withdrawal("seller", missing).await.unwrap_err();
        assert!(matches!(
            err,
            MarketError::Core(CoreError::OrdersNotFound { ref missing }) if missing == &vec!["ghost".to_string()]
        ));

        let err = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&fresh]))
            .await
            .unwrap_err();
        let MarketError::Core(CoreError::IneligibleOrders(problems)) = err else {
            panic!("expected IneligibleOrders");
        };
        assert_eq!(problems.len(), 2);

        let theirs = ready(&market, buy(&market, "buyer", "other-seller", 10_000).await).await;
        let err = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&theirs]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketError::Core(CoreError::IneligibleOrders(ref p)) if p[0].reason == Ineligibility::NotOrderSeller
        ));
    }

    #[tokio::test]
    async fn test_approval_requires_proof() {
        let (market, _clock) = market().await;
        let card = bank_card(&market, "seller").await;
        let order = ready(&market, buy(&market, "buyer", "seller", 10_000).await).await;
        let w = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&order]))
            .await
            .unwrap();

        let err = market
            .withdrawals()
            .handle_admin_action(&w.id, "admin", WithdrawalAction::Approved, None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::ProofRequired)));
        let still = market.withdrawals().get_withdrawal(&w.id, "seller").await.unwrap();
        assert_eq!(still.status, WithdrawalStatus::Pending);

        let approved = market
            .withdrawals()
            .handle_admin_action(&w.id, "admin", WithdrawalAction::Approved, Some("paid"), &proof())
            .await
            .unwrap();
        assert_eq!(approved.status, WithdrawalStatus::Approved);
        assert_eq!(approved.payment_proof_urls, proof());
        assert!(approved.processed_at.is_some());

        let err = market
            .withdrawals()
            .handle_admin_action(&w.id, "admin", WithdrawalAction::Rejected, None, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::AlreadyProcessed { .. })));
    }

    #[tokio::test]
    async fn test_rejection_releases_orders() {
        let (market, _clock) = market().await;
        let card = bank_card(&market, "seller").await;
        let order = ready(&market, buy(&market, "buyer", "seller", 10_000).await).await;
        let w = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&order]))
            .await
            .unwrap();

        let rejected = market
            .withdrawals()
            .handle_admin_action(&w.id, "admin", WithdrawalAction::Rejected, Some("Wrong account"), &[])
            .await
            .unwrap();
        assert_eq!(rejected.status, WithdrawalStatus::Rejected);

        let released = market.orders().get_order(&order.id, "buyer").await.unwrap();
        assert_eq!(released.status, OrderStatus::ReadyForWithdrawal);
        assert!(released.can_withdraw);

        // Released orders can be requested again
        market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&order]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_visibility_and_statistics() {
        let (market, _clock) = market().await;
        let card = bank_card(&market, "seller").await;
        let order = ready(&market, buy(&market, "buyer", "seller", 20_000).await).await;
        let w = market
            .withdrawals()
            .create_withdrawal("seller", request(&card.id, &[&order]))
            .await
            .unwrap();

        let err = market.withdrawals().get_withdrawal(&w.id, "intruder").await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::WithdrawalNotFound(_))));
        assert_eq!(
            market
                .withdrawals()
                .get_all_withdrawals(Some(WithdrawalStatus::Pending))
                .await
                .unwrap()
                .len(),
            1
        );

        market
            .withdrawals()
            .handle_admin_action(&w.id, "admin", WithdrawalAction::Approved, None, &proof())
            .await
            .unwrap();

        let err = market.withdrawals().statistics("seller", None, Some(3)).await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::YearRequiredForMonthFilter)));
        assert!(market.withdrawals().statistics("seller", Some(2024), Some(13)).await.is_err());

        let stats = market.withdrawals().statistics("seller", Some(2024), Some(3)).await.unwrap();
        assert_eq!(stats.count, 1);
        assert_eq!(stats.amount_cents, 20_000);
        assert_eq!(stats.fee_cents + stats.actual_amount_cents, 20_000);

        let empty = market.withdrawals().statistics("seller", Some(2023), None).await.unwrap();
        assert_eq!(empty.count, 0);
    }
}
