//! # Wallet Service
//!
//! Balance reads and direct credits/debits. Checkout, refunds and deposits
//! move money through their own transactions instead.

use std::sync::Arc;
use tracing::info;

use bazaar_core::{CoreError, Money, Wallet};
use bazaar_db::repository::wallet::BalanceChange;
use bazaar_db::Database;

use crate::clock::Clock;
use crate::error::MarketResult;

#[derive(Debug, Clone)]
pub struct WalletService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl WalletService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        WalletService { db, clock }
    }

    /// The user's wallet, created empty on first access.
    pub async fn get_or_create(&self, user_id: &str) -> MarketResult<Wallet> {
        Ok(self.db.wallets().get_or_create(user_id, self.clock.now()).await?)
    }

    /// The user's wallet without creating one.
    pub async fn get_wallet(&self, user_id: &str) -> MarketResult<Wallet> {
        self.db
            .wallets()
            .get_by_user(user_id)
            .await?
            .ok_or_else(|| CoreError::WalletNotFound(user_id.to_string()).into())
    }

    pub async fn get_balance(&self, user_id: &str) -> MarketResult<Money> {
        Ok(self.get_or_create(user_id).await?.balance())
    }

    pub async fn add_balance(&self, user_id: &str, amount: Money) -> MarketResult<BalanceChange> {
        ensure_positive(amount)?;
        let change = self.db.wallets().add_balance(user_id, amount, self.clock.now()).await?;
        info!(user_id = %user_id, amount = amount.cents(), balance = change.after.cents(), "Balance added");
        Ok(change)
    }

    /// Debits if the balance covers `amount`, else `InsufficientBalance`.
    pub async fn deduct_balance(&self, user_id: &str, amount: Money) -> MarketResult<BalanceChange> {
        ensure_positive(amount)?;
        match self.db.wallets().deduct_balance(user_id, amount, self.clock.now()).await? {
            Some(change) => {
                info!(user_id = %user_id, amount = amount.cents(), balance = change.after.cents(), "Balance deducted");
                Ok(change)
            }
            None => {
                let available = self.db.wallets().get_by_user(user_id).await?.map_or(0, |w| w.balance_cents);
                Err(CoreError::InsufficientBalance {
                    required: amount.cents(),
                    available,
                }
                .into())
            }
        }
    }
}

pub(crate) fn ensure_positive(amount: Money) -> Result<(), CoreError> {
    if amount.is_positive() {
        Ok(())
    } else {
        Err(CoreError::InvalidAmount {
            reason: "amount must be greater than 0".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{fund, market, pooled_market};
    use bazaar_core::{CoreError, Money};
    use crate::MarketError;

    #[tokio::test]
    async fn test_wallet_lifecycle() {
        let (market, _clock) = market().await;
        let wallets = market.wallets();

        assert!(matches!(
            wallets.get_wallet("u1").await,
            Err(MarketError::Core(CoreError::WalletNotFound(_)))
        ));
        assert_eq!(wallets.get_balance("u1").await.unwrap(), Money::zero());

        wallets.add_balance("u1", Money::from_cents(1_000)).await.unwrap();
        let change = wallets.deduct_balance("u1", Money::from_cents(400)).await.unwrap();
        assert_eq!(change.after.cents(), 600);

        let err = wallets.deduct_balance("u1", Money::from_cents(601)).await.unwrap_err();
        assert!(matches!(
            err,
            MarketError::Core(CoreError::InsufficientBalance { required: 601, available: 600 })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let (market, _db_file) = pooled_market().await;
        fund(&market, "buyer", 10_000).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let wallets = market.wallets();
                tokio::spawn(async move { wallets.deduct_balance("buyer", Money::from_cents(3_000)).await })
            })
            .collect();

        let mut succeeded = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => succeeded += 1,
                Err(err) => assert!(matches!(err, MarketError::Core(CoreError::InsufficientBalance { .. }))),
            }
        }
        assert_eq!(succeeded, 3);
        assert_eq!(market.wallets().get_balance("buyer").await.unwrap().cents(), 1_000);
    }

    #[tokio::test]
    async fn test_amount_must_be_positive() {
        let (market, _clock) = market().await;
        for amount in [0, -5] {
            let err = market.wallets().add_balance("u1", Money::from_cents(amount)).await.unwrap_err();
            assert!(matches!(err, MarketError::Core(CoreError::InvalidAmount { .. })));
        }
    }
}
