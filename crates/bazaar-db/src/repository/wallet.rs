//! # Wallet Repository
//!
//! One balance per user. Every balance change is a single UPDATE statement;
//! the debit carries its own balance check.
//!
//! ```text
//! credit:  UPDATE wallets SET balance = balance + :amt WHERE user_id = :u
//! debit:   UPDATE wallets SET balance = balance - :amt
//!          WHERE user_id = :u AND balance >= :amt        ← no read-then-write
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use bazaar_core::{Money, Wallet, DEFAULT_CURRENCY};

#[derive(Debug, sqlx::FromRow)]
struct WalletRecord {
    id: String,
    user_id: String,
    balance_cents: i64,
    currency: String,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<WalletRecord> for Wallet {
    fn from(r: WalletRecord) -> Self {
        Wallet {
            id: r.id,
            user_id: r.user_id,
            balance_cents: r.balance_cents,
            currency: r.currency,
            is_active: r.is_active,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Balance before and after a credit or debit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
    pub before: Money,
    pub after: Money,
}

/// Repository for wallet operations.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    /// Gets a user's wallet, if one was ever created.
    pub async fn get_by_user(&self, user_id: &str) -> DbResult<Option<Wallet>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, user_id).await
    }

    /// Gets a user's wallet, creating an empty one on first access.
    pub async fn get_or_create(&self, user_id: &str, now: DateTime<Utc>) -> DbResult<Wallet> {
        let mut conn = self.pool.acquire().await?;
        Self::ensure(&mut conn, user_id, now).await?;
        let wallet = Self::find(&mut conn, user_id).await?;
        wallet.ok_or_else(|| crate::DbError::not_found("Wallet", user_id))
    }

    /// Credits outside of any larger transaction.
    pub async fn add_balance(
        &self,
        user_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<BalanceChange> {
        let mut conn = self.pool.acquire().await?;
        Self::credit(&mut conn, user_id, amount, now).await
    }

    /// Debits outside of any larger transaction. `None` if funds are short.
    pub async fn deduct_balance(
        &self,
        user_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Option<BalanceChange>> {
        let mut conn = self.pool.acquire().await?;
        Self::debit(&mut conn, user_id, amount, now).await
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    pub async fn find(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Option<Wallet>> {
        let record = sqlx::query_as::<_, WalletRecord>(
            r#"
            SELECT id, user_id, balance_cents, currency, is_active, created_at, updated_at
            FROM wallets
            WHERE user_id = ?1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(record.map(Wallet::from))
    }

    /// Creates the wallet row if missing. Idempotent.
    pub async fn ensure(conn: &mut SqliteConnection, user_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, balance_cents, currency, is_active, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, 1, ?4, ?4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(DEFAULT_CURRENCY)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() > 0 {
            debug!(user_id = %user_id, "Created wallet");
        }
        Ok(())
    }

    /// Adds `amount` to the user's balance, creating the wallet if needed.
    pub async fn credit(
        conn: &mut SqliteConnection,
        user_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<BalanceChange> {
        Self::ensure(conn, user_id, now).await?;

        let after: i64 = sqlx::query_scalar(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents + ?2, updated_at = ?3
            WHERE user_id = ?1
            RETURNING balance_cents
            "#,
        )
        .bind(user_id)
        .bind(amount.cents())
        .bind(now)
        .fetch_one(&mut *conn)
        .await?;

        debug!(user_id = %user_id, amount = amount.cents(), balance = after, "Wallet credited");

        let after = Money::from_cents(after);
        Ok(BalanceChange {
            before: after - amount,
            after,
        })
    }

    /// Subtracts `amount` if the balance covers it.
    ///
    /// Returns `None` when the wallet is missing or the balance is short; in
    /// that case nothing was written.
    pub async fn debit(
        conn: &mut SqliteConnection,
        user_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Option<BalanceChange>> {
        let after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE wallets
            SET balance_cents = balance_cents - ?2, updated_at = ?3
            WHERE user_id = ?1 AND balance_cents >= ?2
            RETURNING balance_cents
            "#,
        )
        .bind(user_id)
        .bind(amount.cents())
        .bind(now)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(after.map(|after| {
            debug!(user_id = %user_id, amount = amount.cents(), balance = after, "Wallet debited");
            let after = Money::from_cents(after);
            BalanceChange {
                before: after + amount,
                after,
            }
        }))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
