//! # Bank Card Repository
//!
//! Payout destinations. A partial unique index keeps at most one default
//! card per user, so switching the default is clear-then-set inside one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bazaar_core::BankCard;

#[derive(Debug, sqlx::FromRow)]
struct BankCardRecord {
    id: String,
    user_id: String,
    bank_name: String,
    account_number: String,
    account_holder: String,
    is_default: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BankCardRecord> for BankCard {
    fn from(r: BankCardRecord) -> Self {
        BankCard {
            id: r.id,
            user_id: r.user_id,
            bank_name: r.bank_name,
            account_number: r.account_number,
            account_holder: r.account_holder,
            is_default: r.is_default,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, bank_name, account_number, account_holder, is_default, created_at, updated_at
    FROM bank_cards
"#;

/// Repository for bank cards.
#[derive(Debug, Clone)]
pub struct BankCardRepository {
    pool: SqlitePool,
}

impl BankCardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BankCardRepository { pool }
    }

    /// A card, only if it belongs to `user_id`.
    pub async fn get_for_user(&self, id: &str, user_id: &str) -> DbResult<Option<BankCard>> {
        let record = sqlx::query_as::<_, BankCardRecord>(&format!(
            "{SELECT_COLUMNS} WHERE id = ?1 AND user_id = ?2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(BankCard::from))
    }

    /// Default card first, then newest.
    pub async fn list(&self, user_id: &str) -> DbResult<Vec<BankCard>> {
        let records = sqlx::query_as::<_, BankCardRecord>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY is_default DESC, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records.into_iter().map(BankCard::from).collect())
    }

    pub async fn get_default(&self, user_id: &str) -> DbResult<Option<BankCard>> {
        let record = sqlx::query_as::<_, BankCardRecord>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND is_default = 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(BankCard::from))
    }

    pub async fn count(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bank_cards WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Updates the account details of a user's card.
    pub async fn update_details(
        &self,
        id: &str,
        user_id: &str,
        bank_name: &str,
        account_number: &str,
        account_holder: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE bank_cards
            SET bank_name = ?3, account_number = ?4, account_holder = ?5, updated_at = ?6
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(bank_name)
        .bind(account_number)
        .bind(account_holder)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user's card. Another card is not promoted to default.
    pub async fn delete(&self, id: &str, user_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM bank_cards WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    pub async fn insert(conn: &mut SqliteConnection, card: &BankCard) -> DbResult<()> {
        debug!(id = %card.id, user_id = %card.user_id, default = card.is_default, "Inserting bank card");

        sqlx::query(
            r#"
            INSERT INTO bank_cards (
                id, user_id, bank_name, account_number, account_holder, is_default, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&card.id)
        .bind(&card.user_id)
        .bind(&card.bank_name)
        .bind(&card.account_number)
        .bind(&card.account_holder)
        .bind(card.is_default)
        .bind(card.created_at)
        .bind(card.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Unsets the user's current default, if any.
    pub async fn clear_default(conn: &mut SqliteConnection, user_id: &str, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            "UPDATE bank_cards SET is_default = 0, updated_at = ?2 WHERE user_id = ?1 AND is_default = 1",
        )
        .bind(user_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Marks one of the user's cards as default. Call [`Self::clear_default`] first.
    pub async fn set_default(
        conn: &mut SqliteConnection,
        id: &str,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE bank_cards SET is_default = 1, updated_at = ?3 WHERE id = ?1 AND user_id = ?2",
        )
        .bind(id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
