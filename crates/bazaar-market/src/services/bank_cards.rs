//! # Bank Cards
//!
//! Payout accounts. A user has at most one default card; making a card
//! default clears the previous one in the same transaction.

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use bazaar_core::validation::validate_bank_card;
use bazaar_core::{BankCard, CoreError};
use bazaar_db::{BankCardRepository, Database};

use crate::clock::Clock;
use crate::error::MarketResult;

#[derive(Debug, Clone)]
pub struct NewBankCard {
    pub bank_name: String,
    pub account_number: String,
    pub account_holder: String,
    pub is_default: bool,
}

/// Partial update; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct BankCardUpdate {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub account_holder: Option<String>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct BankCardService {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl BankCardService {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        BankCardService { db, clock }
    }

    pub async fn create(&self, user_id: &str, input: NewBankCard) -> MarketResult<BankCard> {
        validate_bank_card(&input.bank_name, &input.account_number, &input.account_holder)?;

        let now = self.clock.now();
        let card = BankCard {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            bank_name: input.bank_name.trim().to_string(),
            account_number: input.account_number.trim().to_string(),
            account_holder: input.account_holder.trim().to_string(),
            is_default: input.is_default,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.db.begin().await?;
        if card.is_default {
            BankCardRepository::clear_default(&mut *tx, user_id, now).await?;
        }
        BankCardRepository::insert(&mut *tx, &card).await?;
        tx.commit().await?;

        info!(card_id = %card.id, user_id = %user_id, default = card.is_default, "Bank card added");
        Ok(card)
    }

    /// Default first, then newest first.
    pub async fn list(&self, user_id: &str) -> MarketResult<Vec<BankCard>> {
        Ok(self.db.bank_cards().list(user_id).await?)
    }

    pub async fn get(&self, card_id: &str, user_id: &str) -> MarketResult<BankCard> {
        self.db
            .bank_cards()
            .get_for_user(card_id, user_id)
            .await?
            .ok_or_else(|| CoreError::BankCardNotFound(card_id.to_string()).into())
    }

    pub async fn update(&self, card_id: &str, user_id: &str, changes: BankCardUpdate) -> MarketResult<BankCard> {
        let current = self.get(card_id, user_id).await?;
        let bank_name = changes.bank_name.unwrap_or(current.bank_name);
        let account_number = changes.account_number.unwrap_or(current.account_number);
        let account_holder = changes.account_holder.unwrap_or(current.account_holder);
        validate_bank_card(&bank_name, &account_number, &account_holder)?;

        let updated = self
            .db
            .bank_cards()
            .update_details(
                card_id,
                user_id,
                bank_name.trim(),
                account_number.trim(),
                account_holder.trim(),
                self.clock.now(),
            )
            .await?;
        if !updated {
            return Err(CoreError::BankCardNotFound(card_id.to_string()).into());
        }

        if changes.is_default == Some(true) && !current.is_default {
            return self.set_default(card_id, user_id).await;
        }
        self.get(card_id, user_id).await
    }

    /// Deleting the default card leaves the user without one.
    pub async fn delete(&self, card_id: &str, user_id: &str) -> MarketResult<()> {
        if !self.db.bank_cards().delete(card_id, user_id).await? {
            return Err(CoreError::BankCardNotFound(card_id.to_string()).into());
        }
        info!(card_id = %card_id, user_id = %user_id, "Bank card deleted");
        Ok(())
    }

    pub async fn set_default(&self, card_id: &str, user_id: &str) -> MarketResult<BankCard> {
        let now = self.clock.now();

        let mut tx = self.db.begin().await?;
        BankCardRepository::clear_default(&mut *tx, user_id, now).await?;
        if !BankCardRepository::set_default(&mut *tx, card_id, user_id, now).await? {
            return Err(CoreError::BankCardNotFound(card_id.to_string()).into());
        }
        tx.commit().await?;

        self.get(card_id, user_id).await
    }

    pub async fn get_default(&self, user_id: &str) -> MarketResult<BankCard> {
        self.db
            .bank_cards()
            .get_default(user_id)
            .await?
            .ok_or_else(|| CoreError::NoDefaultBankCard.into())
    }
}
