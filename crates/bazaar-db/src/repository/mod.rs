//! # Repository Module
//!
//! Database repository implementations for Bazaar.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Two Ways In                                          │
//! │                                                                         │
//! │  Pool methods (&self)                 Transaction functions             │
//! │  ───────────────────                  ─────────────────────             │
//! │  db.orders().get_by_id(id)            OrderRepository::transition(      │
//! │  db.wallets().get_or_create(u)            &mut *tx, id, from, to, now)  │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  SqlitePool (auto-commit)             caller's Transaction              │
//! │                                                                         │
//! │  Conditional updates return bool:                                       │
//! │    true  → row moved to the new state                                   │
//! │    false → row missing or in another state (caller decides the error)   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`WalletRepository`](wallet::WalletRepository) - balances, credit/debit
//! - [`PaymentHistoryRepository`](payment_history::PaymentHistoryRepository) - money event log
//! - [`OrderRepository`](order::OrderRepository) - orders and item snapshots
//! - [`ReportRepository`](report::ReportRepository) - buyer disputes
//! - [`WithdrawalRepository`](withdrawal::WithdrawalRepository) - seller payouts
//! - [`SystemVariableRepository`](system_variable::SystemVariableRepository) - numeric settings
//! - [`ProductRepository`](product::ProductRepository), [`CartRepository`](cart::CartRepository)
//! - [`BankCardRepository`](bank_card::BankCardRepository)
//! - [`NotificationRepository`](notification::NotificationRepository) - outbox + inbox
//! - [`UserProfileRepository`](user_profile::UserProfileRepository)

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::DbResult;

pub mod bank_card;
pub mod cart;
pub mod notification;
pub mod order;
pub mod payment_history;
pub mod product;
pub mod report;
pub mod system_variable;
pub mod user_profile;
pub mod wallet;
pub mod withdrawal;

/// Encodes a value for a JSON TEXT column.
pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> DbResult<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes a JSON TEXT column.
pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> DbResult<T> {
    Ok(serde_json::from_str(raw)?)
}

/// SQL placeholder list `?, ?, ?` for an `IN (...)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Offset for a 1-based page.
pub(crate) fn page_offset(page: u32, limit: u32) -> i64 {
    (page.saturating_sub(1) as i64) * limit as i64
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(page_offset(1, 20), 0);
        assert_eq!(page_offset(3, 20), 40);
        assert_eq!(page_offset(0, 20), 0);
    }
}
