//! # Services
//!
//! One service per workflow. Each holds a [`Database`](bazaar_db::Database)
//! handle and the shared clock; they are cheap to clone and are handed out
//! by [`Market`](crate::Market).

pub mod bank_cards;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reports;
pub mod system_variables;
pub mod wallet;
pub mod withdrawals;
