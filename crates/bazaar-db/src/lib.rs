//! # bazaar-db: Database Layer for Bazaar
//!
//! SQLite storage for the marketplace, accessed through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Data Flow                                 │
//! │                                                                         │
//! │  bazaar-market workflow (checkout, reports, withdrawals)                │
//! │       │  opens a transaction with db.begin()                           │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    bazaar-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │  │   │
//! │  │   │               │    │ WalletRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ OrderRepo      │    │ 0001_initial │  │   │
//! │  │   │ begin()       │    │ ReportRepo     │    │              │  │   │
//! │  │   │               │    │ WithdrawalRepo │    │              │  │   │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, foreign keys on)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Transactions
//!
//! Repositories expose two shapes of method:
//!
//! - `&self` methods run on the pool (reads, single-statement writes)
//! - associated functions taking `&mut SqliteConnection` run inside a
//!   caller-owned transaction (`&mut *tx`)
//!
//! Status transitions are conditional updates returning `bool`: `false`
//! means the row was not in the expected state.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bazaar_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("bazaar.db")).await?;
//! let wallet = db.wallets().get_or_create("user-1").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::bank_card::BankCardRepository;
pub use repository::cart::CartRepository;
pub use repository::notification::NotificationRepository;
pub use repository::order::OrderRepository;
pub use repository::payment_history::PaymentHistoryRepository;
pub use repository::product::ProductRepository;
pub use repository::report::ReportRepository;
pub use repository::system_variable::SystemVariableRepository;
pub use repository::user_profile::UserProfileRepository;
pub use repository::wallet::WalletRepository;
pub use repository::withdrawal::WithdrawalRepository;
