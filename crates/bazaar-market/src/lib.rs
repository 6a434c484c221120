//! # bazaar-market: Marketplace Workflows
//!
//! Checkout, disputes and seller payouts on top of `bazaar-db`, plus the
//! background tasks that move orders along.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Market (facade)                                  │
//! │                                                                         │
//! │   orders()  reports()  withdrawals()  wallets()  payments()  catalog()  │
//! │   bank_cards()  notifications()  system_variables()                     │
//! │        │                                                                │
//! │        │ BEGIN … COMMIT (bazaar-db transaction functions)               │
//! │        ▼                                                                │
//! │   Notifier ──► notifications table ◄── NotificationDispatcher ──► sink  │
//! │                        ▲                                                │
//! │   OrderScheduler ──────┘  (completed → ready_for_withdrawal)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Order Lifecycle
//! ```text
//! checkout ─► completed ──(3 days, no report)──► ready_for_withdrawal
//!                 │                                   │
//!                 ▼ report                            ▼ withdrawal request
//!             reported ─ reject ─► ready_for_…    withdrawing ─ approve ─► withdrawn
//!                 │                                   │
//!                 ▼ approve                           ▼ reject
//!             refunded                            ready_for_withdrawal
//! ```
//!
//! ## Modules
//!
//! - [`services`] - workflow services
//! - [`scheduler`] - periodic order promotion
//! - [`dispatcher`] - notification delivery
//! - [`notifier`] - post-commit notification recording
//! - [`directory`] - display-name lookups
//! - [`clock`] - injectable time source

pub mod clock;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod notifier;
pub mod scheduler;
pub mod services;

use std::sync::Arc;
use std::time::Duration;

use bazaar_db::Database;

pub use clock::{Clock, ManualClock, SystemClock};
pub use directory::{NameLookup, ProfileDirectory, UserDirectory};
pub use dispatcher::{
    DeliveryError, DispatcherConfig, LogSink, NotificationDispatcher, NotificationDispatcherHandle, NotificationSink,
};
pub use error::{MarketError, MarketResult};
pub use notifier::Notifier;
pub use scheduler::{OrderScheduler, OrderSchedulerHandle, SchedulerConfig, SweepReport};
pub use services::bank_cards::{BankCardService, BankCardUpdate, NewBankCard};
pub use services::catalog::CatalogService;
pub use services::notifications::NotificationService;
pub use services::orders::OrderService;
pub use services::payments::{DepositSettlement, PaymentService};
pub use services::reports::{NewReport, ReportService};
pub use services::system_variables::SystemVariables;
pub use services::wallet::WalletService;
pub use services::withdrawals::{NewWithdrawal, WithdrawalService};

/// Default bound for a display-name lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(500);

// =============================================================================
// Market
// =============================================================================

/// Entry point to every workflow. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Market {
    db: Database,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    names: NameLookup,
}

impl Market {
    pub fn new(
        db: Database,
        clock: Arc<dyn Clock>,
        directory: Arc<dyn UserDirectory>,
        lookup_timeout: Duration,
    ) -> Self {
        let notifier = Notifier::new(db.clone(), clock.clone());
        let names = NameLookup::new(directory, lookup_timeout);
        Market {
            db,
            clock,
            notifier,
            names,
        }
    }

    /// Wall clock and the local profile table as directory.
    pub fn with_defaults(db: Database) -> Self {
        let directory = Arc::new(ProfileDirectory::new(db.clone()));
        Market::new(db, Arc::new(SystemClock), directory, DEFAULT_LOOKUP_TIMEOUT)
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn wallets(&self) -> WalletService {
        WalletService::new(self.db.clone(), self.clock.clone())
    }

    pub fn system_variables(&self) -> SystemVariables {
        SystemVariables::new(self.db.clone(), self.clock.clone())
    }

    pub fn payments(&self) -> PaymentService {
        PaymentService::new(self.db.clone(), self.clock.clone())
    }

    pub fn catalog(&self) -> CatalogService {
        CatalogService::new(self.db.clone(), self.clock.clone())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.db.clone(), self.clock.clone())
    }

    pub fn reports(&self) -> ReportService {
        ReportService::new(
            self.db.clone(),
            self.clock.clone(),
            self.notifier.clone(),
            self.names.clone(),
        )
    }

    pub fn withdrawals(&self) -> WithdrawalService {
        WithdrawalService::new(
            self.db.clone(),
            self.clock.clone(),
            self.system_variables(),
            self.notifier.clone(),
        )
    }

    pub fn bank_cards(&self) -> BankCardService {
        BankCardService::new(self.db.clone(), self.clock.clone())
    }

    pub fn notifications(&self) -> NotificationService {
        NotificationService::new(self.db.clone())
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    pub fn order_scheduler(&self, config: SchedulerConfig) -> (OrderScheduler, OrderSchedulerHandle) {
        OrderScheduler::new(self.db.clone(), self.clock.clone(), self.notifier.clone(), config)
    }

    pub fn notification_dispatcher(
        &self,
        sink: Arc<dyn NotificationSink>,
        config: DispatcherConfig,
    ) -> (NotificationDispatcher, NotificationDispatcherHandle) {
        NotificationDispatcher::new(self.db.clone(), self.clock.clone(), sink, config)
    }
}

// =============================================================================
// Test Support
// =============================================================================


// =============================================================================
// End-to-End Tests
// =============================================================================
