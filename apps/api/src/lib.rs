//! # Bazaar API
//!
//! REST server for the marketplace settlement workflows.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         API Routes                                      │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Buyer         │  │  Seller        │  │  Admin                     ││
//! │  │                │  │                │  │                            ││
//! │  │ • cart         │  │ • products     │  │ • report decisions         ││
//! │  │ • checkout     │  │ • sold orders  │  │ • withdrawal decisions     ││
//! │  │ • reports      │  │ • withdrawals  │  │ • discount rate            ││
//! │  │ • wallet       │  │ • bank cards   │  │ • scheduler sweep          ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────────────┐│  │
//! │  │  │  SQLite      │  │  Scheduler   │  │    JWT Auth              ││  │
//! │  │  │              │  │  Dispatcher  │  │                          ││  │
//! │  │  │ bazaar-db    │  │ bazaar-market│  │ bearer tokens, webhook   ││  │
//! │  │  │              │  │              │  │ secret                   ││  │
//! │  │  └──────────────┘  └──────────────┘  └──────────────────────────┘│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config`]: `bazaar.toml` plus `BAZAAR__SECTION__FIELD` overrides.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use bazaar_market::{Market, OrderSchedulerHandle};

pub use auth::{AdminUser, AuthUser, Claims, JwtManager, Role};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::router;

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub market: Market,
    pub jwt: Arc<JwtManager>,
    pub webhook_secret: Arc<str>,
    /// Manual sweeps share the running scheduler's guard.
    pub sweeps: OrderSchedulerHandle,
}

impl AppState {
    pub fn new(market: Market, jwt: JwtManager, webhook_secret: &str, sweeps: OrderSchedulerHandle) -> Self {
        AppState {
            market,
            jwt: Arc::new(jwt),
            webhook_secret: Arc::from(webhook_secret),
            sweeps,
        }
    }
}
