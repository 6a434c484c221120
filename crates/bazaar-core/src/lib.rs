//! # bazaar-core: Pure Business Logic for Bazaar
//!
//! This crate holds the marketplace settlement rules as pure functions with
//! zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Bazaar Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    /orders/checkout ──► /reports ──► /withdrawals               │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-market (workflows)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ bazaar-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ settlement │  │ validation│  │   │
//! │  │   │  Order    │  │   Money   │  │ window     │  │   rules   │  │   │
//! │  │   │  Report   │  │  FeeRate  │  │ eligibility│  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    bazaar-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Order, Report, Withdrawal, Wallet, etc.)
//! - [`money`] - Money and FeeRate with integer arithmetic
//! - [`settlement`] - Report window, seller shares, withdrawal eligibility
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use bazaar_core::money::{FeeRate, Money};
//!
//! let gross = Money::from_cents(20_000_000); // 200,000.00 VND
//! let split = gross.split_fee(FeeRate::from_bps(1700));
//!
//! assert_eq!(split.fee.cents(), 3_400_000);
//! assert_eq!(split.net.cents(), 16_600_000);
//! assert_eq!(split.fee + split.net, gross);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod settlement;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, Ineligibility, OrderIneligibility, ValidationError};
pub use money::{FeeRate, FeeSplit, Money};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Length of the buyer report window after checkout.
///
/// Orders become withdrawable for sellers once this has elapsed without a
/// report.
pub const REPORT_WINDOW_DAYS: i64 = 3;

/// System variable holding the platform fee rate as a percentage (0-100).
pub const DISCOUNT_RATE_KEY: &str = "discountRate";

/// Fee rate applied when `discountRate` has never been set (17%).
pub const DEFAULT_FEE_RATE_BPS: u32 = 1700;

/// Currency of every wallet and payment record.
pub const DEFAULT_CURRENCY: &str = "VND";

/// Maximum distinct products in a single cart.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest accepted product price in minor units (10 billion VND).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000_000;

/// Label used when a user's display name cannot be resolved.
pub const UNKNOWN_USER: &str = "Unknown User";
