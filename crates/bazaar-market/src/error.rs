//! # Market Error Types
//!
//! Workflows fail for one of two reasons: a business rule said no
//! ([`CoreError`]) or storage failed ([`DbError`]).
//!
//! ```text
//!  CoreError ──┐
//!              ├──► MarketError ──► ApiError (apps/api)
//!  DbError ────┘
//! ```

use thiserror::Error;

use bazaar_core::{CoreError, ValidationError};
use bazaar_db::DbError;

/// Result type alias for workflow operations.
pub type MarketResult<T> = Result<T, MarketError>;

#[derive(Debug, Error)]
pub enum MarketError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<ValidationError> for MarketError {
    fn from(err: ValidationError) -> Self {
        MarketError::Core(CoreError::Validation(err))
    }
}

/// Commit and raw transaction failures.
impl From<sqlx::Error> for MarketError {
    fn from(err: sqlx::Error) -> Self {
        MarketError::Db(DbError::from(err))
    }
}

impl MarketError {
    /// The business rule that failed, if any.
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            MarketError::Core(err) => Some(err),
            MarketError::Db(_) => None,
        }
    }
}
