//! # System Variables
//!
//! Runtime-tunable numbers. The withdrawal fee is read from here on every
//! request, so an admin change applies to the next withdrawal.

use std::sync::Arc;

use bazaar_core::{FeeRate, SystemVariable, ValidationError, DISCOUNT_RATE_KEY};
use bazaar_db::Database;

use crate::clock::Clock;
use crate::error::MarketResult;

/// Keys whose value is a percentage.
const RATE_KEYS: &[&str] = &[DISCOUNT_RATE_KEY];

#[derive(Debug, Clone)]
pub struct SystemVariables {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl SystemVariables {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        SystemVariables { db, clock }
    }

    pub async fn get(&self, key: &str) -> MarketResult<Option<f64>> {
        Ok(self.db.system_variables().get(key).await?.map(|v| v.value))
    }

    /// Upserts a value. Rate keys must be within 0..=100.
    pub async fn set(&self, key: &str, value: f64) -> MarketResult<SystemVariable> {
        if !value.is_finite() {
            return Err(ValidationError::InvalidFormat {
                field: key.to_string(),
                reason: "must be a finite number".to_string(),
            }
            .into());
        }
        if RATE_KEYS.contains(&key) {
            FeeRate::from_percentage(value)?;
        }

        Ok(self.db.system_variables().set(key, value, self.clock.now()).await?)
    }

    /// Platform fee for withdrawals; 17% when unset.
    pub async fn fee_rate(&self) -> MarketResult<FeeRate> {
        match self.get(DISCOUNT_RATE_KEY).await? {
            Some(pct) => Ok(FeeRate::from_percentage(pct)?),
            None => Ok(FeeRate::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::market;
    use crate::MarketError;
    use bazaar_core::{CoreError, DISCOUNT_RATE_KEY};

    #[tokio::test]
    async fn test_fee_rate_defaults_and_updates() {
        let (market, _clock) = market().await;
        let vars = market.system_variables();

        assert_eq!(vars.fee_rate().await.unwrap().bps(), 1700);

        vars.set(DISCOUNT_RATE_KEY, 12.5).await.unwrap();
        assert_eq!(vars.fee_rate().await.unwrap().bps(), 1250);
        assert_eq!(vars.get(DISCOUNT_RATE_KEY).await.unwrap(), Some(12.5));
    }

    #[tokio::test]
    async fn test_rate_bounds() {
        let (market, _clock) = market().await;
        let vars = market.system_variables();

        for bad in [-1.0, 100.5, f64::NAN] {
            let err = vars.set(DISCOUNT_RATE_KEY, bad).await.unwrap_err();
            assert!(matches!(err, MarketError::Core(CoreError::Validation(_))));
        }
        // Non-rate keys only need to be finite
        vars.set("maxUploadMb", 250.0).await.unwrap();
        assert!(vars.set("maxUploadMb", f64::INFINITY).await.is_err());
    }
}
