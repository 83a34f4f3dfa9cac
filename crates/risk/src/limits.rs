//! Hard risk limits.
//!
//! Loaded once before the session arms its kill switch and immutable from
//! then on. All values are decimal dollars.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A limits table that cannot be enforced as written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimitsError {
    #[error("{field} must be positive, got {value}")]
    NonPositive { field: &'static str, value: Decimal },

    #[error("per-market limit {per_market} exceeds total limit {total}")]
    PerMarketExceedsTotal { per_market: Decimal, total: Decimal },
}

/// Exposure and loss caps every order is gated against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Largest absolute cost-basis exposure one market may reach.
    pub max_per_market_exposure: Decimal,
    /// Largest summed absolute exposure across all markets.
    pub max_total_exposure: Decimal,
    /// Daily loss (realized plus unrealized) that trips the kill switch.
    pub max_daily_loss: Decimal,
}

impl Default for RiskLimits {
    /// Small-account limits: $10 per market, $50 total, $20 daily loss.
    fn default() -> Self {
        Self {
            max_per_market_exposure: Decimal::new(10, 0),
            max_total_exposure: Decimal::new(50, 0),
            max_daily_loss: Decimal::new(20, 0),
        }
    }
}

impl RiskLimits {
    #[must_use]
    pub fn new(
        max_per_market_exposure: Decimal,
        max_total_exposure: Decimal,
        max_daily_loss: Decimal,
    ) -> Self {
        Self {
            max_per_market_exposure,
            max_total_exposure,
            max_daily_loss,
        }
    }

    /// Half the default caps, for shaking out a new venue integration.
    #[must_use]
    pub fn conservative() -> Self {
        Self {
            max_per_market_exposure: Decimal::new(5, 0),
            max_total_exposure: Decimal::new(25, 0),
            max_daily_loss: Decimal::new(10, 0),
        }
    }

    /// Production-sized caps.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            max_per_market_exposure: Decimal::new(100, 0),
            max_total_exposure: Decimal::new(500, 0),
            max_daily_loss: Decimal::new(100, 0),
        }
    }

    /// Checks the table is internally coherent.
    ///
    /// # Errors
    ///
    /// Non-positive caps, or a per-market cap the total cap could never
    /// accommodate.
    pub fn validate(&self) -> Result<(), LimitsError> {
        for (field, value) in [
            ("max_per_market_exposure", self.max_per_market_exposure),
            ("max_total_exposure", self.max_total_exposure),
            ("max_daily_loss", self.max_daily_loss),
        ] {
            if value <= Decimal::ZERO {
                return Err(LimitsError::NonPositive { field, value });
            }
        }
        if self.max_per_market_exposure > self.max_total_exposure {
            return Err(LimitsError::PerMarketExceedsTotal {
                per_market: self.max_per_market_exposure,
                total: self.max_total_exposure,
            });
        }
        Ok(())
    }
}
