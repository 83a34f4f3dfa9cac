//! Boundary and validation errors shared across the workspace.

use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for fallible capability calls.
pub type Result<T> = std::result::Result<T, ExchangeError>;

/// Failure reported by an exchange adapter.
///
/// Adapters fold their wire-level failures into these variants so callers
/// can decide generically whether a bounded retry is worthwhile. Nothing
/// here carries venue-specific payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// Connection-level failure: DNS, TLS, socket resets.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The call did not complete in time.
    #[error("request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The venue asked us to slow down.
    #[error("rate limited by venue")]
    RateLimited { retry_after: Option<u64> },

    /// The venue is down or answering with server errors.
    #[error("venue unavailable: {message}")]
    Unavailable { message: String },

    /// Credentials rejected. Never retried.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The venue does not know this market.
    #[error("unknown market: {market_id}")]
    MarketNotFound { market_id: String },

    /// The venue refused the order: balance, halted market, bad params.
    #[error("order rejected by venue: {reason}")]
    OrderRejected { reason: String },

    /// We sent something malformed. A bug on our side, never retried.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl ExchangeError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn timeout(seconds: u64) -> Self {
        Self::Timeout { seconds }
    }

    #[must_use]
    pub fn rate_limited(retry_after: Option<u64>) -> Self {
        Self::RateLimited { retry_after }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn market_not_found(market_id: impl Into<String>) -> Self {
        Self::MarketNotFound {
            market_id: market_id.into(),
        }
    }

    pub fn order_rejected(reason: impl Into<String>) -> Self {
        Self::OrderRejected {
            reason: reason.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// True when a bounded backoff retry has a chance of succeeding.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Timeout { .. }
                | Self::RateLimited { .. }
                | Self::Unavailable { .. }
        )
    }

    /// Venue-suggested delay before the next attempt, when one was given.
    #[must_use]
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after: Some(secs),
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// A record that fails the core's well-formedness rules.
///
/// The ledger logs and skips malformed events rather than letting them
/// poison a replay.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("price {price} outside the 0.01..=0.99 band")]
    PriceOutOfRange { price: Decimal },

    #[error("quantity must be positive")]
    ZeroQuantity,

    #[error("empty market identifier")]
    EmptyMarketId,

    #[error("empty fill identifier")]
    EmptyFillId,

    #[error("settlement payout {payout} outside the 0..=1 band")]
    PayoutOutOfRange { payout: Decimal },
}
