//! Engine-level failures.

use thiserror::Error;
use veris_core::ExchangeError;
use veris_ledger::LedgerError;
use veris_risk::LimitsError;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Failure surfaced by the account engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A trading operation ran before `bootstrap` completed. Replay must
    /// finish before any order can be gated.
    #[error("engine not ready: bootstrap has not completed")]
    NotReady,

    /// The venue served fewer records than the ledger already holds. The
    /// listing was discarded; the journal is never truncated to match a
    /// stale read.
    #[error("stale exchange data: ledger holds {expected} events, venue listed {observed}")]
    StaleData { expected: usize, observed: usize },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Limits(#[from] LimitsError),
}

impl EngineError {
    /// True when the failure was a stale venue read, which calls for a
    /// retried full resync rather than any local repair.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleData { .. })
    }

    /// True when the underlying failure is worth a bounded retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Exchange(error) => error.is_retryable(),
            _ => false,
        }
    }
}
