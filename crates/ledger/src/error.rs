//! Ledger application and persistence errors.

use thiserror::Error;
use veris_core::ValidationError;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Failure while applying or persisting ledger events.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Event breaking the well-formedness rules. Non-fatal: callers log and
    /// skip the record rather than aborting ingestion.
    #[error("malformed event: {0}")]
    Malformed(#[from] ValidationError),

    /// IO error reading or writing journal/snapshot files.
    #[error("persistence io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization or deserialization error.
    #[error("persistence serialization: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// True for events that should be skipped rather than retried or
    /// escalated.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}
