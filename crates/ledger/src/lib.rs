pub mod book;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod snapshot;

pub use book::{ExposureSnapshot, Position, PositionBook, PositionDelta};
pub use error::{LedgerError, Result};
pub use journal::Journal;
pub use ledger::{AppendOutcome, EventLedger, IncrementalOutcome};
pub use snapshot::{BookSnapshot, SessionState, SnapshotStore};
