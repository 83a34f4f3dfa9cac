//! Fingerprinted book snapshots for fast recovery.
//!
//! Replay is always the ground truth; a snapshot is only an optimization
//! that lets startup skip refolding a long journal. The stored fingerprint
//! ties the snapshot to the exact event set it was derived from, and any
//! mismatch or corruption falls back to full replay.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::book::{Position, PositionBook};
use crate::error::Result;
use crate::ledger::EventLedger;

/// Per-day trading state carried across restarts.
///
/// The kill switch is irreversible within a day, so a restart must come
/// back tripped if it went down tripped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// UTC date the session was armed for.
    pub day_key: NaiveDate,
    /// Book-wide realized P&L at the moment the day was armed; the daily
    /// figure is the current total minus this baseline.
    pub day_start_realized: Decimal,
    pub kill_tripped: bool,
    pub trip_reason: Option<String>,
    pub tripped_at: Option<DateTime<Utc>>,
}

impl SessionState {
    /// Fresh, armed session for the given day.
    #[must_use]
    pub fn armed(day_key: NaiveDate, day_start_realized: Decimal) -> Self {
        Self {
            day_key,
            day_start_realized,
            kill_tripped: false,
            trip_reason: None,
            tripped_at: None,
        }
    }
}

/// Serialized book state plus everything needed to prove it still matches
/// the ledger and to resume ingestion where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookSnapshot {
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the event set the positions were folded from.
    pub fingerprint: String,
    pub positions: Vec<Position>,
    pub last_applied: Option<(DateTime<Utc>, String)>,
    pub fill_cursor: Option<DateTime<Utc>>,
    pub settlement_cursor: Option<DateTime<Utc>>,
    pub session: SessionState,
}

impl BookSnapshot {
    /// Captures the current book against the ledger it was folded from.
    #[must_use]
    pub fn capture(
        ledger: &EventLedger,
        book: &PositionBook,
        fill_cursor: Option<DateTime<Utc>>,
        settlement_cursor: Option<DateTime<Utc>>,
        session: SessionState,
    ) -> Self {
        let mut positions: Vec<Position> = book.positions().cloned().collect();
        positions.sort_by(|a, b| a.market_id.cmp(&b.market_id));
        Self {
            created_at: Utc::now(),
            fingerprint: ledger.fingerprint(),
            positions,
            last_applied: book.last_applied().cloned(),
            fill_cursor,
            settlement_cursor,
            session,
        }
    }

    /// True when the snapshot was derived from exactly this ledger's event
    /// set, making [`restore_book`](Self::restore_book) safe to use in place
    /// of replay.
    #[must_use]
    pub fn matches(&self, ledger: &EventLedger) -> bool {
        self.fingerprint == ledger.fingerprint()
    }

    /// Rebuilds the book the snapshot captured.
    #[must_use]
    pub fn restore_book(&self) -> PositionBook {
        PositionBook::from_parts(self.positions.clone(), self.last_applied.clone())
    }
}

/// Loads and saves [`BookSnapshot`]s at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes the snapshot, creating parent directories on first use.
    ///
    /// # Errors
    ///
    /// IO or serialization failure.
    pub fn save(&self, snapshot: &BookSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, snapshot)?;

        debug!(
            path = %self.path.display(),
            positions = snapshot.positions.len(),
            fingerprint = %snapshot.fingerprint,
            "saved book snapshot"
        );
        Ok(())
    }

    /// Reads the snapshot if a usable one exists. Missing and corrupt files
    /// both come back as `None`; corruption is warned about, since replay
    /// covers for it.
    pub fn load(&self) -> Option<BookSnapshot> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no snapshot file, full replay required");
            return None;
        }
        match self.load_inner() {
            Ok(snapshot) => Some(snapshot),
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "unreadable snapshot, falling back to full replay"
                );
                None
            }
        }
    }

    fn load_inner(&self) -> Result<BookSnapshot> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
