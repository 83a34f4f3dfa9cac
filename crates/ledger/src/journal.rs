//! Append-only JSONL journal of ledger events.
//!
//! One serde_json document per line. The journal is the durable source of
//! truth for replay: a missing file means an empty history, and a corrupt
//! line is warned about and skipped rather than blocking recovery.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use veris_core::LedgerEvent;

use crate::error::Result;

/// Handle to the on-disk event journal.
#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
}

impl Journal {
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

    /// Appends one event as a JSON line and flushes it. Creates parent
    /// directories on first use.
    ///
    /// # Errors
    ///
    /// IO or serialization failure; the journal file is never left with a
    /// partially written line followed by a flush.
    pub fn append(&self, event: &LedgerEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        file.flush()?;
        Ok(())
    }

    /// Loads every well-formed event in file order.
    ///
    /// # Errors
    ///
    /// IO failure reading an existing file. A missing file is an empty
    /// history, not an error.
    pub fn load(&self) -> Result<Vec<LedgerEvent>> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "no journal file, starting with empty history");
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut skipped = 0usize;
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEvent>(&line) {
                Ok(event) => events.push(event),
                Err(error) => {
                    skipped += 1;
                    warn!(
                        path = %self.path.display(),
                        line = index + 1,
                        %error,
                        "skipping corrupt journal line"
                    );
                }
            }
        }

        debug!(
            path = %self.path.display(),
            events = events.len(),
            skipped,
            "journal loaded"
        );
        Ok(events)
    }
}
