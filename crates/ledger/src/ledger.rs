//! Append-only, deduplicated event store with deterministic replay.
//!
//! The ledger is the system's ground truth. Exchange position endpoints are
//! unreliable, so the book is never taken from the venue: it is folded from
//! this event set, in a canonical order that does not depend on how the
//! network happened to deliver things.

use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, warn};

use veris_core::{EventKey, LedgerEvent};

use crate::book::{PositionBook, PositionDelta};
use crate::error::{LedgerError, Result};

/// What `append` did with the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// First time this identity was seen; the event is now part of history.
    Appended,
    /// Identity already held; nothing changed.
    Duplicate,
}

/// What `apply_incremental` did with the event.
#[derive(Debug, Clone, PartialEq)]
pub enum IncrementalOutcome {
    /// New event, folded into the live book on the cheap path.
    Applied(PositionDelta),
    /// Already held; neither ledger nor book changed.
    Duplicate,
    /// New event that sorts before already-applied history. The book was
    /// rebuilt by full replay so live state stays identical to replayed
    /// state.
    Reordered,
}

/// Sorts fills ahead of settlements on the rare exact timestamp/identifier
/// tie, keeping the canonical order total.
fn kind_rank(event: &LedgerEvent) -> u8 {
    match event {
        LedgerEvent::Fill(_) => 0,
        LedgerEvent::Settlement(_) => 1,
    }
}

/// Immutable trade history: every fill and settlement the account has ever
/// seen, each exactly once.
#[derive(Debug, Clone, Default)]
pub struct EventLedger {
    events: Vec<LedgerEvent>,
    seen: HashSet<EventKey>,
}

impl EventLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a ledger from stored events, skipping malformed records and
    /// collapsing duplicates. Used when loading a journal.
    #[must_use]
    pub fn from_events(events: impl IntoIterator<Item = LedgerEvent>) -> Self {
        let mut ledger = Self::new();
        for event in events {
            // append already warns on malformed records.
            let _ = ledger.append(event);
        }
        ledger
    }

    /// Records an event. Duplicate identities are absorbed silently so
    /// retried reads and overlapping cursor windows are safe to reapply.
    ///
    /// # Errors
    ///
    /// `LedgerError::Malformed` when the event breaks well-formedness rules;
    /// the event is logged and not recorded, and the caller should skip it.
    pub fn append(&mut self, event: LedgerEvent) -> Result<AppendOutcome> {
        if let Err(reason) = event.validate() {
            warn!(
                market_id = %event.market_id(),
                identifier = %event.identifier(),
                %reason,
                "skipping malformed event"
            );
            return Err(LedgerError::Malformed(reason));
        }
        let key = event.key();
        if self.seen.contains(&key) {
            debug!(identifier = %event.identifier(), "duplicate event absorbed");
            return Ok(AppendOutcome::Duplicate);
        }
        self.seen.insert(key);
        self.events.push(event);
        Ok(AppendOutcome::Appended)
    }

    #[must_use]
    pub fn contains(&self, key: &EventKey) -> bool {
        self.seen.contains(key)
    }

    /// Events in insertion order, for persistence.
    #[must_use]
    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    /// Events in the canonical total order: exchange timestamp, identifier,
    /// then fills ahead of settlements. Replay over this order is
    /// reproducible whatever order events arrived in.
    #[must_use]
    pub fn canonical(&self) -> Vec<&LedgerEvent> {
        let mut ordered: Vec<&LedgerEvent> = self.events.iter().collect();
        ordered.sort_by(|a, b| {
            (a.ordering_key(), kind_rank(a)).cmp(&(b.ordering_key(), kind_rank(b)))
        });
        ordered
    }

    /// Folds the whole ledger into a fresh book. Cold-start and recovery
    /// path; also the reference semantics the incremental path must match.
    #[must_use]
    pub fn replay(&self) -> PositionBook {
        let mut book = PositionBook::new();
        for event in self.canonical() {
            book.apply_event(event);
        }
        debug!(
            events = self.events.len(),
            markets = book.len(),
            "replayed ledger into fresh book"
        );
        book
    }

    /// Appends and, when the event is new, folds it into `book`.
    ///
    /// Guarantees `*book == self.replay()` at every return: in-order events
    /// take the cheap single-market fold, an out-of-order arrival falls back
    /// to a full rebuild.
    ///
    /// # Errors
    ///
    /// `LedgerError::Malformed`, as for [`append`](Self::append).
    pub fn apply_incremental(
        &mut self,
        event: LedgerEvent,
        book: &mut PositionBook,
    ) -> Result<IncrementalOutcome> {
        let in_order = book.last_applied().map_or(true, |(at, id)| {
            (*at, id.as_str()) <= event.ordering_key()
        });
        match self.append(event.clone())? {
            AppendOutcome::Duplicate => Ok(IncrementalOutcome::Duplicate),
            AppendOutcome::Appended if in_order => {
                Ok(IncrementalOutcome::Applied(book.apply_event(&event)))
            }
            AppendOutcome::Appended => {
                warn!(
                    identifier = %event.identifier(),
                    "event arrived out of order, rebuilding book from replay"
                );
                *book = self.replay();
                Ok(IncrementalOutcome::Reordered)
            }
        }
    }

    /// SHA-256 over the canonically ordered event identity sequence. Two
    /// ledgers holding the same event set fingerprint identically, whatever
    /// order they ingested it in.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for event in self.canonical() {
            match event {
                LedgerEvent::Fill(fill) => {
                    hasher.update(b"fill:");
                    hasher.update(fill.fill_id.as_bytes());
                }
                LedgerEvent::Settlement(settlement) => {
                    hasher.update(b"settlement:");
                    hasher.update(settlement.market_id.as_bytes());
                }
            }
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[must_use]
    pub fn fill_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::Fill(_)))
            .count()
    }

    #[must_use]
    pub fn settlement_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, LedgerEvent::Settlement(_)))
            .count()
    }
}
