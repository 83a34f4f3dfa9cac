//! Irreversible-per-day trading halt.
//!
//! Unlike a failure-counting circuit breaker, this latch never reopens on
//! its own: once tripped it stays tripped until the explicit daily reset,
//! however the rest of the day goes. Restarts restore the tripped state
//! from the session snapshot for the same reason.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Lifecycle of the switch within one trading day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KillSwitchState {
    /// Orders flow, risk checks run.
    Armed,
    /// Every order placement is rejected before reaching the exchange.
    Tripped,
}

/// The per-day safety latch gating all order placement.
#[derive(Debug, Clone, PartialEq)]
pub struct KillSwitch {
    state: KillSwitchState,
    tripped_at: Option<DateTime<Utc>>,
    reason: Option<String>,
}

impl Default for KillSwitch {
    fn default() -> Self {
        Self::armed()
    }
}

impl KillSwitch {
    /// Fresh switch at day start.
    #[must_use]
    pub fn armed() -> Self {
        Self {
            state: KillSwitchState::Armed,
            tripped_at: None,
            reason: None,
        }
    }

    /// Rebuilds a tripped switch from persisted session state, preserving
    /// the original trip record.
    #[must_use]
    pub fn restored(reason: impl Into<String>, tripped_at: DateTime<Utc>) -> Self {
        Self {
            state: KillSwitchState::Tripped,
            tripped_at: Some(tripped_at),
            reason: Some(reason.into()),
        }
    }

    #[must_use]
    pub fn state(&self) -> KillSwitchState {
        self.state
    }

    #[must_use]
    pub fn is_tripped(&self) -> bool {
        self.state == KillSwitchState::Tripped
    }

    /// When the switch tripped, if it did.
    #[must_use]
    pub fn tripped_at(&self) -> Option<DateTime<Utc>> {
        self.tripped_at
    }

    /// Why the switch tripped, if it did.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Halts trading for the rest of the day. Returns whether this call
    /// performed the transition; repeat trips keep the first reason and
    /// timestamp.
    pub fn trip(&mut self, reason: impl Into<String>) -> bool {
        if self.is_tripped() {
            debug!("kill switch already tripped, ignoring repeat trip");
            return false;
        }
        let reason = reason.into();
        self.state = KillSwitchState::Tripped;
        self.tripped_at = Some(Utc::now());
        warn!(%reason, "kill switch tripped: all order placement halted");
        self.reason = Some(reason);
        true
    }

    /// Re-arms for a new trading day. The only way out of `Tripped`, and
    /// explicitly operator/scheduler-invoked; there is no automatic or
    /// time-based reset.
    pub fn reset_daily(&mut self) {
        if self.is_tripped() {
            info!(
                previous_reason = self.reason.as_deref().unwrap_or("unknown"),
                "kill switch re-armed for new trading day"
            );
        }
        self.state = KillSwitchState::Armed;
        self.tripped_at = None;
        self.reason = None;
    }
}
