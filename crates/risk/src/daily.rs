//! Daily P&L baseline tracking.
//!
//! Realized P&L in the book accumulates forever; the daily figure is the
//! current book total minus the baseline captured when the day was armed.
//! Computing it by subtraction instead of by summing per-event deltas keeps
//! the number correct across replays, rebuilds, and restarts.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One armed trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingDay {
    day_key: NaiveDate,
    day_start_realized: Decimal,
}

impl TradingDay {
    /// Arms a day, capturing the realized baseline at that moment.
    #[must_use]
    pub fn start(day_key: NaiveDate, day_start_realized: Decimal) -> Self {
        Self {
            day_key,
            day_start_realized,
        }
    }

    /// Arms today (UTC).
    #[must_use]
    pub fn starting_now(day_start_realized: Decimal) -> Self {
        Self::start(Utc::now().date_naive(), day_start_realized)
    }

    #[must_use]
    pub fn day_key(&self) -> NaiveDate {
        self.day_key
    }

    #[must_use]
    pub fn baseline(&self) -> Decimal {
        self.day_start_realized
    }

    /// Realized P&L attributable to this day, given the book's running
    /// total.
    #[must_use]
    pub fn realized_today(&self, total_realized: Decimal) -> Decimal {
        total_realized - self.day_start_realized
    }

    /// True once the wall clock has rolled past the armed day. The session
    /// never resets itself on rollover; it warns so the operator sees a
    /// missed daily reset.
    #[must_use]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now.date_naive() != self.day_key
    }
}
