//! Derived per-market position state.
//!
//! The book is a pure fold over ledger events. Nothing in here calls the
//! exchange: quantities and costs come from fills, terminal states from
//! settlements, and anything mark-dependent (unrealized P&L) is computed on
//! demand from caller-supplied quotes and never stored.
//!
//! All accounting happens in the YES frame: a NO trade is folded as the
//! opposite YES trade at the complement price, so one signed quantity per
//! market captures both sides.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::Signed;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use veris_core::{Fill, LedgerEvent, Settlement};

/// Per-market accounting state.
///
/// `net_quantity` is signed: positive is long YES, negative is short YES.
/// `avg_cost` is defined only while `net_quantity` is non-zero and is reset
/// to zero when the position goes flat. `realized_pnl` accumulates per
/// market and never resets, so the audit trail survives settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub market_id: String,
    pub net_quantity: Decimal,
    pub avg_cost: Decimal,
    pub realized_pnl: Decimal,
    /// Terminal once the market resolves; retained for audit.
    pub settled: bool,
}

impl Position {
    #[must_use]
    pub fn new(market_id: impl Into<String>) -> Self {
        Self {
            market_id: market_id.into(),
            net_quantity: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            settled: false,
        }
    }

    #[must_use]
    pub fn is_flat(&self) -> bool {
        self.net_quantity.is_zero()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.settled
    }

    /// Signed cost-basis exposure: average cost times net quantity. Settled
    /// and flat positions carry none.
    #[must_use]
    pub fn exposure(&self) -> Decimal {
        if self.settled || self.is_flat() {
            Decimal::ZERO
        } else {
            self.avg_cost * self.net_quantity
        }
    }

    /// Mark-to-mid unrealized P&L. Reporting only; never folded back into
    /// position state.
    #[must_use]
    pub fn unrealized_pnl(&self, mid: Decimal) -> Decimal {
        if self.settled || self.is_flat() {
            Decimal::ZERO
        } else {
            (mid - self.avg_cost) * self.net_quantity
        }
    }
}

/// Result of folding one event into the book: the affected position after
/// the fold, and how much P&L the event realized (zero when nothing
/// closed).
#[derive(Debug, Clone, PartialEq)]
pub struct PositionDelta {
    pub position: Position,
    pub realized_delta: Decimal,
}

/// Derived exposure view. Always recomputed from the book, never mutated
/// independently; `by_market` values are signed, `total` sums their
/// absolutes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExposureSnapshot {
    pub total: Decimal,
    pub by_market: HashMap<String, Decimal>,
}

impl ExposureSnapshot {
    /// Signed exposure for one market, zero when it holds nothing.
    #[must_use]
    pub fn market(&self, market_id: &str) -> Decimal {
        self.by_market
            .get(market_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Every market's position, folded from ledger events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionBook {
    positions: HashMap<String, Position>,
    /// Highest canonical ordering key folded so far; lets the ledger detect
    /// out-of-order arrivals on the incremental path.
    last_applied: Option<(DateTime<Utc>, String)>,
}

impl PositionBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_parts(
        positions: Vec<Position>,
        last_applied: Option<(DateTime<Utc>, String)>,
    ) -> Self {
        Self {
            positions: positions
                .into_iter()
                .map(|p| (p.market_id.clone(), p))
                .collect(),
            last_applied,
        }
    }

    /// Folds a fill. Extending a position (or opening one) blends the
    /// average cost; reducing realizes P&L on the closed quantity at the
    /// fill price; crossing zero splits into a full close plus a fresh leg
    /// at the fill price.
    pub fn apply_fill(&mut self, fill: &Fill) -> PositionDelta {
        let delta_qty = fill.signed_quantity();
        let price = fill.yes_price();
        let position = self
            .positions
            .entry(fill.market_id.clone())
            .or_insert_with(|| Position::new(fill.market_id.clone()));

        if position.settled {
            // Out-of-order ingestion is handled upstream by replay; a fill
            // that genuinely postdates resolution should not exist.
            warn!(
                market_id = %fill.market_id,
                fill_id = %fill.fill_id,
                "fill for a settled market, reopening position"
            );
            position.settled = false;
        }

        let current = position.net_quantity;
        let mut realized = Decimal::ZERO;

        if current.is_zero() {
            position.avg_cost = price;
            position.net_quantity = delta_qty;
        } else if current.signum() == delta_qty.signum() {
            let combined = current.abs() + delta_qty.abs();
            position.avg_cost =
                (position.avg_cost * current.abs() + price * delta_qty.abs()) / combined;
            position.net_quantity = current + delta_qty;
        } else {
            let closed = current.abs().min(delta_qty.abs());
            realized = (price - position.avg_cost) * closed * current.signum();
            position.realized_pnl += realized;

            let flipped = delta_qty.abs() - current.abs();
            if flipped > Decimal::ZERO {
                position.net_quantity = flipped * delta_qty.signum();
                position.avg_cost = price;
            } else {
                position.net_quantity = current + delta_qty;
                if position.net_quantity.is_zero() {
                    position.avg_cost = Decimal::ZERO;
                }
            }
        }

        debug!(
            market_id = %fill.market_id,
            fill_id = %fill.fill_id,
            net = %position.net_quantity,
            avg_cost = %position.avg_cost,
            realized = %realized,
            "applied fill"
        );

        let delta = PositionDelta {
            position: position.clone(),
            realized_delta: realized,
        };
        self.note_applied(fill.filled_at, &fill.fill_id);
        delta
    }

    /// Folds a settlement: realizes payout minus cost basis on the open
    /// quantity, zeroes it, and marks the market resolved. A settlement on
    /// a flat market only marks it resolved.
    pub fn apply_settlement(&mut self, settlement: &Settlement) -> PositionDelta {
        let position = self
            .positions
            .entry(settlement.market_id.clone())
            .or_insert_with(|| {
                warn!(
                    market_id = %settlement.market_id,
                    outcome = %settlement.outcome,
                    "settlement for a market with no fills, recording it resolved and empty"
                );
                Position::new(settlement.market_id.clone())
            });

        let mut realized = Decimal::ZERO;
        if !position.settled {
            let net = position.net_quantity;
            if !net.is_zero() {
                realized = (settlement.payout_per_contract - position.avg_cost) * net;
                position.realized_pnl += realized;
            }
            position.net_quantity = Decimal::ZERO;
            position.avg_cost = Decimal::ZERO;
            position.settled = true;

            debug!(
                market_id = %settlement.market_id,
                outcome = %settlement.outcome,
                realized = %realized,
                "applied settlement"
            );
        }

        let delta = PositionDelta {
            position: position.clone(),
            realized_delta: realized,
        };
        self.note_applied(settlement.settled_at, &settlement.market_id);
        delta
    }

    /// Dispatches to the fill or settlement fold.
    pub fn apply_event(&mut self, event: &LedgerEvent) -> PositionDelta {
        match event {
            LedgerEvent::Fill(fill) => self.apply_fill(fill),
            LedgerEvent::Settlement(settlement) => self.apply_settlement(settlement),
        }
    }

    fn note_applied(&mut self, at: DateTime<Utc>, identifier: &str) {
        let key = (at, identifier.to_string());
        if self.last_applied.as_ref().map_or(true, |last| *last < key) {
            self.last_applied = Some(key);
        }
    }

    #[must_use]
    pub fn position(&self, market_id: &str) -> Option<&Position> {
        self.positions.get(market_id)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    /// Markets currently holding risk: unsettled and non-flat.
    #[must_use]
    pub fn active_market_ids(&self) -> Vec<String> {
        self.positions
            .values()
            .filter(|p| p.is_active() && !p.is_flat())
            .map(|p| p.market_id.clone())
            .collect()
    }

    /// Derives the exposure view from current positions.
    #[must_use]
    pub fn exposure(&self) -> ExposureSnapshot {
        let mut by_market = HashMap::new();
        let mut total = Decimal::ZERO;
        for position in self.positions.values() {
            let exposure = position.exposure();
            if !exposure.is_zero() {
                total += exposure.abs();
                by_market.insert(position.market_id.clone(), exposure);
            }
        }
        ExposureSnapshot { total, by_market }
    }

    /// Realized P&L summed across every market, settled ones included.
    #[must_use]
    pub fn total_realized(&self) -> Decimal {
        self.positions.values().map(|p| p.realized_pnl).sum()
    }

    /// Mark-to-mid unrealized P&L across open positions. Markets without a
    /// mark contribute zero.
    #[must_use]
    pub fn total_unrealized(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.positions
            .values()
            .filter(|p| p.is_active() && !p.is_flat())
            .filter_map(|p| marks.get(&p.market_id).map(|mid| p.unrealized_pnl(*mid)))
            .sum()
    }

    /// Highest canonical ordering key folded so far.
    #[must_use]
    pub fn last_applied(&self) -> Option<&(DateTime<Utc>, String)> {
        self.last_applied.as_ref()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
