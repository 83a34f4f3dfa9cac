//! Canonical market data types.
//!
//! Everything the accounting core consumes is expressed here. Exchange
//! adapters translate their wire formats into these types and keep any
//! field-naming quirks on their side of the boundary.
//!
//! Prices are per-contract dollars as exact decimals. A binary contract pays
//! $1 on the winning side, so a NO trade is economically identical to the
//! opposite YES trade at the complement price. The accounting fold exploits
//! that identity to keep a single signed position per market, the YES frame:
//! buying YES or selling NO adds positive quantity, selling YES or buying NO
//! adds negative quantity.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ValidationError;

/// Which side of a binary market a trade touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The other side of the contract.
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Yes => Self::No,
            Self::No => Self::Yes,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
        }
    }
}

/// Whether a side was bought or sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    #[must_use]
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Final resolution of a binary market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Yes,
    No,
    /// Market annulled by the venue. Payouts for voids are adapter-supplied
    /// refunds, not derived from the outcome.
    Void,
}

impl Outcome {
    /// Standard YES-side payout implied by the outcome: $1 on YES, $0
    /// otherwise.
    #[must_use]
    pub fn yes_payout(&self) -> Decimal {
        match self {
            Self::Yes => Decimal::ONE,
            Self::No | Self::Void => Decimal::ZERO,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yes => write!(f, "yes"),
            Self::No => write!(f, "no"),
            Self::Void => write!(f, "void"),
        }
    }
}

fn price_band() -> (Decimal, Decimal) {
    (Decimal::new(1, 2), Decimal::new(99, 2))
}

/// A completed trade reported by the exchange.
///
/// Ground truth for position reconstruction. Immutable once recorded; the
/// ledger deduplicates by `fill_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Exchange-assigned, globally unique identifier.
    pub fill_id: String,
    /// Market the trade occurred in.
    pub market_id: String,
    /// Contract side that was traded.
    pub side: Side,
    /// Whether that side was bought or sold.
    pub action: Action,
    /// Per-contract price in dollars, 0.01 through 0.99.
    pub price: Decimal,
    /// Number of contracts, always positive.
    pub quantity: u32,
    /// Exchange-assigned execution time.
    pub filled_at: DateTime<Utc>,
}

impl Fill {
    /// Checks the wire-independent well-formedness rules.
    ///
    /// # Errors
    ///
    /// Returns the first rule the record breaks: empty identifiers, a price
    /// outside the tradable band, or a zero quantity.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.fill_id.is_empty() {
            return Err(ValidationError::EmptyFillId);
        }
        if self.market_id.is_empty() {
            return Err(ValidationError::EmptyMarketId);
        }
        let (min, max) = price_band();
        if self.price < min || self.price > max {
            return Err(ValidationError::PriceOutOfRange { price: self.price });
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        Ok(())
    }

    /// Price of this trade expressed on the YES side of the book. NO trades
    /// use the complement: a NO contract at 0.30 trades the same economics
    /// as the YES side at 0.70.
    #[must_use]
    pub fn yes_price(&self) -> Decimal {
        match self.side {
            Side::Yes => self.price,
            Side::No => Decimal::ONE - self.price,
        }
    }

    /// Signed YES-frame quantity delta. Buying YES or selling NO goes long,
    /// selling YES or buying NO goes short.
    #[must_use]
    pub fn signed_quantity(&self) -> Decimal {
        let qty = Decimal::from(self.quantity);
        match (self.side, self.action) {
            (Side::Yes, Action::Buy) | (Side::No, Action::Sell) => qty,
            (Side::Yes, Action::Sell) | (Side::No, Action::Buy) => -qty,
        }
    }

    /// Trade value at the traded price, always non-negative.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// Final resolution of a market as reported by the exchange.
///
/// Immutable. A market settles at most once, so the ledger deduplicates
/// settlements by `market_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub market_id: String,
    pub outcome: Outcome,
    /// Payout per contract on the YES side, typically 0 or 1. Void markets
    /// may carry an adapter-supplied refund instead.
    pub payout_per_contract: Decimal,
    pub settled_at: DateTime<Utc>,
}

impl Settlement {
    /// Settlement whose payout follows the outcome: $1 on YES, $0 otherwise.
    #[must_use]
    pub fn resolved(
        market_id: impl Into<String>,
        outcome: Outcome,
        settled_at: DateTime<Utc>,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            outcome,
            payout_per_contract: outcome.yes_payout(),
            settled_at,
        }
    }

    /// Overrides the payout, for void refunds or partial payouts.
    #[must_use]
    pub fn with_payout(mut self, payout_per_contract: Decimal) -> Self {
        self.payout_per_contract = payout_per_contract;
        self
    }

    /// Checks the wire-independent well-formedness rules.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty market identifier or a payout outside
    /// the $0 through $1 band.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.market_id.is_empty() {
            return Err(ValidationError::EmptyMarketId);
        }
        if self.payout_per_contract < Decimal::ZERO || self.payout_per_contract > Decimal::ONE {
            return Err(ValidationError::PayoutOutOfRange {
                payout: self.payout_per_contract,
            });
        }
        Ok(())
    }
}

/// A record the ledger stores: one of the two event kinds that move
/// positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    Fill(Fill),
    Settlement(Settlement),
}

impl LedgerEvent {
    /// Identity used for idempotent deduplication. Fills are unique by fill
    /// id; settlements by market, since a market resolves at most once.
    #[must_use]
    pub fn key(&self) -> EventKey {
        match self {
            Self::Fill(f) => EventKey::Fill(f.fill_id.clone()),
            Self::Settlement(s) => EventKey::Settlement(s.market_id.clone()),
        }
    }

    #[must_use]
    pub fn market_id(&self) -> &str {
        match self {
            Self::Fill(f) => &f.market_id,
            Self::Settlement(s) => &s.market_id,
        }
    }

    /// Exchange-assigned event time.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Fill(f) => f.filled_at,
            Self::Settlement(s) => s.settled_at,
        }
    }

    /// Identifier that breaks timestamp ties in the canonical order.
    #[must_use]
    pub fn identifier(&self) -> &str {
        match self {
            Self::Fill(f) => &f.fill_id,
            Self::Settlement(s) => &s.market_id,
        }
    }

    /// Canonical total-order key: exchange timestamp, then identifier
    /// lexicographically. Replay sorted by this key is reproducible whatever
    /// order the network delivered events in.
    #[must_use]
    pub fn ordering_key(&self) -> (DateTime<Utc>, &str) {
        (self.timestamp(), self.identifier())
    }

    /// # Errors
    ///
    /// Propagates the inner record's validation failure.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Self::Fill(f) => f.validate(),
            Self::Settlement(s) => s.validate(),
        }
    }
}

impl From<Fill> for LedgerEvent {
    fn from(fill: Fill) -> Self {
        Self::Fill(fill)
    }
}

impl From<Settlement> for LedgerEvent {
    fn from(settlement: Settlement) -> Self {
        Self::Settlement(settlement)
    }
}

/// Deduplication identity for a ledger event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKey {
    Fill(String),
    Settlement(String),
}

/// Top-of-book for the YES side of a market.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub market_id: String,
    pub bid: Decimal,
    pub ask: Decimal,
    pub as_of: DateTime<Utc>,
}

impl Quote {
    /// Midpoint of bid and ask, the fair-value estimate used for unrealized
    /// P&L reporting.
    #[must_use]
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }
}

/// An order the caller wants placed on the venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub market_id: String,
    pub side: Side,
    pub action: Action,
    /// Limit price in dollars, 0.01 through 0.99.
    pub price: Decimal,
    pub quantity: u32,
}

impl OrderRequest {
    #[must_use]
    pub fn new(
        market_id: impl Into<String>,
        side: Side,
        action: Action,
        price: Decimal,
        quantity: u32,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            side,
            action,
            price,
            quantity,
        }
    }

    /// Buys `quantity` contracts of `side` at `price`.
    #[must_use]
    pub fn buy(market_id: impl Into<String>, side: Side, price: Decimal, quantity: u32) -> Self {
        Self::new(market_id, side, Action::Buy, price, quantity)
    }

    /// Sells `quantity` contracts of `side` at `price`.
    #[must_use]
    pub fn sell(market_id: impl Into<String>, side: Side, price: Decimal, quantity: u32) -> Self {
        Self::new(market_id, side, Action::Sell, price, quantity)
    }

    /// # Errors
    ///
    /// Same well-formedness rules as a fill, minus the fill identifier.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.market_id.is_empty() {
            return Err(ValidationError::EmptyMarketId);
        }
        let (min, max) = price_band();
        if self.price < min || self.price > max {
            return Err(ValidationError::PriceOutOfRange { price: self.price });
        }
        if self.quantity == 0 {
            return Err(ValidationError::ZeroQuantity);
        }
        Ok(())
    }

    /// Order value at the limit price, always non-negative. Risk headroom is
    /// consumed by this amount regardless of direction.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    /// Limit price expressed on the YES side of the book.
    #[must_use]
    pub fn yes_price(&self) -> Decimal {
        match self.side {
            Side::Yes => self.price,
            Side::No => Decimal::ONE - self.price,
        }
    }

    /// Signed YES-frame exposure the order would add if fully filled at its
    /// limit price: positive for effective buys, negative for effective
    /// sells.
    #[must_use]
    pub fn signed_notional(&self) -> Decimal {
        let value = self.yes_price() * Decimal::from(self.quantity);
        match (self.side, self.action) {
            (Side::Yes, Action::Buy) | (Side::No, Action::Sell) => value,
            (Side::Yes, Action::Sell) | (Side::No, Action::Buy) => -value,
        }
    }
}

/// Acknowledgement that the venue accepted an order. Accepted, not filled;
/// the fill stream is the only ground truth for executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderReceipt {
    /// Exchange-assigned order identifier, usable for cancellation.
    pub order_id: String,
    pub market_id: String,
    pub accepted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn sample_fill() -> Fill {
        Fill {
            fill_id: "f-001".to_string(),
            market_id: "PREZ-2024".to_string(),
            side: Side::Yes,
            action: Action::Buy,
            price: dec!(0.40),
            quantity: 10,
            filled_at: ts(1_700_000_000),
        }
    }

    // ==================== Side / Action / Outcome Tests ====================

    #[test]
    fn side_opposite_flips() {
        assert_eq!(Side::Yes.opposite(), Side::No);
        assert_eq!(Side::No.opposite(), Side::Yes);
    }

    #[test]
    fn action_opposite_flips() {
        assert_eq!(Action::Buy.opposite(), Action::Sell);
        assert_eq!(Action::Sell.opposite(), Action::Buy);
    }

    #[test]
    fn outcome_yes_payout() {
        assert_eq!(Outcome::Yes.yes_payout(), dec!(1));
        assert_eq!(Outcome::No.yes_payout(), dec!(0));
        assert_eq!(Outcome::Void.yes_payout(), dec!(0));
    }

    // ==================== Fill Tests ====================

    #[test]
    fn fill_yes_price_identity_for_yes_side() {
        let fill = sample_fill();
        assert_eq!(fill.yes_price(), dec!(0.40));
    }

    #[test]
    fn fill_yes_price_complement_for_no_side() {
        let fill = Fill {
            side: Side::No,
            price: dec!(0.30),
            ..sample_fill()
        };
        assert_eq!(fill.yes_price(), dec!(0.70));
    }

    #[test]
    fn fill_signed_quantity_all_quadrants() {
        let base = sample_fill();

        let buy_yes = base.clone();
        assert_eq!(buy_yes.signed_quantity(), dec!(10));

        let sell_yes = Fill {
            action: Action::Sell,
            ..base.clone()
        };
        assert_eq!(sell_yes.signed_quantity(), dec!(-10));

        let buy_no = Fill {
            side: Side::No,
            ..base.clone()
        };
        assert_eq!(buy_no.signed_quantity(), dec!(-10));

        let sell_no = Fill {
            side: Side::No,
            action: Action::Sell,
            ..base
        };
        assert_eq!(sell_no.signed_quantity(), dec!(10));
    }

    #[test]
    fn fill_notional_uses_traded_price() {
        let fill = Fill {
            side: Side::No,
            price: dec!(0.30),
            quantity: 10,
            ..sample_fill()
        };
        assert_eq!(fill.notional(), dec!(3.00));
    }

    #[test]
    fn fill_validate_accepts_band_edges() {
        let low = Fill {
            price: dec!(0.01),
            ..sample_fill()
        };
        let high = Fill {
            price: dec!(0.99),
            ..sample_fill()
        };
        assert!(low.validate().is_ok());
        assert!(high.validate().is_ok());
    }

    #[test]
    fn fill_validate_rejects_out_of_band_price() {
        let fill = Fill {
            price: dec!(1.00),
            ..sample_fill()
        };
        assert_eq!(
            fill.validate(),
            Err(ValidationError::PriceOutOfRange { price: dec!(1.00) })
        );
    }

    #[test]
    fn fill_validate_rejects_zero_quantity() {
        let fill = Fill {
            quantity: 0,
            ..sample_fill()
        };
        assert_eq!(fill.validate(), Err(ValidationError::ZeroQuantity));
    }

    #[test]
    fn fill_validate_rejects_empty_ids() {
        let no_fill_id = Fill {
            fill_id: String::new(),
            ..sample_fill()
        };
        assert_eq!(no_fill_id.validate(), Err(ValidationError::EmptyFillId));

        let no_market = Fill {
            market_id: String::new(),
            ..sample_fill()
        };
        assert_eq!(no_market.validate(), Err(ValidationError::EmptyMarketId));
    }

    // ==================== Settlement Tests ====================

    #[test]
    fn settlement_resolved_derives_payout() {
        let yes = Settlement::resolved("PREZ-2024", Outcome::Yes, ts(0));
        assert_eq!(yes.payout_per_contract, dec!(1));

        let no = Settlement::resolved("PREZ-2024", Outcome::No, ts(0));
        assert_eq!(no.payout_per_contract, dec!(0));
    }

    #[test]
    fn settlement_with_payout_overrides() {
        let void = Settlement::resolved("PREZ-2024", Outcome::Void, ts(0)).with_payout(dec!(0.55));
        assert_eq!(void.payout_per_contract, dec!(0.55));
        assert!(void.validate().is_ok());
    }

    #[test]
    fn settlement_validate_rejects_out_of_band_payout() {
        let s = Settlement::resolved("PREZ-2024", Outcome::Yes, ts(0)).with_payout(dec!(1.5));
        assert_eq!(
            s.validate(),
            Err(ValidationError::PayoutOutOfRange { payout: dec!(1.5) })
        );
    }

    // ==================== LedgerEvent Tests ====================

    #[test]
    fn event_keys_separate_fills_from_settlements() {
        let fill: LedgerEvent = sample_fill().into();
        let settlement: LedgerEvent =
            Settlement::resolved("PREZ-2024", Outcome::Yes, ts(1)).into();

        assert_eq!(fill.key(), EventKey::Fill("f-001".to_string()));
        assert_eq!(
            settlement.key(),
            EventKey::Settlement("PREZ-2024".to_string())
        );
        assert_ne!(fill.key(), settlement.key());
    }

    #[test]
    fn ordering_key_breaks_ties_by_identifier() {
        let a: LedgerEvent = Fill {
            fill_id: "f-aaa".to_string(),
            ..sample_fill()
        }
        .into();
        let b: LedgerEvent = Fill {
            fill_id: "f-bbb".to_string(),
            ..sample_fill()
        }
        .into();

        assert_eq!(a.timestamp(), b.timestamp());
        assert!(a.ordering_key() < b.ordering_key());
    }

    #[test]
    fn ledger_event_serde_is_tagged() {
        let event: LedgerEvent = sample_fill().into();
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"fill\""));

        let back: LedgerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    // ==================== Quote Tests ====================

    #[test]
    fn quote_mid_is_midpoint() {
        let quote = Quote {
            market_id: "PREZ-2024".to_string(),
            bid: dec!(0.41),
            ask: dec!(0.45),
            as_of: ts(0),
        };
        assert_eq!(quote.mid(), dec!(0.43));
    }

    // ==================== OrderRequest Tests ====================

    #[test]
    fn order_notional_is_unsigned_cost() {
        let order = OrderRequest::sell("PREZ-2024", Side::Yes, dec!(0.40), 25);
        assert_eq!(order.notional(), dec!(10.00));
    }

    #[test]
    fn order_signed_notional_follows_yes_frame() {
        let buy_yes = OrderRequest::buy("M", Side::Yes, dec!(0.40), 10);
        assert_eq!(buy_yes.signed_notional(), dec!(4.00));

        let sell_yes = OrderRequest::sell("M", Side::Yes, dec!(0.40), 10);
        assert_eq!(sell_yes.signed_notional(), dec!(-4.00));

        let buy_no = OrderRequest::buy("M", Side::No, dec!(0.30), 10);
        assert_eq!(buy_no.signed_notional(), dec!(-7.00));

        let sell_no = OrderRequest::sell("M", Side::No, dec!(0.30), 10);
        assert_eq!(sell_no.signed_notional(), dec!(7.00));
    }

    #[test]
    fn order_validate_mirrors_fill_rules() {
        let ok = OrderRequest::buy("M", Side::Yes, dec!(0.50), 1);
        assert!(ok.validate().is_ok());

        let bad_price = OrderRequest::buy("M", Side::Yes, dec!(0.001), 1);
        assert!(matches!(
            bad_price.validate(),
            Err(ValidationError::PriceOutOfRange { .. })
        ));

        let bad_qty = OrderRequest::buy("M", Side::Yes, dec!(0.50), 0);
        assert_eq!(bad_qty.validate(), Err(ValidationError::ZeroQuantity));
    }
}
