//! Deterministic in-memory exchange.
//!
//! `SimExchange` implements [`ExchangeCapability`] over scripted state so
//! engine behavior can be pinned without a venue: preloaded fills and
//! settlements served by cursor, quotes set per market, a failure queue for
//! exercising retry and fallback paths, and a log of everything placed or
//! canceled. Doubles as the paper-trading backend when `fill_on_place` is
//! enabled, turning accepted orders straight into fills.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;
use uuid::Uuid;

use veris_core::{
    ExchangeCapability, ExchangeError, Fill, OrderReceipt, OrderRequest, Quote, Result,
    Settlement,
};

#[derive(Debug, Default)]
struct SimState {
    fills: Vec<Fill>,
    settlements: Vec<Settlement>,
    quotes: HashMap<String, Quote>,
    failure_queue: VecDeque<ExchangeError>,
    placed: Vec<OrderRequest>,
    canceled: Vec<String>,
    fill_on_place: bool,
}

/// Scriptable venue double. All mutators take `&self`; state lives behind a
/// mutex so the same instance can serve an engine and the test driving it.
#[derive(Debug, Default)]
pub struct SimExchange {
    state: Mutex<SimState>,
}

impl SimExchange {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted orders become fills immediately at their limit price, making
    /// the sim a self-contained paper venue.
    #[must_use]
    pub fn with_fill_on_place(self) -> Self {
        self.state.lock().fill_on_place = true;
        self
    }

    /// Scripts a fill into venue history.
    pub fn push_fill(&self, fill: Fill) {
        self.state.lock().fills.push(fill);
    }

    /// Scripts a settlement into venue history.
    pub fn push_settlement(&self, settlement: Settlement) {
        self.state.lock().settlements.push(settlement);
    }

    /// Sets the current quote for a market.
    pub fn set_quote(&self, quote: Quote) {
        self.state.lock().quotes.insert(quote.market_id.clone(), quote);
    }

    /// Queues `count` copies of `error`; each subsequent capability call
    /// consumes one and fails with it before touching venue state.
    pub fn fail_next(&self, error: ExchangeError, count: usize) {
        let mut state = self.state.lock();
        for _ in 0..count {
            state.failure_queue.push_back(error.clone());
        }
    }

    /// Failures still queued, for asserting how many calls were absorbed.
    #[must_use]
    pub fn pending_failures(&self) -> usize {
        self.state.lock().failure_queue.len()
    }

    /// Drops all but the first `keep` fills from venue history, emulating a
    /// venue whose listing shrank below previously observed state.
    pub fn truncate_fills(&self, keep: usize) {
        self.state.lock().fills.truncate(keep);
    }

    /// Orders the venue has accepted, oldest first.
    #[must_use]
    pub fn placed_orders(&self) -> Vec<OrderRequest> {
        self.state.lock().placed.clone()
    }

    /// Order ids canceled so far.
    #[must_use]
    pub fn canceled_orders(&self) -> Vec<String> {
        self.state.lock().canceled.clone()
    }

    fn take_failure(&self) -> Option<ExchangeError> {
        self.state.lock().failure_queue.pop_front()
    }
}

#[async_trait]
impl ExchangeCapability for SimExchange {
    async fn list_fills_since(&self, cursor: Option<DateTime<Utc>>) -> Result<Vec<Fill>> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let state = self.state.lock();
        let mut fills: Vec<Fill> = state
            .fills
            .iter()
            .filter(|f| cursor.map_or(true, |c| f.filled_at >= c))
            .cloned()
            .collect();
        fills.sort_by(|a, b| (a.filled_at, &a.fill_id).cmp(&(b.filled_at, &b.fill_id)));
        Ok(fills)
    }

    async fn list_settlements_since(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<Settlement>> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let state = self.state.lock();
        let mut settlements: Vec<Settlement> = state
            .settlements
            .iter()
            .filter(|s| cursor.map_or(true, |c| s.settled_at >= c))
            .cloned()
            .collect();
        settlements.sort_by(|a, b| (a.settled_at, &a.market_id).cmp(&(b.settled_at, &b.market_id)));
        Ok(settlements)
    }

    async fn get_market_quote(&self, market_id: &str) -> Result<Quote> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.state
            .lock()
            .quotes
            .get(market_id)
            .cloned()
            .ok_or_else(|| ExchangeError::market_not_found(market_id))
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderReceipt> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        if let Err(reason) = request.validate() {
            return Err(ExchangeError::invalid_request(reason.to_string()));
        }

        let now = Utc::now();
        let receipt = OrderReceipt {
            order_id: Uuid::new_v4().to_string(),
            market_id: request.market_id.clone(),
            accepted_at: now,
        };

        let mut state = self.state.lock();
        if state.fill_on_place {
            state.fills.push(Fill {
                fill_id: Uuid::new_v4().to_string(),
                market_id: request.market_id.clone(),
                side: request.side,
                action: request.action,
                price: request.price,
                quantity: request.quantity,
                filled_at: now,
            });
        }
        debug!(
            market_id = %request.market_id,
            order_id = %receipt.order_id,
            "sim accepted order"
        );
        state.placed.push(request);
        Ok(receipt)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        self.state.lock().canceled.push(order_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use veris_core::{Action, Side};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn fill(id: &str, at: i64) -> Fill {
        Fill {
            fill_id: id.to_string(),
            market_id: "MKT-A".to_string(),
            side: Side::Yes,
            action: Action::Buy,
            price: dec!(0.40),
            quantity: 10,
            filled_at: ts(at),
        }
    }

    // ==================== Cursor Tests ====================

    #[tokio::test]
    async fn fills_list_from_cursor_inclusive_in_order() {
        let sim = SimExchange::new();
        sim.push_fill(fill("f2", 200));
        sim.push_fill(fill("f1", 100));
        sim.push_fill(fill("f3", 300));

        let all = sim.list_fills_since(None).await.unwrap();
        assert_eq!(
            all.iter().map(|f| f.fill_id.as_str()).collect::<Vec<_>>(),
            vec!["f1", "f2", "f3"]
        );

        let tail = sim.list_fills_since(Some(ts(200))).await.unwrap();
        assert_eq!(
            tail.iter().map(|f| f.fill_id.as_str()).collect::<Vec<_>>(),
            vec!["f2", "f3"]
        );
    }

    #[tokio::test]
    async fn quotes_resolve_by_market() {
        let sim = SimExchange::new();
        sim.set_quote(Quote {
            market_id: "MKT-A".to_string(),
            bid: dec!(0.41),
            ask: dec!(0.45),
            as_of: ts(0),
        });

        let quote = sim.get_market_quote("MKT-A").await.unwrap();
        assert_eq!(quote.mid(), dec!(0.43));

        let missing = sim.get_market_quote("MKT-Z").await.unwrap_err();
        assert_eq!(missing, ExchangeError::market_not_found("MKT-Z"));
    }

    // ==================== Failure Injection Tests ====================

    #[tokio::test]
    async fn queued_failures_surface_then_drain() {
        let sim = SimExchange::new();
        sim.push_fill(fill("f1", 100));
        sim.fail_next(ExchangeError::transport("reset"), 2);

        assert!(sim.list_fills_since(None).await.is_err());
        assert!(sim.list_fills_since(None).await.is_err());
        assert_eq!(sim.pending_failures(), 0);
        assert_eq!(sim.list_fills_since(None).await.unwrap().len(), 1);
    }

    // ==================== Order Flow Tests ====================

    #[tokio::test]
    async fn placed_orders_are_logged_and_receipted() {
        let sim = SimExchange::new();
        let request = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10);

        let receipt = sim.place_order(request.clone()).await.unwrap();
        assert_eq!(receipt.market_id, "MKT-A");
        assert!(!receipt.order_id.is_empty());
        assert_eq!(sim.placed_orders(), vec![request]);
        // Without fill_on_place the fill stream stays untouched.
        assert!(sim.list_fills_since(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fill_on_place_turns_orders_into_fills() {
        let sim = SimExchange::new().with_fill_on_place();
        sim.place_order(OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10))
            .await
            .unwrap();

        let fills = sim.list_fills_since(None).await.unwrap();
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, dec!(0.40));
        assert_eq!(fills[0].quantity, 10);
    }

    #[tokio::test]
    async fn malformed_orders_are_refused() {
        let sim = SimExchange::new();
        let request = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 0);

        let error = sim.place_order(request).await.unwrap_err();
        assert!(matches!(error, ExchangeError::InvalidRequest { .. }));
        assert!(sim.placed_orders().is_empty());
    }

    #[tokio::test]
    async fn cancels_are_recorded() {
        let sim = SimExchange::new();
        sim.cancel_order("ord-1").await.unwrap();
        assert_eq!(sim.canceled_orders(), vec!["ord-1".to_string()]);
    }

    // ==================== History Truncation Tests ====================

    #[tokio::test]
    async fn truncate_fills_shrinks_served_history() {
        let sim = SimExchange::new();
        sim.push_fill(fill("f1", 100));
        sim.push_fill(fill("f2", 200));
        sim.truncate_fills(1);

        assert_eq!(sim.list_fills_since(None).await.unwrap().len(), 1);
    }
}
