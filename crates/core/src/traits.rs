//! The seam between the accounting core and any exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::Result;
use crate::types::{Fill, OrderReceipt, OrderRequest, Quote, Settlement};

/// Everything the core needs from a venue, independent of its identity.
///
/// Implementations own authentication, pagination, wire formats, and any
/// field-naming quirks; fills and settlements cross this boundary already
/// canonical. Methods take `&self` so one adapter can serve concurrent
/// readers; the account engine serializes its own mutating decisions.
///
/// Cursor boundaries are inclusive: callers may receive events they already
/// hold near the cursor, and rely on ledger idempotence to absorb the
/// overlap. That beats silently missing events that share a timestamp with
/// the cursor.
#[async_trait]
pub trait ExchangeCapability: Send + Sync {
    /// Fills executed at or after `cursor`, oldest first. `None` lists from
    /// the beginning of account history.
    async fn list_fills_since(&self, cursor: Option<DateTime<Utc>>) -> Result<Vec<Fill>>;

    /// Settlements resolved at or after `cursor`, oldest first. `None` lists
    /// from the beginning of account history.
    async fn list_settlements_since(&self, cursor: Option<DateTime<Utc>>)
        -> Result<Vec<Settlement>>;

    /// Current top-of-book for one market.
    async fn get_market_quote(&self, market_id: &str) -> Result<Quote>;

    /// Submits an order. A receipt means accepted, not filled; executions
    /// arrive through the fill stream.
    async fn place_order(&self, request: OrderRequest) -> Result<OrderReceipt>;

    /// Cancels a resting order by its exchange identifier.
    async fn cancel_order(&self, order_id: &str) -> Result<()>;
}

/// A shared handle to an adapter is itself an adapter, so an owner can hold
/// `Arc<SomeAdapter>` while tooling keeps its own handle.
#[async_trait]
impl<T> ExchangeCapability for Arc<T>
where
    T: ExchangeCapability + ?Sized,
{
    async fn list_fills_since(&self, cursor: Option<DateTime<Utc>>) -> Result<Vec<Fill>> {
        (**self).list_fills_since(cursor).await
    }

    async fn list_settlements_since(
        &self,
        cursor: Option<DateTime<Utc>>,
    ) -> Result<Vec<Settlement>> {
        (**self).list_settlements_since(cursor).await
    }

    async fn get_market_quote(&self, market_id: &str) -> Result<Quote> {
        (**self).get_market_quote(market_id).await
    }

    async fn place_order(&self, request: OrderRequest) -> Result<OrderReceipt> {
        (**self).place_order(request).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<()> {
        (**self).cancel_order(order_id).await
    }
}
