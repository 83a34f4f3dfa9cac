//! Single-writer session owner.
//!
//! `AccountEngine` holds the ledger, the derived book, the risk gate, and
//! the kill switch for one trading account, and funnels both ingestion and
//! order placement through `&mut self` so the decision path never races
//! itself. Replay must complete (`bootstrap`) before any trading operation
//! is accepted.

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use veris_core::{
    ExchangeCapability, ExchangeError, Fill, LedgerEvent, OrderReceipt, OrderRequest, Settlement,
};
use veris_ledger::{
    BookSnapshot, EventLedger, ExposureSnapshot, IncrementalOutcome, Journal, PositionBook,
    SessionState, SnapshotStore,
};
use veris_risk::{KillSwitch, RejectReason, RiskGate, RiskLimits, TradingDay};

use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::retry::{retry_with_backoff, RetryPolicy};

/// What `place_order` did with the request. A rejection is a normal
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum OrderOutcome {
    Placed(OrderReceipt),
    Rejected(RejectReason),
}

impl OrderOutcome {
    #[must_use]
    pub fn is_placed(&self) -> bool {
        matches!(self, Self::Placed(_))
    }

    #[must_use]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Placed(_) => None,
            Self::Rejected(reason) => Some(*reason),
        }
    }
}

/// What one ingestion pass absorbed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub new_fills: usize,
    pub new_settlements: usize,
    pub duplicates: usize,
    pub skipped_malformed: usize,
    /// An event arrived out of order and the book was rebuilt by replay.
    pub reordered: bool,
}

impl SyncReport {
    #[must_use]
    pub fn applied(&self) -> usize {
        self.new_fills + self.new_settlements
    }
}

/// Owns one account's truth: ledger, book, gate, switch, day, marks, and
/// the persistence paths behind them.
pub struct AccountEngine<E> {
    exchange: E,
    ledger: EventLedger,
    book: PositionBook,
    gate: RiskGate,
    kill_switch: KillSwitch,
    day: TradingDay,
    marks: HashMap<String, Decimal>,
    journal: Journal,
    snapshots: SnapshotStore,
    fill_cursor: Option<DateTime<Utc>>,
    settlement_cursor: Option<DateTime<Utc>>,
    retry: RetryPolicy,
    ready: bool,
}

impl<E: ExchangeCapability> AccountEngine<E> {
    #[must_use]
    pub fn new(
        exchange: E,
        limits: RiskLimits,
        journal_path: PathBuf,
        snapshot_path: PathBuf,
    ) -> Self {
        Self {
            exchange,
            ledger: EventLedger::new(),
            book: PositionBook::new(),
            gate: RiskGate::new(limits),
            kill_switch: KillSwitch::armed(),
            day: TradingDay::starting_now(Decimal::ZERO),
            marks: HashMap::new(),
            journal: Journal::new(journal_path),
            snapshots: SnapshotStore::new(snapshot_path),
            fill_cursor: None,
            settlement_cursor: None,
            retry: RetryPolicy::default(),
            ready: false,
        }
    }

    #[must_use]
    pub fn from_config(exchange: E, config: &AppConfig) -> Self {
        Self::new(
            exchange,
            config.limits.clone(),
            config.session.journal_path.clone(),
            config.session.snapshot_path.clone(),
        )
        .with_retry_policy(config.retry.policy())
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ==================== Session lifecycle ====================

    /// Rebuilds account truth and reconciles it against the venue.
    ///
    /// Journal → ledger, snapshot fast path when its fingerprint still
    /// matches (else full replay), same-day session restoration (a tripped
    /// kill switch comes back tripped), then a full reconcile. Only after
    /// all of that does the engine accept trading operations.
    ///
    /// # Errors
    ///
    /// Journal/venue failures, or `StaleData` when the venue lists fewer
    /// events than the ledger holds.
    pub async fn bootstrap(&mut self) -> Result<SyncReport> {
        let events = self.journal.load()?;
        self.ledger = EventLedger::from_events(events);

        let mut restored: Option<SessionState> = None;
        match self.snapshots.load() {
            Some(snapshot) if snapshot.matches(&self.ledger) => {
                info!(
                    positions = snapshot.positions.len(),
                    "snapshot matches journal, skipping replay"
                );
                self.book = snapshot.restore_book();
                self.fill_cursor = snapshot.fill_cursor;
                self.settlement_cursor = snapshot.settlement_cursor;
                restored = Some(snapshot.session);
            }
            Some(snapshot) => {
                warn!("snapshot out of step with journal, replaying in full");
                self.book = self.ledger.replay();
                restored = Some(snapshot.session);
            }
            None => {
                self.book = self.ledger.replay();
            }
        }

        let today = Utc::now().date_naive();
        match restored {
            Some(session) if session.day_key == today => {
                self.day = TradingDay::start(session.day_key, session.day_start_realized);
                if session.kill_tripped {
                    let reason = session
                        .trip_reason
                        .unwrap_or_else(|| "tripped before restart".to_string());
                    let at = session.tripped_at.unwrap_or_else(Utc::now);
                    self.kill_switch = KillSwitch::restored(reason, at);
                    warn!("session restored with kill switch tripped, trading stays halted");
                }
            }
            _ => {
                self.day = TradingDay::start(today, self.realized_before_day(today));
            }
        }

        let report = self.reconcile().await?;
        self.ready = true;
        info!(
            events = self.ledger.len(),
            markets = self.book.len(),
            day = %self.day.day_key(),
            "engine ready"
        );
        self.checkpoint();
        Ok(report)
    }

    /// Trips the kill switch by operator decision.
    pub fn trip(&mut self, reason: impl Into<String>) {
        if self.kill_switch.trip(reason) {
            self.checkpoint();
        }
    }

    /// Re-arms the switch and rebases the daily loss baseline for a new
    /// trading day. Explicit only; the engine never resets itself on day
    /// rollover.
    pub fn reset_daily(&mut self) {
        self.kill_switch.reset_daily();
        self.day = TradingDay::starting_now(self.book.total_realized());
        info!(day = %self.day.day_key(), "daily reset: switch re-armed, loss baseline rebased");
        self.checkpoint();
    }

    // ==================== Ingestion ====================

    /// Polls the venue for events past the cursors and folds the new ones
    /// in. Cursors are inclusive, so the boundary record comes back each
    /// poll and is absorbed as a duplicate.
    ///
    /// # Errors
    ///
    /// Venue failure after retries, or journal write failure.
    pub async fn sync_once(&mut self) -> Result<SyncReport> {
        let fill_cursor = self.fill_cursor;
        let fills = retry_with_backoff(&self.retry, "list_fills", || {
            self.exchange.list_fills_since(fill_cursor)
        })
        .await?;
        let settlement_cursor = self.settlement_cursor;
        let settlements = retry_with_backoff(&self.retry, "list_settlements", || {
            self.exchange.list_settlements_since(settlement_cursor)
        })
        .await?;

        let report = self.absorb(fills, settlements)?;
        if report.applied() > 0 {
            debug!(
                fills = report.new_fills,
                settlements = report.new_settlements,
                duplicates = report.duplicates,
                "sync absorbed new events"
            );
            self.checkpoint();
        }
        Ok(report)
    }

    /// Fetches the venue's full event listing and folds in anything the
    /// ledger is missing. A listing smaller than the ledger is stale: it is
    /// flagged and nothing from it is applied. The journal is never
    /// truncated to match a stale read.
    ///
    /// # Errors
    ///
    /// `StaleData` on a short listing; venue or journal failures otherwise.
    pub async fn reconcile(&mut self) -> Result<SyncReport> {
        let fills = retry_with_backoff(&self.retry, "reconcile_fills", || {
            self.exchange.list_fills_since(None)
        })
        .await?;
        let settlements = retry_with_backoff(&self.retry, "reconcile_settlements", || {
            self.exchange.list_settlements_since(None)
        })
        .await?;

        let observed = fills.len() + settlements.len();
        if observed < self.ledger.len() {
            warn!(
                expected = self.ledger.len(),
                observed, "venue listed fewer events than the ledger holds, resync required"
            );
            return Err(EngineError::StaleData {
                expected: self.ledger.len(),
                observed,
            });
        }
        self.absorb(fills, settlements)
    }

    /// Refreshes the marks cache from venue quotes for every open market,
    /// outside the order decision window. A market whose quote fails keeps
    /// its previous mark.
    pub async fn refresh_marks(&mut self) -> usize {
        let mut refreshed = 0;
        for market_id in self.book.active_market_ids() {
            let quote = retry_with_backoff(&self.retry, "quote", || {
                self.exchange.get_market_quote(&market_id)
            })
            .await;
            match quote {
                Ok(quote) => {
                    self.marks.insert(market_id, quote.mid());
                    refreshed += 1;
                }
                Err(error) => {
                    warn!(market_id = %market_id, %error, "quote refresh failed, keeping prior mark");
                }
            }
        }
        refreshed
    }

    // ==================== Trading ====================

    /// Gates and forwards an order.
    ///
    /// The evaluation, any daily-loss trip, and the forwarding decision
    /// happen atomically under the single writer; marks are read from the
    /// cache so no network call sits inside the decision.
    ///
    /// # Errors
    ///
    /// `NotReady` before bootstrap, a malformed request, or venue failure
    /// after retries. Risk rejections are an `Ok(Rejected(_))` outcome.
    pub async fn place_order(&mut self, request: OrderRequest) -> Result<OrderOutcome> {
        self.ensure_ready()?;
        if let Err(reason) = request.validate() {
            return Err(ExchangeError::invalid_request(reason.to_string()).into());
        }

        let exposure = self.book.exposure();
        let daily = self.daily_pnl();
        let decision = self
            .gate
            .evaluate(&request, &exposure, daily, &self.kill_switch);

        if let Some(reason) = decision.reject_reason() {
            if reason.trips_kill_switch()
                && self.kill_switch.trip(format!("daily loss limit breached at {daily}"))
            {
                self.checkpoint();
            }
            return Ok(OrderOutcome::Rejected(reason));
        }

        let receipt = retry_with_backoff(&self.retry, "place_order", || {
            self.exchange.place_order(request.clone())
        })
        .await?;
        info!(
            order_id = %receipt.order_id,
            market_id = %receipt.market_id,
            "order placed"
        );
        Ok(OrderOutcome::Placed(receipt))
    }

    /// Cancels a resting order at the venue.
    ///
    /// # Errors
    ///
    /// `NotReady` before bootstrap, or venue failure after retries.
    pub async fn cancel_order(&mut self, order_id: &str) -> Result<()> {
        self.ensure_ready()?;
        retry_with_backoff(&self.retry, "cancel_order", || {
            self.exchange.cancel_order(order_id)
        })
        .await?;
        info!(order_id, "order canceled");
        Ok(())
    }

    // ==================== Run loop ====================

    /// Polls sync + marks on an interval until `shutdown` flips true or its
    /// sender drops. Sync failures are logged and retried next tick; a
    /// rolled-over day is warned about, never auto-reset.
    ///
    /// # Errors
    ///
    /// `NotReady` before bootstrap.
    pub async fn run(
        &mut self,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        self.ensure_ready()?;
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = poll_interval.as_millis() as u64, "engine poll loop started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if self.day.is_stale(Utc::now()) {
                        warn!(
                            armed_day = %self.day.day_key(),
                            "trading day rolled over without a daily reset"
                        );
                    }
                    if let Err(error) = self.sync_once().await {
                        warn!(%error, "sync failed, retrying next tick");
                    }
                    self.refresh_marks().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("shutdown requested, engine loop stopping");
                        break;
                    }
                }
            }
        }

        self.checkpoint();
        Ok(())
    }

    // ==================== State access ====================

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    #[must_use]
    pub fn book(&self) -> &PositionBook {
        &self.book
    }

    #[must_use]
    pub fn ledger(&self) -> &EventLedger {
        &self.ledger
    }

    #[must_use]
    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    #[must_use]
    pub fn trading_day(&self) -> &TradingDay {
        &self.day
    }

    #[must_use]
    pub fn exposure(&self) -> ExposureSnapshot {
        self.book.exposure()
    }

    /// Realized P&L attributable to the armed day.
    #[must_use]
    pub fn daily_realized(&self) -> Decimal {
        self.day.realized_today(self.book.total_realized())
    }

    /// Daily figure the gate sees: the day's realized plus current
    /// unrealized from cached marks. Unrealized counts in full, which is
    /// the conservative side of the cap.
    #[must_use]
    pub fn daily_pnl(&self) -> Decimal {
        self.daily_realized() + self.book.total_unrealized(&self.marks)
    }

    #[must_use]
    pub fn mark(&self, market_id: &str) -> Option<Decimal> {
        self.marks.get(market_id).copied()
    }

    /// Captures a fingerprinted snapshot of the current book and session.
    ///
    /// # Errors
    ///
    /// IO or serialization failure.
    pub fn save_snapshot(&self) -> Result<()> {
        let snapshot = BookSnapshot::capture(
            &self.ledger,
            &self.book,
            self.fill_cursor,
            self.settlement_cursor,
            self.session_state(),
        );
        self.snapshots.save(&snapshot)?;
        Ok(())
    }

    // ==================== Internals ====================

    fn ensure_ready(&self) -> Result<()> {
        if self.ready {
            Ok(())
        } else {
            Err(EngineError::NotReady)
        }
    }

    /// Folds fetched events into ledger + book, journaling the new ones
    /// and advancing cursors. Malformed venue records are skipped (already
    /// warned by the ledger); duplicates are absorbed.
    fn absorb(&mut self, fills: Vec<Fill>, settlements: Vec<Settlement>) -> Result<SyncReport> {
        if let Some(latest) = fills.iter().map(|f| f.filled_at).max() {
            self.fill_cursor = Some(self.fill_cursor.map_or(latest, |c| c.max(latest)));
        }
        if let Some(latest) = settlements.iter().map(|s| s.settled_at).max() {
            self.settlement_cursor =
                Some(self.settlement_cursor.map_or(latest, |c| c.max(latest)));
        }

        let mut report = SyncReport::default();
        let events = fills
            .into_iter()
            .map(LedgerEvent::from)
            .chain(settlements.into_iter().map(LedgerEvent::from));
        for event in events {
            match self.ledger.apply_incremental(event.clone(), &mut self.book) {
                Ok(IncrementalOutcome::Duplicate) => report.duplicates += 1,
                Ok(outcome) => {
                    self.journal.append(&event)?;
                    match event {
                        LedgerEvent::Fill(_) => report.new_fills += 1,
                        LedgerEvent::Settlement(_) => report.new_settlements += 1,
                    }
                    if matches!(outcome, IncrementalOutcome::Reordered) {
                        report.reordered = true;
                    }
                }
                Err(error) if error.is_malformed() => report.skipped_malformed += 1,
                Err(error) => return Err(error.into()),
            }
        }
        Ok(report)
    }

    fn session_state(&self) -> SessionState {
        SessionState {
            day_key: self.day.day_key(),
            day_start_realized: self.day.baseline(),
            kill_tripped: self.kill_switch.is_tripped(),
            trip_reason: self.kill_switch.reason().map(String::from),
            tripped_at: self.kill_switch.tripped_at(),
        }
    }

    /// Realized P&L from events before the day's UTC midnight; the daily
    /// baseline when no same-day session survives.
    fn realized_before_day(&self, day: chrono::NaiveDate) -> Decimal {
        let day_start = day.and_time(NaiveTime::MIN).and_utc();
        let mut book = PositionBook::new();
        for event in self.ledger.canonical() {
            if event.ordering_key().0 < day_start {
                book.apply_event(event);
            }
        }
        book.total_realized()
    }

    /// Best-effort snapshot; persistence failure never masks the outcome
    /// of the operation that requested it.
    fn checkpoint(&self) {
        if let Err(error) = self.save_snapshot() {
            warn!(%error, "snapshot save failed, replay covers recovery");
        }
    }
}
