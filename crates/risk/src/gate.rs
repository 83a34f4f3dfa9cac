//! Pre-trade risk gate.
//!
//! One pure decision per proposed order, evaluated against the derived
//! exposure snapshot and the day's P&L. The gate never mutates anything;
//! acting on a rejection, including tripping the kill switch on a
//! daily-loss breach, is the caller's job.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use veris_core::OrderRequest;
use veris_ledger::ExposureSnapshot;

use crate::kill_switch::KillSwitch;
use crate::limits::RiskLimits;

/// Why an order was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    KillSwitchTripped,
    PerMarketLimit,
    TotalExposureLimit,
    DailyLossLimit,
}

impl RejectReason {
    /// Stable machine-readable code.
    #[must_use]
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::KillSwitchTripped => "kill_switch_tripped",
            Self::PerMarketLimit => "per_market_limit",
            Self::TotalExposureLimit => "total_exposure_limit",
            Self::DailyLossLimit => "daily_loss_limit",
        }
    }

    /// Only a daily-loss breach asks the caller to trip the kill switch;
    /// the other rejections leave the session armed.
    #[must_use]
    pub fn trips_kill_switch(&self) -> bool {
        matches!(self, Self::DailyLossLimit)
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// Outcome of gating one order. A rejection is a normal decision, not an
/// error; callers branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskDecision {
    Allow,
    Reject(RejectReason),
}

impl RiskDecision {
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    #[must_use]
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Allow => None,
            Self::Reject(reason) => Some(*reason),
        }
    }
}

/// Order gate bound to one session's immutable limits.
#[derive(Debug, Clone)]
pub struct RiskGate {
    limits: RiskLimits,
}

impl RiskGate {
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    /// Evaluates a proposed order. Checks run in a fixed order and the
    /// first failure wins:
    ///
    /// 1. a tripped kill switch rejects everything;
    /// 2. the order's market may not exceed the per-market cap in absolute
    ///    exposure, counting the order's signed YES-frame notional;
    /// 3. total exposure plus the order's cost may not exceed the total
    ///    cap;
    /// 4. the day's P&L at or beyond the loss cap rejects, and is the one
    ///    rejection that signals the caller to trip the kill switch.
    #[must_use]
    pub fn evaluate(
        &self,
        order: &OrderRequest,
        exposure: &ExposureSnapshot,
        daily_pnl: Decimal,
        kill_switch: &KillSwitch,
    ) -> RiskDecision {
        if kill_switch.is_tripped() {
            return self.reject(order, RejectReason::KillSwitchTripped);
        }

        let market_exposure = exposure.market(&order.market_id);
        if (market_exposure + order.signed_notional()).abs() > self.limits.max_per_market_exposure
        {
            return self.reject(order, RejectReason::PerMarketLimit);
        }

        if exposure.total + order.notional() > self.limits.max_total_exposure {
            return self.reject(order, RejectReason::TotalExposureLimit);
        }

        if daily_pnl <= -self.limits.max_daily_loss {
            return self.reject(order, RejectReason::DailyLossLimit);
        }

        RiskDecision::Allow
    }

    fn reject(&self, order: &OrderRequest, reason: RejectReason) -> RiskDecision {
        debug!(
            market_id = %order.market_id,
            reason = %reason,
            "order rejected by risk gate"
        );
        RiskDecision::Reject(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use veris_core::Side;

    fn snapshot(total: Decimal, markets: &[(&str, Decimal)]) -> ExposureSnapshot {
        ExposureSnapshot {
            total,
            by_market: markets
                .iter()
                .map(|(id, e)| ((*id).to_string(), *e))
                .collect(),
        }
    }

    fn empty_snapshot() -> ExposureSnapshot {
        ExposureSnapshot {
            total: dec!(0),
            by_market: HashMap::new(),
        }
    }

    fn gate() -> RiskGate {
        RiskGate::new(RiskLimits::default())
    }

    // ==================== Check Order Tests ====================

    #[test]
    fn clean_order_is_allowed() {
        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10);
        let decision = gate().evaluate(&order, &empty_snapshot(), dec!(0), &KillSwitch::armed());
        assert_eq!(decision, RiskDecision::Allow);
    }

    #[test]
    fn tripped_switch_rejects_before_any_other_check() {
        let mut switch = KillSwitch::armed();
        switch.trip("manual");

        // Would also breach every exposure cap; the switch must win.
        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.99), 10_000);
        let decision = gate().evaluate(&order, &empty_snapshot(), dec!(-999), &switch);

        assert_eq!(
            decision,
            RiskDecision::Reject(RejectReason::KillSwitchTripped)
        );
    }

    #[test]
    fn tiny_order_is_rejected_while_tripped() {
        let mut switch = KillSwitch::armed();
        switch.trip("daily loss limit");

        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.01), 1);
        let decision = gate().evaluate(&order, &empty_snapshot(), dec!(0), &switch);

        assert_eq!(
            decision.reject_reason(),
            Some(RejectReason::KillSwitchTripped)
        );
    }

    // ==================== Per-Market Cap Tests ====================

    #[test]
    fn per_market_cap_counts_existing_exposure() {
        // Market already carries $8 long; $4 more breaches the $10 cap.
        let exposure = snapshot(dec!(8), &[("MKT-A", dec!(8))]);
        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10);

        let decision = gate().evaluate(&order, &exposure, dec!(0), &KillSwitch::armed());
        assert_eq!(decision, RiskDecision::Reject(RejectReason::PerMarketLimit));
    }

    #[test]
    fn per_market_cap_is_absolute_value() {
        // Short $8; selling more YES pushes the absolute exposure past $10.
        let exposure = snapshot(dec!(8), &[("MKT-A", dec!(-8))]);
        let order = OrderRequest::sell("MKT-A", Side::Yes, dec!(0.40), 10);

        let decision = gate().evaluate(&order, &exposure, dec!(0), &KillSwitch::armed());
        assert_eq!(decision, RiskDecision::Reject(RejectReason::PerMarketLimit));
    }

    #[test]
    fn reducing_order_passes_per_market_cap() {
        // Short $8; buying back shrinks absolute exposure, so it passes the
        // per-market check even near the cap.
        let exposure = snapshot(dec!(8), &[("MKT-A", dec!(-8))]);
        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10);

        let decision = gate().evaluate(&order, &exposure, dec!(0), &KillSwitch::armed());
        assert_eq!(decision, RiskDecision::Allow);
    }

    #[test]
    fn no_side_orders_gate_in_the_yes_frame() {
        // Buying NO at 0.30 adds -0.70/contract of YES-frame exposure.
        let exposure = snapshot(dec!(7), &[("MKT-A", dec!(-7))]);
        let order = OrderRequest::buy("MKT-A", Side::No, dec!(0.30), 5);

        let decision = gate().evaluate(&order, &exposure, dec!(0), &KillSwitch::armed());
        assert_eq!(decision, RiskDecision::Reject(RejectReason::PerMarketLimit));
    }

    // ==================== Total Exposure Cap Tests ====================

    #[test]
    fn total_cap_rejects_at_the_documented_boundary() {
        // $45 held against a $50 cap: $10 more is too much, $5 fits.
        let exposure = snapshot(dec!(45), &[("MKT-A", dec!(5))]);

        let too_big = OrderRequest::buy("MKT-B", Side::Yes, dec!(0.50), 20);
        assert_eq!(too_big.notional(), dec!(10));
        assert_eq!(
            gate().evaluate(&too_big, &exposure, dec!(0), &KillSwitch::armed()),
            RiskDecision::Reject(RejectReason::TotalExposureLimit)
        );

        let fits = OrderRequest::buy("MKT-B", Side::Yes, dec!(0.50), 10);
        assert_eq!(fits.notional(), dec!(5));
        assert_eq!(
            gate().evaluate(&fits, &exposure, dec!(0), &KillSwitch::armed()),
            RiskDecision::Allow
        );
    }

    #[test]
    fn total_cap_charges_sells_conservatively() {
        // Sells still consume total headroom at their order cost.
        let exposure = snapshot(dec!(48), &[("MKT-A", dec!(48))]);
        let order = OrderRequest::sell("MKT-B", Side::Yes, dec!(0.50), 10);

        let decision = gate().evaluate(&order, &exposure, dec!(0), &KillSwitch::armed());
        assert_eq!(
            decision,
            RiskDecision::Reject(RejectReason::TotalExposureLimit)
        );
    }

    // ==================== Daily Loss Tests ====================

    #[test]
    fn daily_loss_at_the_cap_rejects_and_requests_trip() {
        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10);
        let decision = gate().evaluate(&order, &empty_snapshot(), dec!(-20), &KillSwitch::armed());

        let reason = decision.reject_reason().unwrap();
        assert_eq!(reason, RejectReason::DailyLossLimit);
        assert!(reason.trips_kill_switch());
    }

    #[test]
    fn daily_loss_inside_the_cap_allows() {
        let order = OrderRequest::buy("MKT-A", Side::Yes, dec!(0.40), 10);
        let decision = gate().evaluate(
            &order,
            &empty_snapshot(),
            dec!(-19.99),
            &KillSwitch::armed(),
        );
        assert_eq!(decision, RiskDecision::Allow);
    }

    #[test]
    fn only_daily_loss_requests_a_trip() {
        assert!(!RejectReason::KillSwitchTripped.trips_kill_switch());
        assert!(!RejectReason::PerMarketLimit.trips_kill_switch());
        assert!(!RejectReason::TotalExposureLimit.trips_kill_switch());
        assert!(RejectReason::DailyLossLimit.trips_kill_switch());
    }

    // ==================== Reason Code Tests ====================

    #[test]
    fn reason_codes_are_stable() {
        assert_eq!(
            RejectReason::KillSwitchTripped.as_code(),
            "kill_switch_tripped"
        );
        assert_eq!(RejectReason::PerMarketLimit.as_code(), "per_market_limit");
        assert_eq!(
            RejectReason::TotalExposureLimit.as_code(),
            "total_exposure_limit"
        );
        assert_eq!(RejectReason::DailyLossLimit.as_code(), "daily_loss_limit");
    }
}
