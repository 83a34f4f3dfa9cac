pub mod daily;
pub mod gate;
pub mod kill_switch;
pub mod limits;

pub use daily::TradingDay;
pub use gate::{RejectReason, RiskDecision, RiskGate};
pub use kill_switch::{KillSwitch, KillSwitchState};
pub use limits::{LimitsError, RiskLimits};
