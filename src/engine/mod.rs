//! The Watchpost engine: per-target polling, the state machine that turns
//! poll results into transitions, and the gate that rate limits the resulting
//! notifications.

pub mod context;
pub mod notification_gate;
pub mod target_monitor;
pub mod transitions;

pub use context::{MonitorContext, MonitorSettings};
pub use notification_gate::{GateConfig, GateDecision, NotificationGate};
pub use target_monitor::{TargetMonitor, stagger_delay};
pub use transitions::{ContentChange, ReachabilityChange, Transitions};
