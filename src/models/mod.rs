//! This module contains the data models for the Watchpost application.

pub mod alert;
pub mod check_result;
pub mod event;
pub mod notification;
pub mod runtime;
pub mod state;
pub mod target;

pub use alert::{AlertType, NotificationKind};
pub use check_result::{CheckResult, ExtractedFields};
pub use event::{Event, EventKind};
pub use notification::NotificationMessage;
pub use runtime::{FoundState, TargetRuntimeState};
pub use state::{MatchRecord, NotificationRecord, PersistedState, StateStats, fingerprint};
pub use target::Target;
