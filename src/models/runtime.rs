//! In-memory state of a single target's polling loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the condition of interest was present at the last reachable poll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoundState {
    /// No reachable poll has completed yet.
    #[default]
    Unknown,
    /// The condition is present.
    Found,
    /// The condition is absent.
    NotFound,
}

/// Runtime state of one target. Not persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRuntimeState {
    /// Content state as of the last reachable poll.
    pub found: FoundState,
    /// Fingerprint of the condition currently observed, while `Found`.
    pub fingerprint: Option<String>,
    /// Whether the last poll failed.
    pub unreachable: bool,
    /// Set while unreachable, to the time of the first failed poll.
    pub down_since: Option<DateTime<Utc>>,
    /// When the last poll completed.
    pub last_checked_at: Option<DateTime<Utc>>,
    /// Error of the last failed poll.
    pub last_error: Option<String>,
    /// Fetch latency of the last poll in milliseconds.
    pub last_latency_ms: Option<u64>,
    /// Number of completed polls.
    pub checks: u64,
    /// Number of failed polls.
    pub failures: u64,
}
