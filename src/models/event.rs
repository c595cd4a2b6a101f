//! State-change events kept for the status report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a state-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The condition of interest appeared (or changed) on a target.
    Found,
    /// The condition of interest disappeared from a target.
    NotFound,
}

/// A state-change event kept in the event history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the change was observed.
    pub timestamp: DateTime<Utc>,
    /// What changed.
    pub kind: EventKind,
    /// Identifier of the target.
    pub target_id: String,
    /// Human readable description.
    pub message: String,
}

impl Event {
    /// Creates a new event.
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: EventKind,
        target_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self { timestamp, kind, target_id: target_id.into(), message: message.into() }
    }

    /// An event describing a condition that is no longer present.
    pub fn is_resolved(&self) -> bool {
        self.kind == EventKind::NotFound
    }
}
