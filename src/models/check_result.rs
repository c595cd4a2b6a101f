//! The outcome of a single poll of a target.

use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fields extracted from a payload by the content matcher, ordered by name.
pub type ExtractedFields = BTreeMap<String, String>;

/// Result of one poll cycle. Consumed by the state machine and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    /// Identifier of the polled target.
    pub target_id: String,

    /// When the poll completed.
    pub observed_at: DateTime<Utc>,

    /// Whether the condition of interest is present.
    pub found: bool,

    /// Fields extracted when the condition is present.
    pub fields: ExtractedFields,

    /// Time spent fetching the payload.
    #[serde(
        serialize_with = "crate::config::serialize_duration_to_ms",
        deserialize_with = "crate::config::deserialize_duration_from_ms"
    )]
    pub latency: Duration,

    /// Set when the fetch failed. A result with an error is never `found`.
    pub error: Option<String>,
}

impl CheckResult {
    /// A successful fetch, classified by the content matcher.
    pub fn reachable(
        target_id: impl Into<String>,
        observed_at: DateTime<Utc>,
        found: bool,
        fields: ExtractedFields,
        latency: Duration,
    ) -> Self {
        Self { target_id: target_id.into(), observed_at, found, fields, latency, error: None }
    }

    /// A failed fetch.
    pub fn unreachable(
        target_id: impl Into<String>,
        observed_at: DateTime<Utc>,
        error: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            observed_at,
            found: false,
            fields: ExtractedFields::new(),
            latency,
            error: Some(error.into()),
        }
    }

    /// Whether the fetch succeeded.
    pub fn is_reachable(&self) -> bool {
        self.error.is_none()
    }
}
