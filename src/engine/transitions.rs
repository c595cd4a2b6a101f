//! The per-target state machine.
//!
//! [`TargetRuntimeState::apply`] folds one [`CheckResult`] into the state of
//! a target and reports what changed. It performs no I/O; the monitor acts
//! on the returned [`Transitions`].

use chrono::{DateTime, TimeDelta, Utc};

use crate::models::{CheckResult, FoundState, TargetRuntimeState, fingerprint};

/// A change in reachability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReachabilityChange {
    /// The first failed poll after a reachable period (or at startup).
    WentDown {
        /// Time of the failed poll.
        since: DateTime<Utc>,
        /// Why it failed.
        error: String,
    },
    /// The first successful poll after an unreachable period.
    Recovered {
        /// When the unreachable period started.
        down_since: DateTime<Utc>,
        /// How long it lasted.
        downtime: TimeDelta,
    },
}

/// A change in the condition of interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentChange {
    /// The condition appeared.
    Appeared {
        /// Fingerprint of the new condition.
        fingerprint: String,
    },
    /// The condition is still present but its fields changed.
    Changed {
        /// Fingerprint of the new condition.
        fingerprint: String,
        /// Fingerprint it replaced.
        previous: String,
    },
    /// The condition disappeared.
    Cleared,
}

impl ContentChange {
    /// The fingerprint of a condition that should be considered for a
    /// notification.
    pub fn notifiable_fingerprint(&self) -> Option<&str> {
        match self {
            ContentChange::Appeared { fingerprint } | ContentChange::Changed { fingerprint, .. } => {
                Some(fingerprint)
            }
            ContentChange::Cleared => None,
        }
    }
}

/// Everything one poll changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transitions {
    /// Reachability change, if any.
    pub reachability: Option<ReachabilityChange>,
    /// Content change, if any. Always `None` for a failed poll.
    pub content: Option<ContentChange>,
}

impl Transitions {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.reachability.is_none() && self.content.is_none()
    }
}

impl TargetRuntimeState {
    /// Applies `result` to this state.
    ///
    /// A failed poll only touches reachability: the found state is kept until
    /// the next reachable poll.
    pub fn apply(&mut self, result: &CheckResult) -> Transitions {
        let mut transitions = Transitions::default();

        self.checks += 1;
        self.last_checked_at = Some(result.observed_at);
        self.last_latency_ms = Some(result.latency.as_millis().min(u64::MAX as u128) as u64);

        if let Some(error) = &result.error {
            self.failures += 1;
            self.last_error = Some(error.clone());
            if !self.unreachable {
                self.unreachable = true;
                self.down_since = Some(result.observed_at);
                transitions.reachability =
                    Some(ReachabilityChange::WentDown { since: result.observed_at, error: error.clone() });
            }
            return transitions;
        }

        self.last_error = None;
        if self.unreachable {
            self.unreachable = false;
            let down_since = self.down_since.take().unwrap_or(result.observed_at);
            transitions.reachability = Some(ReachabilityChange::Recovered {
                down_since,
                downtime: result.observed_at - down_since,
            });
        }

        if result.found {
            let current = fingerprint(&result.target_id, &result.fields);
            transitions.content = match (self.found, self.fingerprint.take()) {
                (FoundState::Found, Some(previous)) if previous == current => None,
                (FoundState::Found, Some(previous)) => {
                    Some(ContentChange::Changed { fingerprint: current.clone(), previous })
                }
                _ => Some(ContentChange::Appeared { fingerprint: current.clone() }),
            };
            self.found = FoundState::Found;
            self.fingerprint = Some(current);
        } else {
            if self.found == FoundState::Found {
                transitions.content = Some(ContentChange::Cleared);
            }
            self.found = FoundState::NotFound;
            self.fingerprint = None;
        }

        transitions
    }
}
