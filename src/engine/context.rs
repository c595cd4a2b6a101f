//! Services shared by every target monitor.

use std::{sync::Arc, time::Duration};

use crate::{
    activity::{EventLog, LogSink},
    config::AppConfig,
    engine::notification_gate::NotificationGate,
    fetcher::Fetcher,
    matcher::ContentMatcher,
    notification::NotificationService,
    persistence::StateStore,
    resolver::ResolutionCache,
};

/// Per-poll settings taken from the application configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Time between two polls of the same target.
    pub check_interval: Duration,
    /// How long a notified fingerprint suppresses another notification.
    pub dedup_max_age: Duration,
}

impl From<&AppConfig> for MonitorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            check_interval: config.check_interval_secs,
            dedup_max_age: config.dedup_max_age_hours,
        }
    }
}

/// Everything a [`TargetMonitor`](super::target_monitor::TargetMonitor) needs
/// besides its own target and runtime state. Shared behind an `Arc`.
pub struct MonitorContext {
    /// Poll settings.
    pub settings: MonitorSettings,
    /// Host name resolution cache.
    pub resolver: Arc<ResolutionCache>,
    /// Payload fetcher.
    pub fetcher: Arc<dyn Fetcher>,
    /// Payload classifier.
    pub matcher: Arc<dyn ContentMatcher>,
    /// Cooldown and rate limits.
    pub gate: Arc<NotificationGate>,
    /// Persistent notification history.
    pub store: Arc<StateStore>,
    /// Message composition and delivery.
    pub notifications: Arc<NotificationService>,
    /// Found / not-found history.
    pub events: Arc<EventLog>,
    /// User-facing activity log.
    pub logs: Arc<LogSink>,
}
