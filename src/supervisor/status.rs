//! Read-only view of a running supervisor.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::{
    activity::LogEntry,
    engine::MonitorContext,
    models::{Event, NotificationRecord, StateStats, Target, TargetRuntimeState},
    resolver::CacheInfo,
};

const REPORTED_NOTIFICATIONS: usize = 20;

/// Per-target runtime state, shared between a monitor and the status side.
pub type RuntimeRegistry = DashMap<String, Arc<RwLock<TargetRuntimeState>>>;

/// Runtime state of one target.
#[derive(Debug, Clone, Serialize)]
pub struct TargetStatus {
    /// Target identifier (its URL).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Current runtime state.
    #[serde(flatten)]
    pub state: TargetRuntimeState,
}

/// Snapshot of everything an operator would want to look at.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// All targets, in configuration order.
    pub targets: Vec<TargetStatus>,
    /// Found / not-found events inside the reporting window.
    pub recent_events: Vec<Event>,
    /// Activity log, oldest first.
    pub logs: Vec<LogEntry>,
    /// Activity lines dropped because the log queue was full.
    pub dropped_log_lines: u64,
    /// Latest notifications, newest first.
    pub recent_notifications: Vec<NotificationRecord>,
    /// Persisted state statistics.
    pub stats: StateStats,
    /// Match notifications counted against the hourly cap.
    pub hourly_notifications: usize,
    /// Resolution cache contents.
    pub dns_cache: CacheInfo,
}

/// Cloneable handle producing [`StatusReport`]s.
#[derive(Clone)]
pub struct StatusHandle {
    targets: Arc<[Arc<Target>]>,
    runtime: Arc<RuntimeRegistry>,
    context: Arc<MonitorContext>,
    recent_events_window: Duration,
}

impl StatusHandle {
    pub(super) fn new(
        targets: Arc<[Arc<Target>]>,
        runtime: Arc<RuntimeRegistry>,
        context: Arc<MonitorContext>,
        recent_events_window: Duration,
    ) -> Self {
        Self { targets, runtime, context, recent_events_window }
    }

    /// Current runtime state of one target.
    pub async fn target_state(&self, target_id: &str) -> Option<TargetRuntimeState> {
        let state = self.runtime.get(target_id).map(|entry| Arc::clone(entry.value()))?;
        let snapshot = state.read().await.clone();
        Some(snapshot)
    }

    /// Builds a full snapshot.
    pub async fn report(&self) -> StatusReport {
        let now = Utc::now();

        let mut targets = Vec::with_capacity(self.targets.len());
        for target in self.targets.iter() {
            let state = self.target_state(target.id()).await.unwrap_or_default();
            targets.push(TargetStatus {
                id: target.id().to_string(),
                name: target.display_name().to_string(),
                state,
            });
        }

        let cutoff = TimeDelta::from_std(self.recent_events_window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window));
        let recent_events = match cutoff {
            Some(cutoff) => self.context.events.since(cutoff).await,
            None => self.context.events.get_all().await,
        };

        StatusReport {
            generated_at: now,
            targets,
            recent_events,
            logs: self.context.logs.get_logs().await,
            dropped_log_lines: self.context.logs.dropped(),
            recent_notifications: self.context.store.recent_notifications(REPORTED_NOTIFICATIONS).await,
            stats: self.context.store.stats().await,
            hourly_notifications: self.context.gate.hourly_count(now).await,
            dns_cache: self.context.resolver.info().await,
        }
    }
}
