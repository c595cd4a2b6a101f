//! The notification gate decides whether a condition may be notified right
//! now, applying a per-target cooldown, a global hourly cap and per-target
//! daily caps.
//!
//! Match notifications go through all three checks. Error and recovery
//! notifications share a separate per-target daily budget and nothing else.
//! Checking never consumes budget; only [`NotificationGate::record`] does.

use std::{fmt, sync::Arc, time::Duration};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

use crate::{config::AppConfig, models::AlertType, persistence::StateStore};

const DAY: Duration = Duration::from_secs(24 * 3600);

/// Limits applied by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    /// Minimum time between two match notifications for one target.
    pub cooldown: Duration,
    /// Match notifications allowed per rolling hour across all targets.
    pub hourly_limit: usize,
    /// Match notifications allowed per rolling day per target.
    pub daily_limit_per_target: usize,
    /// Error and recovery notifications allowed per rolling day per target.
    pub error_daily_limit_per_target: usize,
}

impl From<&AppConfig> for GateConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            cooldown: config.alert_cooldown_minutes,
            hourly_limit: config.hourly_notification_limit,
            daily_limit_per_target: config.daily_notification_limit_per_target,
            error_daily_limit_per_target: config.daily_error_notification_limit_per_target,
        }
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The notification may be sent.
    Allow,
    /// The target was alerted too recently.
    Cooldown {
        /// Time left until the cooldown ends.
        remaining: Duration,
    },
    /// The global hourly budget is exhausted.
    HourlyLimit {
        /// Notifications in the last hour.
        count: usize,
        /// The configured cap.
        limit: usize,
    },
    /// The target's daily budget is exhausted.
    DailyLimit {
        /// Notifications in the last day.
        count: usize,
        /// The configured cap.
        limit: usize,
    },
}

impl GateDecision {
    /// Whether the notification may be sent.
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

impl fmt::Display for GateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateDecision::Allow => write!(f, "allowed"),
            GateDecision::Cooldown { remaining } => {
                write!(f, "cooldown active for another {}s", remaining.as_secs())
            }
            GateDecision::HourlyLimit { count, limit } => {
                write!(f, "hourly limit reached ({count}/{limit})")
            }
            GateDecision::DailyLimit { count, limit } => {
                write!(f, "daily limit reached ({count}/{limit})")
            }
        }
    }
}

/// Cooldown and rate limiting in front of every notification.
#[derive(Debug)]
pub struct NotificationGate {
    config: GateConfig,
    store: Arc<StateStore>,
    /// Match notification times of the last hour, across targets.
    hourly: Mutex<Vec<DateTime<Utc>>>,
}

impl NotificationGate {
    /// Creates a gate with an empty hourly window.
    pub fn new(config: GateConfig, store: Arc<StateStore>) -> Self {
        Self { config, store, hourly: Mutex::new(Vec::new()) }
    }

    /// Creates a gate whose hourly window is seeded from the match
    /// notifications persisted in the last hour.
    pub async fn restore(config: GateConfig, store: Arc<StateStore>) -> Self {
        let since = Utc::now() - TimeDelta::hours(1);
        let recent = store.notification_times(AlertType::Found, since).await;
        if !recent.is_empty() {
            tracing::debug!(count = recent.len(), "Restored hourly notification window.");
        }
        Self { config, store, hourly: Mutex::new(recent) }
    }

    /// The configured limits.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether a notification of `alert_type` for the target may be sent now.
    pub async fn can_notify(&self, target_id: &str, alert_type: AlertType) -> bool {
        self.check(target_id, alert_type, Utc::now()).await.is_allowed()
    }

    /// Evaluates the limits at `now`.
    pub async fn check(
        &self,
        target_id: &str,
        alert_type: AlertType,
        now: DateTime<Utc>,
    ) -> GateDecision {
        match alert_type {
            AlertType::Found => self.check_found(target_id, now).await,
            AlertType::Error => {
                let limit = self.config.error_daily_limit_per_target;
                let count =
                    self.store.notifications_within(target_id, AlertType::Error, DAY, now).await;
                if count >= limit {
                    return GateDecision::DailyLimit { count, limit };
                }
                GateDecision::Allow
            }
        }
    }

    async fn check_found(&self, target_id: &str, now: DateTime<Utc>) -> GateDecision {
        if let Some(last) = self.store.last_alert(target_id, AlertType::Found).await {
            let cooldown = TimeDelta::from_std(self.config.cooldown).unwrap_or(TimeDelta::MAX);
            let elapsed = now - last;
            if elapsed < cooldown {
                let remaining = (cooldown - elapsed).to_std().unwrap_or_default();
                return GateDecision::Cooldown { remaining };
            }
        }

        {
            let hour_ago = now - TimeDelta::hours(1);
            let mut hourly = self.hourly.lock().await;
            hourly.retain(|t| *t > hour_ago);
            let limit = self.config.hourly_limit;
            if hourly.len() >= limit {
                return GateDecision::HourlyLimit { count: hourly.len(), limit };
            }
        }

        let limit = self.config.daily_limit_per_target;
        let count = self.store.notifications_within(target_id, AlertType::Found, DAY, now).await;
        if count >= limit {
            return GateDecision::DailyLimit { count, limit };
        }

        GateDecision::Allow
    }

    /// Consumes budget for a notification sent now.
    pub async fn record(&self, target_id: &str, alert_type: AlertType) {
        self.record_at(target_id, alert_type, Utc::now()).await
    }

    /// Consumes budget for a notification sent at `at`.
    pub async fn record_at(&self, target_id: &str, alert_type: AlertType, at: DateTime<Utc>) {
        match alert_type {
            AlertType::Found => {
                self.hourly.lock().await.push(at);
                self.store.record_notification(target_id, AlertType::Found, at).await;
                self.store.record_alert_time(target_id, AlertType::Found, at).await;
            }
            AlertType::Error => {
                self.store.record_notification(target_id, AlertType::Error, at).await;
            }
        }
    }

    /// Match notifications counted against the hourly cap at `now`.
    pub async fn hourly_count(&self, now: DateTime<Utc>) -> usize {
        let hour_ago = now - TimeDelta::hours(1);
        self.hourly.lock().await.iter().filter(|t| **t > hour_ago).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_config() -> GateConfig {
        GateConfig {
            cooldown: Duration::from_secs(10 * 60),
            hourly_limit: 3,
            daily_limit_per_target: 5,
            error_daily_limit_per_target: 3,
        }
    }

    fn gate(config: GateConfig) -> NotificationGate {
        NotificationGate::new(config, Arc::new(StateStore::in_memory()))
    }

    #[tokio::test]
    async fn allows_first_notification() {
        let gate = gate(gate_config());
        assert!(gate.can_notify("a", AlertType::Found).await);
        assert!(gate.can_notify("a", AlertType::Error).await);
    }

    #[tokio::test]
    async fn cooldown_blocks_same_target_only() {
        let gate = gate(gate_config());
        let now = Utc::now();
        gate.record_at("a", AlertType::Found, now).await;

        let decision = gate.check("a", AlertType::Found, now + TimeDelta::minutes(4)).await;
        assert_eq!(decision, GateDecision::Cooldown { remaining: Duration::from_secs(6 * 60) });
        assert!(gate.check("b", AlertType::Found, now).await.is_allowed());
        assert!(gate.check("a", AlertType::Found, now + TimeDelta::minutes(10)).await.is_allowed());
    }

    #[tokio::test]
    async fn hourly_limit_is_global_and_rolling() {
        let gate = gate(GateConfig { cooldown: Duration::ZERO, ..gate_config() });
        let start = Utc::now();
        gate.record_at("a", AlertType::Found, start).await;
        gate.record_at("b", AlertType::Found, start + TimeDelta::minutes(10)).await;
        gate.record_at("c", AlertType::Found, start + TimeDelta::minutes(20)).await;

        let decision = gate.check("d", AlertType::Found, start + TimeDelta::minutes(30)).await;
        assert_eq!(decision, GateDecision::HourlyLimit { count: 3, limit: 3 });

        // The first notification leaves the rolling hour.
        let later = start + TimeDelta::minutes(61);
        assert!(gate.check("d", AlertType::Found, later).await.is_allowed());
        assert_eq!(gate.hourly_count(later).await, 2);
    }

    #[tokio::test]
    async fn daily_limit_per_target() {
        let gate = gate(GateConfig {
            cooldown: Duration::ZERO,
            hourly_limit: 100,
            daily_limit_per_target: 2,
            ..gate_config()
        });
        let start = Utc::now();
        gate.record_at("a", AlertType::Found, start).await;
        gate.record_at("a", AlertType::Found, start + TimeDelta::hours(2)).await;

        let decision = gate.check("a", AlertType::Found, start + TimeDelta::hours(3)).await;
        assert_eq!(decision, GateDecision::DailyLimit { count: 2, limit: 2 });
        assert!(gate.check("b", AlertType::Found, start + TimeDelta::hours(3)).await.is_allowed());
        assert!(gate.check("a", AlertType::Found, start + TimeDelta::hours(25)).await.is_allowed());
    }

    #[tokio::test]
    async fn error_family_has_its_own_budget() {
        let gate = gate(GateConfig { hourly_limit: 1, ..gate_config() });
        let now = Utc::now();
        gate.record_at("a", AlertType::Found, now).await;

        // Neither the cooldown nor the hourly cap of match notifications apply.
        assert!(gate.check("a", AlertType::Error, now).await.is_allowed());

        for minutes in 0..3 {
            gate.record_at("a", AlertType::Error, now + TimeDelta::minutes(minutes)).await;
        }
        let decision = gate.check("a", AlertType::Error, now + TimeDelta::minutes(5)).await;
        assert_eq!(decision, GateDecision::DailyLimit { count: 3, limit: 3 });
        assert!(gate.check("b", AlertType::Error, now).await.is_allowed());
    }

    #[tokio::test]
    async fn checking_does_not_consume_budget() {
        let gate = gate(GateConfig { hourly_limit: 1, ..gate_config() });
        let now = Utc::now();

        for _ in 0..10 {
            assert!(gate.check("a", AlertType::Found, now).await.is_allowed());
        }
    }

    #[tokio::test]
    async fn restore_seeds_hourly_window_from_store() {
        let store = Arc::new(StateStore::in_memory());
        let now = Utc::now();
        store.record_notification("a", AlertType::Found, now - TimeDelta::minutes(5)).await;
        store.record_notification("b", AlertType::Found, now - TimeDelta::minutes(2)).await;
        store.record_notification("b", AlertType::Found, now - TimeDelta::hours(3)).await;

        let gate = NotificationGate::restore(
            GateConfig { cooldown: Duration::ZERO, hourly_limit: 2, ..gate_config() },
            store,
        )
        .await;

        assert_eq!(gate.hourly_count(now).await, 2);
        assert!(!gate.can_notify("c", AlertType::Found).await);
    }

    #[test]
    fn decision_display() {
        assert_eq!(GateDecision::Allow.to_string(), "allowed");
        assert_eq!(
            GateDecision::HourlyLimit { count: 10, limit: 10 }.to_string(),
            "hourly limit reached (10/10)"
        );
    }
}
