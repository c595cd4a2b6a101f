use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use super::{
    NotifierConfig, deserialize_duration_from_hours, deserialize_duration_from_minutes,
    deserialize_duration_from_seconds,
};
use crate::notification::composer::MessageTemplates;

/// User agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("watchpost/", env!("CARGO_PKG_VERSION"));

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_alert_cooldown() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_hourly_notification_limit() -> usize {
    10
}

fn default_daily_limit() -> usize {
    3
}

fn default_dedup_max_age() -> Duration {
    Duration::from_secs(7 * 24 * 3600)
}

fn default_state_save_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_dns_cache_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_dns_cache_cleanup_interval() -> Duration {
    Duration::from_secs(10 * 60)
}

fn default_event_buffer_capacity() -> usize {
    100
}

fn default_log_buffer_lines() -> usize {
    500
}

fn default_log_queue_capacity() -> usize {
    1000
}

fn default_recent_events_window() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_shutdown_grace_period() -> Duration {
    Duration::from_secs(2)
}

fn default_user_agents() -> Vec<String> {
    vec![DEFAULT_USER_AGENT.to_string()]
}

/// Application configuration for Watchpost.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// How often every target is polled.
    #[serde(deserialize_with = "deserialize_duration_from_seconds", default = "default_check_interval")]
    pub check_interval_secs: Duration,

    /// Timeout applied to every fetch.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_request_timeout"
    )]
    pub request_timeout_secs: Duration,

    /// Minimum time between two match notifications for the same target.
    #[serde(deserialize_with = "deserialize_duration_from_minutes", default = "default_alert_cooldown")]
    pub alert_cooldown_minutes: Duration,

    /// Maximum number of match notifications across all targets per rolling
    /// hour.
    #[serde(default = "default_hourly_notification_limit")]
    pub hourly_notification_limit: usize,

    /// Maximum number of match notifications per target per rolling day.
    #[serde(default = "default_daily_limit")]
    pub daily_notification_limit_per_target: usize,

    /// Maximum number of error and recovery notifications per target per
    /// rolling day.
    #[serde(default = "default_daily_limit")]
    pub daily_error_notification_limit_per_target: usize,

    /// How long an already-notified condition stays suppressed.
    #[serde(deserialize_with = "deserialize_duration_from_hours", default = "default_dedup_max_age")]
    pub dedup_max_age_hours: Duration,

    /// Where the persisted state lives. State is kept in memory only when
    /// unset.
    #[serde(default)]
    pub state_file_path: Option<PathBuf>,

    /// Period of the state persistence timer.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_state_save_interval"
    )]
    pub state_save_interval_secs: Duration,

    /// Lifetime of a resolved address in the resolution cache.
    #[serde(deserialize_with = "deserialize_duration_from_minutes", default = "default_dns_cache_ttl")]
    pub dns_cache_ttl_minutes: Duration,

    /// Period of the resolution cache cleanup timer.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_dns_cache_cleanup_interval"
    )]
    pub dns_cache_cleanup_interval_secs: Duration,

    /// Number of state-change events kept in memory.
    #[serde(default = "default_event_buffer_capacity")]
    pub event_buffer_capacity: usize,

    /// Number of activity log lines kept in memory.
    #[serde(default = "default_log_buffer_lines")]
    pub log_buffer_lines: usize,

    /// Capacity of the activity log queue. Entries are dropped when full.
    #[serde(default = "default_log_queue_capacity")]
    pub log_queue_capacity: usize,

    /// Events newer than this are reported as recent.
    #[serde(
        deserialize_with = "deserialize_duration_from_hours",
        default = "default_recent_events_window"
    )]
    pub recent_events_window_hours: Duration,

    /// How long shutdown waits for in-flight polls.
    #[serde(
        deserialize_with = "deserialize_duration_from_seconds",
        default = "default_shutdown_grace_period"
    )]
    pub shutdown_grace_period_secs: Duration,

    /// Offset from UTC, in hours, used for timestamps in messages.
    #[serde(default)]
    pub time_offset_hours: i32,

    /// User agents rotated across requests.
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Recipients of match notifications.
    #[serde(default)]
    pub recipients: Vec<String>,

    /// Recipients of error and recovery notifications. Such notifications are
    /// skipped when empty.
    #[serde(default)]
    pub error_recipients: Vec<String>,

    /// Delivery channel.
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Message templates.
    #[serde(default)]
    pub templates: MessageTemplates,

    /// Path to the target configuration file.
    #[serde(skip_deserializing)]
    pub targets_config_path: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            request_timeout_secs: default_request_timeout(),
            alert_cooldown_minutes: default_alert_cooldown(),
            hourly_notification_limit: default_hourly_notification_limit(),
            daily_notification_limit_per_target: default_daily_limit(),
            daily_error_notification_limit_per_target: default_daily_limit(),
            dedup_max_age_hours: default_dedup_max_age(),
            state_file_path: None,
            state_save_interval_secs: default_state_save_interval(),
            dns_cache_ttl_minutes: default_dns_cache_ttl(),
            dns_cache_cleanup_interval_secs: default_dns_cache_cleanup_interval(),
            event_buffer_capacity: default_event_buffer_capacity(),
            log_buffer_lines: default_log_buffer_lines(),
            log_queue_capacity: default_log_queue_capacity(),
            recent_events_window_hours: default_recent_events_window(),
            shutdown_grace_period_secs: default_shutdown_grace_period(),
            time_offset_hours: 0,
            user_agents: default_user_agents(),
            recipients: Vec::new(),
            error_recipients: Vec::new(),
            notifier: NotifierConfig::default(),
            templates: MessageTemplates::default(),
            targets_config_path: PathBuf::from("configs/targets.yaml"),
        }
    }
}

impl AppConfig {
    /// Creates a new `AppConfig` by reading from the configuration directory.
    pub fn new(config_dir: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir_str = config_dir.unwrap_or("configs");
        let s = Config::builder()
            .add_source(File::with_name(&format!("{}/app.yaml", config_dir_str)))
            .add_source(
                Environment::with_prefix("WATCHPOST")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("recipients")
                    .with_list_parse_key("error_recipients")
                    .with_list_parse_key("user_agents"),
            )
            .build()?;
        let mut config: Self = s.try_deserialize()?;

        // Resolve the targets file relative to the config directory.
        config.targets_config_path = Path::new(config_dir_str).join("targets.yaml");

        Ok(config)
    }

    /// Creates a new `AppConfigBuilder`, starting from the defaults.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }
}

/// A builder for creating `AppConfig` instances in tests and tools.
#[derive(Default)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    /// Sets the poll interval.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval_secs = interval;
        self
    }

    /// Sets the fetch timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = timeout;
        self
    }

    /// Sets the per-target match notification cooldown.
    pub fn alert_cooldown(mut self, cooldown: Duration) -> Self {
        self.config.alert_cooldown_minutes = cooldown;
        self
    }

    /// Sets the global hourly cap.
    pub fn hourly_notification_limit(mut self, limit: usize) -> Self {
        self.config.hourly_notification_limit = limit;
        self
    }

    /// Sets the per-target daily cap for match notifications.
    pub fn daily_notification_limit_per_target(mut self, limit: usize) -> Self {
        self.config.daily_notification_limit_per_target = limit;
        self
    }

    /// Sets the per-target daily cap for error and recovery notifications.
    pub fn daily_error_notification_limit_per_target(mut self, limit: usize) -> Self {
        self.config.daily_error_notification_limit_per_target = limit;
        self
    }

    /// Sets how long a notified condition stays suppressed.
    pub fn dedup_max_age(mut self, max_age: Duration) -> Self {
        self.config.dedup_max_age_hours = max_age;
        self
    }

    /// Sets the state file path.
    pub fn state_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.state_file_path = Some(path.into());
        self
    }

    /// Sets the state persistence period.
    pub fn state_save_interval(mut self, interval: Duration) -> Self {
        self.config.state_save_interval_secs = interval;
        self
    }

    /// Sets the shutdown grace period.
    pub fn shutdown_grace_period(mut self, grace: Duration) -> Self {
        self.config.shutdown_grace_period_secs = grace;
        self
    }

    /// Sets the match recipients.
    pub fn recipients(mut self, recipients: Vec<String>) -> Self {
        self.config.recipients = recipients;
        self
    }

    /// Sets the error recipients.
    pub fn error_recipients(mut self, recipients: Vec<String>) -> Self {
        self.config.error_recipients = recipients;
        self
    }

    /// Sets the timestamp offset used in messages.
    pub fn time_offset_hours(mut self, offset: i32) -> Self {
        self.config.time_offset_hours = offset;
        self
    }

    /// Sets the target configuration path.
    pub fn targets_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.targets_config_path = path.into();
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> AppConfig {
        self.config
    }
}
