//! This module provides the `SupervisorBuilder` for constructing a `Supervisor`.

use std::sync::Arc;

use super::{Supervisor, SupervisorError};
use crate::{
    activity::{EventLog, LogSink},
    config::{AppConfig, validate_targets},
    engine::{GateConfig, MonitorContext, MonitorSettings, NotificationGate},
    fetcher::{Fetcher, HttpFetcher},
    matcher::{ContentMatcher, KeywordMatcher},
    models::Target,
    notification::{NotificationService, Notifier, composer::MessageComposer},
    persistence::StateStore,
    resolver::{HostResolver, ResolutionCache, SystemResolver},
};

/// A builder for creating a `Supervisor` instance.
///
/// Only the configuration and the targets are required. Every collaborator
/// that is not provided is built from the configuration.
#[derive(Default)]
pub struct SupervisorBuilder {
    config: Option<AppConfig>,
    targets: Option<Vec<Target>>,
    fetcher: Option<Arc<dyn Fetcher>>,
    matcher: Option<Arc<dyn ContentMatcher>>,
    notifier: Option<Arc<dyn Notifier>>,
    resolver: Option<Arc<dyn HostResolver>>,
    store: Option<Arc<StateStore>>,
    handle_signals: bool,
}

impl SupervisorBuilder {
    /// Creates a new, empty `SupervisorBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the application configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets the targets to monitor.
    pub fn targets(mut self, targets: Vec<Target>) -> Self {
        self.targets = Some(targets);
        self
    }

    /// Replaces the HTTP fetcher.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Replaces the keyword matcher.
    pub fn matcher(mut self, matcher: Arc<dyn ContentMatcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Replaces the configured notification channel.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replaces the system resolver.
    pub fn resolver(mut self, resolver: Arc<dyn HostResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Uses an already loaded state store instead of loading
    /// `state_file_path`.
    pub fn store(mut self, store: Arc<StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Cancels the supervisor on SIGINT or SIGTERM.
    pub fn handle_signals(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Assembles the shared services and builds the `Supervisor`.
    ///
    /// Must be called inside a tokio runtime: the activity log starts its
    /// drain task here.
    pub async fn build(self) -> Result<Supervisor, SupervisorError> {
        let config = self.config.ok_or(SupervisorError::MissingConfig)?;
        let targets = self.targets.filter(|t| !t.is_empty()).ok_or(SupervisorError::MissingTargets)?;
        config.validate()?;
        validate_targets(&targets)?;

        let store = match self.store {
            Some(store) => store,
            None => match &config.state_file_path {
                Some(path) => Arc::new(StateStore::load(path.clone()).await),
                None => {
                    tracing::warn!("No state file configured, notification history will not survive a restart.");
                    Arc::new(StateStore::in_memory())
                }
            },
        };

        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(
                config.request_timeout_secs,
                config.user_agents.clone(),
            )?),
        };

        let matcher: Arc<dyn ContentMatcher> = match self.matcher {
            Some(matcher) => matcher,
            None => Arc::new(KeywordMatcher::new(&targets)?),
        };

        let notifications = match self.notifier {
            Some(notifier) => NotificationService::new(
                notifier,
                MessageComposer::new(config.templates.clone(), config.time_offset_hours),
                config.recipients.clone(),
                config.error_recipients.clone(),
            ),
            None => NotificationService::from_config(&config)?,
        };

        let resolver = self.resolver.unwrap_or_else(|| Arc::new(SystemResolver));
        let gate = NotificationGate::restore(GateConfig::from(&config), Arc::clone(&store)).await;

        let context = MonitorContext {
            settings: MonitorSettings::from(&config),
            resolver: Arc::new(ResolutionCache::new(resolver, config.dns_cache_ttl_minutes)),
            fetcher,
            matcher,
            gate: Arc::new(gate),
            store,
            notifications: Arc::new(notifications),
            events: Arc::new(EventLog::new(config.event_buffer_capacity)),
            logs: Arc::new(LogSink::start(config.log_buffer_lines, config.log_queue_capacity)),
        };

        tracing::info!(targets = targets.len(), "Supervisor assembled.");
        Ok(Supervisor::new(config, targets, context, self.handle_signals))
    }
}
