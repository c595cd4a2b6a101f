//! Assembles a `MonitorContext` out of in-process fakes.

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
    time::Duration,
};

use tokio::sync::RwLock;

use super::{RecordingNotifier, ScriptedFetcher, StaticResolver};
use crate::{
    activity::{EventLog, LogSink},
    engine::{GateConfig, MonitorContext, MonitorSettings, NotificationGate, TargetMonitor},
    matcher::KeywordMatcher,
    models::{Target, TargetRuntimeState},
    notification::{
        NotificationService,
        composer::{MessageComposer, MessageTemplates},
    },
    persistence::StateStore,
    resolver::ResolutionCache,
};

/// A context together with handles on its fakes.
pub struct TestContext {
    /// The assembled context.
    pub context: Arc<MonitorContext>,
    /// The notifier behind the notification service.
    pub notifier: Arc<RecordingNotifier>,
    /// The fetcher used by every monitor.
    pub fetcher: Arc<ScriptedFetcher>,
    /// The resolver behind the resolution cache.
    pub resolver: Arc<StaticResolver>,
    /// The state store.
    pub store: Arc<StateStore>,
}

impl TestContext {
    /// A monitor for `target` with fresh runtime state.
    pub fn monitor(&self, target: &Target) -> (TargetMonitor, Arc<RwLock<TargetRuntimeState>>) {
        let state = Arc::new(RwLock::new(TargetRuntimeState::default()));
        let monitor =
            TargetMonitor::new(Arc::new(target.clone()), Arc::clone(&state), Arc::clone(&self.context));
        (monitor, state)
    }
}

/// A builder for [`TestContext`].
pub struct TestContextBuilder {
    settings: MonitorSettings,
    gate: GateConfig,
    targets: Vec<Target>,
    fetcher: Arc<ScriptedFetcher>,
    notifier: Arc<RecordingNotifier>,
    store: Arc<StateStore>,
    recipients: Vec<String>,
    error_recipients: Vec<String>,
}

impl Default for TestContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContextBuilder {
    /// Default limits, an always-empty page and an in-memory store.
    pub fn new() -> Self {
        Self {
            settings: MonitorSettings {
                check_interval: Duration::from_secs(60),
                dedup_max_age: Duration::from_secs(7 * 24 * 3600),
            },
            gate: GateConfig {
                cooldown: Duration::from_secs(60 * 60),
                hourly_limit: 10,
                daily_limit_per_target: 3,
                error_daily_limit_per_target: 3,
            },
            targets: Vec::new(),
            fetcher: Arc::new(ScriptedFetcher::body("")),
            notifier: Arc::new(RecordingNotifier::new()),
            store: Arc::new(StateStore::in_memory()),
            recipients: vec!["ops@example.com".to_string()],
            error_recipients: vec!["oncall@example.com".to_string()],
        }
    }

    /// Sets the check interval.
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.settings.check_interval = interval;
        self
    }

    /// Sets the dedup window.
    pub fn dedup_max_age(mut self, max_age: Duration) -> Self {
        self.settings.dedup_max_age = max_age;
        self
    }

    /// Sets the gate limits.
    pub fn gate(mut self, gate: GateConfig) -> Self {
        self.gate = gate;
        self
    }

    /// Targets whose extraction patterns the keyword matcher compiles.
    pub fn targets(mut self, targets: &[Target]) -> Self {
        self.targets = targets.to_vec();
        self
    }

    /// Uses `fetcher`.
    pub fn fetcher(mut self, fetcher: Arc<ScriptedFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    /// Uses `store`.
    pub fn store(mut self, store: Arc<StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Replaces the error recipients. An empty list disables error and
    /// recovery notifications.
    pub fn error_recipients(mut self, recipients: Vec<String>) -> Self {
        self.error_recipients = recipients;
        self
    }

    /// Builds the context. Must run inside a tokio runtime.
    pub fn build(self) -> TestContext {
        let matcher = KeywordMatcher::new(&self.targets).expect("test extraction patterns must compile");
        let resolver = Arc::new(StaticResolver::new(vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))]));
        let notifications = NotificationService::new(
            Arc::clone(&self.notifier) as _,
            MessageComposer::new(MessageTemplates::default(), 0),
            self.recipients,
            self.error_recipients,
        );

        let context = MonitorContext {
            settings: self.settings,
            resolver: Arc::new(ResolutionCache::new(
                Arc::clone(&resolver) as _,
                Duration::from_secs(300),
            )),
            fetcher: Arc::clone(&self.fetcher) as _,
            matcher: Arc::new(matcher),
            gate: Arc::new(NotificationGate::new(self.gate, Arc::clone(&self.store))),
            store: Arc::clone(&self.store),
            notifications: Arc::new(notifications),
            events: Arc::new(EventLog::new(100)),
            logs: Arc::new(LogSink::start(500, 1000)),
        };

        TestContext {
            context: Arc::new(context),
            notifier: self.notifier,
            fetcher: self.fetcher,
            resolver,
            store: self.store,
        }
    }
}
