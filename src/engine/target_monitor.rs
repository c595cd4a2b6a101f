//! The polling loop of a single target.
//!
//! A `TargetMonitor` owns one target and its runtime state. Every tick it
//! resolves the host, fetches the payload, classifies it, folds the result
//! into the runtime state and acts on the resulting transitions: events,
//! activity log lines and, when dedup and the gate both allow it,
//! notifications.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::{
    sync::RwLock,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{
    context::MonitorContext,
    transitions::{ContentChange, ReachabilityChange, Transitions},
};
use crate::{
    models::{AlertType, CheckResult, Event, EventKind, Target, TargetRuntimeState},
    notification::composer::format_duration,
};

const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Start offset of the target at `index` out of `count`, spreading the first
/// polls evenly over one interval.
pub fn stagger_delay(interval: Duration, count: usize, index: usize) -> Duration {
    if count <= 1 {
        return Duration::ZERO;
    }
    let step = interval / count as u32;
    step * (index % count) as u32
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Polls one target until cancelled.
pub struct TargetMonitor {
    target: Arc<Target>,
    state: Arc<RwLock<TargetRuntimeState>>,
    context: Arc<MonitorContext>,
}

impl TargetMonitor {
    /// Creates a monitor writing into `state`.
    pub fn new(
        target: Arc<Target>,
        state: Arc<RwLock<TargetRuntimeState>>,
        context: Arc<MonitorContext>,
    ) -> Self {
        Self { target, state, context }
    }

    /// The monitored target.
    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Waits `stagger`, polls once, then polls on every tick of the check
    /// interval until `cancellation_token` is cancelled.
    pub async fn run(self, stagger: Duration, cancellation_token: CancellationToken) {
        let target_id = self.target.id().to_string();

        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => {
                tracing::debug!(target = %target_id, "Cancelled before first poll.");
                return;
            }
            _ = tokio::time::sleep(stagger) => {}
        }

        let period = self.context.settings.check_interval.max(MIN_CHECK_INTERVAL);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(target = %target_id, interval_secs = period.as_secs(), "Target monitor started.");

        loop {
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break,
                _ = ticker.tick() => self.poll_isolated().await,
            }
        }

        tracing::info!(target = %target_id, "Target monitor stopped.");
    }

    /// Runs one poll, containing any panic to this poll.
    async fn poll_isolated(&self) {
        if let Err(payload) = AssertUnwindSafe(self.poll()).catch_unwind().await {
            let reason = panic_message(payload.as_ref());
            tracing::error!(target = %self.target.id(), panic = %reason, "Poll panicked, continuing with the next tick.");
            self.context.logs.add(format!("{}: poll failed: {reason}", self.target.display_name()));
        }
    }

    /// Checks the target once and acts on the outcome.
    pub async fn poll(&self) -> Transitions {
        let result = self.check().await;
        self.handle_result(&result).await
    }

    /// Resolves, fetches and classifies the target. Touches no state.
    pub async fn check(&self) -> CheckResult {
        let target_id = self.target.id();
        let started = Instant::now();

        if let Some(host) = self.target.host() {
            match self.context.resolver.resolve(host).await {
                Ok(resolution) if resolution.changed => {
                    self.context.logs.add(format!(
                        "{}: {host} now resolves to {}",
                        self.target.display_name(),
                        resolution.address
                    ));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(target = %target_id, host, error = %e, "Host resolution failed, fetching anyway.");
                }
            }
        }

        match self.context.fetcher.fetch(&self.target.url).await {
            Ok(payload) => {
                let outcome = self.context.matcher.evaluate(&payload, &self.target);
                tracing::debug!(target = %target_id, found = outcome.found, bytes = payload.len(), "Target checked.");
                CheckResult::reachable(
                    target_id,
                    Utc::now(),
                    outcome.found,
                    outcome.fields,
                    started.elapsed(),
                )
            }
            Err(e) => {
                tracing::debug!(target = %target_id, error = %e, "Fetch failed.");
                CheckResult::unreachable(target_id, Utc::now(), e.to_string(), started.elapsed())
            }
        }
    }

    /// Folds `result` into the runtime state and performs the effects of the
    /// resulting transitions.
    pub async fn handle_result(&self, result: &CheckResult) -> Transitions {
        let transitions = self.state.write().await.apply(result);
        let name = self.target.display_name();

        if let Some(change) = &transitions.reachability {
            match change {
                ReachabilityChange::WentDown { error, .. } => {
                    tracing::warn!(target = %self.target.id(), %error, "Target became unreachable.");
                    self.context.logs.add(format!("{name}: unreachable ({error})"));
                }
                ReachabilityChange::Recovered { downtime, .. } => {
                    tracing::info!(target = %self.target.id(), downtime_secs = downtime.num_seconds(), "Target recovered.");
                    self.context
                        .logs
                        .add(format!("{name}: reachable again after {}", format_duration(*downtime)));
                }
            }
            self.notify_reachability(change, result.observed_at).await;
        } else if let Some(error) = &result.error {
            tracing::debug!(target = %self.target.id(), %error, "Target still unreachable.");
        }

        match &transitions.content {
            Some(ContentChange::Cleared) => {
                self.context
                    .events
                    .add(Event::new(
                        result.observed_at,
                        EventKind::NotFound,
                        self.target.id(),
                        format!("Condition no longer present on {name}"),
                    ))
                    .await;
                self.context.logs.add(format!("{name}: condition cleared"));
                self.context.store.save_in_background();
            }
            Some(ContentChange::Appeared { fingerprint }) => {
                self.on_found(fingerprint, result, format!("Condition found on {name}")).await;
            }
            Some(ContentChange::Changed { fingerprint, .. }) => {
                self.on_found(fingerprint, result, format!("Condition changed on {name}")).await;
            }
            None => {}
        }

        transitions
    }

    async fn on_found(&self, fingerprint: &str, result: &CheckResult, message: String) {
        self.context.logs.add(format!("{}: {}", self.target.display_name(), message.to_lowercase()));
        self.context
            .events
            .add(Event::new(result.observed_at, EventKind::Found, self.target.id(), message))
            .await;
        self.notify_match(fingerprint, result).await;
    }

    async fn notify_reachability(&self, change: &ReachabilityChange, observed_at: DateTime<Utc>) {
        let context = &self.context;
        let target_id = self.target.id();

        if !context.notifications.has_error_recipients() {
            tracing::debug!(target = %target_id, "No error recipients configured, skipping notification.");
            return;
        }

        let decision = context.gate.check(target_id, AlertType::Error, observed_at).await;
        if !decision.is_allowed() {
            tracing::info!(target = %target_id, %decision, "Error notification suppressed.");
            return;
        }

        let sent = match change {
            ReachabilityChange::WentDown { since, error } => {
                context.notifications.notify_unreachable(&self.target, error, *since).await
            }
            ReachabilityChange::Recovered { downtime, .. } => {
                context.notifications.notify_recovered(&self.target, *downtime, observed_at).await
            }
        };

        match sent {
            Ok(record) => {
                context.gate.record_at(target_id, AlertType::Error, observed_at).await;
                context.store.push_notification_record(record).await;
                context.store.save_in_background();
            }
            Err(e) => {
                tracing::error!(target = %target_id, error = %e, "Failed to send error notification.");
            }
        }
    }

    async fn notify_match(&self, fingerprint: &str, result: &CheckResult) {
        let context = &self.context;
        let target_id = self.target.id();
        let observed_at = result.observed_at;

        if context.store.is_match_seen_at(fingerprint, context.settings.dedup_max_age, observed_at).await {
            tracing::info!(target = %target_id, fingerprint, "Match already notified, skipping.");
            return;
        }

        let decision = context.gate.check(target_id, AlertType::Found, observed_at).await;
        if !decision.is_allowed() {
            tracing::info!(target = %target_id, %decision, "Match notification suppressed.");
            context.logs.add(format!("{}: notification suppressed, {decision}", self.target.display_name()));
            return;
        }

        match context.notifications.notify_match(&self.target, result).await {
            Ok(record) => {
                context.store.record_match_at(fingerprint, target_id, &result.fields, observed_at).await;
                context.gate.record_at(target_id, AlertType::Found, observed_at).await;
                context.store.push_notification_record(record).await;
                context.store.save_in_background();
            }
            Err(e) => {
                tracing::error!(target = %target_id, error = %e, "Failed to send match notification.");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::{IpAddr, Ipv4Addr},
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use chrono::{TimeDelta, TimeZone};
    use mockall::Sequence;
    use url::Url;

    use super::*;
    use crate::{
        activity::{EventLog, LogSink},
        engine::{
            context::MonitorSettings,
            notification_gate::{GateConfig, GateDecision, NotificationGate},
        },
        fetcher::{FetchError, Fetcher, MockFetcher},
        matcher::{ContentMatcher, MatchOutcome, MockContentMatcher},
        models::{ExtractedFields, FoundState, NotificationKind, fingerprint},
        notification::{
            MockNotifier, NotificationService,
            composer::{MessageComposer, MessageTemplates},
            error::NotificationError,
        },
        persistence::StateStore,
        resolver::{MockHostResolver, ResolutionCache},
    };

    const URL: &str = "https://slots.example.com/";

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap() + TimeDelta::minutes(minutes)
    }

    fn target() -> Arc<Target> {
        Arc::new(Target::new(
            Url::parse(URL).unwrap(),
            Some("Slots".into()),
            vec!["available".into()],
        ))
    }

    fn gate_config() -> GateConfig {
        GateConfig {
            cooldown: Duration::from_secs(60 * 60),
            hourly_limit: 10,
            daily_limit_per_target: 3,
            error_daily_limit_per_target: 3,
        }
    }

    struct Harness {
        fetcher: Arc<dyn Fetcher>,
        matcher: Arc<dyn ContentMatcher>,
        notifier: MockNotifier,
        resolver: MockHostResolver,
        error_recipients: Vec<String>,
        store: Arc<StateStore>,
        gate_config: GateConfig,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                fetcher: Arc::new(MockFetcher::new()),
                matcher: Arc::new(MockContentMatcher::new()),
                notifier: MockNotifier::new(),
                resolver: MockHostResolver::new(),
                error_recipients: vec!["oncall@example.com".into()],
                store: Arc::new(StateStore::in_memory()),
                gate_config: gate_config(),
            }
        }

        fn build(self) -> (TargetMonitor, Arc<MonitorContext>) {
            let notifications = NotificationService::new(
                Arc::new(self.notifier),
                MessageComposer::new(MessageTemplates::default(), 0),
                vec!["ops@example.com".into()],
                self.error_recipients,
            );
            let context = Arc::new(MonitorContext {
                settings: MonitorSettings {
                    check_interval: Duration::from_secs(60),
                    dedup_max_age: Duration::from_secs(7 * 24 * 3600),
                },
                resolver: Arc::new(ResolutionCache::new(
                    Arc::new(self.resolver),
                    Duration::from_secs(300),
                )),
                fetcher: self.fetcher,
                matcher: self.matcher,
                gate: Arc::new(NotificationGate::new(self.gate_config, Arc::clone(&self.store))),
                store: self.store,
                notifications: Arc::new(notifications),
                events: Arc::new(EventLog::new(100)),
                logs: Arc::new(LogSink::start(100, 100)),
            });
            let monitor = TargetMonitor::new(
                target(),
                Arc::new(RwLock::new(TargetRuntimeState::default())),
                Arc::clone(&context),
            );
            (monitor, context)
        }
    }

    fn found(minutes: i64, date: &str) -> CheckResult {
        let fields = ExtractedFields::from([("date".to_string(), date.to_string())]);
        CheckResult::reachable(URL, at(minutes), true, fields, Duration::from_millis(80))
    }

    fn not_found(minutes: i64) -> CheckResult {
        CheckResult::reachable(URL, at(minutes), false, ExtractedFields::new(), Duration::ZERO)
    }

    fn failed(minutes: i64) -> CheckResult {
        CheckResult::unreachable(URL, at(minutes), "request timed out", Duration::ZERO)
    }

    #[test]
    fn stagger_spreads_targets_over_one_interval() {
        let interval = Duration::from_secs(60);
        let offsets: Vec<_> = (0..4).map(|i| stagger_delay(interval, 4, i)).collect();

        assert_eq!(
            offsets,
            vec![
                Duration::ZERO,
                Duration::from_secs(15),
                Duration::from_secs(30),
                Duration::from_secs(45)
            ]
        );
        assert_eq!(stagger_delay(interval, 1, 0), Duration::ZERO);
        assert_eq!(stagger_delay(interval, 0, 0), Duration::ZERO);
    }

    #[tokio::test]
    async fn outage_sends_one_error_then_one_recovery() {
        let mut harness = Harness::new();
        let mut seq = Sequence::new();
        harness
            .notifier
            .expect_send()
            .withf(|_, message| message.subject == "Target unreachable: Slots")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        harness
            .notifier
            .expect_send()
            .withf(|_, message| {
                message.subject == "Target recovered: Slots"
                    && message.body.contains("Downtime: 10m 0s")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        let (monitor, context) = harness.build();

        monitor.handle_result(&failed(0)).await;
        monitor.handle_result(&failed(1)).await;
        monitor.handle_result(&failed(5)).await;
        monitor.handle_result(&not_found(10)).await;

        let kinds: Vec<_> =
            context.store.recent_notifications(10).await.into_iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![NotificationKind::Recovery, NotificationKind::Error]);
        assert!(!monitor.state.read().await.unreachable);
    }

    #[tokio::test]
    async fn outage_without_error_recipients_is_silent() {
        let mut harness = Harness::new();
        harness.error_recipients.clear();
        harness.notifier.expect_send().times(0);
        let (monitor, context) = harness.build();

        monitor.handle_result(&failed(0)).await;
        monitor.handle_result(&not_found(10)).await;

        assert!(context.store.recent_notifications(10).await.is_empty());
    }

    #[tokio::test]
    async fn repeated_identical_match_notifies_once() {
        let mut harness = Harness::new();
        harness.notifier.expect_send().times(1).returning(|_, _| Ok(()));
        let (monitor, context) = harness.build();

        for minutes in [0, 30, 60, 90, 120] {
            monitor.handle_result(&found(minutes, "2024-05-03")).await;
        }

        let fp = fingerprint(
            URL,
            &ExtractedFields::from([("date".to_string(), "2024-05-03".to_string())]),
        );
        let record = context.store.match_record(&fp).await.unwrap();
        assert_eq!(record.count, 1);
        assert_eq!(context.events.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn seen_fingerprint_is_not_renotified_even_when_gate_allows() {
        let mut harness = Harness::new();
        let fields = ExtractedFields::from([("date".to_string(), "2024-05-03".to_string())]);
        harness.store.record_match_at(&fingerprint(URL, &fields), URL, &fields, at(-24 * 60)).await;
        harness.notifier.expect_send().times(0);
        let (monitor, context) = harness.build();

        assert!(context.gate.check(URL, AlertType::Found, at(0)).await.is_allowed());
        let transitions = monitor.handle_result(&found(0, "2024-05-03")).await;

        assert!(matches!(transitions.content, Some(ContentChange::Appeared { .. })));
        assert_eq!(context.events.get_all().await.len(), 1);
    }

    #[tokio::test]
    async fn gate_blocks_unseen_fingerprint() {
        let mut harness = Harness::new();
        harness.notifier.expect_send().times(1).returning(|_, _| Ok(()));
        let (monitor, context) = harness.build();

        monitor.handle_result(&found(0, "2024-05-03")).await;
        // New fingerprint inside the one hour cooldown.
        monitor.handle_result(&found(10, "2024-05-04")).await;

        let fp = fingerprint(
            URL,
            &ExtractedFields::from([("date".to_string(), "2024-05-04".to_string())]),
        );
        assert!(context.store.match_record(&fp).await.is_none());
        assert_eq!(context.events.get_all().await.len(), 2);
    }

    #[tokio::test]
    async fn daily_cap_blocks_unseen_fingerprint() {
        let mut harness = Harness::new();
        harness.gate_config =
            GateConfig { cooldown: Duration::ZERO, daily_limit_per_target: 1, ..gate_config() };
        harness.notifier.expect_send().times(1).returning(|_, _| Ok(()));
        let (monitor, context) = harness.build();

        monitor.handle_result(&found(0, "2024-05-03")).await;
        monitor.handle_result(&found(10, "2024-05-04")).await;

        let fp = fingerprint(
            URL,
            &ExtractedFields::from([("date".to_string(), "2024-05-04".to_string())]),
        );
        assert!(context.store.match_record(&fp).await.is_none());
        assert!(matches!(
            context.gate.check(URL, AlertType::Found, at(11)).await,
            GateDecision::DailyLimit { count: 1, limit: 1 }
        ));
        assert_eq!(context.store.recent_notifications(10).await.len(), 1);
    }

    #[tokio::test]
    async fn cleared_condition_adds_event_without_notification() {
        let mut harness = Harness::new();
        harness.notifier.expect_send().times(1).returning(|_, _| Ok(()));
        let (monitor, context) = harness.build();

        monitor.handle_result(&found(0, "2024-05-03")).await;
        monitor.handle_result(&not_found(1)).await;

        let events = context.events.get_all().await;
        assert_eq!(events.len(), 2);
        assert!(events[1].is_resolved());
        assert_eq!(monitor.state.read().await.found, FoundState::NotFound);
    }

    #[tokio::test]
    async fn notifier_failure_mutates_nothing() {
        let mut harness = Harness::new();
        harness
            .notifier
            .expect_send()
            .returning(|_, _| Err(NotificationError::NotifyFailed("unreachable".into())));
        let (monitor, context) = harness.build();

        monitor.handle_result(&found(0, "2024-05-03")).await;

        assert!(context.store.recent_notifications(10).await.is_empty());
        assert!(context.store.snapshot().await.seen_matches.is_empty());
        assert!(context.gate.check(URL, AlertType::Found, at(1)).await.is_allowed());
    }

    #[tokio::test]
    async fn check_classifies_fetched_payload() {
        let mut harness = Harness::new();
        harness
            .resolver
            .expect_lookup()
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10))]));
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().returning(|_| Ok("Slots available on 2024-05-03".to_string()));
        let mut matcher = MockContentMatcher::new();
        matcher.expect_evaluate().returning(|payload, _| MatchOutcome {
            found: payload.contains("available"),
            fields: ExtractedFields::from([("date".to_string(), "2024-05-03".to_string())]),
        });
        harness.fetcher = Arc::new(fetcher);
        harness.matcher = Arc::new(matcher);
        let (monitor, _) = harness.build();

        let result = monitor.check().await;

        assert!(result.is_reachable());
        assert!(result.found);
        assert_eq!(result.fields["date"], "2024-05-03");
    }

    #[tokio::test]
    async fn check_reports_fetch_failure_even_when_resolution_fails() {
        let mut harness = Harness::new();
        harness.resolver.expect_lookup().returning(|host| {
            Err(crate::resolver::ResolveError::LookupFailed {
                host: host.to_string(),
                reason: "no such host".into(),
            })
        });
        let mut fetcher = MockFetcher::new();
        fetcher.expect_fetch().times(1).returning(|_| Err(FetchError::Status(503)));
        harness.fetcher = Arc::new(fetcher);
        let (monitor, _) = harness.build();

        let result = monitor.check().await;

        assert!(!result.is_reachable());
        assert_eq!(result.error.as_deref(), Some("unexpected status code: 503"));
    }

    struct PanicOnceFetcher {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Fetcher for PanicOnceFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("parser exploded");
            }
            Ok(String::new())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_polls_on_interval_and_survives_panics() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut harness = Harness::new();
        harness
            .resolver
            .expect_lookup()
            .returning(|_| Ok(vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10))]));
        harness.fetcher = Arc::new(PanicOnceFetcher { calls: Arc::clone(&calls) });
        let mut matcher = MockContentMatcher::new();
        matcher.expect_evaluate().returning(|_, _| MatchOutcome::default());
        harness.matcher = Arc::new(matcher);
        let (monitor, _) = harness.build();
        let token = CancellationToken::new();

        let handle = tokio::spawn(monitor.run(Duration::from_secs(10), token.clone()));

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // Polls at 10s, 70s and 130s; the first one panics.
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        token.cancel();
        handle.await.unwrap();
    }
}
