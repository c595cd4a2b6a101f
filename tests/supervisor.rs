//! Integration tests for the supervisor lifecycle

use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
    time::Duration,
};

use tempfile::tempdir;
use watchpost::{
    config::AppConfig,
    models::FoundState,
    persistence::StateStore,
    supervisor::Supervisor,
    test_helpers::{RecordingNotifier, ScriptedFetcher, StaticResolver, TargetBuilder},
};

const PAGE_OPEN: &str = "Appointments available on 2024-05-03";
const PAGE_CLOSED: &str = "No appointments right now";

fn config(state_file: &std::path::Path) -> AppConfig {
    AppConfig::builder()
        .check_interval(Duration::from_secs(60))
        .state_file_path(state_file)
        .shutdown_grace_period(Duration::from_secs(2))
        .recipients(vec!["ops@example.com".into()])
        .error_recipients(vec!["oncall@example.com".into()])
        .build()
}

fn resolver() -> Arc<StaticResolver> {
    Arc::new(StaticResolver::new(vec![IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))]))
}

#[tokio::test(start_paused = true)]
async fn test_first_polls_are_staggered_over_one_interval() {
    let dir = tempdir().unwrap();
    let fetcher = Arc::new(ScriptedFetcher::body(PAGE_CLOSED));
    let targets = (0..3)
        .map(|i| TargetBuilder::new().url(&format!("https://t{i}.example.com/")).build())
        .collect();

    let supervisor = Supervisor::builder()
        .config(config(&dir.path().join("state.json")))
        .targets(targets)
        .fetcher(Arc::clone(&fetcher) as _)
        .notifier(Arc::new(RecordingNotifier::new()))
        .resolver(resolver())
        .build()
        .await
        .unwrap();
    let token = supervisor.cancellation_token();
    let handle = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(fetcher.calls(), 1);
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.calls(), 2);
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.calls(), 3);
    // The first target comes around again one interval after its first poll.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.calls(), 4);

    token.cancel();
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_status_and_final_save() {
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    let notifier = Arc::new(RecordingNotifier::new());
    let target = TargetBuilder::new()
        .url("https://slots.example.com/")
        .name("Slots")
        .extract("date", r"(\d{4}-\d{2}-\d{2})")
        .build();

    let supervisor = Supervisor::builder()
        .config(config(&state_file))
        .targets(vec![target.clone()])
        .fetcher(Arc::new(ScriptedFetcher::body(PAGE_OPEN)))
        .notifier(Arc::clone(&notifier) as _)
        .resolver(resolver())
        .build()
        .await
        .unwrap();
    let token = supervisor.cancellation_token();
    let status = supervisor.status_handle();
    let handle = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_secs(1)).await;

    let report = status.report().await;
    assert_eq!(report.targets.len(), 1);
    assert_eq!(report.targets[0].name, "Slots");
    assert_eq!(report.targets[0].state.found, FoundState::Found);
    assert_eq!(report.recent_events.len(), 1);
    assert_eq!(report.recent_notifications.len(), 1);
    assert_eq!(report.hourly_notifications, 1);
    assert_eq!(report.dns_cache.entries.len(), 1);
    assert_eq!(notifier.subjects(), vec!["Match found: Slots".to_string()]);
    assert_eq!(
        status.target_state(target.id()).await.map(|state| state.checks),
        Some(1)
    );

    token.cancel();
    handle.await.unwrap().unwrap();

    let reloaded = StateStore::load(&state_file).await;
    let stats = reloaded.stats().await;
    assert_eq!(stats.seen_matches, 1);
    assert_eq!(stats.match_notifications_24h, 1);
    assert!(stats.last_saved.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_poll_still_saves() {
    let dir = tempdir().unwrap();
    let state_file = dir.path().join("state.json");
    let fetcher = Arc::new(ScriptedFetcher::body(PAGE_CLOSED));
    let targets = vec![
        TargetBuilder::new().url("https://a.example.com/").build(),
        TargetBuilder::new().url("https://b.example.com/").build(),
    ];

    let supervisor = Supervisor::builder()
        .config(config(&state_file))
        .targets(targets)
        .fetcher(Arc::clone(&fetcher) as _)
        .notifier(Arc::new(RecordingNotifier::new()))
        .resolver(resolver())
        .build()
        .await
        .unwrap();
    let token = supervisor.cancellation_token();
    let handle = tokio::spawn(supervisor.run());

    tokio::time::sleep(Duration::from_secs(10)).await;
    token.cancel();
    handle.await.unwrap().unwrap();

    // Only the unstaggered target was polled.
    assert_eq!(fetcher.calls(), 1);
    assert!(state_file.exists());
}
