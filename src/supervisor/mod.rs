//! The Supervisor module manages the lifecycle of Watchpost.
//!
//! The supervisor is the top-level owner of the shared services (state store,
//! notification gate, resolution cache, activity logs) and of one
//! [`TargetMonitor`] task per target.
//!
//! ## Responsibilities
//!
//! - **Initialization**: The `SupervisorBuilder` wires the services together,
//!   building defaults from the configuration for anything not injected.
//! - **Scheduling**: Monitors start staggered over one check interval so the
//!   targets are not all polled at the same instant.
//! - **Maintenance**: Two timers periodically persist the state (after
//!   retention cleanup) and evict expired resolution cache entries.
//! - **Graceful Shutdown**: On cancellation (a signal, or the token returned
//!   by [`Supervisor::cancellation_token`]) every loop stops, in-flight polls
//!   get a short grace period, and the state is saved one last time.

mod builder;
mod status;

use std::{sync::Arc, time::Duration};

pub use builder::SupervisorBuilder;
use dashmap::DashMap;
pub use status::{RuntimeRegistry, StatusHandle, StatusReport, TargetStatus};
use thiserror::Error;
use tokio::{
    signal,
    sync::RwLock,
    task::JoinSet,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{AppConfig, ConfigValidationError},
    engine::{MonitorContext, TargetMonitor, stagger_delay},
    fetcher::FetchError,
    matcher::MatcherError,
    models::{Target, TargetRuntimeState},
    notification::error::NotificationError,
};

const MIN_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(1);

/// Represents the set of errors that can occur while building or running the
/// supervisor.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// A required configuration was not provided to the `SupervisorBuilder`.
    #[error("Missing configuration for Supervisor")]
    MissingConfig,

    /// No targets were provided to the `SupervisorBuilder`.
    #[error("No targets to monitor")]
    MissingTargets,

    /// The configuration or the targets failed validation.
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigValidationError),

    /// The content matcher could not be built.
    #[error("Matcher error: {0}")]
    Matcher(#[from] MatcherError),

    /// The HTTP fetcher could not be built.
    #[error("Fetcher error: {0}")]
    Fetcher(#[from] FetchError),

    /// The notification channel could not be built.
    #[error("Notification error: {0}")]
    Notification(#[from] NotificationError),
}

/// The primary runtime manager for the application.
pub struct Supervisor {
    config: Arc<AppConfig>,
    targets: Arc<[Arc<Target>]>,
    runtime: Arc<RuntimeRegistry>,
    context: Arc<MonitorContext>,
    cancellation_token: CancellationToken,
    join_set: JoinSet<()>,
    handle_signals: bool,
}

impl Supervisor {
    /// Creates a supervisor from already assembled services.
    pub fn new(
        config: AppConfig,
        targets: Vec<Target>,
        context: MonitorContext,
        handle_signals: bool,
    ) -> Self {
        let runtime: RuntimeRegistry = DashMap::new();
        let targets: Arc<[Arc<Target>]> = targets.into_iter().map(Arc::new).collect();
        for target in targets.iter() {
            runtime.insert(
                target.id().to_string(),
                Arc::new(RwLock::new(TargetRuntimeState::default())),
            );
        }

        Self {
            config: Arc::new(config),
            targets,
            runtime: Arc::new(runtime),
            context: Arc::new(context),
            cancellation_token: CancellationToken::new(),
            join_set: JoinSet::new(),
            handle_signals,
        }
    }

    /// Returns a new `SupervisorBuilder` instance.
    pub fn builder() -> SupervisorBuilder {
        SupervisorBuilder::new()
    }

    /// Token that stops the supervisor when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// A handle for reading status while the supervisor runs.
    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(
            Arc::clone(&self.targets),
            Arc::clone(&self.runtime),
            Arc::clone(&self.context),
            self.config.recent_events_window_hours,
        )
    }

    /// Starts every monitor and the maintenance timers, then blocks until
    /// cancelled.
    ///
    /// 1. Optionally spawns a handler that cancels on `SIGINT` or `SIGTERM`.
    /// 2. Spawns one monitor per target with its stagger offset.
    /// 3. Spawns the state save and cache cleanup timers.
    /// 4. Watches the tasks until the token is cancelled.
    /// 5. Waits up to the grace period for in-flight polls, aborts the rest,
    ///    saves the state and stops the activity log.
    pub async fn run(mut self) -> Result<(), SupervisorError> {
        if self.handle_signals {
            self.spawn_signal_handler();
        }

        // --- Monitors ---

        let interval = self.config.check_interval_secs;
        let count = self.targets.len();
        for (index, target) in self.targets.iter().enumerate() {
            let state = self
                .runtime
                .entry(target.id().to_string())
                .or_insert_with(|| Arc::new(RwLock::new(TargetRuntimeState::default())))
                .clone();
            let monitor = TargetMonitor::new(Arc::clone(target), state, Arc::clone(&self.context));
            let stagger = stagger_delay(interval, count, index);
            tracing::debug!(target = %target.id(), stagger_ms = stagger.as_millis() as u64, "Scheduling target.");
            self.join_set.spawn(monitor.run(stagger, self.cancellation_token.clone()));
        }
        tracing::info!(targets = count, interval_secs = interval.as_secs(), "All target monitors scheduled.");

        // --- Maintenance ---

        self.spawn_state_saver();
        self.spawn_cache_cleaner();

        // --- Main Supervisor Loop ---

        loop {
            tokio::select! {
                maybe_result = self.join_set.join_next() => {
                    match maybe_result {
                        Some(Ok(())) => {}
                        Some(Err(e)) => {
                            tracing::error!(error = %e, "A supervised task failed, the others keep running.");
                        }
                        None => break,
                    }
                }
                _ = self.cancellation_token.cancelled() => break,
            }
        }

        // --- Graceful Shutdown ---

        self.cancellation_token.cancel();
        let grace = self.config.shutdown_grace_period_secs;
        let drain = async { while self.join_set.join_next().await.is_some() {} };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                remaining = self.join_set.len(),
                "Tasks still running after the grace period, aborting them."
            );
        }
        self.join_set.shutdown().await;
        tracing::info!("All supervised tasks have completed.");

        match self.context.store.save().await {
            Ok(()) => tracing::info!("Final state saved."),
            Err(e) => tracing::error!(error = %e, "Failed to save state on shutdown."),
        }
        self.context.logs.stop();

        tracing::info!("Supervisor shutdown complete.");
        Ok(())
    }

    fn spawn_signal_handler(&mut self) {
        let cancellation_token = self.cancellation_token.clone();
        self.join_set.spawn(async move {
            let ctrl_c = signal::ctrl_c();
            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to register SIGTERM handler.");
                        std::future::pending::<()>().await;
                    }
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => tracing::info!("SIGINT (Ctrl+C) received, initiating graceful shutdown."),
                _ = terminate => tracing::info!("SIGTERM received, initiating graceful shutdown."),
                _ = cancellation_token.cancelled() => return,
            }

            cancellation_token.cancel();
        });
    }

    fn spawn_state_saver(&mut self) {
        let store = Arc::clone(&self.context.store);
        let cancellation_token = self.cancellation_token.clone();
        let period = self.config.state_save_interval_secs.max(MIN_MAINTENANCE_INTERVAL);

        self.join_set.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = store.cleanup().await;
                        match store.save().await {
                            Ok(()) => tracing::debug!(removed, "Periodic state save completed."),
                            Err(e) => tracing::error!(error = %e, "Periodic state save failed."),
                        }
                    }
                }
            }
        });
    }

    fn spawn_cache_cleaner(&mut self) {
        let resolver = Arc::clone(&self.context.resolver);
        let cancellation_token = self.cancellation_token.clone();
        let period = self.config.dns_cache_cleanup_interval_secs.max(MIN_MAINTENANCE_INTERVAL);

        self.join_set.spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = cancellation_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = resolver.cleanup_expired().await;
                        if removed > 0 {
                            tracing::debug!(removed, "Expired resolution cache entries evicted.");
                        }
                    }
                }
            }
        });
    }
}
