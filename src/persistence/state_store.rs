//! The crash-safe state store.
//!
//! State lives in memory behind a single lock and is written to disk as
//! pretty-printed JSON through a temporary file that is renamed over the real
//! one, so a crash mid-write never leaves a truncated state file. A file that
//! cannot be parsed is moved aside and replaced by a fresh state.

use std::{
    ffi::OsString,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::{
    fs,
    io::AsyncWriteExt,
    sync::{Mutex, RwLock},
};

use super::error::PersistenceError;
use crate::models::{
    AlertType, ExtractedFields, MatchRecord, NotificationRecord, PersistedState, StateStats,
    state::last_alert_key,
};

/// Returns `now - window`, or `None` when the window reaches past the
/// representable range.
fn cutoff(now: DateTime<Utc>, window: Duration) -> Option<DateTime<Utc>> {
    TimeDelta::from_std(window).ok().and_then(|window| now.checked_sub_signed(window))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `payload` to `<path>.tmp` and renames it onto `path`.
async fn write_atomically(path: &Path, payload: &[u8]) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| PersistenceError::Write { path: parent.to_path_buf(), source })?;
    }

    let temp_path = with_suffix(path, ".tmp");
    let write = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(payload).await?;
        file.sync_all().await
    };
    if let Err(source) = write.await {
        if let Err(e) = fs::remove_file(&temp_path).await {
            tracing::debug!(path = %temp_path.display(), error = %e, "Could not remove temporary state file.");
        }
        return Err(PersistenceError::Write { path: temp_path, source });
    }

    if let Err(source) = fs::rename(&temp_path, path).await {
        if let Err(e) = fs::remove_file(&temp_path).await {
            tracing::debug!(path = %temp_path.display(), error = %e, "Could not remove temporary state file.");
        }
        return Err(PersistenceError::Rename { path: path.to_path_buf(), source });
    }

    Ok(())
}

/// Durable record of notification history and deduplication fingerprints.
#[derive(Debug)]
pub struct StateStore {
    path: Option<PathBuf>,
    state: RwLock<PersistedState>,
    /// Serializes writers of the state file. Always taken before `state`.
    save_lock: Mutex<()>,
}

impl StateStore {
    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::from_state(None, PersistedState::default())
    }

    /// A store seeded with `state`.
    pub fn from_state(path: Option<PathBuf>, state: PersistedState) -> Self {
        Self { path, state: RwLock::new(state), save_lock: Mutex::new(()) }
    }

    /// Loads the store from `path`. Never fails: a missing or unreadable file
    /// yields a fresh state, and an unparsable one is backed up first.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        Self::load_at(path, Utc::now()).await
    }

    /// [`StateStore::load`] with an explicit clock.
    pub async fn load_at(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let mut state = match fs::read(&path).await {
            Ok(contents) => match serde_json::from_slice::<PersistedState>(&contents) {
                Ok(state) => {
                    tracing::info!(path = %path.display(), seen_matches = state.seen_matches.len(), "Loaded state file.");
                    state
                }
                Err(e) => {
                    let backup = with_suffix(
                        &path,
                        &format!(".corrupted.{}", now.format("%Y%m%d-%H%M%S")),
                    );
                    tracing::error!(path = %path.display(), backup = %backup.display(), error = %e, "State file is corrupted, starting fresh.");
                    if let Err(e) = fs::rename(&path, &backup).await {
                        tracing::error!(path = %path.display(), error = %e, "Failed to back up corrupted state file.");
                    }
                    PersistedState::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No state file found, starting fresh.");
                PersistedState::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read state file, starting fresh.");
                PersistedState::default()
            }
        };

        let purged = state.cleanup(now);
        if purged > 0 {
            tracing::debug!(purged, "Purged expired match records on load.");
        }

        Self::from_state(Some(path), state)
    }

    /// The configured state file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Writes the state to the configured file. A no-op for in-memory stores.
    pub async fn save(&self) -> Result<(), PersistenceError> {
        match &self.path {
            Some(path) => self.save_to(path).await,
            None => {
                tracing::trace!("No state file configured, skipping save.");
                Ok(())
            }
        }
    }

    /// Runs retention cleanup and writes the state to `path`.
    pub async fn save_to(&self, path: &Path) -> Result<(), PersistenceError> {
        let _guard = self.save_lock.lock().await;

        let now = Utc::now();
        let payload = {
            let mut state = self.state.write().await;
            state.cleanup(now);
            let previous = state.last_saved.replace(now);
            let payload = serde_json::to_vec_pretty(&*state);
            state.last_saved = previous;
            payload?
        };

        write_atomically(path, &payload).await?;

        self.state.write().await.last_saved = Some(now);
        tracing::debug!(path = %path.display(), bytes = payload.len(), "State saved.");
        Ok(())
    }

    /// Saves on a detached task, logging failures.
    pub fn save_in_background(self: &Arc<Self>) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = store.save().await {
                tracing::error!(error = %e, "Background state save failed, keeping state in memory.");
            }
        });
    }

    /// Whether `fingerprint` was notified within `max_age`.
    pub async fn is_match_seen(&self, fingerprint: &str, max_age: Duration) -> bool {
        self.is_match_seen_at(fingerprint, max_age, Utc::now()).await
    }

    /// [`StateStore::is_match_seen`] with an explicit clock.
    pub async fn is_match_seen_at(
        &self,
        fingerprint: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        let state = self.state.read().await;
        let Some(record) = state.seen_matches.get(fingerprint) else {
            return false;
        };
        match cutoff(now, max_age) {
            Some(cutoff) => record.last_notified >= cutoff,
            None => true,
        }
    }

    /// Records that `fingerprint` was notified now.
    pub async fn record_match(&self, fingerprint: &str, target_id: &str, fields: &ExtractedFields) {
        self.record_match_at(fingerprint, target_id, fields, Utc::now()).await
    }

    /// [`StateStore::record_match`] with an explicit clock.
    pub async fn record_match_at(
        &self,
        fingerprint: &str,
        target_id: &str,
        fields: &ExtractedFields,
        now: DateTime<Utc>,
    ) {
        let mut state = self.state.write().await;
        state
            .seen_matches
            .entry(fingerprint.to_string())
            .and_modify(|record| {
                record.last_notified = now;
                record.count = record.count.saturating_add(1);
            })
            .or_insert_with(|| MatchRecord {
                fingerprint: fingerprint.to_string(),
                target_id: target_id.to_string(),
                fields: fields.clone(),
                first_seen: now,
                last_notified: now,
                count: 1,
            });
    }

    /// The match record stored under `fingerprint`.
    pub async fn match_record(&self, fingerprint: &str) -> Option<MatchRecord> {
        self.state.read().await.seen_matches.get(fingerprint).cloned()
    }

    /// Prunes the target's notification list of `alert_type` to `window` and
    /// returns how many entries remain.
    pub async fn notifications_within(
        &self,
        target_id: &str,
        alert_type: AlertType,
        window: Duration,
        now: DateTime<Utc>,
    ) -> usize {
        let mut state = self.state.write().await;
        let lists = state.notifications_mut(alert_type);
        let Some(timestamps) = lists.get_mut(target_id) else {
            return 0;
        };
        if let Some(cutoff) = cutoff(now, window) {
            timestamps.retain(|t| *t > cutoff);
        }
        let remaining = timestamps.len();
        if remaining == 0 {
            lists.remove(target_id);
        }
        remaining
    }

    /// Every notification time of `alert_type` after `since`, across targets,
    /// in ascending order.
    pub async fn notification_times(
        &self,
        alert_type: AlertType,
        since: DateTime<Utc>,
    ) -> Vec<DateTime<Utc>> {
        let state = self.state.read().await;
        let mut times: Vec<_> = state
            .notifications(alert_type)
            .values()
            .flat_map(|list| list.iter().copied())
            .filter(|t| *t > since)
            .collect();
        times.sort();
        times
    }

    /// Appends `at` to the target's notification list of `alert_type`.
    pub async fn record_notification(
        &self,
        target_id: &str,
        alert_type: AlertType,
        at: DateTime<Utc>,
    ) {
        let mut state = self.state.write().await;
        state.notifications_mut(alert_type).entry(target_id.to_string()).or_default().push(at);
    }

    /// When the target was last alerted for `alert_type`.
    pub async fn last_alert(&self, target_id: &str, alert_type: AlertType) -> Option<DateTime<Utc>> {
        self.state.read().await.last_alerts.get(&last_alert_key(target_id, alert_type)).copied()
    }

    /// Sets the last alert time of the target for `alert_type`.
    pub async fn record_alert_time(&self, target_id: &str, alert_type: AlertType, at: DateTime<Utc>) {
        self.state.write().await.last_alerts.insert(last_alert_key(target_id, alert_type), at);
    }

    /// Keeps a sent notification for display.
    pub async fn push_notification_record(&self, record: NotificationRecord) {
        self.state.write().await.push_notification_record(record);
    }

    /// Up to `limit` sent notifications, newest first.
    pub async fn recent_notifications(&self, limit: usize) -> Vec<NotificationRecord> {
        let state = self.state.read().await;
        state.recent_notifications.iter().rev().take(limit).cloned().collect()
    }

    /// Summary counters.
    pub async fn stats(&self) -> StateStats {
        self.state.read().await.stats(Utc::now())
    }

    /// A copy of the whole state.
    pub async fn snapshot(&self) -> PersistedState {
        self.state.read().await.clone()
    }

    /// Runs retention cleanup now and returns the number of purged match
    /// records.
    pub async fn cleanup(&self) -> usize {
        self.state.write().await.cleanup(Utc::now())
    }
}
