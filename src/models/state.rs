//! This module defines the durable state shared by the notification gate and
//! the deduplication logic.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    alert::{AlertType, NotificationKind},
    check_result::ExtractedFields,
};

/// How long per-target notification timestamps and last-alert times are kept.
pub const NOTIFICATION_RETENTION_HOURS: i64 = 24;

/// How long a match record survives after it was last notified.
pub const MATCH_RETENTION_DAYS: i64 = 7;

/// Number of sent notifications kept for display.
pub const MAX_RECENT_NOTIFICATIONS: usize = 100;

/// Computes the deduplication fingerprint of a condition: the SHA-256 of the
/// target id and the extracted fields, as lowercase hex. Every component is
/// length-prefixed so that no two distinct field sets hash the same input.
pub fn fingerprint(target_id: &str, fields: &ExtractedFields) -> String {
    let mut hasher = Sha256::new();
    let mut feed = |bytes: &[u8]| {
        hasher.update((bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    };
    feed(target_id.as_bytes());
    for (name, value) in fields {
        feed(name.as_bytes());
        feed(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// A condition that has already been notified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// The fingerprint this record is stored under.
    pub fingerprint: String,
    /// Identifier of the target the match was observed on.
    pub target_id: String,
    /// The fields that produced the fingerprint.
    #[serde(default)]
    pub fields: ExtractedFields,
    /// When the condition was first notified.
    pub first_seen: DateTime<Utc>,
    /// When the condition was last notified.
    pub last_notified: DateTime<Utc>,
    /// How many times the condition was recorded.
    pub count: u32,
}

/// A sent notification, kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// When the notification was sent.
    pub timestamp: DateTime<Utc>,
    /// Identifier of the target.
    pub target_id: String,
    /// Display name of the target at send time.
    pub target_name: String,
    /// What the notification was about.
    pub kind: NotificationKind,
    /// Who received it.
    pub recipients: Vec<String>,
    /// The rendered subject line.
    pub subject: String,
}

/// Summary counters over the persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStats {
    /// Number of match records.
    pub seen_matches: usize,
    /// Number of targets with match notifications in the retention window.
    pub targets_tracked: usize,
    /// Match notifications sent in the last 24 hours.
    pub match_notifications_24h: usize,
    /// Error and recovery notifications sent in the last 24 hours.
    pub error_notifications_24h: usize,
    /// When the state was last written to disk.
    pub last_saved: Option<DateTime<Utc>>,
}

/// The aggregate persisted to the state file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Per-target timestamps of match notifications.
    #[serde(default)]
    pub match_notifications: HashMap<String, Vec<DateTime<Utc>>>,
    /// Per-target timestamps of error and recovery notifications.
    #[serde(default)]
    pub error_notifications: HashMap<String, Vec<DateTime<Utc>>>,
    /// Last alert time keyed by `<target>|<alert type>`.
    #[serde(default)]
    pub last_alerts: HashMap<String, DateTime<Utc>>,
    /// Match records keyed by fingerprint.
    #[serde(default)]
    pub seen_matches: HashMap<String, MatchRecord>,
    /// The most recent sent notifications, oldest first.
    #[serde(default)]
    pub recent_notifications: Vec<NotificationRecord>,
    /// When the state was last written to disk.
    #[serde(default)]
    pub last_saved: Option<DateTime<Utc>>,
}

/// Key under which the last alert time of a target is stored.
pub fn last_alert_key(target_id: &str, alert_type: AlertType) -> String {
    format!("{target_id}|{alert_type}")
}

impl PersistedState {
    /// The per-target notification lists of one family.
    pub fn notifications(&self, alert_type: AlertType) -> &HashMap<String, Vec<DateTime<Utc>>> {
        match alert_type {
            AlertType::Found => &self.match_notifications,
            AlertType::Error => &self.error_notifications,
        }
    }

    /// Mutable access to the per-target notification lists of one family.
    pub fn notifications_mut(
        &mut self,
        alert_type: AlertType,
    ) -> &mut HashMap<String, Vec<DateTime<Utc>>> {
        match alert_type {
            AlertType::Found => &mut self.match_notifications,
            AlertType::Error => &mut self.error_notifications,
        }
    }

    /// Drops everything that fell out of its retention window and returns the
    /// number of match records removed.
    pub fn cleanup(&mut self, now: DateTime<Utc>) -> usize {
        let day_ago = now - TimeDelta::hours(NOTIFICATION_RETENTION_HOURS);
        for lists in [&mut self.match_notifications, &mut self.error_notifications] {
            for timestamps in lists.values_mut() {
                timestamps.retain(|t| *t > day_ago);
            }
            lists.retain(|_, timestamps| !timestamps.is_empty());
        }

        self.last_alerts.retain(|_, t| *t >= day_ago);

        let week_ago = now - TimeDelta::days(MATCH_RETENTION_DAYS);
        let before = self.seen_matches.len();
        self.seen_matches.retain(|_, record| record.last_notified >= week_ago);
        before - self.seen_matches.len()
    }

    /// Appends a sent notification, keeping only the most recent ones.
    pub fn push_notification_record(&mut self, record: NotificationRecord) {
        self.recent_notifications.push(record);
        if self.recent_notifications.len() > MAX_RECENT_NOTIFICATIONS {
            let excess = self.recent_notifications.len() - MAX_RECENT_NOTIFICATIONS;
            self.recent_notifications.drain(..excess);
        }
    }

    /// Computes summary counters relative to `now`.
    pub fn stats(&self, now: DateTime<Utc>) -> StateStats {
        let day_ago = now - TimeDelta::hours(NOTIFICATION_RETENTION_HOURS);
        let count_recent = |lists: &HashMap<String, Vec<DateTime<Utc>>>| {
            lists.values().flat_map(|list| list.iter()).filter(|t| **t > day_ago).count()
        };

        StateStats {
            seen_matches: self.seen_matches.len(),
            targets_tracked: self.match_notifications.len(),
            match_notifications_24h: count_recent(&self.match_notifications),
            error_notifications_24h: count_recent(&self.error_notifications),
            last_saved: self.last_saved,
        }
    }
}
