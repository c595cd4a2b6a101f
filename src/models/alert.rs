//! Alert and notification kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The families the notification gate limits independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// The condition of interest appeared.
    Found,
    /// The target became unreachable or recovered.
    Error,
}

impl AlertType {
    /// Stable lowercase name, used in persisted keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::Found => "found",
            AlertType::Error => "error",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a sent notification was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// A new match.
    Match,
    /// The target went down.
    Error,
    /// The target came back up.
    Recovery,
}

impl NotificationKind {
    /// The gate family this kind is counted against.
    pub fn alert_type(&self) -> AlertType {
        match self {
            NotificationKind::Match => AlertType::Found,
            NotificationKind::Error | NotificationKind::Recovery => AlertType::Error,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NotificationKind::Match => "match",
            NotificationKind::Error => "error",
            NotificationKind::Recovery => "recovery",
        };
        f.write_str(name)
    }
}
