//! Data models for notifications.

use serde::{Deserialize, Serialize};

/// A rendered message handed to a notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct NotificationMessage {
    /// The subject line of the message.
    pub subject: String,
    /// The body content of the message.
    pub body: String,
}
