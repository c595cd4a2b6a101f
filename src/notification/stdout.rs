use async_trait::async_trait;

use super::{Notifier, error::NotificationError};
use crate::models::NotificationMessage;

/// A notifier that prints messages to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutNotifier;

#[async_trait]
impl Notifier for StdoutNotifier {
    async fn send(
        &self,
        recipients: &[String],
        message: &NotificationMessage,
    ) -> Result<(), NotificationError> {
        let recipients =
            if recipients.is_empty() { "-".to_string() } else { recipients.join(", ") };
        println!("=== Notification to {recipients} ===\n{}\n{}\n", message.subject, message.body);
        Ok(())
    }
}
