//! An in-process `Notifier` that records what it was asked to send.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::{
    models::NotificationMessage,
    notification::{Notifier, error::NotificationError},
};

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    /// Who the message went to.
    pub recipients: Vec<String>,
    /// The rendered message.
    pub message: NotificationMessage,
}

/// Records every message instead of delivering it. Can be switched into a
/// failing mode to simulate an unavailable channel.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Creates a notifier that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent sends fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Everything sent so far, in order.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Subjects of everything sent so far, in order.
    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|sent| sent.message.subject).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(
        &self,
        recipients: &[String],
        message: &NotificationMessage,
    ) -> Result<(), NotificationError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotificationError::NotifyFailed("notifier configured to fail".into()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentNotification { recipients: recipients.to_vec(), message: message.clone() });
        Ok(())
    }
}
