//! # Notification Service
//!
//! This module turns state transitions into delivered messages.
//!
//! ## Core Components
//!
//! - **`Notifier` Trait**: The delivery seam. Anything that can deliver a
//!   rendered message to a set of recipients implements it; an error means the
//!   message was not sent.
//! - **`WebhookNotifier` / `StdoutNotifier`**: The built-in channels.
//! - **`MessageComposer`**: Renders subjects and bodies from configurable
//!   minijinja templates.
//! - **`NotificationService`**: Ties a notifier, the composer and the
//!   recipient lists together and reports what was sent as a
//!   `NotificationRecord`.
//!
//! The service never retries. Whether a notification may be sent at all is
//! decided upstream by the notification gate and the deduplication check.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
#[cfg(test)]
use mockall::automock;

use crate::{
    config::{AppConfig, NotifierConfig},
    models::{CheckResult, NotificationKind, NotificationMessage, NotificationRecord, Target},
};

pub mod composer;
pub mod error;
pub mod stdout;
pub mod template;
pub mod webhook;

use composer::MessageComposer;
use error::NotificationError;
use stdout::StdoutNotifier;
use webhook::WebhookNotifier;

/// Delivers a rendered message.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message` to `recipients`.
    async fn send(
        &self,
        recipients: &[String],
        message: &NotificationMessage,
    ) -> Result<(), NotificationError>;
}

/// Builds the notifier selected in the configuration.
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn Notifier>, NotificationError> {
    match config {
        NotifierConfig::Stdout => Ok(Arc::new(StdoutNotifier)),
        NotifierConfig::Webhook(webhook) => {
            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| NotificationError::ConfigError(format!("HTTP client: {e}")))?;
            Ok(Arc::new(WebhookNotifier::new(webhook.clone(), client)?))
        }
    }
}

/// Composes and delivers match, error and recovery notifications.
pub struct NotificationService {
    notifier: Arc<dyn Notifier>,
    composer: MessageComposer,
    recipients: Vec<String>,
    error_recipients: Vec<String>,
}

impl NotificationService {
    /// Creates a new service.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        composer: MessageComposer,
        recipients: Vec<String>,
        error_recipients: Vec<String>,
    ) -> Self {
        Self { notifier, composer, recipients, error_recipients }
    }

    /// Creates the service described by the application configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, NotificationError> {
        let notifier = build_notifier(&config.notifier)?;
        let composer = MessageComposer::new(config.templates.clone(), config.time_offset_hours);
        Ok(Self::new(
            notifier,
            composer,
            config.recipients.clone(),
            config.error_recipients.clone(),
        ))
    }

    /// Whether error and recovery notifications have anyone to go to.
    pub fn has_error_recipients(&self) -> bool {
        !self.error_recipients.is_empty()
    }

    /// Announces a new match on `target`.
    pub async fn notify_match(
        &self,
        target: &Target,
        result: &CheckResult,
    ) -> Result<NotificationRecord, NotificationError> {
        let message = self.composer.compose_match(target, result)?;
        self.deliver(NotificationKind::Match, target, &self.recipients, message).await
    }

    /// Announces that `target` became unreachable at `down_since`.
    pub async fn notify_unreachable(
        &self,
        target: &Target,
        error: &str,
        down_since: DateTime<Utc>,
    ) -> Result<NotificationRecord, NotificationError> {
        let message = self.composer.compose_unreachable(target, error, down_since)?;
        self.deliver(NotificationKind::Error, target, &self.error_recipients, message).await
    }

    /// Announces that `target` recovered after `downtime`.
    pub async fn notify_recovered(
        &self,
        target: &Target,
        downtime: TimeDelta,
        recovered_at: DateTime<Utc>,
    ) -> Result<NotificationRecord, NotificationError> {
        let message = self.composer.compose_recovery(target, downtime, recovered_at)?;
        self.deliver(NotificationKind::Recovery, target, &self.error_recipients, message).await
    }

    async fn deliver(
        &self,
        kind: NotificationKind,
        target: &Target,
        recipients: &[String],
        message: NotificationMessage,
    ) -> Result<NotificationRecord, NotificationError> {
        self.notifier.send(recipients, &message).await?;
        tracing::info!(target = %target.id(), %kind, recipients = recipients.len(), subject = %message.subject, "Notification sent.");

        Ok(NotificationRecord {
            timestamp: Utc::now(),
            target_id: target.id().to_string(),
            target_name: target.display_name().to_string(),
            kind,
            recipients: recipients.to_vec(),
            subject: message.subject,
        })
    }
}
