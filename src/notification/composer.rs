//! Rendering of match, error and recovery messages.

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::template::{TemplateService, TemplateServiceError};
use crate::models::{CheckResult, NotificationMessage, Target};

/// Subject and body templates for every notification kind. Rendered with
/// minijinja; see the defaults for the available variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageTemplates {
    /// Subject of a match notification.
    pub match_subject: String,
    /// Body of a match notification.
    pub match_body: String,
    /// Subject of an unreachable notification.
    pub error_subject: String,
    /// Body of an unreachable notification.
    pub error_body: String,
    /// Subject of a recovery notification.
    pub recovery_subject: String,
    /// Body of a recovery notification.
    pub recovery_body: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            match_subject: "Match found: {{ target.name }}".to_string(),
            match_body: concat!(
                "The condition you are watching appeared on {{ target.name }}.\n\n",
                "URL: {{ target.url }}\n",
                "{% for name, value in fields|items %}{{ name }}: {{ value }}\n{% endfor %}",
                "Observed at: {{ observed_at }}\n",
            )
            .to_string(),
            error_subject: "Target unreachable: {{ target.name }}".to_string(),
            error_body: concat!(
                "{{ target.name }} could not be reached.\n\n",
                "URL: {{ target.url }}\n",
                "Error: {{ error }}\n",
                "Down since: {{ down_since }}\n",
            )
            .to_string(),
            recovery_subject: "Target recovered: {{ target.name }}".to_string(),
            recovery_body: concat!(
                "{{ target.name }} is reachable again.\n\n",
                "URL: {{ target.url }}\n",
                "Downtime: {{ downtime }}\n",
                "Recovered at: {{ recovered_at }}\n",
            )
            .to_string(),
        }
    }
}

/// Formats a duration as `1d 2h 3m 4s`, omitting leading zero units.
pub fn format_duration(duration: TimeDelta) -> String {
    let total = duration.num_seconds().max(0);
    let (days, hours, minutes, seconds) =
        (total / 86_400, (total % 86_400) / 3600, (total % 3600) / 60, total % 60);

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Renders notification messages from [`MessageTemplates`].
#[derive(Debug)]
pub struct MessageComposer {
    templates: MessageTemplates,
    template_service: TemplateService,
    offset: FixedOffset,
}

impl MessageComposer {
    /// Creates a composer that prints timestamps at `offset_hours` from UTC.
    /// Out-of-range offsets fall back to UTC.
    pub fn new(templates: MessageTemplates, offset_hours: i32) -> Self {
        let offset = FixedOffset::east_opt(offset_hours.saturating_mul(3600)).unwrap_or_else(|| {
            tracing::warn!(offset_hours, "Invalid time offset, using UTC.");
            Utc.fix()
        });
        Self { templates, template_service: TemplateService::new(), offset }
    }

    fn format_timestamp(&self, timestamp: DateTime<Utc>) -> String {
        timestamp.with_timezone(&self.offset).format("%Y-%m-%d %H:%M:%S %:z").to_string()
    }

    fn target_context(target: &Target) -> serde_json::Value {
        json!({ "name": target.display_name(), "url": target.id() })
    }

    fn render(
        &self,
        subject: &str,
        body: &str,
        context: serde_json::Value,
    ) -> Result<NotificationMessage, TemplateServiceError> {
        Ok(NotificationMessage {
            subject: self.template_service.render(subject, context.clone())?,
            body: self.template_service.render(body, context)?,
        })
    }

    /// A new match on `target`.
    pub fn compose_match(
        &self,
        target: &Target,
        result: &CheckResult,
    ) -> Result<NotificationMessage, TemplateServiceError> {
        let context = json!({
            "target": Self::target_context(target),
            "fields": result.fields,
            "observed_at": self.format_timestamp(result.observed_at),
        });
        self.render(&self.templates.match_subject, &self.templates.match_body, context)
    }

    /// `target` became unreachable.
    pub fn compose_unreachable(
        &self,
        target: &Target,
        error: &str,
        down_since: DateTime<Utc>,
    ) -> Result<NotificationMessage, TemplateServiceError> {
        let context = json!({
            "target": Self::target_context(target),
            "error": error,
            "down_since": self.format_timestamp(down_since),
        });
        self.render(&self.templates.error_subject, &self.templates.error_body, context)
    }

    /// `target` is reachable again after `downtime`.
    pub fn compose_recovery(
        &self,
        target: &Target,
        downtime: TimeDelta,
        recovered_at: DateTime<Utc>,
    ) -> Result<NotificationMessage, TemplateServiceError> {
        let context = json!({
            "target": Self::target_context(target),
            "downtime": format_duration(downtime),
            "downtime_secs": downtime.num_seconds().max(0),
            "recovered_at": self.format_timestamp(recovered_at),
        });
        self.render(&self.templates.recovery_subject, &self.templates.recovery_body, context)
    }
}
