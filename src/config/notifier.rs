use serde::{Deserialize, Serialize};

use crate::notification::webhook::WebhookConfig;

/// Selects the channel notifications are delivered through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// Print notifications to standard output.
    #[default]
    Stdout,
    /// POST notifications as JSON to a webhook.
    Webhook(WebhookConfig),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_variants() {
        let stdout: NotifierConfig = serde_json::from_str(r#"{"type": "stdout"}"#).unwrap();
        assert_eq!(stdout, NotifierConfig::Stdout);

        let webhook: NotifierConfig =
            serde_json::from_str(r#"{"type": "webhook", "url": "https://hooks.example.com/x"}"#)
                .unwrap();
        match webhook {
            NotifierConfig::Webhook(config) => {
                assert_eq!(config.url.as_str(), "https://hooks.example.com/x");
                assert!(config.secret.is_none());
                assert!(config.headers.is_empty());
            }
            other => panic!("unexpected notifier config: {other:?}"),
        }
    }
}
