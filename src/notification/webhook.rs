//! Webhook notification implementation.
//!
//! Posts every notification as a JSON document to a configured URL,
//! optionally signed with an HMAC-SHA256 of the payload and a timestamp.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::Sha256;
use url::Url;

use super::{Notifier, error::NotificationError};
use crate::models::NotificationMessage;

/// HMAC SHA256 type alias
type HmacSha256 = Hmac<Sha256>;

/// Represents a webhook configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Where notifications are posted.
    pub url: Url,
    /// Secret used to sign the payload.
    #[serde(default)]
    pub secret: Option<String>,
    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// [`Notifier`] that posts JSON to a webhook.
#[derive(Debug)]
pub struct WebhookNotifier {
    url: Url,
    client: reqwest::Client,
    secret: Option<String>,
    headers: HeaderMap,
}

impl WebhookNotifier {
    /// Creates a new Webhook notifier. Fails when a configured header is not
    /// a valid HTTP header.
    pub fn new(config: WebhookConfig, client: reqwest::Client) -> Result<Self, NotificationError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("content-type"),
            HeaderValue::from_static("application/json"),
        );
        for (key, value) in &config.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                NotificationError::ConfigError(format!("Invalid header name: {key}: {e}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                NotificationError::ConfigError(format!("Invalid header value for {key}: {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        Ok(Self { url: config.url, client, secret: config.secret, headers })
    }

    /// Signs `payload` with `secret` and returns the hex signature and the
    /// millisecond timestamp that was signed along with it.
    pub fn sign_payload(
        &self,
        secret: &str,
        payload: &serde_json::Value,
    ) -> Result<(String, String), NotificationError> {
        // `new_from_slice` accepts empty keys.
        if secret.is_empty() {
            return Err(NotificationError::NotifyFailed(
                "Invalid secret: cannot be empty.".to_string(),
            ));
        }

        let timestamp = Utc::now().timestamp_millis();

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| NotificationError::ConfigError(format!("Invalid secret: {e}")))?;

        let serialized_payload = serde_json::to_string(payload).map_err(|e| {
            NotificationError::InternalError(format!("Failed to serialize payload: {e}"))
        })?;
        mac.update(format!("{serialized_payload}{timestamp}").as_bytes());

        let signature = hex::encode(mac.finalize().into_bytes());

        Ok((signature, timestamp.to_string()))
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        recipients: &[String],
        message: &NotificationMessage,
    ) -> Result<(), NotificationError> {
        let payload = json!({
            "recipients": recipients,
            "subject": message.subject,
            "body": message.body,
            "sent_at": Utc::now().to_rfc3339(),
        });

        let mut headers = self.headers.clone();
        if let Some(secret) = &self.secret {
            let (signature, timestamp) = self.sign_payload(secret, &payload)?;
            headers.insert(
                HeaderName::from_static("x-signature"),
                HeaderValue::from_str(&signature).map_err(|e| {
                    NotificationError::NotifyFailed(format!("Invalid signature value: {e}"))
                })?,
            );
            headers.insert(
                HeaderName::from_static("x-timestamp"),
                HeaderValue::from_str(&timestamp).map_err(|e| {
                    NotificationError::NotifyFailed(format!("Invalid timestamp value: {e}"))
                })?,
            );
        }

        let response =
            self.client.post(self.url.clone()).headers(headers).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::NotifyFailed(format!(
                "Webhook request failed with status: {status}"
            )));
        }

        tracing::debug!(url = %self.url, subject = %message.subject, "Webhook notification delivered.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn create_test_notifier(
        url: &str,
        secret: Option<&str>,
        headers: HashMap<String, String>,
    ) -> Result<WebhookNotifier, NotificationError> {
        let config = WebhookConfig {
            url: Url::parse(url).unwrap(),
            secret: secret.map(str::to_string),
            headers,
        };
        WebhookNotifier::new(config, reqwest::Client::new())
    }

    fn message() -> NotificationMessage {
        NotificationMessage { subject: "Match found: Slots".into(), body: "Slots open".into() }
    }

    #[test]
    fn test_sign_payload() {
        let notifier =
            create_test_notifier("https://webhook.example.com", Some("secret"), HashMap::new())
                .unwrap();
        let payload = json!({ "subject": "Test", "body": "Test message" });

        let (signature, timestamp) = notifier.sign_payload("secret", &payload).unwrap();

        assert_eq!(signature.len(), 64);
        assert!(timestamp.parse::<i64>().is_ok());
    }

    #[test]
    fn test_sign_payload_fails_empty_secret() {
        let notifier =
            create_test_notifier("https://webhook.example.com", None, HashMap::new()).unwrap();

        let result = notifier.sign_payload("", &json!({}));

        assert!(matches!(result, Err(NotificationError::NotifyFailed(_))));
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let headers = HashMap::from([("Invalid Header!@#".to_string(), "value".to_string())]);

        let err = create_test_notifier("https://webhook.example.com", None, headers).unwrap_err();

        assert!(err.to_string().contains("Invalid header name"));
    }

    #[tokio::test]
    async fn test_send_posts_json_payload() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .match_header("x-team", "ops")
            .match_body(Matcher::PartialJson(json!({
                "recipients": ["ops@example.com"],
                "subject": "Match found: Slots",
                "body": "Slots open",
            })))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let headers = HashMap::from([("X-Team".to_string(), "ops".to_string())]);
        let notifier = create_test_notifier(&server.url(), None, headers).unwrap();

        notifier.send(&["ops@example.com".to_string()], &message()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_includes_signature_and_timestamp() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("x-signature", Matcher::Regex("^[0-9a-f]{64}$".to_string()))
            .match_header("x-timestamp", Matcher::Regex("^[0-9]+$".to_string()))
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let notifier =
            create_test_notifier(&server.url(), Some("top-secret"), HashMap::new()).unwrap();

        notifier.send(&[], &message()).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_fails_on_error_status() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", "/").with_status(500).expect(1).create_async().await;

        let notifier = create_test_notifier(&server.url(), None, HashMap::new()).unwrap();

        let err = notifier.send(&[], &message()).await.unwrap_err();

        assert!(matches!(err, NotificationError::NotifyFailed(_)));
        mock.assert_async().await;
    }
}
