//! Resend email adapter.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::ports::{NotificationChannel, NotificationError};

#[derive(Debug, Clone)]
pub struct ResendConfig {
    api_key: SecretString,
    /// Value of the `From` header, e.g. `NeoCare <noreply@neocare.app>`.
    pub from: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ResendConfig {
    pub fn new(api_key: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into()),
            from: from.into(),
            base_url: "https://api.resend.com".to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
}

pub struct ResendNotificationChannel {
    config: ResendConfig,
    client: Client,
}

impl ResendNotificationChannel {
    pub fn new(config: ResendConfig) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotificationError::Unavailable(format!("http client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn emails_url(&self) -> String {
        format!("{}/emails", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl NotificationChannel for ResendNotificationChannel {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), NotificationError> {
        let email = ResendEmail {
            from: &self.config.from,
            to: [to],
            subject,
            text: body,
        };

        let response = self
            .client
            .post(self.emails_url())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&email)
            .send()
            .await
            .map_err(|e| NotificationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(to = %to, "Email accepted by Resend");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        if status.is_server_error() || status.as_u16() == 429 {
            Err(NotificationError::Unavailable(format!("{}: {}", status, detail)))
        } else {
            Err(NotificationError::Rejected(format!("{}: {}", status, detail)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_url_tolerates_trailing_slash() {
        let channel = ResendNotificationChannel::new(
            ResendConfig::new("re_test", "NeoCare <noreply@neocare.app>")
                .with_base_url("http://localhost:9999/"),
        )
        .unwrap();
        assert_eq!(channel.emails_url(), "http://localhost:9999/emails");
    }

    #[test]
    fn request_body_uses_resend_field_names() {
        let email = ResendEmail {
            from: "NeoCare <noreply@neocare.app>",
            to: ["k1@example.com"],
            subject: "Hi",
            text: "Body",
        };
        let json = serde_json::to_value(&email).unwrap();
        assert_eq!(json["to"][0], "k1@example.com");
        assert_eq!(json["text"], "Body");
    }

    #[test]
    fn config_debug_hides_key() {
        let config = ResendConfig::new("re_secret_value", "a@b.c");
        assert!(!format!("{:?}", config).contains("re_secret_value"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let channel = ResendNotificationChannel::new(
            ResendConfig::new("re_test", "a@b.c")
                .with_base_url("http://127.0.0.1:1")
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap();
        let result = channel.send("k1@example.com", "s", "b").await;
        assert!(matches!(result, Err(NotificationError::Unavailable(_))));
    }
}
