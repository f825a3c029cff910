//! Email channel backed by a transactional email HTTP API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{http, NotificationChannel, SendResult};
use crate::config::EmailSettings;
use crate::error::ChannelError;
use crate::notification::Notification;

#[derive(Debug)]
pub struct EmailChannel {
    settings: Option<EmailSettings>,
    client: Client,
}

impl EmailChannel {
    pub fn new(settings: Option<EmailSettings>, client: Client) -> Self {
        Self { settings, client }
    }

    /// Build the email subject.
    fn build_subject(notification: &Notification) -> String {
        if notification.urgent {
            format!("[URGENT] {}", notification.subject)
        } else {
            notification.subject.clone()
        }
    }

    fn build_payload(settings: &EmailSettings, notification: &Notification) -> serde_json::Value {
        let mut payload = json!({
            "from": settings.sender,
            "to": [settings.receiver],
            "subject": Self::build_subject(notification),
            "text": notification.body,
        });
        if let Some(html) = &notification.html_body {
            payload["html"] = json!(html);
        }
        payload
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, notification: &Notification) -> SendResult {
        let settings = self
            .settings
            .as_ref()
            .filter(|s| !s.api_key.is_empty() && !s.sender.is_empty() && !s.receiver.is_empty())
            .ok_or_else(|| ChannelError::auth("email API key, sender or receiver not configured"))?;

        let request = self
            .client
            .post(&settings.endpoint)
            .bearer_auth(&settings.api_key)
            .json(&Self::build_payload(settings, notification));

        http::execute(self.name(), request).await
    }
}
