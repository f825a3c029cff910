//! LINE push-message channel.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{http, truncate_chars, NotificationChannel, SendResult};
use crate::config::LineSettings;
use crate::error::ChannelError;
use crate::notification::Notification;

/// Push-message text limit is 5000, keep some headroom
const LINE_MESSAGE_LIMIT: usize = 4900;

const TRUNCATION_MARKER: &str = "\n...(message truncated)";

#[derive(Debug)]
pub struct LineChannel {
    settings: Option<LineSettings>,
    client: Client,
}

impl LineChannel {
    pub fn new(settings: Option<LineSettings>, client: Client) -> Self {
        Self { settings, client }
    }

    fn build_text(notification: &Notification) -> String {
        truncate_chars(
            &notification.plain_text(),
            LINE_MESSAGE_LIMIT,
            TRUNCATION_MARKER,
        )
    }
}

#[async_trait]
impl NotificationChannel for LineChannel {
    fn name(&self) -> &str {
        "line"
    }

    async fn send(&self, notification: &Notification) -> SendResult {
        let settings = self
            .settings
            .as_ref()
            .filter(|s| !s.access_token.is_empty() && !s.user_id.is_empty())
            .ok_or_else(|| ChannelError::auth("LINE access token or user id not configured"))?;

        let payload = json!({
            "to": settings.user_id,
            "messages": [{
                "type": "text",
                "text": Self::build_text(notification),
            }],
        });

        let request = self
            .client
            .post(&settings.endpoint)
            .bearer_auth(&settings.access_token)
            .json(&payload);

        http::execute(self.name(), request).await
    }
}
