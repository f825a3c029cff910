//! Telegram Bot API channel (`POST /bot<token>/sendMessage`).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use super::{http, truncate_chars, NotificationChannel, SendResult};
use crate::config::TelegramSettings;
use crate::error::ChannelError;
use crate::notification::Notification;

/// Telegram `sendMessage` text limit (UTF-8 characters).
const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

#[derive(Debug)]
pub struct TelegramChannel {
    settings: Option<TelegramSettings>,
    client: Client,
}

impl TelegramChannel {
    pub fn new(settings: Option<TelegramSettings>, client: Client) -> Self {
        Self { settings, client }
    }

    fn parse_mode(notification: &Notification) -> &'static str {
        if notification.html_body.is_some() {
            "HTML"
        } else {
            "Markdown"
        }
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, notification: &Notification) -> SendResult {
        let settings = self
            .settings
            .as_ref()
            .filter(|s| !s.bot_token.is_empty() && !s.chat_id.is_empty())
            .ok_or_else(|| ChannelError::auth("Telegram bot token or chat id not configured"))?;

        let url = format!(
            "{}/bot{}/sendMessage",
            settings.api_base.trim_end_matches('/'),
            settings.bot_token
        );
        let payload = json!({
            "chat_id": settings.chat_id,
            "text": truncate_chars(&notification.plain_text(), TELEGRAM_MESSAGE_LIMIT, "\n\n[truncated]"),
            "parse_mode": Self::parse_mode(notification),
        });

        http::execute(self.name(), self.client.post(url).json(&payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::spawn_http_stub;

    #[test]
    fn test_parse_mode_follows_html_body() {
        let plain = Notification::new("s", "b");
        assert_eq!(TelegramChannel::parse_mode(&plain), "Markdown");

        let html = Notification::new("s", "b").with_html("<b>b</b>");
        assert_eq!(TelegramChannel::parse_mode(&html), "HTML");
    }

    #[tokio::test]
    async fn test_empty_token_is_auth_failure() {
        let settings = TelegramSettings {
            bot_token: String::new(),
            chat_id: "42".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
        };
        let channel = TelegramChannel::new(Some(settings), Client::new());
        let err = channel
            .send(&Notification::new("s", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn test_rejected_token_is_auth_failure() {
        let base = spawn_http_stub("401 Unauthorized", "{\"ok\":false}").await;
        let settings = TelegramSettings {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            api_base: base,
        };
        let channel = TelegramChannel::new(Some(settings), Client::new());
        let err = channel
            .send(&Notification::new("s", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthFailure);
    }

    #[tokio::test]
    async fn test_unreachable_api_is_network_error() {
        let settings = TelegramSettings {
            bot_token: "123:abc".to_string(),
            chat_id: "42".to_string(),
            api_base: "http://127.0.0.1:1".to_string(),
        };
        let channel = TelegramChannel::new(Some(settings), Client::new());
        let err = channel
            .send(&Notification::new("s", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError);
    }
}
