//! Notification channels.
//!
//! Every delivery mechanism implements [`NotificationChannel`]; the
//! orchestrator only ever sees this trait:
//! - LINE push-message API
//! - Telegram Bot API
//! - Email over a transactional HTTP API
//! - Local file sink, the fallback of last resort

mod email;
mod file;
pub mod http;
mod line;
mod telegram;

pub use email::EmailChannel;
pub use file::FileChannel;
pub use line::LineChannel;
pub use telegram::TelegramChannel;

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::NotifierConfig;
use crate::error::{ChannelError, NotifierError, Result};
use crate::notification::Notification;

/// Outcome of one channel attempt
pub type SendResult = std::result::Result<(), ChannelError>;

/// Uniform send contract of a delivery channel.
///
/// Implementations perform exactly one network or filesystem operation per
/// call and translate every failure into a [`ChannelError`].
#[async_trait]
pub trait NotificationChannel: Send + Sync + Debug {
    /// Channel name, matching its `ChannelConfig::name`
    fn name(&self) -> &str;

    /// Attempt delivery once
    async fn send(&self, notification: &Notification) -> SendResult;
}

/// Build the concrete channel for every configured channel name
pub fn build_channels(config: &NotifierConfig) -> Result<Vec<Arc<dyn NotificationChannel>>> {
    let client = http::build_client(&config.http)?;
    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::with_capacity(config.channels.len());

    for channel in config.ordered_channels() {
        let built: Arc<dyn NotificationChannel> = match channel.name.as_str() {
            "line" => Arc::new(LineChannel::new(config.line.clone(), client.clone())),
            "telegram" => Arc::new(TelegramChannel::new(config.telegram.clone(), client.clone())),
            "email" => Arc::new(EmailChannel::new(config.email.clone(), client.clone())),
            "file" => Arc::new(FileChannel::new(config.fallback_dir.clone())),
            other => {
                return Err(NotifierError::Config(format!(
                    "no channel implementation named '{}'",
                    other
                )))
            }
        };
        channels.push(built);
    }

    Ok(channels)
}

/// Truncate `text` to at most `limit` characters, ending with `marker`
pub(crate) fn truncate_chars(text: &str, limit: usize, marker: &str) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let budget = limit.saturating_sub(marker.chars().count());
    let truncated: String = text.chars().take(budget).collect();
    format!("{truncated}{marker}")
}
