use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, warn};

use super::exponential_backoff::ExponentialBackoff;
use crate::channels::NotificationChannel;
use crate::config::{ChannelConfig, RateLimitConfig};
use crate::delivery_event;
use crate::error::{ChannelError, ErrorKind};
use crate::notification::Notification;

/// One channel wrapped with its retry budget
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    channel: Arc<dyn NotificationChannel>,
    config: ChannelConfig,
    rate_limit: RateLimitConfig,
}

impl RetryPolicy {
    pub fn new(
        channel: Arc<dyn NotificationChannel>,
        config: ChannelConfig,
        rate_limit: RateLimitConfig,
    ) -> Self {
        Self {
            channel,
            config,
            rate_limit,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Fixed wait plus a random share of the configured jitter
    fn rate_limit_wait(&self) -> Duration {
        self.rate_limit.wait + self.rate_limit.jitter.mul_f64(rand::random::<f64>())
    }

    /// Try the channel until it succeeds or its budget runs out.
    ///
    /// Returns the number of attempts used on success, otherwise the error
    /// of the last attempt. `AuthFailure` ends the loop at once; `RateLimited`
    /// replaces the next backoff with the rate-limit wait.
    pub async fn send(&self, notification: &Notification) -> Result<u32, ChannelError> {
        let mut backoff = ExponentialBackoff::new(&self.config);
        let mut forced_wait: Option<Duration> = None;
        let mut last_error = None;

        while let Some(delay) = backoff.next_backoff() {
            let attempt = backoff.attempt();
            let wait = forced_wait.take().unwrap_or(delay);
            if !wait.is_zero() {
                debug!(channel = self.name(), attempt, wait_ms = wait.as_millis() as u64, "Waiting before retry");
                time::sleep(wait).await;
            }

            match self.channel.send(notification).await {
                Ok(()) => {
                    delivery_event!(self.name(), attempt, "delivered");
                    return Ok(attempt);
                }
                Err(e) => {
                    delivery_event!(self.name(), attempt, e.kind.as_str());
                    warn!(
                        channel = self.name(),
                        attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Channel attempt failed"
                    );

                    if e.kind.aborts_channel() {
                        return Err(e);
                    }
                    if e.kind == ErrorKind::RateLimited && backoff.has_remaining() {
                        forced_wait = Some(self.rate_limit_wait());
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            ChannelError::unknown(format!("channel '{}' has no attempts configured", self.name()))
        }))
    }
}
