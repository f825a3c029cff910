// src/resilience/exponential_backoff.rs

use std::time::Duration;

use crate::config::ChannelConfig;

/// Lowest jitter multiplier applied from the second attempt on
pub const JITTER_MIN: f64 = 0.8;
/// Highest jitter multiplier
pub const JITTER_MAX: f64 = 1.2;

/// Per-attempt delay schedule of one channel.
///
/// Attempt 1 runs immediately. Attempt `k >= 2` waits
/// `min(max_delay, base_delay * backoff_factor^(k-2)) * jitter`, clamped
/// again to `max_delay` so jitter never pushes a delay past the cap.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Current attempt number
    current_attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    backoff_factor: f64,
    max_delay: Duration,
    use_jitter: bool,
}

impl ExponentialBackoff {
    /// Create a backoff schedule from a channel's retry profile
    pub fn new(config: &ChannelConfig) -> Self {
        Self {
            current_attempt: 0,
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            backoff_factor: config.backoff_factor,
            max_delay: config.max_delay,
            use_jitter: config.use_jitter,
        }
    }

    /// Delay to wait before the next attempt, or None once the budget is spent
    pub fn next_backoff(&mut self) -> Option<Duration> {
        self.current_attempt += 1;

        if self.current_attempt > self.max_attempts {
            return None;
        }

        let jitter = if self.use_jitter && self.current_attempt > 1 {
            JITTER_MIN + rand::random::<f64>() * (JITTER_MAX - JITTER_MIN)
        } else {
            1.0
        };

        Some(self.delay_for_attempt(self.current_attempt, jitter))
    }

    /// Delay before `attempt` (1-based) with an explicit jitter multiplier
    pub fn delay_for_attempt(&self, attempt: u32, jitter: f64) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exp = (attempt - 2) as f64;
        let base_secs = self.base_delay.as_secs_f64();
        let max_secs = self.max_delay.as_secs_f64();
        let capped = (base_secs * self.backoff_factor.powf(exp)).min(max_secs);
        let jittered = (capped * jitter).min(max_secs);

        if jittered.is_finite() && jittered > 0.0 {
            Duration::from_secs_f64(jittered)
        } else {
            Duration::ZERO
        }
    }

    /// Number of attempts handed out so far
    pub fn attempt(&self) -> u32 {
        self.current_attempt.min(self.max_attempts)
    }

    /// Whether another call to `next_backoff` would yield an attempt
    pub fn has_remaining(&self) -> bool {
        self.current_attempt < self.max_attempts
    }

    /// Reset the backoff to start from the beginning
    pub fn reset(&mut self) {
        self.current_attempt = 0;
    }
}
