use chrono::{DateTime, Utc};

use crate::config::HealthConfig;
use crate::status::ChannelHealth;

/// Whether a channel may be attempted right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Channel is attempted normally
    Ready,
    /// Channel failed repeatedly since a recent success and is skipped
    CoolingDown,
    /// Channel was marked unavailable and is skipped until re-enabled
    Disabled,
}

impl ChannelState {
    pub fn is_eligible(self) -> bool {
        self == ChannelState::Ready
    }
}

fn older_than(ts: DateTime<Utc>, now: DateTime<Utc>, age: std::time::Duration) -> bool {
    match chrono::Duration::from_std(age) {
        Ok(age) => now.signed_duration_since(ts) >= age,
        Err(_) => false,
    }
}

/// Decide the state of a channel from its health record.
///
/// Cooldown needs both `failure_threshold` consecutive failures and a last
/// success inside `cooldown_window`. A channel that never succeeded
/// therefore never cools down.
pub fn evaluate(health: &ChannelHealth, config: &HealthConfig, now: DateTime<Utc>) -> ChannelState {
    if !health.available {
        return ChannelState::Disabled;
    }

    if health.consecutive_failures >= config.failure_threshold {
        if let Some(last_success) = health.last_success {
            if !older_than(last_success, now, config.cooldown_window) {
                return ChannelState::CoolingDown;
            }
        }
    }

    ChannelState::Ready
}

/// Whether the auto-reset sweep should re-enable this channel
pub fn should_auto_reset(health: &ChannelHealth, config: &HealthConfig, now: DateTime<Utc>) -> bool {
    if health.available {
        return false;
    }

    match health.last_success {
        Some(last_success) => older_than(last_success, now, config.auto_reset_after),
        None => false,
    }
}
