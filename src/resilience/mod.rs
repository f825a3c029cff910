// src/resilience/mod.rs
//! Failure handling around the delivery channels.
//!
//! 1. **Exponential backoff** - per-attempt delay schedule with jitter
//! 2. **Retry policy** - one channel's attempt loop, honoring rate limits and auth failures
//! 3. **Cooldown** - whether a channel may be attempted given its health record
//! 4. **Health tracking** - serialized bookkeeping of the persisted status document

mod cooldown;
mod exponential_backoff;
mod health_tracker;
mod retry_policy;

#[cfg(test)]
mod tests;

// Re-export key components
pub use cooldown::{evaluate, should_auto_reset, ChannelState};
pub use exponential_backoff::{ExponentialBackoff, JITTER_MAX, JITTER_MIN};
pub use health_tracker::ChannelHealthTracker;
pub use retry_policy::RetryPolicy;
