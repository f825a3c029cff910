use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::cooldown::{self, ChannelState};
use crate::config::HealthConfig;
use crate::status::SystemStatus;
use crate::storage::StorageBackend;

/// Owner of the process-wide [`SystemStatus`].
///
/// Every read-modify sequence runs under one async mutex, so concurrent
/// sends never lose an update. The lock is never held across storage or
/// channel I/O: each change bumps a version, and one writer at a time saves
/// the newest snapshot, bounded by `persist_timeout`.
pub struct ChannelHealthTracker {
    /// Channel names in failover order
    priority: Vec<String>,
    config: HealthConfig,
    status: Mutex<SystemStatus>,
    /// Bumped under the status lock on every change
    version: AtomicU64,
    /// Last version handed to storage
    written: Mutex<u64>,
    storage: Arc<dyn StorageBackend>,
}

impl fmt::Debug for ChannelHealthTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelHealthTracker")
            .field("priority", &self.priority)
            .field("config", &self.config)
            .finish()
    }
}

impl ChannelHealthTracker {
    /// Start from a known status document
    pub fn new(
        priority: Vec<String>,
        config: HealthConfig,
        mut status: SystemStatus,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        status.ensure_channels(priority.iter().map(String::as_str));
        Self {
            priority,
            config,
            status: Mutex::new(status),
            version: AtomicU64::new(0),
            written: Mutex::new(0),
            storage,
        }
    }

    /// Restore the status persisted by a previous run.
    ///
    /// An unreadable document is logged and replaced by a fresh one; the
    /// service must come up even when its state is damaged.
    pub async fn load(
        priority: Vec<String>,
        config: HealthConfig,
        storage: Arc<dyn StorageBackend>,
    ) -> Self {
        let status = match storage.load_status().await {
            Ok(Some(status)) => {
                debug!("Loaded persisted notifier status");
                status
            }
            Ok(None) => SystemStatus::default(),
            Err(e) => {
                error!("Failed to load notifier status, starting fresh: {}", e);
                SystemStatus::default()
            }
        };
        Self::new(priority, config, status, storage)
    }

    pub fn priority(&self) -> &[String] {
        &self.priority
    }

    pub fn config(&self) -> &HealthConfig {
        &self.config
    }

    /// Copy of the current status document
    pub async fn snapshot(&self) -> SystemStatus {
        self.status.lock().await.clone()
    }

    /// Channels that may be attempted now, in priority order
    pub async fn eligible_channels(&self, now: DateTime<Utc>) -> Vec<String> {
        let status = self.status.lock().await;
        self.priority
            .iter()
            .filter(|name| {
                let state = status
                    .channel(name)
                    .map(|health| cooldown::evaluate(health, &self.config, now))
                    .unwrap_or(ChannelState::Ready);
                if !state.is_eligible() {
                    debug!(channel = name.as_str(), state = ?state, "Skipping channel");
                }
                state.is_eligible()
            })
            .cloned()
            .collect()
    }

    /// A channel delivered: clear its failures and stamp the notification time
    pub async fn record_success(&self, channel: &str, now: DateTime<Utc>) {
        self.mutate(|status| {
            let health = status.channel_mut(channel);
            health.last_success = Some(now);
            health.consecutive_failures = 0;
            health.available = true;
            status.last_notification = Some(now);
        })
        .await;
    }

    /// A channel exhausted its retry budget, returns the new failure streak
    pub async fn record_failure(&self, channel: &str) -> u32 {
        self.mutate(|status| {
            let health = status.channel_mut(channel);
            health.consecutive_failures = health.consecutive_failures.saturating_add(1);
            health.consecutive_failures
        })
        .await
    }

    /// Re-enable disabled channels whose last success is old enough.
    ///
    /// Only writes the status document when a channel was reset.
    pub async fn auto_reset_sweep(&self, now: DateTime<Utc>) -> Vec<String> {
        let reset = {
            let mut status = self.status.lock().await;
            let mut reset = Vec::new();
            for (name, health) in status.channels.iter_mut() {
                if cooldown::should_auto_reset(health, &self.config, now) {
                    health.available = true;
                    health.consecutive_failures = 0;
                    reset.push(name.clone());
                }
            }
            if !reset.is_empty() {
                self.version.fetch_add(1, Ordering::SeqCst);
            }
            reset
        };

        if reset.is_empty() {
            return reset;
        }
        for name in &reset {
            info!(channel = name.as_str(), "Channel re-enabled by auto-reset");
        }
        self.persist().await;
        reset
    }

    /// Operator switch for a channel's `available` flag
    pub async fn set_available(&self, channel: &str, available: bool) -> bool {
        if !self.priority.iter().any(|name| name == channel) {
            warn!(channel, "Unknown channel, availability unchanged");
            return false;
        }

        self.mutate(|status| status.channel_mut(channel).available = available)
            .await;
        info!(channel, available, "Channel availability changed");
        true
    }

    /// Count a notification that exhausted every channel
    pub async fn record_exhausted(&self) -> u64 {
        self.mutate(|status| {
            status.undelivered_count = status.undelivered_count.saturating_add(1);
            status.undelivered_count
        })
        .await
    }

    pub async fn record_heartbeat(&self, now: DateTime<Utc>) {
        self.mutate(|status| status.last_heartbeat = Some(now)).await;
    }

    /// Apply `f` under the lock, then persist once the lock is released
    async fn mutate<T>(&self, f: impl FnOnce(&mut SystemStatus) -> T) -> T {
        let out = {
            let mut status = self.status.lock().await;
            let out = f(&mut status);
            self.version.fetch_add(1, Ordering::SeqCst);
            out
        };
        self.persist().await;
        out
    }

    /// Save the newest status unless another writer is already at it.
    ///
    /// A busy writer re-checks the version when it finishes and saves again,
    /// so the last change always reaches storage. A failed or timed out write
    /// is logged and swallowed: the in-memory state stays authoritative and
    /// the next change writes it again.
    async fn persist(&self) {
        loop {
            let Ok(mut written) = self.written.try_lock() else {
                return;
            };

            let (version, snapshot) = {
                let status = self.status.lock().await;
                (self.version.load(Ordering::SeqCst), status.clone())
            };
            if version <= *written {
                return;
            }

            let saved = match time::timeout(self.config.persist_timeout, self.storage.save_status(&snapshot)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    error!("Failed to persist notifier status: {}", e);
                    false
                }
                Err(_) => {
                    error!(
                        "Failed to persist notifier status: timed out after {:?}",
                        self.config.persist_timeout
                    );
                    false
                }
            };
            *written = version;
            drop(written);

            if !saved || self.version.load(Ordering::SeqCst) == version {
                return;
            }
        }
    }
}
