// src/service.rs

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tokio::time;
use tracing::{debug, info};

use crate::channels::{self, NotificationChannel};
use crate::config::NotifierConfig;
use crate::delivery::DeliveryOrchestrator;
use crate::error::{NotifierError, Result};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatOutcome};
use crate::notification::{Notification, UndeliveredRecord};
use crate::resilience::{ChannelHealthTracker, RetryPolicy};
use crate::status::SystemStatus;
use crate::storage::{self, RecordId, StorageBackend};
use crate::undelivered::{ReplaySummary, UndeliveredStore};

/// What [`NotificationService::startup`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartupReport {
    /// Channels re-enabled by the auto-reset sweep
    pub reset_channels: Vec<String>,
    pub heartbeat: HeartbeatOutcome,
    pub replay: ReplaySummary,
}

/// Producer-facing entry point wiring channels, health and storage together
#[derive(Debug)]
pub struct NotificationService {
    config: NotifierConfig,
    orchestrator: Arc<DeliveryOrchestrator>,
    heartbeat: HeartbeatMonitor,
    /// Generation of the maintenance task allowed to run; bumping it stops
    /// whichever task is current
    maintenance_generation: Arc<AtomicU64>,
}

impl NotificationService {
    /// Assemble a service from already built channels.
    ///
    /// Every configured channel needs an implementation with the same name.
    pub async fn new(
        config: NotifierConfig,
        channels: Vec<Arc<dyn NotificationChannel>>,
        storage: Arc<dyn StorageBackend>,
    ) -> Result<Self> {
        config.validate()?;

        let mut policies = Vec::with_capacity(config.channels.len());
        for channel_config in config.ordered_channels() {
            let channel = channels
                .iter()
                .find(|c| c.name() == channel_config.name)
                .cloned()
                .ok_or_else(|| {
                    NotifierError::Config(format!(
                        "channel '{}' is configured but was not provided",
                        channel_config.name
                    ))
                })?;
            policies.push(RetryPolicy::new(
                channel,
                channel_config,
                config.rate_limit.clone(),
            ));
        }

        let priority = policies.iter().map(|p| p.name().to_string()).collect();
        let health = Arc::new(
            ChannelHealthTracker::load(priority, config.health.clone(), Arc::clone(&storage)).await,
        );
        let undelivered = Arc::new(UndeliveredStore::new(storage));
        let orchestrator = Arc::new(DeliveryOrchestrator::new(policies, health, undelivered));
        let heartbeat = HeartbeatMonitor::new(Arc::clone(&orchestrator));

        Ok(Self {
            config,
            orchestrator,
            heartbeat,
            maintenance_generation: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Build channels and open storage from the configuration
    pub async fn from_config(config: NotifierConfig) -> Result<Self> {
        let channels = channels::build_channels(&config)?;
        let storage = storage::open(&config.storage).await?;
        Self::new(config, channels, storage).await
    }

    pub fn config(&self) -> &NotifierConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<DeliveryOrchestrator> {
        &self.orchestrator
    }

    /// Deliver a message, true when some channel accepted it
    pub async fn send(&self, subject: &str, body: &str, html_body: Option<&str>, urgent: bool) -> bool {
        let mut notification = Notification::new(subject, body).urgent(urgent);
        if let Some(html) = html_body {
            notification = notification.with_html(html);
        }
        self.send_notification(&notification).await
    }

    pub async fn send_notification(&self, notification: &Notification) -> bool {
        self.orchestrator.send(notification).await
    }

    /// Deliver with a deadline across every channel and attempt
    pub async fn send_within(&self, notification: &Notification, timeout: Duration) -> bool {
        self.orchestrator.send_within(notification, timeout).await
    }

    /// Replay with the configured retry limit and pause
    pub async fn replay_undelivered(&self) -> ReplaySummary {
        self.replay_with(self.config.replay.max_retries, self.config.replay.pause)
            .await
    }

    pub async fn replay_with(&self, max_retries: u32, pause: Duration) -> ReplaySummary {
        self.orchestrator
            .undelivered()
            .replay_all(&self.orchestrator, max_retries, pause)
            .await
    }

    pub async fn maybe_send_heartbeat(&self) -> HeartbeatOutcome {
        self.heartbeat
            .maybe_send_heartbeat(Utc::now(), self.config.heartbeat.interval)
            .await
    }

    /// Run once after the process comes up.
    ///
    /// Re-enables stale disabled channels, sends a heartbeat when none went
    /// out within the startup interval, then replays undelivered records.
    pub async fn startup(&self) -> StartupReport {
        let now = Utc::now();
        let reset_channels = self.orchestrator.health().auto_reset_sweep(now).await;
        let heartbeat = self
            .heartbeat
            .maybe_send_heartbeat(now, self.config.heartbeat.startup_interval)
            .await;
        let replay = self.replay_undelivered().await;

        info!(
            reset = reset_channels.len(),
            heartbeat = ?heartbeat,
            replayed = replay.delivered,
            "Startup maintenance finished"
        );

        StartupReport {
            reset_channels,
            heartbeat,
            replay,
        }
    }

    /// Start the background maintenance task.
    ///
    /// Starting again replaces the running task, which stops after its
    /// current pass; at most one loop runs at a time.
    pub fn start_maintenance(self: &Arc<Self>, every: Duration) -> task::JoinHandle<()> {
        let service = Arc::clone(self);
        let generation = Arc::clone(&self.maintenance_generation);
        let mine = generation.fetch_add(1, Ordering::SeqCst) + 1;

        task::spawn(async move {
            // interval() panics on a zero period
            let mut interval_timer = time::interval(every.max(Duration::from_millis(1)));

            loop {
                interval_timer.tick().await;

                // Check if we should stop
                if generation.load(Ordering::SeqCst) != mine {
                    break;
                }

                service.maybe_send_heartbeat().await;
                service.replay_undelivered().await;
            }

            debug!(generation = mine, "Maintenance task stopped");
        })
    }

    /// Stop the maintenance task after its current pass
    pub fn stop_maintenance(&self) {
        self.maintenance_generation.fetch_add(1, Ordering::SeqCst);
    }

    pub async fn status(&self) -> SystemStatus {
        self.orchestrator.health().snapshot().await
    }

    /// Take a channel out of rotation until re-enabled or auto-reset
    pub async fn disable_channel(&self, name: &str) -> bool {
        self.orchestrator.health().set_available(name, false).await
    }

    pub async fn enable_channel(&self, name: &str) -> bool {
        self.orchestrator.health().set_available(name, true).await
    }

    pub async fn undelivered_records(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>> {
        self.orchestrator.undelivered().records().await
    }
}
