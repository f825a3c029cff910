// src/delivery.rs

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{self, Instant};
use tracing::{error, info, warn};

use crate::notification::Notification;
use crate::resilience::{ChannelHealthTracker, RetryPolicy};
use crate::undelivered::UndeliveredStore;

/// Terminal state of one delivery run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A channel accepted the notification; later channels were not tried
    Delivered { channel: String, attempts: u32 },
    /// Every eligible channel spent its retry budget
    Exhausted,
    /// The caller's deadline passed; the in-flight attempt was dropped
    DeadlineExceeded,
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }

    fn reason(&self) -> &'static str {
        match self {
            DeliveryOutcome::Delivered { .. } => "delivered",
            DeliveryOutcome::Exhausted => "all channels failed",
            DeliveryOutcome::DeadlineExceeded => "deadline exceeded",
        }
    }
}

/// Ordered failover across the configured channels
#[derive(Debug)]
pub struct DeliveryOrchestrator {
    /// Retry policies in priority order
    policies: Vec<RetryPolicy>,
    health: Arc<ChannelHealthTracker>,
    undelivered: Arc<UndeliveredStore>,
}

impl DeliveryOrchestrator {
    pub fn new(
        policies: Vec<RetryPolicy>,
        health: Arc<ChannelHealthTracker>,
        undelivered: Arc<UndeliveredStore>,
    ) -> Self {
        Self {
            policies,
            health,
            undelivered,
        }
    }

    pub fn health(&self) -> &Arc<ChannelHealthTracker> {
        &self.health
    }

    pub fn undelivered(&self) -> &Arc<UndeliveredStore> {
        &self.undelivered
    }

    /// Deliver through the first channel that accepts the notification.
    ///
    /// Returns false when every channel failed; the notification is then in
    /// the undelivered store and the lifetime counter went up by one.
    pub async fn send(&self, notification: &Notification) -> bool {
        self.send_until(notification, None).await
    }

    /// Like [`send`](Self::send), bounded by `timeout` across all channels
    pub async fn send_within(&self, notification: &Notification, timeout: Duration) -> bool {
        self.send_until(notification, Some(Instant::now() + timeout))
            .await
    }

    async fn send_until(&self, notification: &Notification, deadline: Option<Instant>) -> bool {
        let outcome = self.deliver(notification, deadline).await;
        if outcome.is_delivered() {
            return true;
        }
        self.handle_exhausted(notification, &outcome).await;
        false
    }

    /// Walk the eligible channels without recording an undelivered result.
    ///
    /// Health bookkeeping happens as usual. Replay calls this directly so a
    /// failed resubmission does not produce a second record. With a deadline,
    /// every await up to the last channel attempt is bounded by it; a success
    /// is reported as delivered even when its status write runs out of time.
    pub async fn deliver(
        &self,
        notification: &Notification,
        deadline: Option<Instant>,
    ) -> DeliveryOutcome {
        let now = Utc::now();
        let eligible = match bounded(deadline, self.eligible(now)).await {
            Some(eligible) => eligible,
            None => return self.deadline_passed("before the first channel"),
        };
        if eligible.is_empty() {
            warn!(subject = notification.subject.as_str(), "No eligible channels");
        }

        for name in eligible {
            let Some(policy) = self.policies.iter().find(|p| p.name() == name) else {
                continue;
            };

            let result = match bounded(deadline, policy.send(notification)).await {
                Some(result) => result,
                None => return self.deadline_passed(&name),
            };

            match result {
                Ok(attempts) => {
                    if bounded(deadline, self.health.record_success(&name, Utc::now()))
                        .await
                        .is_none()
                    {
                        warn!(channel = name.as_str(), "Delivery deadline passed while recording success");
                    }
                    info!(
                        channel = name.as_str(),
                        attempts,
                        subject = notification.subject.as_str(),
                        "Notification delivered"
                    );
                    return DeliveryOutcome::Delivered {
                        channel: name,
                        attempts,
                    };
                }
                Err(e) => {
                    let Some(failures) = bounded(deadline, self.health.record_failure(&name)).await else {
                        return self.deadline_passed(&name);
                    };
                    warn!(
                        channel = name.as_str(),
                        consecutive_failures = failures,
                        error = %e,
                        "Channel failed, trying next"
                    );
                }
            }
        }

        DeliveryOutcome::Exhausted
    }

    async fn eligible(&self, now: chrono::DateTime<Utc>) -> Vec<String> {
        self.health.auto_reset_sweep(now).await;
        self.health.eligible_channels(now).await
    }

    fn deadline_passed(&self, at: &str) -> DeliveryOutcome {
        warn!(at, "Delivery deadline passed, skipping remaining channels");
        DeliveryOutcome::DeadlineExceeded
    }

    /// Count the failure and store the notification for replay.
    ///
    /// Runs after the deadline too: a timed out notification still has to
    /// land in the undelivered store. Both writes run side by side and the
    /// record write is bounded by the same timeout as status writes.
    async fn handle_exhausted(&self, notification: &Notification, outcome: &DeliveryOutcome) {
        let persist_timeout = self.health.config().persist_timeout;
        let (count, stored) = tokio::join!(
            self.health.record_exhausted(),
            time::timeout(persist_timeout, self.undelivered.persist(notification)),
        );

        match stored {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Failed to store undelivered notification: {}", e),
            Err(_) => error!(
                "Failed to store undelivered notification: timed out after {:?}",
                persist_timeout
            ),
        }
        error!(
            subject = notification.subject.as_str(),
            reason = outcome.reason(),
            undelivered_count = count,
            "Notification could not be delivered"
        );
    }
}

/// Await `future`, giving up at `deadline` when there is one
async fn bounded<F: Future>(deadline: Option<Instant>, future: F) -> Option<F::Output> {
    match deadline {
        Some(deadline) => time::timeout_at(deadline, future).await.ok(),
        None => Some(future.await),
    }
}
