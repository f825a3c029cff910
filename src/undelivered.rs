// src/undelivered.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::delivery::DeliveryOrchestrator;
use crate::error::Result;
use crate::notification::{Notification, UndeliveredRecord};
use crate::storage::{RecordId, StorageBackend};

/// Counts from one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Records found in the store
    pub total: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Records already at the retry limit
    pub skipped: usize,
}

/// Durable queue of notifications that exhausted every channel.
///
/// Records are never deleted automatically except after a successful replay.
pub struct UndeliveredStore {
    storage: Arc<dyn StorageBackend>,
    // One replay pass at a time
    replay_gate: Mutex<()>,
}

impl fmt::Debug for UndeliveredStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UndeliveredStore")
            .field("storage", &self.storage)
            .finish()
    }
}

impl UndeliveredStore {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            storage,
            replay_gate: Mutex::new(()),
        }
    }

    /// Store a new record with a zero retry count
    pub async fn persist(&self, notification: &Notification) -> Result<RecordId> {
        let record = UndeliveredRecord::new(notification.clone());
        let id = self.storage.insert_undelivered(&record).await?;
        info!(id = id.as_str(), subject = notification.subject.as_str(), "Stored undelivered notification");
        Ok(id)
    }

    /// Every stored record, oldest first
    pub async fn records(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>> {
        self.storage.list_undelivered().await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.records().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Count one more failed replay of a record
    pub async fn mark_failed(&self, id: &str, record: &mut UndeliveredRecord) -> Result<()> {
        record.retry_count = record.retry_count.saturating_add(1);
        self.storage.update_undelivered(id, record).await
    }

    /// Manually clear a record
    pub async fn remove(&self, id: &str) -> Result<bool> {
        self.storage.delete_undelivered(id).await
    }

    /// Resubmit every record still under `max_retries`.
    ///
    /// A delivered record is deleted; a failed one gets its retry count
    /// bumped. Records at the limit are left alone. Resubmission never
    /// creates a new record nor touches the lifetime undelivered counter.
    pub async fn replay_all(
        &self,
        orchestrator: &DeliveryOrchestrator,
        max_retries: u32,
        pause: Duration,
    ) -> ReplaySummary {
        let _gate = self.replay_gate.lock().await;
        let mut summary = ReplaySummary::default();

        let records = match self.records().await {
            Ok(records) => records,
            Err(e) => {
                error!("Failed to list undelivered notifications: {}", e);
                return summary;
            }
        };
        summary.total = records.len();

        let mut resubmitted = 0usize;
        for (id, mut record) in records {
            if record.retry_count >= max_retries {
                debug!(id = id.as_str(), retry_count = record.retry_count, "Skipping record at retry limit");
                summary.skipped += 1;
                continue;
            }

            if resubmitted > 0 && !pause.is_zero() {
                time::sleep(pause).await;
            }
            resubmitted += 1;

            let tagged = record.notification.with_subject(format!(
                "{} [retry {}/{}]",
                record.notification.subject,
                record.retry_count + 1,
                max_retries
            ));

            if orchestrator.deliver(&tagged, None).await.is_delivered() {
                summary.delivered += 1;
                if let Err(e) = self.remove(&id).await {
                    error!(id = id.as_str(), "Delivered record could not be removed: {}", e);
                }
            } else {
                summary.failed += 1;
                if let Err(e) = self.mark_failed(&id, &mut record).await {
                    error!(id = id.as_str(), "Failed to update retry count: {}", e);
                } else {
                    warn!(
                        id = id.as_str(),
                        retry_count = record.retry_count,
                        max_retries,
                        "Replay failed"
                    );
                }
            }
        }

        info!(
            total = summary.total,
            delivered = summary.delivered,
            failed = summary.failed,
            skipped = summary.skipped,
            "Replay pass finished"
        );
        summary
    }
}
