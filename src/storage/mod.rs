// src/storage/mod.rs

pub mod file;
pub mod memory;
pub mod redis;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use redis::RedisStorage;

#[cfg(test)]
mod tests;

use super::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::notification::UndeliveredRecord;
use crate::status::SystemStatus;

/// Identifier of a stored undelivered record
pub type RecordId = String;

/// Core trait that all storage backends must implement
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    // Reads the persisted status document, None when nothing was saved yet
    async fn load_status(&self) -> Result<Option<SystemStatus>>;

    // Replaces the persisted status document
    async fn save_status(&self, status: &SystemStatus) -> Result<()>;

    // Stores a new undelivered record and returns its id
    async fn insert_undelivered(&self, record: &UndeliveredRecord) -> Result<RecordId>;

    // Lists every stored undelivered record, oldest first
    async fn list_undelivered(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>>;

    // Overwrites an existing undelivered record
    async fn update_undelivered(&self, id: &str, record: &UndeliveredRecord) -> Result<()>;

    // Deletes an undelivered record, false if it did not exist
    async fn delete_undelivered(&self, id: &str) -> Result<bool>;
}

/// Open the backend described by `config`
pub async fn open(config: &StorageConfig) -> Result<Arc<dyn StorageBackend>> {
    let backend: Arc<dyn StorageBackend> = match config {
        StorageConfig::File { dir } => Arc::new(FileStorage::new(dir.clone())),
        StorageConfig::Redis(redis_config) => Arc::new(RedisStorage::new(redis_config.clone()).await?),
        StorageConfig::Memory => Arc::new(MemoryStorage::new()),
    };
    Ok(backend)
}

/// Fresh record id; sorts by creation second, the suffix breaks ties
pub(crate) fn new_record_id() -> RecordId {
    let id = Uuid::new_v4().simple().to_string();
    format!(
        "undelivered_{}_{}",
        Utc::now().format("%Y%m%d_%H%M%S"),
        &id[..12]
    )
}

pub(crate) fn sort_oldest_first(records: &mut [(RecordId, UndeliveredRecord)]) {
    records.sort_by(|(a_id, a), (b_id, b)| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a_id.cmp(b_id))
    });
}
