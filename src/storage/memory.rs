// src/storage/memory.rs

// In-memory storage (for testing and ephemeral usage)
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{NotifierError, Result, StorageError};
use crate::notification::UndeliveredRecord;
use crate::status::SystemStatus;
use crate::storage::{new_record_id, sort_oldest_first, RecordId, StorageBackend};

#[derive(Debug, Default)]
struct MemoryState {
    status: Option<SystemStatus>,
    records: HashMap<RecordId, UndeliveredRecord>,
}

/// In-memory storage backend implementation
///
/// Clones share the same underlying state, which lets a test keep a handle
/// on what a service persisted.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    data: Arc<RwLock<MemoryState>>,
}

fn poisoned() -> NotifierError {
    NotifierError::Internal("memory storage lock poisoned".to_string())
}

impl MemoryStorage {
    /// Creates a new, empty in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn load_status(&self) -> Result<Option<SystemStatus>> {
        let data = self.data.read().map_err(|_| poisoned())?;
        Ok(data.status.clone())
    }

    async fn save_status(&self, status: &SystemStatus) -> Result<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        data.status = Some(status.clone());
        Ok(())
    }

    async fn insert_undelivered(&self, record: &UndeliveredRecord) -> Result<RecordId> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        let id = new_record_id();
        data.records.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn list_undelivered(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>> {
        let data = self.data.read().map_err(|_| poisoned())?;
        let mut records: Vec<_> = data
            .records
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect();
        sort_oldest_first(&mut records);
        Ok(records)
    }

    async fn update_undelivered(&self, id: &str, record: &UndeliveredRecord) -> Result<()> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        match data.records.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(NotifierError::Storage(StorageError::NotFound(id.to_string()))),
        }
    }

    async fn delete_undelivered(&self, id: &str) -> Result<bool> {
        let mut data = self.data.write().map_err(|_| poisoned())?;
        Ok(data.records.remove(id).is_some())
    }
}
