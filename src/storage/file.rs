// src/storage/file.rs

// JSON files on local disk: one status document plus one file per
// undelivered record. Writes go through a temp file and a rename so a crash
// never leaves a half-written document behind.
use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::warn;

use crate::error::{NotifierError, Result, StorageError};
use crate::notification::UndeliveredRecord;
use crate::status::SystemStatus;
use crate::storage::{new_record_id, sort_oldest_first, RecordId, StorageBackend};
use crate::storage_op;

const STATUS_FILE: &str = "notifier_status.json";
const UNDELIVERED_DIR: &str = "undelivered";
const RECORD_PREFIX: &str = "undelivered_";
const RECORD_SUFFIX: &str = ".json";

/// File-backed storage rooted at a state directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join(STATUS_FILE)
    }

    pub fn undelivered_dir(&self) -> PathBuf {
        self.root.join(UNDELIVERED_DIR)
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        // ids are file stems, never paths
        if id.is_empty() || id.contains(['/', '\\']) || id.contains("..") {
            return Err(NotifierError::Storage(StorageError::NotFound(id.to_string())));
        }
        Ok(self.undelivered_dir().join(format!("{id}{RECORD_SUFFIX}")))
    }

    async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let started = Instant::now();
        let result = Self::write_atomic_inner(path, value).await;
        let key = path.display().to_string();
        storage_op!(
            "write",
            key.as_str(),
            result,
            started.elapsed().as_millis() as u64
        );
        result
    }

    async fn write_atomic_inner<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn read_record(path: &Path) -> Result<UndeliveredRecord> {
        let bytes = fs::read(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl StorageBackend for FileStorage {
    async fn load_status(&self) -> Result<Option<SystemStatus>> {
        match fs::read(self.status_path()).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save_status(&self, status: &SystemStatus) -> Result<()> {
        Self::write_atomic(&self.status_path(), status).await
    }

    async fn insert_undelivered(&self, record: &UndeliveredRecord) -> Result<RecordId> {
        let id = new_record_id();
        Self::write_atomic(&self.record_path(&id)?, record).await?;
        Ok(id)
    }

    async fn list_undelivered(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>> {
        let mut entries = match fs::read_dir(self.undelivered_dir()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(id) = name
                .strip_suffix(RECORD_SUFFIX)
                .filter(|stem| stem.starts_with(RECORD_PREFIX))
            else {
                continue;
            };

            match Self::read_record(&entry.path()).await {
                Ok(record) => records.push((id.to_string(), record)),
                // Leave unreadable files in place for an operator to inspect
                Err(e) => warn!(file = name, error = %e, "Skipping unreadable undelivered record"),
            }
        }

        sort_oldest_first(&mut records);
        Ok(records)
    }

    async fn update_undelivered(&self, id: &str, record: &UndeliveredRecord) -> Result<()> {
        let path = self.record_path(id)?;
        if !fs::try_exists(&path).await? {
            return Err(NotifierError::Storage(StorageError::NotFound(id.to_string())));
        }
        Self::write_atomic(&path, record).await
    }

    async fn delete_undelivered(&self, id: &str) -> Result<bool> {
        match fs::remove_file(self.record_path(id)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
