// src/storage/redis.rs

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::config::RedisConfig;
use crate::error::{NotifierError, Result, StorageError};
use crate::notification::UndeliveredRecord;
use crate::status::SystemStatus;
use crate::storage::{new_record_id, sort_oldest_first, RecordId, StorageBackend};
use crate::storage_op;

// The status document lives in one string key, undelivered records in one
// hash keyed by record id.
pub struct RedisStorage {
    client: Client,
    connection: Arc<tokio::sync::Mutex<ConnectionManager>>,
    config: RedisConfig,
}

// Manually implement Debug
impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage")
            .field("url", &self.config.url)
            .field("key_prefix", &self.config.key_prefix)
            .finish()
    }
}

// Manually implement Clone
impl Clone for RedisStorage {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            connection: Arc::clone(&self.connection),
            config: self.config.clone(),
        }
    }
}

impl RedisStorage {
    /// Creates a new Redis storage with the given configuration
    pub async fn new(config: RedisConfig) -> Result<Self> {
        // Open the client - this doesn't actually connect to Redis yet
        let client = Client::open(config.url.as_str())
            .map_err(|e| NotifierError::Storage(StorageError::RedisConnection(e.to_string())))?;

        let connection_future = ConnectionManager::new(client.clone());

        let connection_manager =
            match tokio::time::timeout(config.connection_timeout, connection_future).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(NotifierError::Storage(StorageError::RedisConnection(
                        format!(
                            "Connection to Redis at {} timed out after {:?}",
                            config.url, config.connection_timeout
                        ),
                    )));
                }
            };

        Ok(Self {
            client,
            connection: Arc::new(tokio::sync::Mutex::new(connection_manager)),
            config,
        })
    }

    fn status_key(&self) -> String {
        format!("{}:status", self.config.key_prefix)
    }

    fn undelivered_key(&self) -> String {
        format!("{}:undelivered", self.config.key_prefix)
    }

    /// Run one command bounded by the connection timeout.
    ///
    /// A stalled server must not hold up the caller, which may be a
    /// delivery waiting on a status write.
    async fn bounded<T, F>(&self, operation: &str, command: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.config.connection_timeout, command).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(NotifierError::Storage(StorageError::RedisCommand(format!(
                "Redis {} timed out after {:?}",
                operation, self.config.connection_timeout
            )))),
        }
    }

    /// Ping Redis to check health with timeout
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.lock().await;

        // Apply the connection timeout to the ping operation
        let ping_future = redis::AsyncCommands::ping::<String>(&mut *conn);

        let result = match tokio::time::timeout(self.config.connection_timeout, ping_future).await {
            Ok(inner_result) => inner_result?,
            Err(_) => {
                return Err(NotifierError::Storage(StorageError::RedisCommand(
                    format!(
                        "Redis PING operation timed out after {:?}",
                        self.config.connection_timeout
                    ),
                )));
            }
        };

        if result == "PONG" {
            Ok(())
        } else {
            Err(NotifierError::Storage(StorageError::RedisCommand(
                format!("Unexpected response from Redis PING: {}", result),
            )))
        }
    }
}

#[async_trait]
impl StorageBackend for RedisStorage {
    async fn load_status(&self) -> Result<Option<SystemStatus>> {
        let mut conn = self.connection.lock().await;
        let raw: Option<String> = self.bounded("GET", conn.get(self.status_key())).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_status(&self, status: &SystemStatus) -> Result<()> {
        let started = Instant::now();
        let payload = serde_json::to_string(status)?;
        let key = self.status_key();

        let mut conn = self.connection.lock().await;
        let result: Result<()> = self.bounded("SET", conn.set(&key, payload)).await;
        storage_op!("set", key.as_str(), result, started.elapsed().as_millis() as u64);
        result
    }

    async fn insert_undelivered(&self, record: &UndeliveredRecord) -> Result<RecordId> {
        let id = new_record_id();
        let payload = serde_json::to_string(record)?;

        let mut conn = self.connection.lock().await;
        let _: () = self
            .bounded("HSET", conn.hset(self.undelivered_key(), &id, payload))
            .await?;
        Ok(id)
    }

    async fn list_undelivered(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>> {
        let raw: HashMap<String, String> = {
            let mut conn = self.connection.lock().await;
            self.bounded("HGETALL", conn.hgetall(self.undelivered_key()))
                .await?
        };

        let mut records = Vec::with_capacity(raw.len());
        for (id, json) in raw {
            match serde_json::from_str::<UndeliveredRecord>(&json) {
                Ok(record) => records.push((id, record)),
                Err(e) => warn!(id = id.as_str(), error = %e, "Skipping unreadable undelivered record"),
            }
        }

        sort_oldest_first(&mut records);
        Ok(records)
    }

    async fn update_undelivered(&self, id: &str, record: &UndeliveredRecord) -> Result<()> {
        let payload = serde_json::to_string(record)?;
        let key = self.undelivered_key();

        let mut conn = self.connection.lock().await;
        let exists: bool = self.bounded("HEXISTS", conn.hexists(&key, id)).await?;
        if !exists {
            return Err(NotifierError::Storage(StorageError::NotFound(id.to_string())));
        }
        let _: () = self.bounded("HSET", conn.hset(&key, id, payload)).await?;
        Ok(())
    }

    async fn delete_undelivered(&self, id: &str) -> Result<bool> {
        let mut conn = self.connection.lock().await;
        let removed: i64 = self
            .bounded("HDEL", conn.hdel(self.undelivered_key(), id))
            .await?;
        Ok(removed > 0)
    }
}
