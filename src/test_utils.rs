// src/test_utils.rs

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::channels::{NotificationChannel, SendResult};
use crate::config::{ChannelConfig, HealthConfig, NotifierConfig, RateLimitConfig, ReplayConfig};
use crate::error::{ChannelError, ErrorKind, NotifierError, Result, StorageError};
use crate::notification::{Notification, UndeliveredRecord};
use crate::service::NotificationService;
use crate::status::SystemStatus;
use crate::storage::{MemoryStorage, RecordId, StorageBackend};

/// Scripted channel: pops queued outcomes, then falls back to a default
#[derive(Debug)]
pub struct MockChannel {
    name: String,
    script: Mutex<VecDeque<SendResult>>,
    default: Mutex<SendResult>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    received: Mutex<Vec<Notification>>,
}

impl MockChannel {
    fn with_default(name: &str, default: SendResult) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(default),
            delay: None,
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding(name: &str) -> Arc<Self> {
        Arc::new(Self::with_default(name, Ok(())))
    }

    pub fn failing(name: &str, kind: ErrorKind) -> Arc<Self> {
        Arc::new(Self::with_default(
            name,
            Err(ChannelError::new(kind, format!("{name} is down"))),
        ))
    }

    /// Outcomes returned in order, then success
    pub fn scripted(name: &str, outcomes: Vec<SendResult>) -> Arc<Self> {
        let channel = Self::with_default(name, Ok(()));
        *channel.script.lock().unwrap() = outcomes.into();
        Arc::new(channel)
    }

    /// Channel whose every call takes `delay` before succeeding
    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        let mut channel = Self::with_default(name, Ok(()));
        channel.delay = Some(delay);
        Arc::new(channel)
    }

    pub fn set_default(&self, outcome: SendResult) {
        *self.default.lock().unwrap() = outcome;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for MockChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, notification: &Notification) -> SendResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = {
            let mut script = self.script.lock().unwrap();
            match script.pop_front() {
                Some(outcome) => outcome,
                None => self.default.lock().unwrap().clone(),
            }
        };
        if outcome.is_ok() {
            self.received.lock().unwrap().push(notification.clone());
        }
        outcome
    }
}

/// Memory storage whose writes can be switched to fail or to hang
#[derive(Debug, Default)]
pub struct FailingStorage {
    inner: MemoryStorage,
    fail_writes: AtomicBool,
    hang_writes: AtomicBool,
    status_writes: AtomicUsize,
}

impl FailingStorage {
    pub fn new(fail_writes: bool) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStorage::new(),
            fail_writes: AtomicBool::new(fail_writes),
            ..Self::default()
        })
    }

    /// Storage whose status and record writes never complete
    pub fn hanging() -> Arc<Self> {
        let storage = Self::new(false);
        storage.set_hang_writes(true);
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_hang_writes(&self, hang: bool) {
        self.hang_writes.store(hang, Ordering::SeqCst);
    }

    /// Number of `save_status` calls that reached this storage
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(NotifierError::Storage(StorageError::Io("disk full".to_string())))
        } else {
            Ok(())
        }
    }

    async fn hang_if_set(&self) {
        if self.hang_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
    }
}

#[async_trait]
impl StorageBackend for FailingStorage {
    async fn load_status(&self) -> Result<Option<SystemStatus>> {
        self.inner.load_status().await
    }

    async fn save_status(&self, status: &SystemStatus) -> Result<()> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        self.hang_if_set().await;
        self.check()?;
        self.inner.save_status(status).await
    }

    async fn insert_undelivered(&self, record: &UndeliveredRecord) -> Result<RecordId> {
        self.hang_if_set().await;
        self.check()?;
        self.inner.insert_undelivered(record).await
    }

    async fn list_undelivered(&self) -> Result<Vec<(RecordId, UndeliveredRecord)>> {
        self.inner.list_undelivered().await
    }

    async fn update_undelivered(&self, id: &str, record: &UndeliveredRecord) -> Result<()> {
        self.check()?;
        self.inner.update_undelivered(id, record).await
    }

    async fn delete_undelivered(&self, id: &str) -> Result<bool> {
        self.check()?;
        self.inner.delete_undelivered(id).await
    }
}

/// Channel profile with millisecond backoff and no jitter
pub fn fast_channel(name: &str, priority: u32, attempts: u32) -> ChannelConfig {
    ChannelConfig::new(name, priority)
        .with_attempts(attempts)
        .with_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(5))
        .without_jitter()
}

/// Configuration for the given mocks, in the order given, with tiny delays
pub fn fast_config(channels: &[Arc<MockChannel>], attempts: u32) -> NotifierConfig {
    NotifierConfig {
        channels: channels
            .iter()
            .enumerate()
            .map(|(i, c)| fast_channel(c.name(), i as u32, attempts))
            .collect(),
        rate_limit: RateLimitConfig {
            wait: Duration::from_millis(20),
            jitter: Duration::ZERO,
        },
        replay: ReplayConfig {
            max_retries: 3,
            pause: Duration::ZERO,
        },
        health: HealthConfig {
            persist_timeout: Duration::from_millis(100),
            ..HealthConfig::default()
        },
        ..NotifierConfig::default()
    }
}

/// Service over the mocks and the given storage
pub async fn build_service(
    channels: &[Arc<MockChannel>],
    storage: Arc<dyn StorageBackend>,
) -> NotificationService {
    let config = fast_config(channels, 2);
    let dyn_channels: Vec<Arc<dyn NotificationChannel>> = channels
        .iter()
        .map(|c| Arc::clone(c) as Arc<dyn NotificationChannel>)
        .collect();
    NotificationService::new(config, dyn_channels, storage)
        .await
        .unwrap()
}

/// One-shot HTTP server answering every request with `status_line` and
/// `body`. Returns its base URL.
pub async fn spawn_http_stub(status_line: &str, body: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let response = format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let _ = read_request(&mut socket).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}

// Reads headers and a content-length body so the client sees a clean close
async fn read_request(socket: &mut tokio::net::TcpStream) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];

    let header_end = loop {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_ascii_lowercase();
    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    Ok(())
}
