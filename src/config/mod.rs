// src/config/mod.rs

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{NotifierError, Result};

/// Static retry profile of one channel.
///
/// Created at startup and never mutated. Channels are attempted in
/// ascending `priority` order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, also the key in the persisted status document
    pub name: String,

    /// Position in the failover order (lower goes first)
    pub priority: u32,

    /// Attempts made against this channel per send
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt
    #[serde(default = "default_base_delay", with = "duration_serde")]
    pub base_delay: Duration,

    /// Multiplier applied for every further attempt
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    /// Upper bound on any single backoff delay
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Whether to apply the +/-20% jitter to backoff delays
    #[serde(default = "default_use_jitter")]
    pub use_jitter: bool,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_use_jitter() -> bool {
    true
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            max_attempts: default_max_attempts(),
            base_delay: default_base_delay(),
            backoff_factor: default_backoff_factor(),
            max_delay: default_max_delay(),
            use_jitter: default_use_jitter(),
        }
    }

    pub fn with_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, base_delay: Duration, factor: f64, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.backoff_factor = factor;
        self.max_delay = max_delay;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Push-message API profile
    pub fn line() -> Self {
        Self::new("line", 0).with_backoff(Duration::from_secs(2), 2.0, Duration::from_secs(60))
    }

    /// Bot API profile
    pub fn telegram() -> Self {
        Self::new("telegram", 1).with_backoff(
            Duration::from_secs(1),
            2.0,
            Duration::from_secs(30),
        )
    }

    /// Email profile, fewer and slower attempts
    pub fn email() -> Self {
        Self::new("email", 2)
            .with_attempts(2)
            .with_backoff(Duration::from_secs(3), 1.5, Duration::from_secs(60))
    }

    /// Local fallback sink, a single attempt is enough
    pub fn file() -> Self {
        Self::new("file", 3)
            .with_attempts(1)
            .with_backoff(Duration::ZERO, 1.0, Duration::ZERO)
    }
}

/// Wait forced by a `RateLimited` channel response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_rate_limit_wait", with = "duration_serde")]
    pub wait: Duration,

    /// Upper bound of the random extra wait added on top
    #[serde(default = "default_rate_limit_jitter", with = "duration_serde")]
    pub jitter: Duration,
}

fn default_rate_limit_wait() -> Duration {
    Duration::from_secs(30)
}

fn default_rate_limit_jitter() -> Duration {
    Duration::from_secs(10)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            wait: default_rate_limit_wait(),
            jitter: default_rate_limit_jitter(),
        }
    }
}

/// Cooldown and auto-reset thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Consecutive failures after which a channel may cool down
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How recent the last success must be for the cooldown to apply
    #[serde(default = "default_cooldown_window", with = "duration_serde")]
    pub cooldown_window: Duration,

    /// Age of the last success after which a disabled channel is re-enabled
    #[serde(default = "default_auto_reset_after", with = "duration_serde")]
    pub auto_reset_after: Duration,

    /// Upper bound on one status or undelivered-record write
    #[serde(default = "default_persist_timeout", with = "duration_serde")]
    pub persist_timeout: Duration,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_window() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_auto_reset_after() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_persist_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_window: default_cooldown_window(),
            auto_reset_after: default_auto_reset_after(),
            persist_timeout: default_persist_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Minimum time between two heartbeats
    #[serde(default = "default_heartbeat_interval", with = "duration_serde")]
    pub interval: Duration,

    /// Startup sends a heartbeat when the last one is older than this
    #[serde(default = "default_startup_interval", with = "duration_serde")]
    pub startup_interval: Duration,
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_startup_interval() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: default_heartbeat_interval(),
            startup_interval: default_startup_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Records replayed this many times are skipped from then on
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between two replayed records
    #[serde(default = "default_replay_pause", with = "duration_serde")]
    pub pause: Duration,
}

fn default_max_retries() -> u32 {
    3
}

fn default_replay_pause() -> Duration {
    Duration::from_secs(5)
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            pause: default_replay_pause(),
        }
    }
}

/// Timeouts shared by every HTTP channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

/// Configuration for Redis storage backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Key prefix for the status document and the undelivered hash
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Connection timeout
    #[serde(default = "default_conn_timeout", with = "duration_serde")]
    pub connection_timeout: Duration,
}

fn default_key_prefix() -> String {
    "notifier".to_string()
}

fn default_conn_timeout() -> Duration {
    Duration::from_secs(2)
}

/// Where the status document and undelivered records live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StorageConfig {
    File { dir: PathBuf },
    Redis(RedisConfig),
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::File {
            dir: PathBuf::from("cache"),
        }
    }
}

/// Credentials for the push-message API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineSettings {
    pub access_token: String,
    pub user_id: String,
    #[serde(default = "default_line_endpoint")]
    pub endpoint: String,
}

pub(crate) fn default_line_endpoint() -> String {
    "https://api.line.me/v2/bot/message/push".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

pub(crate) fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

/// Credentials for the transactional email HTTP API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailSettings {
    pub api_key: String,
    pub sender: String,
    pub receiver: String,
    #[serde(default = "default_email_endpoint")]
    pub endpoint: String,
}

pub(crate) fn default_email_endpoint() -> String {
    "https://api.resend.com/emails".to_string()
}

/// Everything the notification service needs at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub channels: Vec<ChannelConfig>,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub line: Option<LineSettings>,
    #[serde(default)]
    pub telegram: Option<TelegramSettings>,
    #[serde(default)]
    pub email: Option<EmailSettings>,
    /// Directory the local fallback sink writes into
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: PathBuf,
}

fn default_fallback_dir() -> PathBuf {
    PathBuf::from("logs/notifications")
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channels: vec![
                ChannelConfig::line(),
                ChannelConfig::telegram(),
                ChannelConfig::email(),
                ChannelConfig::file(),
            ],
            rate_limit: RateLimitConfig::default(),
            health: HealthConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            replay: ReplayConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            line: None,
            telegram: None,
            email: None,
            fallback_dir: default_fallback_dir(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl NotifierConfig {
    /// Build the configuration from the process environment.
    ///
    /// A channel whose credentials are absent is still configured; its sends
    /// fail with an auth error so the orchestrator moves on to the next one.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let (Some(access_token), Some(user_id)) = (
            non_empty_var("LINE_CHANNEL_ACCESS_TOKEN"),
            non_empty_var("LINE_USER_ID"),
        ) {
            config.line = Some(LineSettings {
                access_token,
                user_id,
                endpoint: default_line_endpoint(),
            });
        }

        if let (Some(bot_token), Some(chat_id)) = (
            non_empty_var("TELEGRAM_BOT_TOKEN"),
            non_empty_var("TELEGRAM_CHAT_ID"),
        ) {
            config.telegram = Some(TelegramSettings {
                bot_token,
                chat_id,
                api_base: default_telegram_api_base(),
            });
        }

        if let (Some(api_key), Some(sender), Some(receiver)) = (
            non_empty_var("EMAIL_API_KEY"),
            non_empty_var("EMAIL_SENDER"),
            non_empty_var("EMAIL_RECEIVER"),
        ) {
            config.email = Some(EmailSettings {
                api_key,
                sender,
                receiver,
                endpoint: non_empty_var("EMAIL_API_URL").unwrap_or_else(default_email_endpoint),
            });
        }

        if let Some(url) = non_empty_var("NOTIFIER_REDIS_URL") {
            config.storage = StorageConfig::Redis(RedisConfig {
                url,
                key_prefix: default_key_prefix(),
                connection_timeout: default_conn_timeout(),
            });
        } else if let Some(dir) = non_empty_var("NOTIFIER_STATE_DIR") {
            config.storage = StorageConfig::File {
                dir: PathBuf::from(dir),
            };
        }

        if let Some(dir) = non_empty_var("NOTIFIER_FALLBACK_DIR") {
            config.fallback_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the orchestrator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(NotifierError::Config(
                "at least one channel must be configured".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for channel in &self.channels {
            if !seen.insert(channel.name.as_str()) {
                return Err(NotifierError::Config(format!(
                    "channel '{}' is configured twice",
                    channel.name
                )));
            }
            if channel.max_attempts == 0 {
                return Err(NotifierError::Config(format!(
                    "channel '{}' needs at least one attempt",
                    channel.name
                )));
            }
            if !(channel.backoff_factor.is_finite() && channel.backoff_factor > 0.0) {
                return Err(NotifierError::Config(format!(
                    "channel '{}' has an invalid backoff factor {}",
                    channel.name, channel.backoff_factor
                )));
            }
        }

        if self.health.persist_timeout.is_zero() {
            return Err(NotifierError::Config(
                "persist timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Channel configs sorted into failover order
    pub fn ordered_channels(&self) -> Vec<ChannelConfig> {
        let mut channels = self.channels.clone();
        channels.sort_by_key(|c| c.priority);
        channels
    }
}

// Helper module to serialize/deserialize Duration with serde
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
