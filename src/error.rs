// for error definitions
use redis;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifierError {
    /// A channel rejected or failed to deliver a notification
    #[error("Channel error: {0}")]
    Channel(ChannelError),

    /// Errors related to the storage backend
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unexpected or internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem errors from the file backend
    #[error("I/O error: {0}")]
    Io(String),

    /// Redis connection errors
    #[error("Redis connection error: {0}")]
    RedisConnection(String),

    // Redis authentication errors
    #[error("Redis authentication error: {0}")]
    RedisAuth(String),

    /// Redis command errors
    #[error("Redis command error: {0}")]
    RedisCommand(String),

    /// Data serialization/deserialization errors
    #[error("Data serialization error: {0}")]
    Serialization(String),

    /// Record not found in storage
    #[error("Record not found: {0}")]
    NotFound(String),
}

/// Kind of failure reported by a channel attempt.
///
/// The kind decides what the retry policy does next:
/// `Timeout` and `NetworkError` back off and retry, `RateLimited` waits a
/// fixed longer period, `AuthFailure` gives up on the channel immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Timeout,
    NetworkError,
    RateLimited,
    AuthFailure,
    PersistenceError,
    Unknown,
}

impl ErrorKind {
    /// Whether another attempt against the same channel can help
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::AuthFailure)
    }

    /// Whether the remaining attempts for the channel should be dropped
    pub fn aborts_channel(self) -> bool {
        matches!(self, ErrorKind::AuthFailure)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::AuthFailure => "auth_failure",
            ErrorKind::PersistenceError => "persistence_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of a single channel attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct ChannelError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ChannelError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFailure, message)
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PersistenceError, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Classify a transport-level reqwest failure
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::network(err.to_string())
        } else {
            Self::unknown(err.to_string())
        }
    }

    /// Classify a non-success HTTP status returned by a channel API
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status.as_u16(), body);
        match status.as_u16() {
            429 => Self::rate_limited(message),
            401 | 403 => Self::auth(message),
            408 | 504 => Self::timeout(message),
            500..=599 => Self::network(message),
            _ => Self::unknown(message),
        }
    }
}

impl From<ChannelError> for NotifierError {
    fn from(err: ChannelError) -> Self {
        NotifierError::Channel(err)
    }
}

// Implement conversions from redis::RedisError to StorageError
impl From<redis::RedisError> for NotifierError {
    fn from(err: redis::RedisError) -> Self {
        match err.kind() {
            redis::ErrorKind::AuthenticationFailed => {
                // authentication errors
                NotifierError::Storage(StorageError::RedisAuth(err.to_string()))
            }
            redis::ErrorKind::IoError | redis::ErrorKind::ClientError => {
                // Connection-related errors
                NotifierError::Storage(StorageError::RedisConnection(err.to_string()))
            }
            _ => {
                // Command/operation related errors
                NotifierError::Storage(StorageError::RedisCommand(err.to_string()))
            }
        }
    }
}

// implement conversions from serde_json::Error to NotifierError
impl From<serde_json::Error> for NotifierError {
    fn from(err: serde_json::Error) -> Self {
        NotifierError::Storage(StorageError::Serialization(err.to_string()))
    }
}

impl From<std::io::Error> for NotifierError {
    fn from(err: std::io::Error) -> Self {
        NotifierError::Storage(StorageError::Io(err.to_string()))
    }
}

// define a Result type alias for convenience
pub type Result<T> = std::result::Result<T, NotifierError>;
