// library entry
pub mod channels;
pub mod config;
pub mod delivery;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod notification;
pub mod resilience;
pub mod service;
pub mod status;
pub mod storage;
pub mod undelivered;

#[cfg(test)]
pub(crate) mod test_utils;

#[cfg(test)]
mod tests;

// Re-export key components for convenience
pub use channels::{NotificationChannel, SendResult};
pub use config::{ChannelConfig, NotifierConfig, StorageConfig};
pub use delivery::{DeliveryOrchestrator, DeliveryOutcome};
pub use error::{ChannelError, ErrorKind, NotifierError, Result, StorageError};
pub use heartbeat::{render_status_report, HeartbeatMonitor, HeartbeatOutcome};
pub use logging::init as init_logging;
pub use notification::{Notification, UndeliveredRecord};
pub use resilience::{ChannelHealthTracker, RetryPolicy};
pub use service::{NotificationService, StartupReport};
pub use status::{ChannelHealth, SystemStatus};
pub use storage::StorageBackend;
pub use undelivered::{ReplaySummary, UndeliveredStore};
