// src/status.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mutable health bookkeeping for one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelHealth {
    #[serde(default)]
    pub last_success: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl Default for ChannelHealth {
    fn default() -> Self {
        Self {
            last_success: None,
            consecutive_failures: 0,
            available: true,
        }
    }
}

/// Process-wide status document.
///
/// Loaded at startup, mutated after every attempt and persisted after every
/// mutation. `undelivered_count` is a lifetime counter, never decremented.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatus {
    #[serde(default)]
    pub channels: BTreeMap<String, ChannelHealth>,
    #[serde(default)]
    pub last_notification: Option<DateTime<Utc>>,
    #[serde(default)]
    pub undelivered_count: u64,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
}

impl SystemStatus {
    /// Fresh status with a healthy entry for every named channel
    pub fn for_channels<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut status = Self::default();
        status.ensure_channels(names);
        status
    }

    /// Add healthy entries for channels missing from a loaded document
    pub fn ensure_channels<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        for name in names {
            self.channels.entry(name.to_string()).or_default();
        }
    }

    pub fn channel(&self, name: &str) -> Option<&ChannelHealth> {
        self.channels.get(name)
    }

    pub(crate) fn channel_mut(&mut self, name: &str) -> &mut ChannelHealth {
        self.channels.entry(name.to_string()).or_default()
    }
}
