// src/heartbeat.rs

use chrono::{DateTime, Utc};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::delivery::DeliveryOrchestrator;
use crate::notification::Notification;
use crate::status::SystemStatus;

/// Failure streak under which a channel is reported as fine
const HEALTHY_FAILURES: u32 = 3;
/// Failure streak at which the whole system is reported as degraded
const DEGRADED_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatOutcome {
    /// The last heartbeat is recent enough
    NotDue,
    Sent,
    /// The report could not be delivered; the next call tries again
    Failed,
}

/// Periodic self-test sent through the normal delivery path
#[derive(Debug)]
pub struct HeartbeatMonitor {
    orchestrator: Arc<DeliveryOrchestrator>,
    // Serializes the due-check and the send
    gate: Mutex<()>,
}

impl HeartbeatMonitor {
    pub fn new(orchestrator: Arc<DeliveryOrchestrator>) -> Self {
        Self {
            orchestrator,
            gate: Mutex::new(()),
        }
    }

    /// Send a status report unless one went out less than `interval` ago
    pub async fn maybe_send_heartbeat(&self, now: DateTime<Utc>, interval: Duration) -> HeartbeatOutcome {
        let _gate = self.gate.lock().await;
        let health = self.orchestrator.health();
        let status = health.snapshot().await;

        if !is_due(status.last_heartbeat, now, interval) {
            debug!("Heartbeat not due yet");
            return HeartbeatOutcome::NotDue;
        }

        let report = render_status_report(&status, health.priority(), now);
        let notification = Notification::new(
            format!("Notifier heartbeat {}", now.format("%Y-%m-%d %H:%M")),
            report,
        );

        if self.orchestrator.send(&notification).await {
            health.record_heartbeat(now).await;
            info!("Heartbeat sent");
            HeartbeatOutcome::Sent
        } else {
            warn!("Heartbeat could not be delivered");
            HeartbeatOutcome::Failed
        }
    }
}

fn is_due(last: Option<DateTime<Utc>>, now: DateTime<Utc>, interval: Duration) -> bool {
    let Some(last) = last else {
        return true;
    };
    match chrono::Duration::from_std(interval) {
        Ok(interval) => now.signed_duration_since(last) >= interval,
        Err(_) => false,
    }
}

fn since(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(last) = last else {
        return "never".to_string();
    };
    let minutes = now.signed_duration_since(last).num_minutes().max(0);
    if minutes < 60 {
        format!("{} min ago", minutes)
    } else {
        format!("{:.1} h ago", minutes as f64 / 60.0)
    }
}

/// Human-readable summary of every channel and the undelivered counter
pub fn render_status_report(status: &SystemStatus, channels: &[String], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Notification system heartbeat");
    let _ = writeln!(out, "Checked at: {}", now.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out);
    let _ = writeln!(out, "Channels:");

    let mut degraded = false;
    for name in channels {
        let health = status.channel(name).cloned().unwrap_or_default();
        let ok = health.available && health.consecutive_failures < HEALTHY_FAILURES;
        degraded |= health.consecutive_failures >= DEGRADED_FAILURES;

        let mark = if ok { "ok" } else { "!!" };
        let availability = if health.available { "" } else { " (disabled)" };
        let _ = writeln!(
            out,
            "  [{}] {}{}: last success {}, consecutive failures {}",
            mark,
            name,
            availability,
            since(health.last_success, now),
            health.consecutive_failures
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Undelivered notifications: {}", status.undelivered_count);
    let _ = writeln!(out, "System healthy: {}", if degraded { "no" } else { "yes" });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_is_due() {
        let now = Utc::now();
        let hour = Duration::from_secs(3600);

        assert!(is_due(None, now, hour));
        assert!(!is_due(Some(now - ChronoDuration::minutes(30)), now, hour));
        assert!(is_due(Some(now - ChronoDuration::minutes(60)), now, hour));
    }

    #[test]
    fn test_report_lists_every_channel() {
        let now = Utc::now();
        let mut status = SystemStatus::for_channels(["line", "email", "file"]);
        status.undelivered_count = 4;
        status.channel_mut("line").last_success = Some(now - ChronoDuration::minutes(12));
        {
            let email = status.channel_mut("email");
            email.available = false;
            email.consecutive_failures = 6;
            email.last_success = Some(now - ChronoDuration::hours(3));
        }

        let names = vec!["line".to_string(), "email".to_string(), "file".to_string()];
        let report = render_status_report(&status, &names, now);

        assert!(report.contains("[ok] line: last success 12 min ago, consecutive failures 0"));
        assert!(report.contains("[!!] email (disabled): last success 3.0 h ago, consecutive failures 6"));
        assert!(report.contains("[ok] file: last success never"));
        assert!(report.contains("Undelivered notifications: 4"));
        assert!(report.contains("System healthy: no"));
    }
}
