// src/tests/service_tests.rs

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use crate::channels::NotificationChannel;
use crate::error::{ErrorKind, NotifierError};
use crate::heartbeat::HeartbeatOutcome;
use crate::notification::{Notification, UndeliveredRecord};
use crate::service::NotificationService;
use crate::status::SystemStatus;
use crate::storage::{FileStorage, MemoryStorage, StorageBackend};
use crate::test_utils::{build_service, fast_config, MockChannel};

#[tokio::test]
async fn test_send_passes_message_fields() {
    let a = MockChannel::succeeding("A");
    let service = build_service(&[a.clone()], Arc::new(MemoryStorage::new())).await;

    assert!(service.send("Subject", "Body", Some("<b>Body</b>"), true).await);

    let received = a.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].subject, "Subject");
    assert_eq!(received[0].body, "Body");
    assert_eq!(received[0].html_body.as_deref(), Some("<b>Body</b>"));
    assert!(received[0].urgent);
}

#[tokio::test]
async fn test_missing_channel_implementation_is_config_error() {
    let a = MockChannel::succeeding("A");
    let b = MockChannel::succeeding("B");
    let config = fast_config(&[a.clone(), b], 2);

    let channels: Vec<Arc<dyn NotificationChannel>> = vec![a];
    let result = NotificationService::new(config, channels, Arc::new(MemoryStorage::new())).await;
    assert!(matches!(result, Err(NotifierError::Config(_))));
}

#[tokio::test]
async fn test_priority_follows_config_not_argument_order() {
    let a = MockChannel::succeeding("A");
    let b = MockChannel::succeeding("B");
    // A first in priority, B handed over first
    let config = fast_config(&[a.clone(), b.clone()], 1);
    let channels: Vec<Arc<dyn NotificationChannel>> = vec![b.clone(), a.clone()];
    let service = NotificationService::new(config, channels, Arc::new(MemoryStorage::new()))
        .await
        .unwrap();

    assert!(service.send("s", "b", None, false).await);
    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 0);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let a = MockChannel::failing("A", ErrorKind::NetworkError);
    let b = MockChannel::succeeding("B");

    {
        let service = build_service(&[a.clone(), b.clone()], Arc::new(FileStorage::new(dir.path()))).await;
        for _ in 0..7 {
            assert!(service.send("s", "b", None, false).await);
        }
        service.disable_channel("A").await;
    }

    // Fresh process over the same state directory
    let restarted = build_service(&[a.clone(), b.clone()], Arc::new(FileStorage::new(dir.path()))).await;
    let status = restarted.status().await;
    let a_health = status.channel("A").unwrap();
    assert!(!a_health.available);
    assert_eq!(a_health.consecutive_failures, 7);

    let calls_before = a.calls();
    assert!(restarted.send("s", "b", None, false).await);
    assert_eq!(a.calls(), calls_before);
}

#[tokio::test]
async fn test_startup_runs_sweep_heartbeat_and_replay() {
    let storage = MemoryStorage::new();
    let mut status = SystemStatus::for_channels(["A"]);
    {
        let a = status.channel_mut("A");
        a.available = false;
        a.last_success = Some(Utc::now() - ChronoDuration::hours(48));
    }
    storage.save_status(&status).await.unwrap();
    storage
        .insert_undelivered(&UndeliveredRecord::new(Notification::new("pending", "b")))
        .await
        .unwrap();

    let a = MockChannel::succeeding("A");
    let service = build_service(&[a.clone()], Arc::new(storage.clone())).await;
    let report = service.startup().await;

    assert_eq!(report.reset_channels, vec!["A".to_string()]);
    assert_eq!(report.heartbeat, HeartbeatOutcome::Sent);
    assert_eq!(report.replay.delivered, 1);
    assert!(storage.list_undelivered().await.unwrap().is_empty());
    // Heartbeat plus the replayed record
    assert_eq!(a.calls(), 2);
}

#[tokio::test]
async fn test_startup_skips_recent_heartbeat() {
    let storage = MemoryStorage::new();
    let mut status = SystemStatus::for_channels(["A"]);
    status.last_heartbeat = Some(Utc::now() - ChronoDuration::hours(2));
    storage.save_status(&status).await.unwrap();

    let a = MockChannel::succeeding("A");
    let service = build_service(&[a.clone()], Arc::new(storage)).await;
    let report = service.startup().await;

    // Inside the daily startup window
    assert_eq!(report.heartbeat, HeartbeatOutcome::NotDue);
    assert_eq!(a.calls(), 0);
}

#[tokio::test]
async fn test_maintenance_task_runs_until_stopped() {
    let a = MockChannel::succeeding("A");
    let service = Arc::new(build_service(&[a.clone()], Arc::new(MemoryStorage::new())).await);

    let handle = service.start_maintenance(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(60)).await;
    service.stop_maintenance();

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("maintenance task did not stop")
        .unwrap();

    // Heartbeat went out once; later ticks found it not due
    assert_eq!(a.calls(), 1);
    assert!(service.status().await.last_heartbeat.is_some());
}

#[tokio::test]
async fn test_restarting_maintenance_replaces_running_task() {
    let a = MockChannel::succeeding("A");
    let service = Arc::new(build_service(&[a.clone()], Arc::new(MemoryStorage::new())).await);

    let first = service.start_maintenance(Duration::from_millis(10));
    let second = service.start_maintenance(Duration::from_millis(10));

    // The replaced loop exits on its own
    tokio::time::timeout(Duration::from_secs(1), first)
        .await
        .expect("replaced maintenance task kept running")
        .unwrap();
    assert!(!second.is_finished());

    service.stop_maintenance();
    tokio::time::timeout(Duration::from_secs(1), second)
        .await
        .expect("maintenance task did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_stop_before_start_does_not_block_new_task() {
    let a = MockChannel::succeeding("A");
    let service = Arc::new(build_service(&[a.clone()], Arc::new(MemoryStorage::new())).await);

    service.stop_maintenance();
    let handle = service.start_maintenance(Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(!handle.is_finished());
    assert_eq!(a.calls(), 1);

    service.stop_maintenance();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("maintenance task did not stop")
        .unwrap();
}

#[tokio::test]
async fn test_from_config_builds_file_backed_service() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = crate::config::NotifierConfig::default();
    config.channels = vec![crate::config::ChannelConfig::file()];
    config.fallback_dir = dir.path().join("notifications");
    config.storage = crate::config::StorageConfig::File {
        dir: dir.path().join("state"),
    };

    let service = NotificationService::from_config(config).await.unwrap();
    assert!(service.send("Fallback", "written to disk", None, false).await);

    let written = std::fs::read_dir(dir.path().join("notifications")).unwrap().count();
    assert_eq!(written, 1);
    assert!(dir.path().join("state").join("notifier_status.json").exists());
}
