//! Local file sink, the channel of last resort.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;
use uuid::Uuid;

use super::{NotificationChannel, SendResult};
use crate::error::ChannelError;
use crate::notification::Notification;

const SUBJECT_CHARS: usize = 30;

#[derive(Debug, Clone)]
pub struct FileChannel {
    dir: PathBuf,
}

impl FileChannel {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(notification: &Notification) -> String {
        let urgency = if notification.urgent { "URGENT_" } else { "" };
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let safe_subject: String = notification
            .subject
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .take(SUBJECT_CHARS)
            .collect();
        let id = Uuid::new_v4().simple().to_string();
        format!("{urgency}{timestamp}_{safe_subject}_{}.txt", &id[..8])
    }

    fn render(notification: &Notification) -> String {
        let mut out = String::new();
        out.push_str(&format!("Subject: {}\n", notification.subject));
        out.push_str(&format!(
            "Time: {}\n",
            notification.created_at.format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "Urgent: {}\n",
            if notification.urgent { "yes" } else { "no" }
        ));
        out.push_str(&"-".repeat(50));
        out.push_str("\n\n");
        out.push_str(&notification.body);
        out.push_str("\n\n");

        if let Some(html) = &notification.html_body {
            out.push_str(&"-".repeat(50));
            out.push_str("\nHTML content:\n");
            out.push_str(html);
        }

        out
    }
}

#[async_trait]
impl NotificationChannel for FileChannel {
    fn name(&self) -> &str {
        "file"
    }

    async fn send(&self, notification: &Notification) -> SendResult {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ChannelError::persistence(format!("create {}: {}", self.dir.display(), e)))?;

        let path = self.dir.join(Self::file_name(notification));
        fs::write(&path, Self::render(notification))
            .await
            .map_err(|e| ChannelError::persistence(format!("write {}: {}", path.display(), e)))?;

        info!(path = %path.display(), "Notification written to fallback file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_sanitizes_subject() {
        let n = Notification::new("Daily report: 2024/05/01 (close)", "b").urgent(true);
        let name = FileChannel::file_name(&n);
        assert!(name.starts_with("URGENT_"));
        assert!(name.ends_with(".txt"));
        assert!(!name.contains('/'));
        assert!(!name.contains(' '));
        assert!(name.contains("Daily_report__2024_05_01__clos"));
    }

    #[tokio::test]
    async fn test_writes_notification_file() {
        let dir = tempfile::tempdir().unwrap();
        let channel = FileChannel::new(dir.path().join("notifications"));

        let n = Notification::new("Alert", "price moved").with_html("<b>moved</b>");
        channel.send(&n).await.unwrap();

        let mut entries = std::fs::read_dir(channel.dir()).unwrap();
        let entry = entries.next().unwrap().unwrap();
        let content = std::fs::read_to_string(entry.path()).unwrap();
        assert!(content.contains("Subject: Alert"));
        assert!(content.contains("Urgent: no"));
        assert!(content.contains("price moved"));
        assert!(content.contains("<b>moved</b>"));
        assert!(entries.next().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_dir_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the directory should be
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"").unwrap();

        let channel = FileChannel::new(&blocker);
        let err = channel
            .send(&Notification::new("s", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::PersistenceError);
    }
}
