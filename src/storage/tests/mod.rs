// src/storage/tests/mod.rs


// Checks every backend must pass
pub(crate) mod common {
    use chrono::{Duration as ChronoDuration, Utc};

    use crate::error::{NotifierError, Result, StorageError};
    use crate::notification::{Notification, UndeliveredRecord};
    use crate::status::SystemStatus;
    use crate::storage::StorageBackend;

    pub async fn test_status_roundtrip<S: StorageBackend + ?Sized>(storage: &S) -> Result<()> {
        // Nothing saved yet
        assert_eq!(storage.load_status().await?, None);

        let mut status = SystemStatus::for_channels(["line", "telegram", "file"]);
        status.undelivered_count = 3;
        status.last_heartbeat = Some(Utc::now());
        {
            let line = status.channel_mut("line");
            line.consecutive_failures = 7;
            line.available = false;
        }

        storage.save_status(&status).await?;
        assert_eq!(storage.load_status().await?, Some(status.clone()));

        // A second save replaces the document
        status.undelivered_count = 4;
        storage.save_status(&status).await?;
        let loaded = storage.load_status().await?.unwrap();
        assert_eq!(loaded.undelivered_count, 4);

        Ok(())
    }

    pub async fn test_undelivered_lifecycle<S: StorageBackend + ?Sized>(storage: &S) -> Result<()> {
        let mut older = UndeliveredRecord::new(Notification::new("first", "body one"));
        older.created_at = Utc::now() - ChronoDuration::minutes(5);
        let newer = UndeliveredRecord::new(Notification::new("second", "body two").urgent(true));

        // Insert out of order, listing must come back oldest first
        let newer_id = storage.insert_undelivered(&newer).await?;
        let older_id = storage.insert_undelivered(&older).await?;
        assert_ne!(newer_id, older_id);

        let listed = storage.list_undelivered().await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].0, older_id);
        assert_eq!(listed[0].1.notification.subject, "first");
        assert_eq!(listed[1].0, newer_id);
        assert!(listed[1].1.notification.urgent);

        // Update bumps the retry count in place
        let mut bumped = listed[0].1.clone();
        bumped.retry_count = 2;
        storage.update_undelivered(&older_id, &bumped).await?;
        let listed = storage.list_undelivered().await?;
        assert_eq!(listed[0].1.retry_count, 2);

        assert!(storage.delete_undelivered(&older_id).await?);
        assert!(!storage.delete_undelivered(&older_id).await?);

        let listed = storage.list_undelivered().await?;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, newer_id);

        storage.delete_undelivered(&newer_id).await?;
        Ok(())
    }

    pub async fn test_update_missing_record<S: StorageBackend + ?Sized>(storage: &S) -> Result<()> {
        let record = UndeliveredRecord::new(Notification::new("ghost", "never stored"));
        let result = storage
            .update_undelivered("undelivered_20240101_000000_000000000000", &record)
            .await;

        assert!(matches!(
            result,
            Err(NotifierError::Storage(StorageError::NotFound(_)))
        ));
        Ok(())
    }
}
