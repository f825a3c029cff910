// src/notification.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An outbound message, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    pub html_body: Option<String>,
    pub urgent: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            html_body: None,
            urgent: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_html(mut self, html_body: impl Into<String>) -> Self {
        self.html_body = Some(html_body.into());
        self
    }

    pub fn urgent(mut self, urgent: bool) -> Self {
        self.urgent = urgent;
        self
    }

    /// Copy with a different subject, everything else kept
    pub(crate) fn with_subject(&self, subject: String) -> Self {
        Self {
            subject,
            ..self.clone()
        }
    }

    /// Subject and body joined the way text-only channels render them
    pub fn plain_text(&self) -> String {
        format!("【{}】\n\n{}", self.subject, self.body)
    }
}

/// A notification that exhausted every channel, waiting for replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RecordDocument", into = "RecordDocument")]
pub struct UndeliveredRecord {
    pub notification: Notification,
    pub created_at: DateTime<Utc>,
    pub retry_count: u32,
}

impl UndeliveredRecord {
    pub fn new(notification: Notification) -> Self {
        Self {
            notification,
            created_at: Utc::now(),
            retry_count: 0,
        }
    }
}

// On-disk shape of an undelivered record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordDocument {
    timestamp: DateTime<Utc>,
    subject: String,
    message: String,
    #[serde(default)]
    html_body: Option<String>,
    #[serde(default)]
    urgent: bool,
    #[serde(default)]
    retry_count: u32,
}

impl From<RecordDocument> for UndeliveredRecord {
    fn from(doc: RecordDocument) -> Self {
        Self {
            notification: Notification {
                subject: doc.subject,
                body: doc.message,
                html_body: doc.html_body,
                urgent: doc.urgent,
                created_at: doc.timestamp,
            },
            created_at: doc.timestamp,
            retry_count: doc.retry_count,
        }
    }
}

impl From<UndeliveredRecord> for RecordDocument {
    fn from(record: UndeliveredRecord) -> Self {
        Self {
            timestamp: record.created_at,
            subject: record.notification.subject,
            message: record.notification.body,
            html_body: record.notification.html_body,
            urgent: record.notification.urgent,
            retry_count: record.retry_count,
        }
    }
}
