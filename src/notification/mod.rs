//! Notification domain types.
//!
//! A [`Notification`] is the durable record of one outbound message: its
//! delivery payload, the provider that handled it, and its canonical
//! lifecycle status. Records are created by the intake API, mutated by the
//! delivery dispatcher (submission metadata) and the callback reconciler
//! (status transitions), and never deleted by this service.

mod status;

pub use status::NotificationStatus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of delivery channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Sms,
    Email,
    Letter,
    Messagebox,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::Letter => "letter",
            Self::Messagebox => "messagebox",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sms" => Some(Self::Sms),
            "email" => Some(Self::Email),
            "letter" => Some(Self::Letter),
            "messagebox" => Some(Self::Messagebox),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credential class of the accepted request.
///
/// A test credential short-circuits delivery: the notification is marked
/// `delivered` at creation and never dispatched to a real provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    #[default]
    Normal,
    Test,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Test => "test",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "normal" => Some(Self::Normal),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

/// Durable record of an outbound notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    /// Correlation identifier issued at dispatch and passed to the provider.
    /// Unique; `None` until the dispatcher hands the notification off.
    pub provider_reference: Option<Uuid>,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    /// Provider that handled the submission, set once at dispatch.
    pub sent_by: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    /// Provider-specific diagnostic code, stored verbatim for audit and
    /// never interpreted outside the response normalizer.
    pub detailed_status_code: Option<String>,
    pub recipient: String,
    /// Rendered message body (or base64 print file for letters), produced by
    /// the external template layer.
    pub content: String,
    pub personalisation: Option<serde_json::Value>,
    pub billable_units: Option<i32>,
    pub postage: Option<String>,
    pub key_type: KeyType,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Notification {
    /// Create a new notification record for an accepted request.
    ///
    /// Under a test credential the record is marked delivered immediately
    /// and skips the dispatch pipeline.
    pub fn new(
        notification_type: NotificationType,
        recipient: String,
        content: String,
        personalisation: Option<serde_json::Value>,
        key_type: KeyType,
    ) -> Self {
        let now = Utc::now();
        let (status, updated_at) = match key_type {
            KeyType::Test => (NotificationStatus::Delivered, Some(now)),
            KeyType::Normal => (NotificationStatus::Created, None),
        };

        Self {
            id: Uuid::new_v4(),
            provider_reference: None,
            notification_type,
            status,
            sent_by: None,
            sent_at: None,
            detailed_status_code: None,
            recipient,
            content,
            personalisation,
            billable_units: None,
            postage: None,
            key_type,
            created_at: now,
            updated_at,
        }
    }
}
