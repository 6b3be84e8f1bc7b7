//! Provider clients and response normalization.
//!
//! Every delivery channel is backed by a [`ProviderClient`]: a thin HTTP
//! client that submits one notification to the external provider and
//! reports the outcome as either a retryable or a non-retryable failure.
//! The distinction drives the task runner: transport faults and 5xx
//! responses are retried with bounded attempts, 4xx-class rejections are
//! terminal.

pub mod dvla;
pub mod mailer;
pub mod messagebox;
pub mod response;
pub mod spryng;

pub use dvla::DvlaClient;
pub use mailer::MailerClient;
pub use messagebox::MessageboxClient;
pub use response::{normalize, CallbackProvider, NormalizedResponse, ResponseNotFound};
pub use spryng::SpryngClient;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ProvidersConfig;
use crate::notification::{Notification, NotificationType};

/// Errors raised by provider submissions.
///
/// `NonRetryable` covers 4xx-class rejections: the provider understood the
/// request and refused it, so resubmitting the same payload cannot succeed.
/// Everything else (transport faults, timeouts, 429, 5xx) is `Retryable`.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{provider} rejected the submission: {message}")]
    NonRetryable { provider: &'static str, message: String },

    #[error("{provider} submission failed: {message}")]
    Retryable { provider: &'static str, message: String },
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    /// Classify an HTTP response status from a provider.
    pub fn from_status(provider: &'static str, status: StatusCode, body: String) -> Self {
        let message = format!("{status}: {body}");
        if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
            Self::NonRetryable { provider, message }
        } else {
            Self::Retryable { provider, message }
        }
    }

    /// Transport-level failures (connect, timeout, body read) are always
    /// worth retrying.
    pub fn from_transport(provider: &'static str, err: reqwest::Error) -> Self {
        Self::Retryable {
            provider,
            message: err.to_string(),
        }
    }
}

/// Everything a provider client needs to submit one notification.
#[derive(Debug, Clone)]
pub struct DeliveryPayload {
    pub notification_id: Uuid,
    /// Correlation reference issued by the dispatcher; the provider echoes
    /// it back in delivery callbacks.
    pub reference: Uuid,
    pub recipient: String,
    pub content: String,
    pub personalisation: Option<serde_json::Value>,
    pub postage: Option<String>,
}

impl DeliveryPayload {
    /// Build the payload for a notification, issuing a fresh reference.
    pub fn for_notification(notification: &Notification) -> Self {
        Self {
            notification_id: notification.id,
            reference: Uuid::new_v4(),
            recipient: notification.recipient.clone(),
            content: notification.content.clone(),
            personalisation: notification.personalisation.clone(),
            postage: notification.postage.clone(),
        }
    }
}

/// Acknowledgement returned by a successful submission.
#[derive(Debug, Clone)]
pub struct SubmissionAck {
    /// The reference under which the provider will report delivery.
    pub reference: Uuid,
    /// Provider-assigned message id, if the API returns one. Logged only.
    pub provider_message_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

/// Uniform capability exposed by every provider client.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Short provider name, recorded as `sent_by` and used in metric labels.
    fn name(&self) -> &'static str;

    /// The delivery channel this client serves.
    fn notification_type(&self) -> NotificationType;

    /// Submit one notification to the provider.
    async fn submit(&self, payload: &DeliveryPayload) -> Result<SubmissionAck, ProviderError>;
}

/// Maps each delivery channel to its configured client.
pub struct ProviderRegistry {
    clients: HashMap<NotificationType, Arc<dyn ProviderClient>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
        }
    }

    /// Build the registry from settings, one client per enabled channel.
    pub fn from_settings(config: &ProvidersConfig) -> Self {
        let mut registry = Self::new();

        if config.spryng.enabled {
            registry.register(Arc::new(SpryngClient::new(&config.spryng)));
        }
        if config.messagebox.enabled {
            registry.register(Arc::new(MessageboxClient::new(&config.messagebox)));
        }
        if config.dvla.enabled {
            registry.register(Arc::new(DvlaClient::new(&config.dvla)));
        }
        if config.mailer.enabled {
            registry.register(Arc::new(MailerClient::new(&config.mailer)));
        }

        registry
    }

    pub fn register(&mut self, client: Arc<dyn ProviderClient>) {
        tracing::info!(
            provider = client.name(),
            notification_type = %client.notification_type(),
            "Registered provider client"
        );
        self.clients.insert(client.notification_type(), client);
    }

    pub fn client_for(&self, notification_type: NotificationType) -> Option<Arc<dyn ProviderClient>> {
        self.clients.get(&notification_type).cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared helper for building a reqwest client with a bounded timeout.
///
/// Provider calls must never hang a worker; a timeout is treated as a
/// retryable failure upstream.
pub(crate) fn http_client(timeout_seconds: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_seconds))
        .build()
        .unwrap_or_default()
}
