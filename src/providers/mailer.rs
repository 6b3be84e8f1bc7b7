//! Email relay client.
//!
//! Email is the one channel without a delivery callback in this deployment:
//! the relay either accepts the message or rejects it synchronously, and the
//! notification's lifecycle ends at `sending` within this service.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::config::MailerConfig;
use crate::notification::NotificationType;

use super::{http_client, DeliveryPayload, ProviderClient, ProviderError, SubmissionAck};

const PROVIDER_NAME: &str = "mailer";

pub struct MailerClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    sender: String,
}

#[derive(Debug, Serialize)]
struct MailerRequest<'a> {
    from: &'a str,
    to: &'a str,
    body: &'a str,
    reference: String,
}

impl MailerClient {
    pub fn new(config: &MailerConfig) -> Self {
        Self {
            http: http_client(config.timeout_seconds),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            sender: config.sender.clone(),
        }
    }
}

#[async_trait]
impl ProviderClient for MailerClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn notification_type(&self) -> NotificationType {
        NotificationType::Email
    }

    #[tracing::instrument(
        name = "mailer.submit",
        skip(self, payload),
        fields(notification_id = %payload.notification_id, reference = %payload.reference)
    )]
    async fn submit(&self, payload: &DeliveryPayload) -> Result<SubmissionAck, ProviderError> {
        let request = MailerRequest {
            from: &self.sender,
            to: &payload.recipient,
            body: &payload.content,
            reference: payload.reference.to_string(),
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER_NAME, status, body));
        }

        Ok(SubmissionAck {
            reference: payload.reference,
            provider_message_id: None,
            submitted_at: Utc::now(),
        })
    }
}
