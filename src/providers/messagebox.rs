//! Mailbox gateway client.
//!
//! Delivers a message into a citizen's government mailbox. The gateway
//! validates the message against its own rules (subscription, message type,
//! XSD) and reports the outcome asynchronously under the reference passed
//! at submission.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::config::MessageboxConfig;
use crate::notification::NotificationType;

use super::{http_client, DeliveryPayload, ProviderClient, ProviderError, SubmissionAck};

const PROVIDER_NAME: &str = "messagebox";

pub struct MessageboxClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct MessageboxRequest<'a> {
    #[serde(rename = "berichtId")]
    message_id: String,
    recipient: &'a str,
    body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    personalisation: Option<&'a serde_json::Value>,
}

impl MessageboxClient {
    pub fn new(config: &MessageboxConfig) -> Self {
        Self {
            http: http_client(config.timeout_seconds),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn build_request<'a>(&self, payload: &'a DeliveryPayload) -> MessageboxRequest<'a> {
        MessageboxRequest {
            message_id: payload.reference.to_string(),
            recipient: &payload.recipient,
            body: &payload.content,
            personalisation: payload.personalisation.as_ref(),
        }
    }
}

#[async_trait]
impl ProviderClient for MessageboxClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn notification_type(&self) -> NotificationType {
        NotificationType::Messagebox
    }

    #[tracing::instrument(
        name = "messagebox.submit",
        skip(self, payload),
        fields(notification_id = %payload.notification_id, reference = %payload.reference)
    )]
    async fn submit(&self, payload: &DeliveryPayload) -> Result<SubmissionAck, ProviderError> {
        let request = self.build_request(payload);

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

        tracing::debug!("Mailbox message submitted");

        Ok(SubmissionAck {
            reference: payload.reference,
            provider_message_id: None,
            submitted_at: Utc::now(),
        })
    }
}
