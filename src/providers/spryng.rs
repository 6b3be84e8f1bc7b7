//! SMS aggregator client.
//!
//! Submits one SMS per request as a JSON POST with bearer authentication.
//! The aggregator reports delivery asynchronously against the reference we
//! pass here.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::config::SpryngConfig;
use crate::notification::NotificationType;

use super::{http_client, DeliveryPayload, ProviderClient, ProviderError, SubmissionAck};

const PROVIDER_NAME: &str = "spryng";

pub struct SpryngClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    originator: String,
}

#[derive(Debug, Serialize)]
struct SpryngRequest<'a> {
    originator: &'a str,
    recipients: Vec<String>,
    body: &'a str,
    reference: String,
    route: &'static str,
    encoding: &'static str,
}

impl SpryngClient {
    pub fn new(config: &SpryngConfig) -> Self {
        Self {
            http: http_client(config.timeout_seconds),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            originator: config.originator.clone(),
        }
    }

    fn build_request<'a>(&'a self, payload: &'a DeliveryPayload) -> SpryngRequest<'a> {
        SpryngRequest {
            originator: &self.originator,
            // The aggregator expects numbers without the leading plus.
            recipients: vec![payload.recipient.replace('+', "")],
            body: &payload.content,
            reference: payload.reference.to_string(),
            route: "business",
            encoding: "unicode",
        }
    }
}

#[async_trait]
impl ProviderClient for SpryngClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn notification_type(&self) -> NotificationType {
        NotificationType::Sms
    }

    #[tracing::instrument(
        name = "spryng.submit",
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

        // The response must at least be valid JSON; a 200 with garbage means
        // the request never reached the messaging backend.
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER_NAME, e))?;

        let provider_message_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        tracing::debug!(
            provider_message_id = provider_message_id.as_deref().unwrap_or("-"),
            "SMS submitted"
        );

        Ok(SubmissionAck {
            reference: payload.reference,
            provider_message_id,
            submitted_at: Utc::now(),
        })
    }
}
