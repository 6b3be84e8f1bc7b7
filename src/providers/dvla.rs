//! Postal print API client.
//!
//! Creates one print job per letter. The print file arrives pre-rendered
//! (base64) from the letter pipeline; the print API posts status callbacks
//! (accepted, despatched, rejected) to the configured callback URL.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::config::DvlaConfig;
use crate::notification::NotificationType;

use super::{http_client, DeliveryPayload, ProviderClient, ProviderError, SubmissionAck};

const PROVIDER_NAME: &str = "dvla";

/// Callback retry window the print API is asked to honour, in seconds.
const CALLBACK_RETRY_WINDOW: u32 = 10_800;

pub struct DvlaClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    callback_url: String,
}

impl DvlaClient {
    pub fn new(config: &DvlaConfig) -> Self {
        Self {
            http: http_client(config.timeout_seconds),
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            callback_url: config.callback_url.clone(),
        }
    }

    fn format_print_job(&self, payload: &DeliveryPayload) -> serde_json::Value {
        // Address lines come from the recipient field, one line per row,
        // normalised upstream by the letter pipeline.
        let mut lines = payload.recipient.lines();
        let recipient_name = lines.next().unwrap_or_default();
        let address_lines: Vec<&str> = lines.collect();

        let despatch = payload
            .postage
            .as_deref()
            .unwrap_or("netherlands")
            .to_uppercase();

        json!({
            "id": payload.notification_id.to_string(),
            "standardParams": {
                "jobType": "NOTIFY",
                "templateReference": "NOTIFY",
                "businessIdentifier": payload.reference.to_string(),
                "despatchMethod": despatch,
                "recipientName": recipient_name,
                "address": {
                    "unstructuredAddress": {
                        "line1": address_lines.first().copied().unwrap_or_default(),
                        "postcode": address_lines.last().copied().unwrap_or_default(),
                    }
                }
            },
            "customParams": [
                { "key": "pdfContent", "value": payload.content },
            ],
            "callbackParams": {
                "target": self.callback_url,
                "retryParams": { "enabled": true, "maxRetryWindow": CALLBACK_RETRY_WINDOW }
            }
        })
    }
}

#[async_trait]
impl ProviderClient for DvlaClient {
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    fn notification_type(&self) -> NotificationType {
        NotificationType::Letter
    }

    #[tracing::instrument(
        name = "dvla.submit",
        skip(self, payload),
        fields(notification_id = %payload.notification_id, reference = %payload.reference)
    )]
    async fn submit(&self, payload: &DeliveryPayload) -> Result<SubmissionAck, ProviderError> {
        let job = self.format_print_job(payload);

        let response = self
            .http
            .post(&self.url)
            .header("Accept", "application/json")
            .header("X-API-Key", &self.api_key)
            .json(&job)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER_NAME, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(PROVIDER_NAME, status, body));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::from_transport(PROVIDER_NAME, e))?;

        let provider_message_id = body
            .get("id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        tracing::debug!(
            print_job_id = provider_message_id.as_deref().unwrap_or("-"),
            "Print job created"
        );

        Ok(SubmissionAck {
            reference: payload.reference,
            provider_message_id,
            submitted_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_print_job_shape() {
        let client = DvlaClient::new(&DvlaConfig {
            callback_url: "https://api.example.com/notifications/letter/dvla".to_string(),
            ..DvlaConfig::default()
        });
        let payload = DeliveryPayload {
            notification_id: Uuid::new_v4(),
            reference: Uuid::new_v4(),
            recipient: "A. User\nMy Street 1\n1234AB City".to_string(),
            content: "cGRm".to_string(),
            personalisation: None,
            postage: Some("netherlands".to_string()),
        };

        let job = client.format_print_job(&payload);

        assert_eq!(job["standardParams"]["jobType"], "NOTIFY");
        assert_eq!(job["standardParams"]["despatchMethod"], "NETHERLANDS");
        assert_eq!(job["standardParams"]["recipientName"], "A. User");
        assert_eq!(
            job["standardParams"]["businessIdentifier"],
            payload.reference.to_string()
        );
        assert_eq!(job["customParams"][0]["value"], "cGRm");
        assert_eq!(
            job["callbackParams"]["target"],
            "https://api.example.com/notifications/letter/dvla"
        );
        assert_eq!(job["callbackParams"]["retryParams"]["enabled"], true);
    }

    #[test]
    fn test_print_job_defaults_postage() {
        let client = DvlaClient::new(&DvlaConfig::default());
        let payload = DeliveryPayload {
            notification_id: Uuid::new_v4(),
            reference: Uuid::new_v4(),
            recipient: "B. User\nStraat 2\n5678CD Dorp".to_string(),
            content: String::new(),
            personalisation: None,
            postage: None,
        };

        let job = client.format_print_job(&payload);
        assert_eq!(job["standardParams"]["despatchMethod"], "NETHERLANDS");
    }
}
