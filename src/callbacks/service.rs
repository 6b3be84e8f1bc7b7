//! Delivery receipt dispatch to the service's own callback endpoint.
//!
//! When a notification settles in a non-pending status, a `ServiceCallback`
//! task posts the canonical outcome to the callback URL the service
//! operator configured. Unset URL means the hook is disabled and the task
//! is a no-op.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::ServiceCallbackConfig;
use crate::metrics::TaskMetrics;
use crate::notification::{Notification, NotificationStatus, NotificationType};
use crate::store::NotificationStore;
use crate::worker::TaskError;

/// Receipt body posted to the callback endpoint. Canonical vocabulary only.
#[derive(Debug, Serialize)]
pub struct DeliveryReceipt {
    pub id: Uuid,
    pub reference: Option<Uuid>,
    pub notification_type: NotificationType,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl DeliveryReceipt {
    pub fn for_notification(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            reference: notification.provider_reference,
            notification_type: notification.notification_type,
            status: notification.status,
            created_at: notification.created_at,
            sent_at: notification.sent_at,
            completed_at: notification.updated_at,
        }
    }
}

pub struct ServiceCallbackClient {
    http: reqwest::Client,
    config: ServiceCallbackConfig,
    store: Arc<dyn NotificationStore>,
}

impl ServiceCallbackClient {
    pub fn new(config: ServiceCallbackConfig, store: Arc<dyn NotificationStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { http, config, store }
    }

    /// Post the delivery receipt for a settled notification.
    #[tracing::instrument(
        name = "service_callback.send",
        skip(self),
        fields(notification_id = %notification_id)
    )]
    pub async fn send(&self, notification_id: Uuid) -> Result<(), TaskError> {
        let Some(url) = &self.config.url else {
            tracing::debug!("No service callback URL configured, skipping receipt");
            return Ok(());
        };

        let notification = self
            .store
            .get(notification_id)
            .await
            .map_err(TaskError::retryable)?;

        let Some(notification) = notification else {
            // The record was the reason this task exists; without it there
            // is nothing to report.
            tracing::warn!("Notification vanished before receipt dispatch, skipping");
            return Ok(());
        };

        let receipt = DeliveryReceipt::for_notification(&notification);

        let mut request = self.http.post(url).json(&receipt);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TaskError::retryable(format!("service callback request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            // The receiving endpoint owns its own availability; any failure
            // is retried within the usual bounds.
            return Err(TaskError::retryable(format!(
                "service callback returned {status}"
            )));
        }

        TaskMetrics::record_service_callback_sent();
        tracing::info!(status = %notification.status, "Delivery receipt posted");
        Ok(())
    }
}
