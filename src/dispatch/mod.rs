//! Delivery dispatcher.
//!
//! Hands a persisted notification to the provider client for its channel
//! and records the submission metadata. Runs inside a `Deliver` task: a
//! retryable provider failure propagates to the task runner, a 4xx-class
//! rejection settles the notification as `technical-failure` on the spot.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::metrics::DispatchMetrics;
use crate::notification::NotificationStatus;
use crate::providers::{DeliveryPayload, ProviderRegistry};
use crate::store::NotificationStore;
use crate::worker::TaskError;

pub struct DeliveryDispatcher {
    store: Arc<dyn NotificationStore>,
    registry: ProviderRegistry,
}

impl DeliveryDispatcher {
    pub fn new(store: Arc<dyn NotificationStore>, registry: ProviderRegistry) -> Self {
        Self { store, registry }
    }

    /// Submit one notification to its provider.
    ///
    /// Idempotent under task redelivery: a notification already past
    /// `created` is left alone.
    #[tracing::instrument(
        name = "dispatch.deliver",
        skip(self),
        fields(notification_id = %notification_id)
    )]
    pub async fn deliver(&self, notification_id: Uuid) -> Result<(), TaskError> {
        let notification = self
            .store
            .get(notification_id)
            .await
            .map_err(TaskError::retryable)?;

        let Some(notification) = notification else {
            // A deliver task always follows a successful insert; a missing
            // record here is a pipeline bug, not something a retry can fix.
            return Err(TaskError::fatal(format!(
                "notification {notification_id} not found for dispatch"
            )));
        };

        if notification.status != NotificationStatus::Created {
            tracing::debug!(
                status = %notification.status,
                "Notification already dispatched, skipping"
            );
            return Ok(());
        }

        let Some(client) = self.registry.client_for(notification.notification_type) else {
            return Err(TaskError::fatal(format!(
                "no provider client configured for {}",
                notification.notification_type
            )));
        };

        let payload = DeliveryPayload::for_notification(&notification);
        let provider = client.name();

        match client.submit(&payload).await {
            Ok(ack) => {
                self.store
                    .record_dispatch(notification.id, provider, ack.reference, Utc::now())
                    .await
                    .map_err(TaskError::retryable)?;

                DispatchMetrics::record_result(
                    provider,
                    NotificationStatus::Sending,
                    notification.created_at,
                );

                tracing::info!(
                    provider = provider,
                    reference = %ack.reference,
                    provider_message_id = ack.provider_message_id.as_deref().unwrap_or("-"),
                    "Notification handed to provider"
                );
                Ok(())
            }
            Err(e) if !e.is_retryable() => {
                // The provider refused the payload outright; resubmitting the
                // same request cannot succeed.
                self.store
                    .update_status(
                        notification.id,
                        NotificationStatus::TechnicalFailure,
                        Some(provider),
                        None,
                    )
                    .await
                    .map_err(TaskError::retryable)?;

                DispatchMetrics::record_result(
                    provider,
                    NotificationStatus::TechnicalFailure,
                    notification.created_at,
                );

                tracing::error!(
                    provider = provider,
                    error = %e,
                    "Provider rejected submission, notification marked technical-failure"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    provider = provider,
                    error = %e,
                    "Provider submission failed transiently"
                );
                Err(TaskError::retryable(e))
            }
        }
    }
}
