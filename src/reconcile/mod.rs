//! Callback reconciler.
//!
//! One reconciliation unit processes one inbound provider callback:
//! validate the reference, normalize the raw status, look up the
//! notification and apply the transition. The store's guarded update is the
//! sole arbiter under concurrency — duplicate, out-of-order and backward
//! callbacks all land as harmless no-ops.

use std::sync::Arc;

use uuid::Uuid;

use crate::metrics::CallbackMetrics;
use crate::notification::NotificationStatus;
use crate::providers::{normalize, CallbackProvider};
use crate::queue::{Task, TaskEnvelope, TaskQueueBackend};
use crate::store::NotificationStore;
use crate::worker::TaskError;

/// Parse a provider-supplied reference, requiring a version-4 UUID.
pub fn parse_reference(reference: &str) -> Result<Uuid, String> {
    let parsed = Uuid::parse_str(reference)
        .map_err(|e| format!("malformed reference {reference:?}: {e}"))?;
    if parsed.get_version_num() != 4 {
        return Err(format!("reference {reference:?} is not a version-4 UUID"));
    }
    Ok(parsed)
}

pub struct CallbackReconciler {
    store: Arc<dyn NotificationStore>,
    queue: Arc<dyn TaskQueueBackend>,
}

impl CallbackReconciler {
    pub fn new(store: Arc<dyn NotificationStore>, queue: Arc<dyn TaskQueueBackend>) -> Self {
        Self { store, queue }
    }

    /// Process one provider callback.
    #[tracing::instrument(
        name = "reconcile.process",
        skip(self),
        fields(provider = %provider, raw_status = raw_status, reference = reference)
    )]
    pub async fn process(
        &self,
        provider: CallbackProvider,
        raw_status: &str,
        detail_code: Option<&str>,
        reference: &str,
    ) -> Result<(), TaskError> {
        // The boundary already rejected malformed references with a 400;
        // failing here means a bad task was enqueued, which no retry fixes.
        let reference = match parse_reference(reference) {
            Ok(reference) => reference,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "{} callback with invalid reference",
                    provider.display_name()
                );
                return Err(TaskError::fatal(e));
            }
        };

        match normalize(provider, raw_status, detail_code) {
            Ok(normalized) => {
                tracing::info!(
                    status = %normalized.status,
                    reason = normalized.reason.unwrap_or("-"),
                    detail_code = detail_code.unwrap_or("-"),
                    "{} callback normalized",
                    provider.display_name()
                );
                self.apply(provider, reference, normalized.status, detail_code)
                    .await
            }
            Err(e) => {
                // Unknown raw status: settle the notification as a recorded
                // technical failure, then surface the error so the bounded
                // retries give a transiently broken mapping a chance to
                // recover and operators a trail to follow.
                self.apply(provider, reference, NotificationStatus::TechnicalFailure, None)
                    .await?;

                tracing::error!(error = %e, "Callback status could not be normalized");
                Err(TaskError::retryable(e))
            }
        }
    }

    async fn apply(
        &self,
        provider: CallbackProvider,
        reference: Uuid,
        status: NotificationStatus,
        detail_code: Option<&str>,
    ) -> Result<(), TaskError> {
        let notification = self
            .store
            .find_by_reference(reference)
            .await
            .map_err(TaskError::retryable)?;

        let Some(notification) = notification else {
            // Callbacks may arrive for traffic this deployment does not
            // track; succeed without touching anything, but keep it visible.
            CallbackMetrics::record_unmatched(provider.as_str());
            tracing::warn!(
                reference = %reference,
                "Callback matched no notification, ignoring"
            );
            return Ok(());
        };

        let updated = self
            .store
            .update_status(notification.id, status, Some(provider.as_str()), detail_code)
            .await
            .map_err(TaskError::retryable)?;

        let Some(updated) = updated else {
            // Duplicate or out-of-order callback; the record already moved
            // past this transition.
            tracing::debug!(
                notification_id = %notification.id,
                current = %notification.status,
                attempted = %status,
                "No update performed"
            );
            return Ok(());
        };

        CallbackMetrics::record_status(provider.as_str(), status);
        if let Some(sent_at) = updated.sent_at {
            CallbackMetrics::record_elapsed(provider.as_str(), status, sent_at);
        }

        if status != NotificationStatus::Pending {
            self.queue
                .enqueue(TaskEnvelope::new(Task::ServiceCallback {
                    notification_id: updated.id,
                }))
                .await
                .map_err(TaskError::retryable)?;
        }

        tracing::info!(
            notification_id = %updated.id,
            status = %status,
            "Notification status reconciled"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::notification::{KeyType, Notification, NotificationType};
    use crate::queue::MemoryTaskQueue;
    use crate::store::MemoryNotificationStore;

    struct Fixture {
        store: Arc<MemoryNotificationStore>,
        queue: Arc<MemoryTaskQueue>,
        reconciler: CallbackReconciler,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryNotificationStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());
        let reconciler = CallbackReconciler::new(store.clone(), queue.clone());
        Fixture {
            store,
            queue,
            reconciler,
        }
    }

    /// Create a messagebox notification already handed to the provider.
    async fn sending_notification(store: &MemoryNotificationStore) -> (Uuid, Uuid) {
        let n = store
            .create(Notification::new(
                NotificationType::Messagebox,
                String::new(),
                "bericht".to_string(),
                None,
                KeyType::Normal,
            ))
            .await
            .unwrap();
        let reference = Uuid::new_v4();
        store
            .record_dispatch(n.id, "messagebox", reference, Utc::now())
            .await
            .unwrap();
        (n.id, reference)
    }

    #[test]
    fn test_parse_reference_requires_v4() {
        assert!(parse_reference(&Uuid::new_v4().to_string()).is_ok());
        assert!(parse_reference("not-a-uuid").is_err());
        // A valid UUID of another version is still rejected.
        assert!(parse_reference("00000000-0000-0000-0000-000000000000").is_err());
    }

    #[tokio::test]
    async fn test_delivered_callback_transitions_and_queues_receipt() {
        let f = fixture();
        let (id, reference) = sending_notification(&f.store).await;

        f.reconciler
            .process(
                CallbackProvider::Messagebox,
                "10",
                Some("0"),
                &reference.to_string(),
            )
            .await
            .unwrap();

        let n = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(n.status, NotificationStatus::Delivered);
        assert_eq!(n.detailed_status_code.as_deref(), Some("0"));

        // A service callback task was enqueued for the settled status.
        let envelope = f.queue.claim().await.unwrap().unwrap();
        assert_eq!(
            envelope.task,
            Task::ServiceCallback { notification_id: id }
        );
    }

    #[tokio::test]
    async fn test_pending_callback_does_not_queue_receipt() {
        let f = fixture();
        let (id, reference) = sending_notification(&f.store).await;

        f.reconciler
            .process(
                CallbackProvider::Dvla,
                "ACCEPTED",
                None,
                &reference.to_string(),
            )
            .await
            .unwrap();

        let n = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(n.status, NotificationStatus::Pending);
        assert!(f.queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_status_settles_technical_failure_and_errors() {
        let f = fixture();
        let (id, reference) = sending_notification(&f.store).await;

        let err = f
            .reconciler
            .process(CallbackProvider::Messagebox, "30", None, &reference.to_string())
            .await
            .unwrap_err();
        assert!(err.is_retryable());

        let n = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(n.status, NotificationStatus::TechnicalFailure);
    }

    #[tokio::test]
    async fn test_unknown_notification_is_noop_success() {
        let f = fixture();

        f.reconciler
            .process(
                CallbackProvider::Spryng,
                "10",
                Some("0"),
                &Uuid::new_v4().to_string(),
            )
            .await
            .unwrap();

        assert!(f.store.is_empty());
        assert!(f.queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_reference_is_fatal() {
        let f = fixture();

        let err = f
            .reconciler
            .process(CallbackProvider::Spryng, "10", None, "garbage")
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_duplicate_terminal_callback_is_noop_success() {
        let f = fixture();
        let (id, reference) = sending_notification(&f.store).await;
        let reference = reference.to_string();

        f.reconciler
            .process(CallbackProvider::Messagebox, "10", Some("0"), &reference)
            .await
            .unwrap();
        // Second identical callback: no error, no state change.
        f.reconciler
            .process(CallbackProvider::Messagebox, "10", Some("0"), &reference)
            .await
            .unwrap();

        let n = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(n.status, NotificationStatus::Delivered);

        // Only the first callback queued a receipt.
        assert!(f.queue.claim().await.unwrap().is_some());
        assert!(f.queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_pending_after_delivered_is_rejected_backward_transition() {
        let f = fixture();
        let (id, reference) = sending_notification(&f.store).await;
        let reference = reference.to_string();

        f.reconciler
            .process(CallbackProvider::Messagebox, "10", Some("0"), &reference)
            .await
            .unwrap();
        // A late pending-style callback must not regress the status.
        f.reconciler
            .process(CallbackProvider::Dvla, "ACCEPTED", None, &reference)
            .await
            .unwrap();

        let n = f.store.get(id).await.unwrap().unwrap();
        assert_eq!(n.status, NotificationStatus::Delivered);
    }
}
