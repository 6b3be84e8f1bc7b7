//! In-memory notification store.
//!
//! Backs tests and single-node development. Mutations lock the record's map
//! entry for their full duration, which gives the same per-record
//! serialization the PostgreSQL backend gets from row locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{Notification, NotificationStatus};

use super::{NotificationStore, StoreError};

pub struct MemoryNotificationStore {
    records: DashMap<Uuid, Notification>,
    /// reference -> notification id index
    references: DashMap<Uuid, Uuid>,
}

impl MemoryNotificationStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            references: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for MemoryNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationStore for MemoryNotificationStore {
    async fn create(&self, notification: Notification) -> Result<Notification, StoreError> {
        if let Some(reference) = notification.provider_reference {
            if self.references.contains_key(&reference) {
                return Err(StoreError::DuplicateReference(reference));
            }
            self.references.insert(reference, notification.id);
        }

        self.records.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_by_reference(&self, reference: Uuid) -> Result<Option<Notification>, StoreError> {
        let id = match self.references.get(&reference) {
            Some(entry) => *entry,
            None => return Ok(None),
        };
        self.get(id).await
    }

    async fn record_dispatch(
        &self,
        id: Uuid,
        sent_by: &str,
        reference: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<Notification>, StoreError> {
        if self.references.contains_key(&reference) {
            return Err(StoreError::DuplicateReference(reference));
        }

        let mut entry = match self.records.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.status != NotificationStatus::Created {
            return Ok(None);
        }

        entry.status = NotificationStatus::Sending;
        entry.sent_by = Some(sent_by.to_string());
        entry.sent_at = Some(sent_at);
        entry.provider_reference = Some(reference);
        entry.updated_at = Some(Utc::now());

        self.references.insert(reference, id);
        Ok(Some(entry.clone()))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
        sent_by: Option<&str>,
        detailed_status_code: Option<&str>,
    ) -> Result<Option<Notification>, StoreError> {
        let mut entry = match self.records.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if !entry.status.can_transition_to(status) {
            return Ok(None);
        }

        entry.status = status;
        if let Some(sent_by) = sent_by {
            entry.sent_by = Some(sent_by.to_string());
        }
        if let Some(code) = detailed_status_code {
            entry.detailed_status_code = Some(code.to_string());
        }
        entry.updated_at = Some(Utc::now());

        Ok(Some(entry.clone()))
    }

    async fn set_letter_print_details(
        &self,
        id: Uuid,
        billable_units: i32,
        postage: &str,
    ) -> Result<Option<Notification>, StoreError> {
        let mut entry = match self.records.get_mut(&id) {
            Some(entry) => entry,
            None => return Ok(None),
        };

        if entry.billable_units.is_some() {
            return Ok(None);
        }

        entry.billable_units = Some(billable_units);
        entry.postage = Some(postage.to_string());
        entry.updated_at = Some(Utc::now());

        Ok(Some(entry.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::{KeyType, NotificationType};

    fn sample() -> Notification {
        Notification::new(
            NotificationType::Sms,
            "+31612345678".to_string(),
            "hello".to_string(),
            None,
            KeyType::Normal,
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = MemoryNotificationStore::new();
        let n = store.create(sample()).await.unwrap();

        let fetched = store.get(n.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, n.id);
        assert_eq!(fetched.status, NotificationStatus::Created);
    }

    #[tokio::test]
    async fn test_record_dispatch_sets_metadata_once() {
        let store = MemoryNotificationStore::new();
        let n = store.create(sample()).await.unwrap();
        let reference = Uuid::new_v4();
        let now = Utc::now();

        let updated = store
            .record_dispatch(n.id, "spryng", reference, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, NotificationStatus::Sending);
        assert_eq!(updated.sent_by.as_deref(), Some("spryng"));
        assert_eq!(updated.provider_reference, Some(reference));

        // Second dispatch for the same record is a no-op.
        let again = store
            .record_dispatch(n.id, "spryng", Uuid::new_v4(), now)
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_reference_rejected() {
        let store = MemoryNotificationStore::new();
        let a = store.create(sample()).await.unwrap();
        let b = store.create(sample()).await.unwrap();
        let reference = Uuid::new_v4();

        store
            .record_dispatch(a.id, "spryng", reference, Utc::now())
            .await
            .unwrap();

        let err = store
            .record_dispatch(b.id, "spryng", reference, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateReference(r) if r == reference));
    }

    #[tokio::test]
    async fn test_find_by_reference() {
        let store = MemoryNotificationStore::new();
        let n = store.create(sample()).await.unwrap();
        let reference = Uuid::new_v4();
        store
            .record_dispatch(n.id, "spryng", reference, Utc::now())
            .await
            .unwrap();

        let found = store.find_by_reference(reference).await.unwrap().unwrap();
        assert_eq!(found.id, n.id);

        assert!(store
            .find_by_reference(Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_status_terminal_is_idempotent() {
        let store = MemoryNotificationStore::new();
        let n = store.create(sample()).await.unwrap();
        store
            .record_dispatch(n.id, "spryng", Uuid::new_v4(), Utc::now())
            .await
            .unwrap();

        let updated = store
            .update_status(n.id, NotificationStatus::Delivered, Some("spryng"), Some("0"))
            .await
            .unwrap();
        assert!(updated.is_some());

        // Applying the same terminal status again changes nothing and is
        // not an error.
        let second = store
            .update_status(n.id, NotificationStatus::Delivered, Some("spryng"), Some("0"))
            .await
            .unwrap();
        assert!(second.is_none());

        // A backward transition is also a no-op.
        let backward = store
            .update_status(n.id, NotificationStatus::Pending, Some("spryng"), None)
            .await
            .unwrap();
        assert!(backward.is_none());
        assert_eq!(
            store.get(n.id).await.unwrap().unwrap().status,
            NotificationStatus::Delivered
        );
    }

    #[tokio::test]
    async fn test_set_letter_print_details_once() {
        let store = MemoryNotificationStore::new();
        let n = store
            .create(Notification::new(
                NotificationType::Letter,
                "A. User\nStraat 1\n1234AB City".to_string(),
                "cGRm".to_string(),
                None,
                KeyType::Normal,
            ))
            .await
            .unwrap();

        let updated = store
            .set_letter_print_details(n.id, 2, "netherlands")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.billable_units, Some(2));

        let again = store
            .set_letter_print_details(n.id, 3, "europe")
            .await
            .unwrap();
        assert!(again.is_none());
    }
}
