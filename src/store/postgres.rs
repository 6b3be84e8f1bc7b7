//! PostgreSQL-backed notification store.
//!
//! Every mutation is a single guarded `UPDATE ... RETURNING` statement: the
//! transition rule is re-checked inside the statement, and PostgreSQL's
//! row-level locking serializes concurrent updates to the same record. No
//! optimistic retry loop is needed because an update that loses the race
//! simply matches zero rows, which callers treat as "no update performed".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::notification::{KeyType, Notification, NotificationStatus, NotificationType};

use super::{NotificationStore, StoreError};

const COLUMNS: &str = "id, provider_reference, notification_type, status, sent_by, sent_at, \
     detailed_status_code, recipient, content, personalisation, billable_units, postage, \
     key_type, created_at, updated_at";

type NotificationRow = (
    Uuid,                      // id
    Option<Uuid>,              // provider_reference
    String,                    // notification_type
    String,                    // status
    Option<String>,            // sent_by
    Option<DateTime<Utc>>,     // sent_at
    Option<String>,            // detailed_status_code
    String,                    // recipient
    String,                    // content
    Option<serde_json::Value>, // personalisation
    Option<i32>,               // billable_units
    Option<String>,            // postage
    String,                    // key_type
    DateTime<Utc>,             // created_at
    Option<DateTime<Utc>>,     // updated_at
);

pub struct PostgresNotificationStore {
    pool: PgPool,
}

impl PostgresNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool from configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_size)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds as u64))
            .connect(&config.url)
            .await?;

        tracing::info!(pool_size = config.pool_size, "PostgreSQL connection pool created");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_notification(row: NotificationRow) -> Option<Notification> {
        let (
            id,
            provider_reference,
            notification_type,
            status,
            sent_by,
            sent_at,
            detailed_status_code,
            recipient,
            content,
            personalisation,
            billable_units,
            postage,
            key_type,
            created_at,
            updated_at,
        ) = row;

        let notification_type = match NotificationType::parse(&notification_type) {
            Some(t) => t,
            None => {
                tracing::warn!(
                    notification_id = %id,
                    value = %notification_type,
                    "Unknown notification type in store, skipping row"
                );
                return None;
            }
        };
        let status = match NotificationStatus::parse(&status) {
            Some(s) => s,
            None => {
                tracing::warn!(
                    notification_id = %id,
                    value = %status,
                    "Unknown status in store, skipping row"
                );
                return None;
            }
        };
        let key_type = KeyType::parse(&key_type).unwrap_or_default();

        Some(Notification {
            id,
            provider_reference,
            notification_type,
            status,
            sent_by,
            sent_at,
            detailed_status_code,
            recipient,
            content,
            personalisation,
            billable_units,
            postage,
            key_type,
            created_at,
            updated_at,
        })
    }

    fn map_insert_error(err: sqlx::Error, reference: Option<Uuid>) -> StoreError {
        if let sqlx::Error::Database(ref db) = err {
            if db.is_unique_violation() {
                if let Some(reference) = reference {
                    return StoreError::DuplicateReference(reference);
                }
            }
        }
        StoreError::Database(err)
    }
}

#[async_trait]
impl NotificationStore for PostgresNotificationStore {
    async fn create(&self, notification: Notification) -> Result<Notification, StoreError> {
        let reference = notification.provider_reference;

        sqlx::query(
            r#"
            INSERT INTO notifications
                (id, provider_reference, notification_type, status, sent_by, sent_at,
                 detailed_status_code, recipient, content, personalisation, billable_units,
                 postage, key_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(notification.id)
        .bind(notification.provider_reference)
        .bind(notification.notification_type.as_str())
        .bind(notification.status.as_str())
        .bind(&notification.sent_by)
        .bind(notification.sent_at)
        .bind(&notification.detailed_status_code)
        .bind(&notification.recipient)
        .bind(&notification.content)
        .bind(&notification.personalisation)
        .bind(notification.billable_units)
        .bind(&notification.postage)
        .bind(notification.key_type.as_str())
        .bind(notification.created_at)
        .bind(notification.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, reference))?;

        Ok(notification)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(Self::row_to_notification))
    }

    async fn find_by_reference(&self, reference: Uuid) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE provider_reference = $1"
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(Self::row_to_notification))
    }

    async fn record_dispatch(
        &self,
        id: Uuid,
        sent_by: &str,
        reference: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET status = 'sending', sent_by = $2, provider_reference = $3, sent_at = $4,
                updated_at = NOW()
            WHERE id = $1 AND status = 'created'
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(sent_by)
        .bind(reference)
        .bind(sent_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::map_insert_error(e, Some(reference)))?;

        Ok(row.and_then(Self::row_to_notification))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
        sent_by: Option<&str>,
        detailed_status_code: Option<&str>,
    ) -> Result<Option<Notification>, StoreError> {
        // The WHERE clause is the transition rule: only created, sending and
        // pending records accept updates, and re-applying the current status
        // matches zero rows.
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET status = $2,
                sent_by = COALESCE($3, sent_by),
                detailed_status_code = COALESCE($4, detailed_status_code),
                updated_at = NOW()
            WHERE id = $1
              AND status IN ('created', 'sending', 'pending')
              AND status <> $2
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(sent_by)
        .bind(detailed_status_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(Self::row_to_notification))
    }

    async fn set_letter_print_details(
        &self,
        id: Uuid,
        billable_units: i32,
        postage: &str,
    ) -> Result<Option<Notification>, StoreError> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            UPDATE notifications
            SET billable_units = $2, postage = $3, updated_at = NOW()
            WHERE id = $1 AND billable_units IS NULL
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(billable_units)
        .bind(postage)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(Self::row_to_notification))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_conversion() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let row: NotificationRow = (
            id,
            None,
            "sms".to_string(),
            "created".to_string(),
            None,
            None,
            None,
            "+31612345678".to_string(),
            "hello".to_string(),
            None,
            None,
            None,
            "normal".to_string(),
            now,
            None,
        );

        let n = PostgresNotificationStore::row_to_notification(row).unwrap();
        assert_eq!(n.id, id);
        assert_eq!(n.notification_type, NotificationType::Sms);
        assert_eq!(n.status, NotificationStatus::Created);
        assert_eq!(n.key_type, KeyType::Normal);
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let row: NotificationRow = (
            Uuid::new_v4(),
            None,
            "sms".to_string(),
            "sent".to_string(),
            None,
            None,
            None,
            String::new(),
            String::new(),
            None,
            None,
            None,
            "normal".to_string(),
            Utc::now(),
            None,
        );

        assert!(PostgresNotificationStore::row_to_notification(row).is_none());
    }
}
