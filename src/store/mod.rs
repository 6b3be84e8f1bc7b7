//! Durable storage for notification records.
//!
//! The store is the single source of truth and the only shared mutable
//! resource in the pipeline: workers never cache notification state between
//! calls, and every mutation is a single atomic operation that re-checks the
//! transition rule, so concurrent callbacks for one record serialize here.

pub mod memory;
pub mod postgres;

pub use memory::MemoryNotificationStore;
pub use postgres::PostgresNotificationStore;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::notification::{Notification, NotificationStatus};

/// Errors raised by store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate provider reference {0}")]
    DuplicateReference(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Durable CRUD over notification records.
///
/// `update_status` and `record_dispatch` return `Ok(None)` when no update
/// was performed — an illegal, duplicate or out-of-order transition. That
/// outcome is success for callers: reapplying a terminal status must be
/// harmless.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Insert a new record.
    async fn create(&self, notification: Notification) -> Result<Notification, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Notification>, StoreError>;

    /// Resolve a provider reference to at most one notification.
    ///
    /// Callers validate the reference is a well-formed v4 UUID before this
    /// lookup; a malformed reference never reaches the store.
    async fn find_by_reference(&self, reference: Uuid) -> Result<Option<Notification>, StoreError>;

    /// Record a successful provider hand-off: `sent_by`, `sent_at` and the
    /// issued reference, moving `created -> sending`. A no-op for records
    /// already past `created`.
    async fn record_dispatch(
        &self,
        id: Uuid,
        sent_by: &str,
        reference: Uuid,
        sent_at: DateTime<Utc>,
    ) -> Result<Option<Notification>, StoreError>;

    /// Apply a status transition if and only if it is legal.
    async fn update_status(
        &self,
        id: Uuid,
        status: NotificationStatus,
        sent_by: Option<&str>,
        detailed_status_code: Option<&str>,
    ) -> Result<Option<Notification>, StoreError>;

    /// Set print cost attributes for a letter, once, post-sanitisation.
    async fn set_letter_print_details(
        &self,
        id: Uuid,
        billable_units: i32,
        postage: &str,
    ) -> Result<Option<Notification>, StoreError>;
}

/// Create a notification store from configuration.
///
/// `postgres` connects a pool; anything else yields the in-memory store
/// (tests, single-node development).
pub async fn create_notification_store(
    config: &DatabaseConfig,
) -> Result<Arc<dyn NotificationStore>, StoreError> {
    match config.backend.as_str() {
        "postgres" => {
            let store = PostgresNotificationStore::connect(config).await?;
            tracing::info!(backend = "postgres", "Created notification store");
            Ok(Arc::new(store))
        }
        _ => {
            tracing::info!(backend = "memory", "Created notification store");
            Ok(Arc::new(MemoryNotificationStore::new()))
        }
    }
}
