//! Durable task queue for out-of-band pipeline work.
//!
//! Dispatch, reconciliation and service-callback units all run inside tasks
//! pulled from this queue by the worker pool. Backends are interchangeable:
//! memory for tests and single-node development, Redis for deployments that
//! need work to survive restarts. Delayed visibility (`available_at`) is how
//! retries get their fixed backoff.

pub mod memory_backend;
pub mod redis_backend;

pub use memory_backend::MemoryTaskQueue;
pub use redis_backend::RedisTaskQueue;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::providers::CallbackProvider;

/// One unit of asynchronous pipeline work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Task {
    /// Hand a persisted notification to its provider.
    Deliver { notification_id: Uuid },
    /// Process one inbound provider callback.
    Reconcile {
        provider: CallbackProvider,
        raw_status: String,
        detail_code: Option<String>,
        /// Kept as the raw string the provider sent; the reconciler
        /// re-validates it even though the boundary already did.
        reference: String,
    },
    /// Post a delivery receipt to the service's callback endpoint.
    ServiceCallback { notification_id: Uuid },
}

impl Task {
    /// Task kind label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Deliver { .. } => "deliver",
            Self::Reconcile { .. } => "reconcile",
            Self::ServiceCallback { .. } => "service_callback",
        }
    }
}

/// A task plus its scheduling envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: Uuid,
    pub task: Task,
    /// Completed executions so far; 0 for a fresh task.
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
    /// The task is invisible to workers before this instant.
    pub available_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task,
            attempts: 0,
            enqueued_at: now,
            available_at: now,
        }
    }

    /// Re-schedule this envelope after a failed attempt.
    pub fn retry(mut self, delay: Duration) -> Self {
        self.attempts += 1;
        self.available_at = Utc::now() + chrono::Duration::from_std(delay).unwrap_or_default();
        self
    }

    pub fn is_due(&self) -> bool {
        self.available_at <= Utc::now()
    }
}

/// Errors raised by queue backends.
#[derive(Debug, Error)]
pub enum QueueBackendError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable work queue shared by all workers.
///
/// `claim` hands out at most one due envelope per call and removes it from
/// the backend; a claimed task that must run again is re-enqueued by the
/// worker with its attempt count bumped.
#[async_trait]
pub trait TaskQueueBackend: Send + Sync {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), QueueBackendError>;

    /// Claim the next due envelope, if any.
    async fn claim(&self) -> Result<Option<TaskEnvelope>, QueueBackendError>;

    /// Number of envelopes waiting (due or delayed).
    async fn len(&self) -> Result<usize, QueueBackendError>;
}

/// Create a task queue backend from configuration.
pub async fn create_task_queue(
    config: &QueueConfig,
) -> Result<Arc<dyn TaskQueueBackend>, QueueBackendError> {
    match config.backend.as_str() {
        "redis" => {
            let queue = RedisTaskQueue::connect(&config.redis_url, config.redis_prefix.clone()).await?;
            tracing::info!(backend = "redis", prefix = %config.redis_prefix, "Created task queue");
            Ok(Arc::new(queue))
        }
        _ => {
            tracing::info!(backend = "memory", "Created task queue");
            Ok(Arc::new(MemoryTaskQueue::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_starts_due() {
        let envelope = TaskEnvelope::new(Task::Deliver {
            notification_id: Uuid::new_v4(),
        });
        assert_eq!(envelope.attempts, 0);
        assert!(envelope.is_due());
    }

    #[test]
    fn test_retry_delays_visibility() {
        let envelope = TaskEnvelope::new(Task::Deliver {
            notification_id: Uuid::new_v4(),
        });
        let retried = envelope.retry(Duration::from_secs(300));
        assert_eq!(retried.attempts, 1);
        assert!(!retried.is_due());
    }

    #[test]
    fn test_task_serialization_round_trip() {
        let task = Task::Reconcile {
            provider: CallbackProvider::Messagebox,
            raw_status: "10".to_string(),
            detail_code: Some("0".to_string()),
            reference: Uuid::new_v4().to_string(),
        };
        let json = serde_json::to_string(&task).unwrap();
        assert!(json.contains("\"kind\":\"reconcile\""));
        assert!(json.contains("\"provider\":\"messagebox\""));

        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn test_task_kind_labels() {
        assert_eq!(
            Task::Deliver { notification_id: Uuid::new_v4() }.kind(),
            "deliver"
        );
        assert_eq!(
            Task::ServiceCallback { notification_id: Uuid::new_v4() }.kind(),
            "service_callback"
        );
    }
}
