//! Asynchronous task runner.
//!
//! A pool of independent workers pulls envelopes from the durable queue and
//! executes them. Workers share nothing but the queue and the notification
//! store; retries are bounded (default 5 attempts) with a fixed delay
//! (default 300 s), and only failures the task reports as retryable are
//! retried — validation and business-rule rejections fail once, visibly.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::callbacks::ServiceCallbackClient;
use crate::config::WorkerConfig;
use crate::dispatch::DeliveryDispatcher;
use crate::metrics::{TaskMetrics, QUEUE_DEPTH};
use crate::queue::{Task, TaskEnvelope, TaskQueueBackend};
use crate::reconcile::CallbackReconciler;

/// How a task execution failed.
///
/// `Retryable` failures come from transient I/O (provider timeouts, store
/// contention, queue hiccups) and are re-enqueued with a fixed delay.
/// `Fatal` failures are wrong inputs or broken invariants; retrying them
/// cannot succeed, so they fail once and stay visible to operators.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    Fatal(String),
}

impl TaskError {
    pub fn retryable(err: impl std::fmt::Display) -> Self {
        Self::Retryable(err.to_string())
    }

    pub fn fatal(err: impl std::fmt::Display) -> Self {
        Self::Fatal(err.to_string())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

pub struct WorkerPool {
    queue: Arc<dyn TaskQueueBackend>,
    dispatcher: Arc<DeliveryDispatcher>,
    reconciler: Arc<CallbackReconciler>,
    service_callbacks: Arc<ServiceCallbackClient>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn TaskQueueBackend>,
        dispatcher: Arc<DeliveryDispatcher>,
        reconciler: Arc<CallbackReconciler>,
        service_callbacks: Arc<ServiceCallbackClient>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            dispatcher,
            reconciler,
            service_callbacks,
            config,
        }
    }

    /// Spawn the configured number of worker loops.
    pub fn spawn(self: &Arc<Self>, shutdown: &broadcast::Sender<()>) -> Vec<JoinHandle<()>> {
        (0..self.config.count)
            .map(|worker_id| {
                let pool = self.clone();
                let shutdown = shutdown.subscribe();
                tokio::spawn(async move { pool.run_worker(worker_id, shutdown).await })
            })
            .collect()
    }

    async fn run_worker(self: Arc<Self>, worker_id: usize, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(worker_id = worker_id, "Worker started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(worker_id = worker_id, "Worker shutting down");
                    break;
                }
                claimed = self.queue.claim() => {
                    match claimed {
                        Ok(Some(envelope)) => self.execute(envelope).await,
                        Ok(None) => self.idle(worker_id).await,
                        Err(e) => {
                            tracing::warn!(worker_id = worker_id, error = %e, "Queue claim failed");
                            self.idle(worker_id).await;
                        }
                    }
                }
            }
        }
    }

    /// Execute one envelope and settle its outcome.
    pub async fn execute(&self, envelope: TaskEnvelope) {
        let kind = envelope.task.kind();

        let result = match &envelope.task {
            Task::Deliver { notification_id } => self.dispatcher.deliver(*notification_id).await,
            Task::Reconcile {
                provider,
                raw_status,
                detail_code,
                reference,
            } => {
                self.reconciler
                    .process(*provider, raw_status, detail_code.as_deref(), reference)
                    .await
            }
            Task::ServiceCallback { notification_id } => {
                self.service_callbacks.send(*notification_id).await
            }
        };

        match result {
            Ok(()) => {
                TaskMetrics::record_processed(kind);
            }
            Err(e) if e.is_retryable() => {
                let attempts = envelope.attempts + 1;
                if attempts >= self.config.max_attempts {
                    TaskMetrics::record_failed(kind);
                    tracing::error!(
                        task_id = %envelope.id,
                        kind = kind,
                        attempts = attempts,
                        error = %e,
                        "Task failed permanently after exhausting retries"
                    );
                } else {
                    let delay = Duration::from_secs(self.config.retry_delay_seconds);
                    tracing::warn!(
                        task_id = %envelope.id,
                        kind = kind,
                        attempts = attempts,
                        retry_in_seconds = self.config.retry_delay_seconds,
                        error = %e,
                        "Task failed, scheduling retry"
                    );
                    match self.queue.enqueue(envelope.retry(delay)).await {
                        Ok(()) => TaskMetrics::record_retried(kind),
                        Err(enqueue_err) => {
                            TaskMetrics::record_failed(kind);
                            tracing::error!(
                                error = %enqueue_err,
                                kind = kind,
                                "Failed to re-enqueue task"
                            );
                        }
                    }
                }
            }
            Err(e) => {
                TaskMetrics::record_failed(kind);
                tracing::error!(
                    task_id = %envelope.id,
                    kind = kind,
                    error = %e,
                    "Task failed fatally"
                );
            }
        }
    }

    /// Sleep briefly when the queue is empty. Jittered so a pool of workers
    /// does not poll in lockstep.
    async fn idle(&self, worker_id: usize) {
        if worker_id == 0 {
            if let Ok(depth) = self.queue.len().await {
                QUEUE_DEPTH.set(depth as i64);
            }
        }

        let base = self.config.poll_interval_ms;
        let jitter = rand::rng().random_range(0..=base / 4);
        tokio::time::sleep(Duration::from_millis(base + jitter)).await;
    }
}
