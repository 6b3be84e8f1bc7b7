//! In-memory task queue backend.
//!
//! A mutex-guarded schedule ordered by visibility time. Used by tests and
//! single-node development; work does not survive a restart.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use super::{QueueBackendError, TaskEnvelope, TaskQueueBackend};

pub struct MemoryTaskQueue {
    schedule: Mutex<Vec<TaskEnvelope>>,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self {
            schedule: Mutex::new(Vec::new()),
        }
    }
}

impl Default for MemoryTaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskQueueBackend for MemoryTaskQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), QueueBackendError> {
        let mut schedule = self.schedule.lock().expect("queue lock poisoned");
        // Keep the schedule sorted by visibility so claim() is a scan from
        // the front.
        let position = schedule
            .binary_search_by_key(&envelope.available_at, |e| e.available_at)
            .unwrap_or_else(|p| p);
        schedule.insert(position, envelope);
        Ok(())
    }

    async fn claim(&self) -> Result<Option<TaskEnvelope>, QueueBackendError> {
        let mut schedule = self.schedule.lock().expect("queue lock poisoned");
        let now = Utc::now();
        if schedule.first().is_some_and(|e| e.available_at <= now) {
            return Ok(Some(schedule.remove(0)));
        }
        Ok(None)
    }

    async fn len(&self) -> Result<usize, QueueBackendError> {
        Ok(self.schedule.lock().expect("queue lock poisoned").len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::Task;
    use std::time::Duration;
    use uuid::Uuid;

    fn deliver_task() -> TaskEnvelope {
        TaskEnvelope::new(Task::Deliver {
            notification_id: Uuid::new_v4(),
        })
    }

    #[tokio::test]
    async fn test_claim_returns_due_tasks_in_order() {
        let queue = MemoryTaskQueue::new();
        let first = deliver_task();
        let second = deliver_task();

        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(queue.claim().await.unwrap().unwrap().id, first.id);
        assert_eq!(queue.claim().await.unwrap().unwrap().id, second.id);
        assert!(queue.claim().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delayed_tasks_are_invisible_until_due() {
        let queue = MemoryTaskQueue::new();
        let delayed = deliver_task().retry(Duration::from_secs(300));
        queue.enqueue(delayed).await.unwrap();

        assert!(queue.claim().await.unwrap().is_none());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_due_task_claimed_before_delayed_one() {
        let queue = MemoryTaskQueue::new();
        let delayed = deliver_task().retry(Duration::from_secs(300));
        let due = deliver_task();

        queue.enqueue(delayed).await.unwrap();
        queue.enqueue(due.clone()).await.unwrap();

        assert_eq!(queue.claim().await.unwrap().unwrap().id, due.id);
        assert!(queue.claim().await.unwrap().is_none());
    }
}
