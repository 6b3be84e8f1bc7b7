//! Redis-based task queue backend.
//!
//! Envelopes live in a sorted set scored by their visibility time, so one
//! structure serves both due and delayed (retrying) work. Claiming is a
//! small Lua script: pop the oldest due member atomically, so independent
//! workers never execute the same envelope twice.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{QueueBackendError, TaskEnvelope, TaskQueueBackend};

/// Atomically claim the oldest due member, keyed by current time.
const CLAIM_SCRIPT: &str = r#"
local entries = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, 1)
if #entries == 0 then
    return false
end
redis.call('ZREM', KEYS[1], entries[1])
return entries[1]
"#;

pub struct RedisTaskQueue {
    conn: ConnectionManager,
    key: String,
    claim_script: redis::Script,
}

impl RedisTaskQueue {
    pub fn new(conn: ConnectionManager, prefix: String) -> Self {
        Self {
            conn,
            key: format!("{prefix}:schedule"),
            claim_script: redis::Script::new(CLAIM_SCRIPT),
        }
    }

    /// Connect a managed connection and build the queue.
    pub async fn connect(url: &str, prefix: String) -> Result<Self, QueueBackendError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }
}

#[async_trait]
impl TaskQueueBackend for RedisTaskQueue {
    async fn enqueue(&self, envelope: TaskEnvelope) -> Result<(), QueueBackendError> {
        let member = serde_json::to_string(&envelope)?;
        let score = envelope.available_at.timestamp_millis();

        let mut conn = self.conn.clone();
        let _: () = conn.zadd(&self.key, member, score).await?;

        tracing::trace!(
            task_id = %envelope.id,
            kind = envelope.task.kind(),
            attempts = envelope.attempts,
            "Task enqueued to Redis"
        );

        Ok(())
    }

    async fn claim(&self) -> Result<Option<TaskEnvelope>, QueueBackendError> {
        let now = Utc::now().timestamp_millis();

        let mut conn = self.conn.clone();
        let member: Option<String> = self
            .claim_script
            .key(&self.key)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        let Some(member) = member else {
            return Ok(None);
        };

        match serde_json::from_str::<TaskEnvelope>(&member) {
            Ok(envelope) => Ok(Some(envelope)),
            Err(e) => {
                // A member that no longer deserializes is unrunnable; it has
                // already been removed from the set, so log and move on.
                tracing::error!(error = %e, "Failed to deserialize claimed task, dropping it");
                Ok(None)
            }
        }
    }

    async fn len(&self) -> Result<usize, QueueBackendError> {
        let mut conn = self.conn.clone();
        let count: usize = conn.zcard(&self.key).await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_key_derived_from_prefix() {
        // Key layout only; live Redis behavior is covered by deployments.
        assert_eq!(format!("{}:schedule", "notify:tasks"), "notify:tasks:schedule");
    }

    #[test]
    fn test_claim_script_pops_single_member() {
        assert!(CLAIM_SCRIPT.contains("ZRANGEBYSCORE"));
        assert!(CLAIM_SCRIPT.contains("ZREM"));
        assert!(CLAIM_SCRIPT.contains("LIMIT', 0, 1"));
    }
}
