use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{WorkItem, WorkItemKind, WorkItemStatus};

/// Postgres-backed typed queue for the background job runtime: claim,
/// heartbeat, complete, or fail, over this system's closed `WorkItemKind`
/// set.
#[derive(Clone)]
pub struct WorkItemsRepo {
    pool: PgPool,
}

/// Outcome of a `fail` call: whether the item still has retries left or has
/// exhausted `max_attempts` and moved to the dead-letter list.
pub enum FailOutcome {
    Requeued,
    DeadLettered(WorkItem),
}

impl WorkItemsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        kind: WorkItemKind,
        payload: serde_json::Value,
        application_id: Option<Uuid>,
        priority: i32,
        idempotency_key: Option<&str>,
    ) -> Result<WorkItem, ApiError> {
        let row = sqlx::query_as::<_, WorkItem>(
            "INSERT INTO work_items (kind, payload, application_id, priority, idempotency_key) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (kind, idempotency_key) WHERE idempotency_key IS NOT NULL \
                AND status IN ('queued', 'running') \
             DO UPDATE SET priority = GREATEST(work_items.priority, EXCLUDED.priority) \
             RETURNING *",
        )
        .bind(kind)
        .bind(payload)
        .bind(application_id)
        .bind(priority)
        .bind(idempotency_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Claims the next runnable item, skipping rows locked by another
    /// dispatcher via `FOR UPDATE SKIP LOCKED` so multiple dispatcher
    /// instances can run concurrently.
    pub async fn claim_next(&self) -> Result<Option<WorkItem>, ApiError> {
        let mut tx = self.pool.begin().await?;
        let candidate = sqlx::query_as::<_, WorkItem>(
            "SELECT * FROM work_items \
             WHERE status = 'queued' AND run_after <= now() \
             ORDER BY priority DESC, run_after ASC \
             LIMIT 1 FOR UPDATE SKIP LOCKED",
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(item) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let claimed = sqlx::query_as::<_, WorkItem>(
            "UPDATE work_items \
             SET status = 'running', started_at = now(), last_heartbeat = now(), \
                 attempts = attempts + 1 \
             WHERE id = $1 RETURNING *",
        )
        .bind(item.id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(claimed))
    }

    pub async fn heartbeat(&self, id: i64) -> Result<(), ApiError> {
        sqlx::query("UPDATE work_items SET last_heartbeat = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn complete(&self, id: i64) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE work_items SET status = 'succeeded', completed_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Marks an item failed. When attempts have exhausted `max_attempts` it
    /// moves to `dead_letter` instead of being retried, otherwise it goes
    /// back to `queued` with an exponential backoff delay. Returns the item
    /// as it stood before this failure, so the caller can tell a permanent
    /// (dead-lettered) failure from a transient retry and surface it to an
    /// operator channel instead of dropping it silently.
    pub async fn fail(&self, id: i64, error_message: &str) -> Result<FailOutcome, ApiError> {
        let item = sqlx::query_as::<_, WorkItem>("SELECT * FROM work_items WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("work item {id} not found")))?;

        if item.attempts >= item.max_attempts {
            sqlx::query(
                "UPDATE work_items \
                 SET status = 'dead_letter', completed_at = now(), error_message = $2 \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(error_message)
            .execute(&self.pool)
            .await?;
            Ok(FailOutcome::DeadLettered(item))
        } else {
            let backoff_secs = 2i64.saturating_pow(item.attempts.max(1) as u32).min(3600);
            sqlx::query(
                "UPDATE work_items \
                 SET status = 'queued', error_message = $2, \
                     run_after = now() + make_interval(secs => $3) \
                 WHERE id = $1",
            )
            .bind(id)
            .bind(error_message)
            .bind(backoff_secs as f64)
            .execute(&self.pool)
            .await?;
            Ok(FailOutcome::Requeued)
        }
    }

    pub async fn reap_stalled(&self, stale_after: chrono::Duration) -> Result<u64, ApiError> {
        let cutoff = Utc::now() - stale_after;
        let result = sqlx::query(
            "UPDATE work_items SET status = 'queued', run_after = now() \
             WHERE status = 'running' AND (last_heartbeat IS NULL OR last_heartbeat < $1)",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Operator override: puts a `dead_letter` (or otherwise stuck) item
    /// straight back on the queue with a clean attempt counter.
    pub async fn requeue(&self, id: i64) -> Result<WorkItem, ApiError> {
        sqlx::query_as::<_, WorkItem>(
            "UPDATE work_items \
             SET status = 'queued', attempts = 0, run_after = now(), error_message = NULL, \
                 completed_at = NULL \
             WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("work item {id} not found")))
    }

    pub async fn list(&self, status: Option<WorkItemStatus>, limit: i64) -> Result<Vec<WorkItem>, ApiError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, WorkItem>(
                    "SELECT * FROM work_items WHERE status = $1 ORDER BY created_at DESC LIMIT $2",
                )
                .bind(status)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, WorkItem>(
                    "SELECT * FROM work_items ORDER BY created_at DESC LIMIT $1",
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows)
    }
}
