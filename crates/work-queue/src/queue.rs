use std::time::Duration;

use probe_types::WorkItem;
use sqlx::{PgPool, Row};
use tracing::{debug, warn};

use crate::backoff::BackoffPolicy;
use crate::error::QueueError;

/// Options for [`WorkQueue::publish`].
#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub max_attempts: i32,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

/// Outcome of a publish call: whether a new row was created, or an existing
/// non-terminal singleton was returned as a no-op, per §4.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    Created,
    SingletonActive,
}

#[derive(Debug, Clone, Copy)]
pub struct Published {
    pub id: i64,
    pub outcome: PublishOutcome,
}

/// The relational work queue (C6).
///
/// Mirrors the single-consumer `FOR UPDATE SKIP LOCKED` discipline used by
/// `ob-workflow`'s task queue listener, generalised to a multi-tenant queue
/// with per-key fairness and singleton enforcement instead of a single
/// dedicated results table.
///
/// All queries use runtime-checked `sqlx::query`/`query_as` rather than the
/// compile-time `query!`/`query_as!` macros, because `work_items` is created
/// by migration wiring that is out of scope for this crate and may not exist
/// at build time.
#[derive(Clone)]
pub struct WorkQueue {
    pool: PgPool,
    backoff: BackoffPolicy,
}

impl WorkQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            backoff: BackoffPolicy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Insert a WorkItem, or no-op if a non-terminal row with the same
    /// `(queue, singleton_key)` already exists, per §4.1.
    pub async fn publish(
        &self,
        queue: &str,
        key: &str,
        singleton_key: &str,
        payload: serde_json::Value,
        opts: PublishOptions,
    ) -> Result<Published, QueueError> {
        // Conditional-insert CTE: the INSERT only fires when no non-terminal
        // row shares this (queue, singleton_key); otherwise we fall through
        // to the existing row's id. This enforces invariant 3 in §8 without
        // a table lock, per §5's locking discipline.
        let row = sqlx::query(
            r#"
            WITH existing AS (
                SELECT id FROM work_items
                WHERE queue = $1 AND singleton_key = $2
                  AND state IN ('QUEUED', 'ACTIVE', 'RETRY')
                LIMIT 1
            ),
            inserted AS (
                INSERT INTO work_items
                    (queue, key, singleton_key, state, available_at, attempts, max_attempts, payload, created_at, updated_at)
                SELECT $1, $3, $2, 'QUEUED', now(), 0, $4, $5, now(), now()
                WHERE NOT EXISTS (SELECT 1 FROM existing)
                RETURNING id
            )
            SELECT id, false AS was_existing FROM inserted
            UNION ALL
            SELECT id, true AS was_existing FROM existing
            LIMIT 1
            "#,
        )
        .bind(queue)
        .bind(singleton_key)
        .bind(key)
        .bind(opts.max_attempts)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.try_get("id")?;
        let was_existing: bool = row.try_get("was_existing")?;
        let outcome = if was_existing {
            PublishOutcome::SingletonActive
        } else {
            PublishOutcome::Created
        };
        debug!(queue, singleton_key, id, ?outcome, "published work item");
        Ok(Published { id, outcome })
    }

    /// Atomically move up to `n` eligible rows to ACTIVE and return them.
    /// Fairness: prefer keys with no currently-ACTIVE row (§4.1/§5), so one
    /// slow SP cannot starve the rest of the fleet.
    pub async fn fetch(
        &self,
        queue: &str,
        n: i64,
        visibility_timeout: Duration,
    ) -> Result<Vec<WorkItem>, QueueError> {
        let visibility_secs = visibility_timeout.as_secs_f64();
        let rows = sqlx::query_as::<_, WorkItem>(
            r#"
            WITH active_keys AS (
                SELECT DISTINCT key FROM work_items
                WHERE queue = $1 AND state = 'ACTIVE'
            ),
            candidates AS (
                SELECT id FROM work_items
                WHERE queue = $1
                  AND state IN ('QUEUED', 'RETRY')
                  AND available_at <= now()
                ORDER BY (key IN (SELECT key FROM active_keys)), available_at ASC, created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE work_items
            SET state = 'ACTIVE',
                attempts = attempts + 1,
                visibility_expires_at = now() + make_interval(secs => $3),
                updated_at = now()
            FROM candidates
            WHERE work_items.id = candidates.id
            RETURNING work_items.*
            "#,
        )
        .bind(queue)
        .bind(n)
        .bind(visibility_secs)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn complete(&self, id: i64) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"UPDATE work_items SET state = 'COMPLETED', updated_at = now()
               WHERE id = $1 AND state = 'ACTIVE'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotActive(id));
        }
        Ok(())
    }

    /// Fail an ACTIVE item. Schedules a RETRY with exponential backoff unless
    /// `attempts >= max_attempts`, in which case it becomes terminally
    /// FAILED with `error` persisted, per §4.1.
    pub async fn fail(&self, id: i64, error: &str) -> Result<(), QueueError> {
        let row = sqlx::query(
            r#"SELECT attempts, max_attempts FROM work_items WHERE id = $1 AND state = 'ACTIVE'"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(QueueError::NotActive(id))?;

        let attempts: i32 = row.try_get("attempts")?;
        let max_attempts: i32 = row.try_get("max_attempts")?;

        if attempts >= max_attempts {
            sqlx::query(
                r#"UPDATE work_items SET state = 'FAILED', error_message = $2, updated_at = now()
                   WHERE id = $1"#,
            )
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;
            warn!(id, error, "work item failed after max attempts");
        } else {
            let delay = self.backoff.delay_for(attempts);
            sqlx::query(
                r#"UPDATE work_items
                   SET state = 'RETRY',
                       available_at = now() + make_interval(secs => $2),
                       error_message = $3,
                       updated_at = now()
                   WHERE id = $1"#,
            )
            .bind(id)
            .bind(delay.as_secs_f64())
            .bind(error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Cancel an ACTIVE item, moving it straight to terminal FAILED without a
    /// retry. Used for operator-initiated cancellation per §5.
    pub async fn cancel(&self, id: i64) -> Result<(), QueueError> {
        let result = sqlx::query(
            r#"UPDATE work_items SET state = 'FAILED', error_message = 'cancelled', updated_at = now()
               WHERE id = $1 AND state = 'ACTIVE'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(QueueError::NotActive(id));
        }
        Ok(())
    }

    /// Reclaim ACTIVE rows whose visibility window has expired back to
    /// RETRY, incrementing `attempts`. Recovers from worker crashes per §4.1:
    /// "crashes mid-work leak ACTIVE rows that sweep recovers after the
    /// visibility window."
    pub async fn sweep(&self) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE work_items
            SET state = CASE WHEN attempts >= max_attempts THEN 'FAILED' ELSE 'RETRY' END,
                error_message = CASE WHEN attempts >= max_attempts
                    THEN 'max attempts exceeded after visibility timeout'
                    ELSE error_message END,
                updated_at = now()
            WHERE state = 'ACTIVE' AND visibility_expires_at < now()
            "#,
        )
        .execute(&self.pool)
        .await?;

        let swept = result.rows_affected();
        if swept > 0 {
            warn!(swept, "reclaimed stale ACTIVE work items");
        }
        Ok(swept)
    }
}
