use chrono::Utc;
use probe_types::{JobFamily, StorageProvider};
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use work_queue::{PublishOptions, WorkQueue};

use crate::cron_plan::PlannedSchedule;
use crate::maintenance::{in_any_window, MaintenanceWindow};
use crate::JobPlannerError;

/// Cadence and gating inputs the planner reconciles against, per §4.2 and
/// §6's configuration surface.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub deal_interval_seconds: i64,
    pub retrieval_interval_seconds: i64,
    pub retention_interval_seconds: i64,
    pub metrics_rollup_interval_seconds: i64,
    pub maintenance_windows: Vec<MaintenanceWindow>,
    pub queue_name: String,
    pub max_attempts: i32,
}

impl PlannerConfig {
    fn interval_for(&self, family: JobFamily) -> i64 {
        match family {
            JobFamily::Deal => self.deal_interval_seconds,
            JobFamily::Retrieval => self.retrieval_interval_seconds,
            JobFamily::Retention => self.retention_interval_seconds,
            JobFamily::MetricsRollup => self.metrics_rollup_interval_seconds,
        }
    }
}

/// Outcome of one [`JobPlanner::tick`], surfaced for logging/tests.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub upserted: usize,
    pub deleted: usize,
    pub published: usize,
    pub skipped_maintenance: usize,
}

/// Per-SP schedule materialisation and reconciliation (C7), per §4.2.
///
/// Single-writer: [`JobPlanner::tick`] only does work while it holds the
/// Postgres advisory lock keyed by `queue_name`; every other planner process
/// observes the lock held and returns immediately with an empty report, per
/// §4.2's "single-writer" rule and §5's locking discipline.
pub struct JobPlanner {
    pool: PgPool,
    queue: WorkQueue,
    config: PlannerConfig,
}

impl JobPlanner {
    pub fn new(pool: PgPool, queue: WorkQueue, config: PlannerConfig) -> Self {
        Self {
            pool,
            queue,
            config,
        }
    }

    /// Run one planning tick: enumerate desired schedules for `active_sps`,
    /// reconcile against `job_schedule_state`, and publish due WorkItems.
    /// Returns `Ok(None)` if another process currently holds the advisory
    /// lock (read-only components tolerate the resulting staleness, §4.2).
    pub async fn tick(
        &self,
        active_sps: &[StorageProvider],
    ) -> Result<Option<TickReport>, JobPlannerError> {
        let lock_key = advisory_lock_key(&self.config.queue_name);
        let mut tx = self.pool.begin().await?;

        let acquired: bool = sqlx::query_scalar("SELECT pg_try_advisory_xact_lock($1)")
            .bind(lock_key)
            .fetch_one(&mut *tx)
            .await?;

        if !acquired {
            tx.rollback().await?;
            return Ok(None);
        }

        let report = self.reconcile(&mut tx, active_sps).await?;
        tx.commit().await?;
        Ok(Some(report))
    }

    async fn reconcile(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        active_sps: &[StorageProvider],
    ) -> Result<TickReport, JobPlannerError> {
        let mut report = TickReport::default();
        let now = Utc::now();

        let desired: Vec<PlannedSchedule> = active_sps
            .iter()
            .flat_map(|sp| {
                JobFamily::ALL.iter().map(move |family| {
                    PlannedSchedule::compute(*family, &sp.address, self.config.interval_for(*family))
                })
            })
            .collect();

        let desired_keys: std::collections::HashSet<(String, String)> = desired
            .iter()
            .map(|p| (p.family.as_str().to_string(), p.sp_address.clone()))
            .collect();

        // §4.2 step 2: delete schedule rows for SPs no longer present.
        let existing_rows = sqlx::query(r#"SELECT name, key FROM job_schedule_state"#)
            .fetch_all(&mut **tx)
            .await?;
        for row in existing_rows {
            let name: String = row.try_get("name")?;
            let key: String = row.try_get("key")?;
            if !desired_keys.contains(&(name.clone(), key.clone())) {
                sqlx::query(r#"DELETE FROM job_schedule_state WHERE name = $1 AND key = $2"#)
                    .bind(&name)
                    .bind(&key)
                    .execute(&mut **tx)
                    .await?;
                report.deleted += 1;
            }
        }

        for planned in &desired {
            let name = planned.family.as_str();
            let key = &planned.sp_address;

            let current_next_run: Option<chrono::DateTime<Utc>> = sqlx::query_scalar(
                r#"SELECT next_run_at FROM job_schedule_state WHERE name = $1 AND key = $2"#,
            )
            .bind(name)
            .bind(key)
            .fetch_optional(&mut **tx)
            .await?;

            let next_run_at = match current_next_run {
                Some(existing) => existing,
                None => {
                    sqlx::query(
                        r#"
                        INSERT INTO job_schedule_state (name, key, cron, next_run_at, payload)
                        VALUES ($1, $2, $3, $4, $5)
                        "#,
                    )
                    .bind(name)
                    .bind(key)
                    .bind(&planned.cron_expr)
                    .bind(planned.next_after(now))
                    .bind(serde_json::json!({ "sp_address": key }))
                    .execute(&mut **tx)
                    .await?;
                    report.upserted += 1;
                    continue;
                }
            };

            if next_run_at > now {
                continue;
            }

            // §4.2 step 4: skip publish if inside a maintenance window.
            if let Some(window) = in_any_window(&self.config.maintenance_windows, now) {
                warn!(family = name, sp = %key, window = %window.label(), "skipping publish: maintenance window");
                report.skipped_maintenance += 1;
                continue;
            }

            let singleton_key = format!("{name}:{key}");
            let payload = serde_json::json!({ "family": name, "sp_address": key });
            self.queue
                .publish(
                    &self.config.queue_name,
                    key,
                    &singleton_key,
                    payload,
                    PublishOptions {
                        max_attempts: self.config.max_attempts,
                    },
                )
                .await
                .map_err(JobPlannerError::Queue)?;
            report.published += 1;

            let advanced = planned.next_after(now);
            sqlx::query(
                r#"UPDATE job_schedule_state SET next_run_at = $3, cron = $4 WHERE name = $1 AND key = $2"#,
            )
            .bind(name)
            .bind(key)
            .bind(advanced)
            .bind(&planned.cron_expr)
            .execute(&mut **tx)
            .await?;
        }

        info!(
            upserted = report.upserted,
            deleted = report.deleted,
            published = report.published,
            skipped_maintenance = report.skipped_maintenance,
            "planner tick complete"
        );
        Ok(report)
    }
}

/// Derive a stable `bigint` advisory lock key from the queue name, per §5:
/// "The planner uses an advisory lock keyed by the queue name."
fn advisory_lock_key(queue_name: &str) -> i64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    queue_name.hash(&mut hasher);
    hasher.finish() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advisory_lock_key_is_deterministic() {
        assert_eq!(advisory_lock_key("probes"), advisory_lock_key("probes"));
        assert_ne!(advisory_lock_key("probes"), advisory_lock_key("retention"));
    }
}
