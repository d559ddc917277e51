// SQLite JobBroker Implementation

use crate::error::{corrupt_column, map_sqlx_error};
use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tally_core::domain::{
    Job, JobId, JobOptions, JobResult, JobState, LeaseToken, NewJob, Progress, QueueName,
};
use tally_core::error::{AppError, Result};
use tally_core::port::{IdProvider, JobBroker, TimeProvider};
use tracing::{debug, warn};

pub struct SqliteJobBroker {
    pool: SqlitePool,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteJobBroker {
    pub fn new(
        pool: SqlitePool,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            pool,
            id_provider,
            time_provider,
        }
    }

    /// Explain why a lease-guarded UPDATE touched no row
    async fn not_leased(&self, id: &str, lease: LeaseToken) -> AppError {
        let row: std::result::Result<Option<(String, i64)>, _> =
            sqlx::query_as("SELECT state, lease_token FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;
        match row {
            Ok(Some((_, current))) if current != lease => AppError::LeaseLost(format!(
                "Job {} lease {} superseded by {}",
                id, lease, current
            )),
            Ok(Some((state, _))) => {
                AppError::InvalidState(format!("Job {} is {}, expected active", id, state))
            }
            Ok(None) => AppError::NotFound(format!("Job {}", id)),
            Err(e) => map_sqlx_error(e),
        }
    }

    /// Keep the newest `keep` jobs of a queue in a terminal state
    async fn trim(
        tx: &mut Transaction<'_, Sqlite>,
        queue: &str,
        terminal: JobState,
        keep: u32,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE queue = ? AND state = ? AND seq NOT IN (
                SELECT seq FROM jobs
                WHERE queue = ? AND state = ?
                ORDER BY finished_at DESC, seq DESC
                LIMIT ?
            )
            "#,
        )
        .bind(queue)
        .bind(terminal.as_str())
        .bind(queue)
        .bind(terminal.as_str())
        .bind(i64::from(keep))
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

fn parse_options(raw: &str) -> Result<JobOptions> {
    serde_json::from_str(raw).map_err(|e| corrupt_column("options", e))
}

#[async_trait]
impl JobBroker for SqliteJobBroker {
    async fn enqueue(&self, new_job: NewJob) -> Result<JobId> {
        let id = self.id_provider.generate_id();
        let job = Job::from_new(id, self.time_provider.now_millis(), new_job);

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, job_type, payload, options, priority, state,
                attempts_made, created_at, run_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(job.queue.as_str())
        .bind(job.job_type().as_str())
        .bind(serde_json::to_string(&job.payload)?)
        .bind(serde_json::to_string(&job.options)?)
        .bind(job.options.priority)
        .bind(job.state.as_str())
        .bind(job.attempts_made)
        .bind(job.created_at)
        .bind(job.run_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(job_id = %job.id, queue = %job.queue, state = %job.state, "Job enqueued");
        Ok(job.id)
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn dequeue(&self, queue: QueueName, lease_ms: i64) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        sqlx::query(
            "UPDATE jobs SET state = 'waiting' WHERE queue = ? AND state = 'delayed' AND run_at <= ?",
        )
        .bind(queue.as_str())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        // Single statement: concurrent workers never lease the same row
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = 'active', processed_at = ?, lease_expires_at = ?,
                lease_token = lease_token + 1
            WHERE seq = (
                SELECT seq FROM jobs
                WHERE queue = ? AND state = 'waiting'
                ORDER BY priority ASC, run_at ASC, seq ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now.saturating_add(lease_ms))
        .bind(queue.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update_progress(
        &self,
        id: &str,
        lease: LeaseToken,
        progress: &Progress,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE jobs SET progress = ? WHERE id = ? AND state = 'active' AND lease_token = ?",
        )
        .bind(serde_json::to_string(progress)?)
        .bind(id)
        .bind(lease)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.not_leased(id, lease).await);
        }
        Ok(())
    }

    async fn complete(&self, id: &str, lease: LeaseToken, result: &JobResult) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let updated: Option<(String, String)> = sqlx::query_as(
            r#"
            UPDATE jobs
            SET state = 'completed', attempts_made = attempts_made + 1,
                result = ?, finished_at = ?, lease_expires_at = NULL
            WHERE id = ? AND state = 'active' AND lease_token = ?
            RETURNING queue, options
            "#,
        )
        .bind(serde_json::to_string(result)?)
        .bind(now)
        .bind(id)
        .bind(lease)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let Some((queue, options)) = updated else {
            drop(tx);
            return Err(self.not_leased(id, lease).await);
        };

        let keep = parse_options(&options)?.retention.on_complete;
        let evicted = Self::trim(&mut tx, &queue, JobState::Completed, keep).await?;
        tx.commit().await.map_err(map_sqlx_error)?;

        if evicted > 0 {
            debug!(queue = %queue, evicted, "Trimmed completed jobs");
        }
        Ok(())
    }

    async fn fail(
        &self,
        id: &str,
        lease: LeaseToken,
        reason: &str,
        retry_at: Option<i64>,
    ) -> Result<()> {
        let now = self.time_provider.now_millis();
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let updated: Option<(String, String)> = match retry_at {
            Some(run_at) => {
                let next_state = if run_at > now {
                    JobState::Delayed
                } else {
                    JobState::Waiting
                };
                sqlx::query_as(
                    r#"
                    UPDATE jobs
                    SET state = ?, attempts_made = attempts_made + 1, failed_reason = ?,
                        run_at = ?, lease_expires_at = NULL
                    WHERE id = ? AND state = 'active' AND lease_token = ?
                    RETURNING queue, options
                    "#,
                )
                .bind(next_state.as_str())
                .bind(reason)
                .bind(run_at)
                .bind(id)
                .bind(lease)
                .fetch_optional(&mut *tx)
                .await
            }
            None => {
                sqlx::query_as(
                    r#"
                    UPDATE jobs
                    SET state = 'failed', attempts_made = attempts_made + 1, failed_reason = ?,
                        finished_at = ?, lease_expires_at = NULL
                    WHERE id = ? AND state = 'active' AND lease_token = ?
                    RETURNING queue, options
                    "#,
                )
                .bind(reason)
                .bind(now)
                .bind(id)
                .bind(lease)
                .fetch_optional(&mut *tx)
                .await
            }
        }
        .map_err(map_sqlx_error)?;

        let Some((queue, options)) = updated else {
            drop(tx);
            return Err(self.not_leased(id, lease).await);
        };

        if retry_at.is_none() {
            let keep = parse_options(&options)?.retention.on_fail;
            let evicted = Self::trim(&mut tx, &queue, JobState::Failed, keep).await?;
            if evicted > 0 {
                debug!(queue = %queue, evicted, "Trimmed failed jobs");
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn remove_pending(&self, id: &str) -> Result<bool> {
        let result =
            sqlx::query("DELETE FROM jobs WHERE id = ? AND state IN ('waiting', 'delayed')")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, queue: QueueName, states: &[JobState]) -> Result<Vec<Job>> {
        if states.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; states.len()].join(", ");
        let sql = format!(
            "SELECT * FROM jobs WHERE queue = ? AND state IN ({}) ORDER BY seq ASC",
            placeholders
        );

        let mut query = sqlx::query_as::<_, JobRow>(&sql).bind(queue.as_str());
        for state in states {
            query = query.bind(state.as_str());
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count(&self, queue: QueueName, state: JobState) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
            .bind(queue.as_str())
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn reclaim_expired_leases(&self) -> Result<Vec<JobId>> {
        let now = self.time_provider.now_millis();

        let ids: Vec<String> = sqlx::query_scalar(
            r#"
            UPDATE jobs
            SET state = 'waiting', lease_expires_at = NULL, lease_token = lease_token + 1
            WHERE state = 'active' AND lease_expires_at IS NOT NULL AND lease_expires_at <= ?
            RETURNING id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if !ids.is_empty() {
            warn!(count = ids.len(), "Reclaimed jobs with expired leases");
        }
        Ok(ids)
    }
}

// Internal row mapping
#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    job_type: String,
    payload: String,
    options: String,
    state: String,
    attempts_made: i32,
    failed_reason: Option<String>,
    progress: Option<String>,
    result: Option<String>,
    created_at: i64,
    run_at: i64,
    processed_at: Option<i64>,
    finished_at: Option<i64>,
    lease_expires_at: Option<i64>,
    lease_token: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let queue: QueueName = self.queue.parse()?;
        let state: JobState = self.state.parse()?;
        let payload: tally_core::domain::JobPayload =
            serde_json::from_str(&self.payload).map_err(|e| corrupt_column("payload", e))?;

        if payload.job_type().as_str() != self.job_type {
            return Err(AppError::Database(format!(
                "Job {} has job_type {} but payload of type {}",
                self.id,
                self.job_type,
                payload.job_type()
            )));
        }

        let progress = self
            .progress
            .map(|raw| serde_json::from_str(&raw).map_err(|e| corrupt_column("progress", e)))
            .transpose()?;
        let result = self
            .result
            .map(|raw| serde_json::from_str(&raw).map_err(|e| corrupt_column("result", e)))
            .transpose()?;

        Ok(Job {
            id: self.id,
            queue,
            payload,
            options: parse_options(&self.options)?,
            state,
            attempts_made: self.attempts_made,
            failed_reason: self.failed_reason,
            progress,
            result,
            created_at: self.created_at,
            run_at: self.run_at,
            processed_at: self.processed_at,
            finished_at: self.finished_at,
            lease_expires_at: self.lease_expires_at,
            lease_token: self.lease_token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use serde_json::json;
    use tally_core::domain::{
        Backoff, EnrichmentPayload, JobPayload, Retention, DEFAULT_PRIORITY, PRIORITY_HIGH,
    };
    use tally_core::port::id_provider::mocks::SequentialIdProvider;
    use tally_core::port::time_provider::mocks::FixedTimeProvider;

    const Q: QueueName = QueueName::LeadsEnrichment;

    async fn setup_test_db() -> (Arc<FixedTimeProvider>, SqliteJobBroker) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(FixedTimeProvider::new(1_000_000));
        let broker = SqliteJobBroker::new(
            pool,
            Arc::new(SequentialIdProvider::new("job")),
            clock.clone(),
        );
        (clock, broker)
    }

    fn new_job(lead_id: i64, delay_ms: i64, priority: i32, retention: Retention) -> NewJob {
        NewJob::new(
            JobPayload::LeadEnrichment(EnrichmentPayload {
                lead_id,
                signals: Default::default(),
            }),
            JobOptions {
                delay_ms,
                attempts: 3,
                backoff: Backoff::exponential(3_000),
                priority,
                retention,
            },
        )
    }

    fn job(lead_id: i64) -> NewJob {
        new_job(lead_id, 0, DEFAULT_PRIORITY, Retention::keep(10, 5))
    }

    #[tokio::test]
    async fn test_enqueue_and_get() {
        let (_clock, broker) = setup_test_db().await;

        let id = broker.enqueue(job(7)).await.unwrap();
        assert_eq!(id, "job-1");

        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.queue, Q);
        assert_eq!(stored.state, JobState::Waiting);
        assert_eq!(stored.created_at, 1_000_000);
        assert_eq!(stored.run_at, 1_000_000);
        assert_eq!(stored.payload.target_id(), Some(7));
        assert!(broker.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delayed_job_promoted_when_due() {
        let (clock, broker) = setup_test_db().await;
        let id = broker
            .enqueue(new_job(1, 5_000, DEFAULT_PRIORITY, Retention::keep(10, 5)))
            .await
            .unwrap();

        assert_eq!(
            broker.get(&id).await.unwrap().unwrap().state,
            JobState::Delayed
        );
        assert!(broker.dequeue(Q, 60_000).await.unwrap().is_none());

        clock.advance(5_000);
        let leased = broker.dequeue(Q, 60_000).await.unwrap().unwrap();
        assert_eq!(leased.id, id);
        assert_eq!(leased.state, JobState::Active);
        assert_eq!(leased.processed_at, Some(1_005_000));
        assert_eq!(leased.lease_expires_at, Some(1_065_000));
    }

    #[tokio::test]
    async fn test_dequeue_order_priority_then_fifo() {
        let (_clock, broker) = setup_test_db().await;
        let first = broker.enqueue(job(1)).await.unwrap();
        let second = broker.enqueue(job(2)).await.unwrap();
        let urgent = broker
            .enqueue(new_job(3, 0, PRIORITY_HIGH, Retention::keep(10, 5)))
            .await
            .unwrap();

        let order: Vec<String> = [
            broker.dequeue(Q, 1_000).await.unwrap().unwrap().id,
            broker.dequeue(Q, 1_000).await.unwrap().unwrap().id,
            broker.dequeue(Q, 1_000).await.unwrap().unwrap().id,
        ]
        .into();
        assert_eq!(order, vec![urgent, first, second]);
        assert!(broker.dequeue(Q, 1_000).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_dequeue_is_scoped_to_queue() {
        let (_clock, broker) = setup_test_db().await;
        broker.enqueue(job(1)).await.unwrap();

        assert!(broker
            .dequeue(QueueName::EmailReminders, 1_000)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_progress_requires_active_job() {
        let (_clock, broker) = setup_test_db().await;
        let id = broker.enqueue(job(1)).await.unwrap();

        let err = broker
            .update_progress(&id, 0, &Progress::percent(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));

        let err = broker
            .update_progress("nope", 0, &Progress::percent(10))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;
        let progress = Progress::from_value(&json!({"progress": 30, "step": "lookup"}));
        broker.update_progress(&id, lease, &progress).await.unwrap();

        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.progress, Some(progress));
    }

    #[tokio::test]
    async fn test_complete_stores_result_and_counts_attempt() {
        let (clock, broker) = setup_test_db().await;
        let id = broker.enqueue(job(1)).await.unwrap();
        let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;
        clock.advance(250);

        let result = JobResult::skipped("Lead is won, enrichment skipped");
        broker.complete(&id, lease, &result).await.unwrap();

        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.attempts_made, 1);
        assert_eq!(stored.finished_at, Some(1_000_250));
        assert_eq!(stored.lease_expires_at, None);
        assert_eq!(stored.result, Some(result));

        // Already terminal
        let err = broker
            .complete(&id, lease, &JobResult::skipped("again"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_fail_retry_then_terminal() {
        let (clock, broker) = setup_test_db().await;
        let id = broker.enqueue(job(1)).await.unwrap();
        let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;

        broker
            .fail(&id, lease, "timeout", Some(1_003_000))
            .await
            .unwrap();
        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Delayed);
        assert_eq!(stored.attempts_made, 1);
        assert_eq!(stored.run_at, 1_003_000);
        assert_eq!(stored.failed_reason.as_deref(), Some("timeout"));

        clock.set(1_003_000);
        let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;
        broker.fail(&id, lease, "timeout again", None).await.unwrap();

        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.attempts_made, 2);
        assert_eq!(stored.finished_at, Some(1_003_000));
    }

    #[tokio::test]
    async fn test_fail_with_due_retry_goes_straight_to_waiting() {
        let (_clock, broker) = setup_test_db().await;
        let id = broker.enqueue(job(1)).await.unwrap();
        let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;

        broker
            .fail(&id, lease, "flaky", Some(1_000_000))
            .await
            .unwrap();
        assert_eq!(
            broker.get(&id).await.unwrap().unwrap().state,
            JobState::Waiting
        );
    }

    #[tokio::test]
    async fn test_retention_keeps_newest_completed() {
        let (clock, broker) = setup_test_db().await;
        let mut ids = Vec::new();
        for lead in 0..3 {
            let id = broker
                .enqueue(new_job(lead, 0, DEFAULT_PRIORITY, Retention::keep(2, 1)))
                .await
                .unwrap();
            let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;
            clock.advance(10);
            broker
                .complete(&id, lease, &JobResult::skipped("noop"))
                .await
                .unwrap();
            ids.push(id);
        }

        assert_eq!(broker.count(Q, JobState::Completed).await.unwrap(), 2);
        assert!(broker.get(&ids[0]).await.unwrap().is_none());
        assert!(broker.get(&ids[1]).await.unwrap().is_some());
        assert!(broker.get(&ids[2]).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_retention_keeps_newest_failed() {
        let (clock, broker) = setup_test_db().await;
        for lead in 0..3 {
            let id = broker
                .enqueue(new_job(lead, 0, DEFAULT_PRIORITY, Retention::keep(2, 1)))
                .await
                .unwrap();
            let lease = broker.dequeue(Q, 1_000).await.unwrap().unwrap().lease_token;
            clock.advance(10);
            broker.fail(&id, lease, "boom", None).await.unwrap();
        }

        let failed = broker.list(Q, &[JobState::Failed]).await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, "job-3");
    }

    #[tokio::test]
    async fn test_remove_pending() {
        let (_clock, broker) = setup_test_db().await;
        let waiting = broker.enqueue(job(1)).await.unwrap();
        let delayed = broker
            .enqueue(new_job(2, 60_000, DEFAULT_PRIORITY, Retention::keep(10, 5)))
            .await
            .unwrap();

        assert!(broker.remove_pending(&delayed).await.unwrap());
        assert!(!broker.remove_pending(&delayed).await.unwrap());

        broker.dequeue(Q, 1_000).await.unwrap();
        assert!(!broker.remove_pending(&waiting).await.unwrap());
        assert!(broker.get(&waiting).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_list_and_count_by_state() {
        let (_clock, broker) = setup_test_db().await;
        broker.enqueue(job(1)).await.unwrap();
        broker.enqueue(job(2)).await.unwrap();
        broker
            .enqueue(new_job(3, 60_000, DEFAULT_PRIORITY, Retention::keep(10, 5)))
            .await
            .unwrap();
        broker.dequeue(Q, 1_000).await.unwrap();

        let pending = broker
            .list(Q, &JobState::PENDING)
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect::<Vec<_>>();
        assert_eq!(pending, vec!["job-1", "job-2", "job-3"]);

        assert_eq!(broker.count(Q, JobState::Active).await.unwrap(), 1);
        assert_eq!(broker.count(Q, JobState::Waiting).await.unwrap(), 1);
        assert_eq!(broker.count(Q, JobState::Delayed).await.unwrap(), 1);
        assert!(broker.list(Q, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reclaim_expired_leases() {
        let (clock, broker) = setup_test_db().await;
        let id = broker.enqueue(job(1)).await.unwrap();
        broker.dequeue(Q, 1_000).await.unwrap();

        assert!(broker.reclaim_expired_leases().await.unwrap().is_empty());

        clock.advance(1_000);
        assert_eq!(broker.reclaim_expired_leases().await.unwrap(), vec![id.clone()]);

        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Waiting);
        assert_eq!(stored.attempts_made, 0);
        assert_eq!(stored.lease_expires_at, None);
    }

    #[tokio::test]
    async fn test_stale_lease_is_fenced_after_reclaim() {
        let (clock, broker) = setup_test_db().await;
        let id = broker.enqueue(job(1)).await.unwrap();
        let stale = broker.dequeue(Q, 1_000).await.unwrap().unwrap();
        assert_eq!(stale.lease_token, 1);

        clock.advance(1_000);
        broker.reclaim_expired_leases().await.unwrap();
        let current = broker.dequeue(Q, 60_000).await.unwrap().unwrap();
        assert_eq!(current.id, id);
        assert_eq!(current.lease_token, 3);

        let err = broker
            .complete(&id, stale.lease_token, &JobResult::skipped("late"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LeaseLost(_)));
        let err = broker
            .fail(&id, stale.lease_token, "late", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LeaseLost(_)));
        let err = broker
            .update_progress(&id, stale.lease_token, &Progress::percent(90))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LeaseLost(_)));

        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Active);
        assert_eq!(stored.attempts_made, 0);
        assert!(stored.progress.is_none());

        broker
            .complete(&id, current.lease_token, &JobResult::skipped("done"))
            .await
            .unwrap();
        let stored = broker.get(&id).await.unwrap().unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert_eq!(stored.attempts_made, 1);
    }
}
