// SQLite JobQueue Implementation
//
// Every state change is a single conditional UPDATE. SQLite takes the write
// lock when such a statement begins, so two workers can never claim or settle
// the same row, even across processes sharing the database file.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tenantq_core::application::retry::{RetryDecision, RetryPolicy};
use tenantq_core::domain::{DomainError, FailOutcome, Job, JobId, JobKind, JobPayload, JobState};
use tenantq_core::error::{AppError, Result};
use tenantq_core::port::{JobQueue, TimeProvider};
use tracing::debug;

pub struct SqliteJobQueue {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    retry_policy: Arc<RetryPolicy>,
}

impl SqliteJobQueue {
    pub fn new(
        pool: SqlitePool,
        time_provider: Arc<dyn TimeProvider>,
        retry_policy: Arc<RetryPolicy>,
    ) -> Self {
        Self {
            pool,
            time_provider,
            retry_policy,
        }
    }

    /// Job counts grouped by queue and state (operator status view)
    pub async fn state_counts(&self) -> Result<Vec<(String, JobState, i64)>> {
        let rows: Vec<(String, String, i64)> = sqlx::query_as(
            r#"
            SELECT queue, state, COUNT(*) FROM jobs
            GROUP BY queue, state
            ORDER BY queue ASC, state ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter()
            .map(|(queue, state, count)| -> Result<(String, JobState, i64)> {
                Ok((queue, state.parse::<JobState>()?, count))
            })
            .collect()
    }

    /// Explain why a conditional UPDATE touched no row
    async fn transition_failure(&self, id: &JobId, to: JobState) -> AppError {
        let current: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT state FROM jobs WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(None) => AppError::NotFound(format!("Job {} not found", id)),
            Ok(Some(from)) => DomainError::InvalidStateTransition {
                from,
                to: to.to_string(),
            }
            .into(),
            Err(e) => map_sqlx_error(e),
        }
    }
}

#[async_trait]
impl JobQueue for SqliteJobQueue {
    async fn enqueue(&self, job: &Job) -> Result<JobId> {
        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, queue, kind, payload, tenant_id, state,
                created_at, available_at, started_at, finished_at,
                attempts, max_attempts, backoff_factor, last_error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.id)
        .bind(&job.queue)
        .bind(job.kind.as_str())
        .bind(job.payload.as_value().to_string())
        .bind(&job.tenant_id)
        .bind(job.state.to_string())
        .bind(job.created_at)
        .bind(job.available_at)
        .bind(job.started_at)
        .bind(job.finished_at)
        .bind(job.attempts)
        .bind(job.max_attempts)
        .bind(job.backoff_factor)
        .bind(&job.last_error)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(job.id.clone())
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<Job>> {
        let now = self.time_provider.now_millis();

        // rowid breaks ties between jobs enqueued in the same millisecond
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            UPDATE jobs
            SET state = ?, started_at = ?, attempts = attempts + 1
            WHERE id = (
                SELECT id FROM jobs
                WHERE queue = ? AND state = ? AND available_at <= ?
                ORDER BY available_at ASC, created_at ASC, rowid ASC
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(JobState::Running.to_string())
        .bind(now)
        .bind(queue)
        .bind(JobState::Queued.to_string())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn ack(&self, id: &JobId) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, finished_at = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Done.to_string())
        .bind(now)
        .bind(id)
        .bind(JobState::Running.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Unknown id is an error; any other state means the ack already happened
        match self.find_by_id(id).await? {
            Some(_) => {
                debug!(job_id = %id, "Ack on a job that is no longer running");
                Ok(false)
            }
            None => Err(AppError::NotFound(format!("Job {} not found", id))),
        }
    }

    async fn fail(&self, id: &JobId, reason: &str) -> Result<FailOutcome> {
        let now = self.time_provider.now_millis();
        let mut job = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;

        if job.state != JobState::Running {
            return Err(DomainError::InvalidStateTransition {
                from: job.state.to_string(),
                to: JobState::Queued.to_string(),
            }
            .into());
        }
        let claimed_attempt = job.attempts;

        let (result, outcome) = match self.retry_policy.decide(&job) {
            RetryDecision::Retry(delay_ms) => {
                self.retry_policy
                    .prepare_for_retry(&mut job, delay_ms, reason)?;
                let result = sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = ?, available_at = ?, started_at = NULL, last_error = ?
                    WHERE id = ? AND state = ? AND attempts = ?
                    "#,
                )
                .bind(JobState::Queued.to_string())
                .bind(job.available_at)
                .bind(reason)
                .bind(id)
                .bind(JobState::Running.to_string())
                .bind(claimed_attempt)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
                let outcome = FailOutcome::Retrying {
                    attempt: job.attempts,
                    available_at: job.available_at,
                };
                (result, outcome)
            }
            RetryDecision::Exhausted => {
                let result = sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = ?, finished_at = ?, last_error = ?
                    WHERE id = ? AND state = ? AND attempts = ?
                    "#,
                )
                .bind(JobState::Failed.to_string())
                .bind(now)
                .bind(reason)
                .bind(id)
                .bind(JobState::Running.to_string())
                .bind(claimed_attempt)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
                let outcome = FailOutcome::Dead {
                    attempts: claimed_attempt,
                };
                (result, outcome)
            }
        };

        if result.rows_affected() == 0 {
            // Settled by someone else between read and write
            return Err(self.transition_failure(id, JobState::Queued).await);
        }
        Ok(outcome)
    }

    async fn bury(&self, id: &JobId, reason: &str) -> Result<()> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, finished_at = ?, last_error = ?
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Failed.to_string())
        .bind(now)
        .bind(reason)
        .bind(id)
        .bind(JobState::Running.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_failure(id, JobState::Failed).await);
        }
        Ok(())
    }

    async fn release(&self, id: &JobId) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, started_at = NULL, attempts = MAX(attempts - 1, 0)
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Queued.to_string())
        .bind(id)
        .bind(JobState::Running.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_failure(id, JobState::Queued).await);
        }
        Ok(())
    }

    async fn retry_dead(&self, id: &JobId) -> Result<()> {
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?, attempts = 0, available_at = ?, started_at = NULL, finished_at = NULL
            WHERE id = ? AND state = ?
            "#,
        )
        .bind(JobState::Queued.to_string())
        .bind(now)
        .bind(id)
        .bind(JobState::Failed.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.transition_failure(id, JobState::Queued).await);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            r#"
            SELECT * FROM jobs
            WHERE state = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(state.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE queue = ? AND state = ?")
                .bind(queue)
                .bind(state.to_string())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    queue: String,
    kind: String,
    payload: String,
    tenant_id: Option<String>,
    state: String,
    created_at: i64,
    available_at: i64,
    started_at: Option<i64>,
    finished_at: Option<i64>,
    attempts: i32,
    max_attempts: i32,
    backoff_factor: f64,
    last_error: Option<String>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;

        Ok(Job {
            id: self.id,
            queue: self.queue,
            kind: self.kind.parse::<JobKind>()?,
            payload: JobPayload::new(payload),
            tenant_id: self.tenant_id,
            state: self.state.parse::<JobState>()?,
            created_at: self.created_at,
            available_at: self.available_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
            attempts: self.attempts,
            max_attempts: self.max_attempts,
            backoff_factor: self.backoff_factor,
            last_error: self.last_error,
        })
    }
}
