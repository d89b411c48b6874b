// Job Queue Port (Interface)

use crate::domain::{FailOutcome, Job, JobId, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Queue interface for job storage and claiming
///
/// Implementations own the retry policy: `fail` decides between requeue and
/// the dead set, so every worker sharing a store applies the same bound.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Append a job to the pending set
    ///
    /// # Errors
    /// - `AppError::StoreUnavailable` if the store cannot accept the job
    async fn enqueue(&self, job: &Job) -> Result<JobId>;

    /// Atomically claim the next available job of `queue` (FIFO)
    ///
    /// The returned job is already RUNNING with its attempt counter bumped.
    /// No two callers ever receive the same claim.
    async fn dequeue(&self, queue: &str) -> Result<Option<Job>>;

    /// Mark a RUNNING job as DONE
    ///
    /// Returns `false` when the job was not RUNNING (already acked), which
    /// makes a second `ack` a no-op.
    async fn ack(&self, id: &JobId) -> Result<bool>;

    /// Report a failed attempt; requeues with backoff or moves to the dead set
    async fn fail(&self, id: &JobId, reason: &str) -> Result<FailOutcome>;

    /// Move a RUNNING job straight to the dead set (non-retryable failure)
    async fn bury(&self, id: &JobId, reason: &str) -> Result<()>;

    /// Give a cancelled in-flight job back to the pending set, attempt not consumed
    async fn release(&self, id: &JobId) -> Result<()>;

    /// Re-queue a dead job with a fresh attempt budget
    async fn retry_dead(&self, id: &JobId) -> Result<()>;

    /// Find job by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>>;

    /// Find all jobs in a state, oldest first (recovery, dead-letter view)
    async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>>;

    /// Count jobs by state
    async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::application::retry::{RetryDecision, RetryPolicy};
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory queue, insertion-ordered. Claims are serialized by one mutex.
    pub struct InMemoryJobQueue {
        jobs: Mutex<Vec<Job>>,
        retry_policy: Arc<RetryPolicy>,
        time_provider: Arc<dyn TimeProvider>,
        unavailable: AtomicBool,
    }

    impl InMemoryJobQueue {
        pub fn new(retry_policy: Arc<RetryPolicy>, time_provider: Arc<dyn TimeProvider>) -> Self {
            Self {
                jobs: Mutex::new(Vec::new()),
                retry_policy,
                time_provider,
                unavailable: AtomicBool::new(false),
            }
        }

        /// Simulate an outage: every call fails with `StoreUnavailable`
        pub fn set_unavailable(&self, unavailable: bool) {
            self.unavailable.store(unavailable, Ordering::SeqCst);
        }

        fn check_available(&self) -> Result<()> {
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(AppError::StoreUnavailable("in-memory queue offline".to_string()));
            }
            Ok(())
        }

        fn with_job<T>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> Result<T>) -> Result<T> {
            self.check_available()?;
            let mut jobs = self.jobs.lock().unwrap();
            let job = jobs
                .iter_mut()
                .find(|j| &j.id == id)
                .ok_or_else(|| AppError::NotFound(format!("Job {} not found", id)))?;
            f(job)
        }
    }

    #[async_trait]
    impl JobQueue for InMemoryJobQueue {
        async fn enqueue(&self, job: &Job) -> Result<JobId> {
            self.check_available()?;
            self.jobs.lock().unwrap().push(job.clone());
            Ok(job.id.clone())
        }

        async fn dequeue(&self, queue: &str) -> Result<Option<Job>> {
            self.check_available()?;
            let now = self.time_provider.now_millis();
            let mut jobs = self.jobs.lock().unwrap();

            // min_by returns the first of equal elements, so insertion order breaks ties
            let next = jobs
                .iter_mut()
                .filter(|j| j.queue == queue && j.state == JobState::Queued && j.available_at <= now)
                .min_by(|a, b| (a.available_at, a.created_at).cmp(&(b.available_at, b.created_at)));

            match next {
                Some(job) => {
                    job.start(now)?;
                    Ok(Some(job.clone()))
                }
                None => Ok(None),
            }
        }

        async fn ack(&self, id: &JobId) -> Result<bool> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| {
                if job.state != JobState::Running {
                    return Ok(false);
                }
                job.complete(now)?;
                Ok(true)
            })
        }

        async fn fail(&self, id: &JobId, reason: &str) -> Result<FailOutcome> {
            let now = self.time_provider.now_millis();
            let policy = Arc::clone(&self.retry_policy);
            self.with_job(id, |job| match policy.decide(job) {
                RetryDecision::Retry(delay_ms) => {
                    policy.prepare_for_retry(job, delay_ms, reason)?;
                    Ok(FailOutcome::Retrying {
                        attempt: job.attempts,
                        available_at: job.available_at,
                    })
                }
                RetryDecision::Exhausted => {
                    job.bury(now, reason)?;
                    Ok(FailOutcome::Dead {
                        attempts: job.attempts,
                    })
                }
            })
        }

        async fn bury(&self, id: &JobId, reason: &str) -> Result<()> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| Ok(job.bury(now, reason)?))
        }

        async fn release(&self, id: &JobId) -> Result<()> {
            self.with_job(id, |job| Ok(job.release()?))
        }

        async fn retry_dead(&self, id: &JobId) -> Result<()> {
            let now = self.time_provider.now_millis();
            self.with_job(id, |job| Ok(job.revive(now)?))
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<Job>> {
            self.check_available()?;
            Ok(self.jobs.lock().unwrap().iter().find(|j| &j.id == id).cloned())
        }

        async fn find_by_state(&self, state: JobState) -> Result<Vec<Job>> {
            self.check_available()?;
            let mut found: Vec<Job> = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.state == state)
                .cloned()
                .collect();
            found.sort_by_key(|j| j.created_at);
            Ok(found)
        }

        async fn count_by_state(&self, queue: &str, state: JobState) -> Result<i64> {
            self.check_available()?;
            let count = self
                .jobs
                .lock()
                .unwrap()
                .iter()
                .filter(|j| j.queue == queue && j.state == state)
                .count();
            Ok(count as i64)
        }
    }

}
