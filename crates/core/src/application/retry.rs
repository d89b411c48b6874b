// Retry logic
use crate::domain::Job;
use crate::port::TimeProvider;
use std::sync::Arc;
use tracing::{info, warn};

/// Retry decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the job (with backoff delay in ms)
    Retry(i64),
    /// Do not retry, attempts are exhausted
    Exhausted,
}

/// Retry policy
///
/// Determines if a failed attempt should be retried based on:
/// - Attempts consumed so far (bumped on every claim)
/// - Maximum attempts allowed for the job
/// - Backoff factor for exponential delay
pub struct RetryPolicy {
    time_provider: Arc<dyn TimeProvider>,
    base_delay_ms: i64,
}

impl RetryPolicy {
    /// Create a new retry policy
    ///
    /// # Arguments
    /// * `time_provider` - Time provider for current time
    /// * `base_delay_ms` - Base delay in milliseconds (default: 1000, 0 = immediate)
    ///
    /// # Example
    /// ```text
    /// let policy = RetryPolicy::new(Arc::new(SystemTimeProvider), 1000);
    /// ```
    pub fn new(time_provider: Arc<dyn TimeProvider>, base_delay_ms: i64) -> Self {
        Self {
            time_provider,
            base_delay_ms,
        }
    }

    /// Determine if a job should be retried after a failed attempt
    ///
    /// Returns:
    /// - `RetryDecision::Retry(delay_ms)` if attempts remain
    /// - `RetryDecision::Exhausted` once `attempts >= max_attempts`
    ///
    /// Backoff formula:
    /// delay = base_delay * (backoff_factor ^ (attempt - 1)) * jitter
    pub fn decide(&self, job: &Job) -> RetryDecision {
        if job.is_exhausted() {
            warn!(
                job_id = %job.id,
                attempts = %job.attempts,
                max_attempts = %job.max_attempts,
                "Max retry attempts reached"
            );
            return RetryDecision::Exhausted;
        }

        let exponent = (job.attempts - 1).max(0);
        let base_delay_ms = self.base_delay_ms as f64 * job.backoff_factor.powi(exponent);

        // ±10%, deterministic per job id
        let jitter_seed = job.id.chars().map(|c| c as u32).sum::<u32>();
        let jitter_factor = 0.9 + ((jitter_seed % 21) as f64 / 100.0); // 0.9 to 1.1

        let delay_ms = (base_delay_ms * jitter_factor) as i64;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            max_attempts = %job.max_attempts,
            delay_ms = %delay_ms,
            "Scheduling retry"
        );

        RetryDecision::Retry(delay_ms)
    }

    /// Prepare a job for retry
    ///
    /// Puts the job back in the pending set, available after `delay_ms`
    pub fn prepare_for_retry(
        &self,
        job: &mut Job,
        delay_ms: i64,
        reason: &str,
    ) -> crate::domain::error::Result<()> {
        let available_at = self.time_provider.now_millis() + delay_ms;
        job.requeue(available_at, reason)?;

        info!(
            job_id = %job.id,
            attempt = %job.attempts,
            available_at = %available_at,
            "Job prepared for retry"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobKind, JobPayload, JobState};
    use crate::port::time_provider::mocks::ManualTimeProvider;

    fn policy(base_delay_ms: i64) -> RetryPolicy {
        RetryPolicy::new(Arc::new(ManualTimeProvider::new(10_000)), base_delay_ms)
    }

    fn running_job(max_attempts: i32) -> Job {
        let mut job = Job::new_test("default", JobKind::LogValue, JobPayload::empty())
            .with_max_attempts(max_attempts);
        job.start(10_000).unwrap();
        job
    }

    #[test]
    fn test_retry_until_max_attempts() {
        let policy = policy(0);
        let mut job = running_job(2);
        assert_eq!(policy.decide(&job), RetryDecision::Retry(0));

        policy.prepare_for_retry(&mut job, 0, "first").unwrap();
        job.start(10_000).unwrap();
        assert_eq!(job.attempts, 2);
        assert_eq!(policy.decide(&job), RetryDecision::Exhausted);
    }

    #[test]
    fn test_backoff_grows_with_attempts() {
        let policy = policy(1000);
        let mut job = running_job(5);

        let first = match policy.decide(&job) {
            RetryDecision::Retry(d) => d,
            RetryDecision::Exhausted => panic!("should retry"),
        };
        assert!((900..=1100).contains(&first));

        policy.prepare_for_retry(&mut job, first, "again").unwrap();
        job.start(20_000).unwrap();
        let second = match policy.decide(&job) {
            RetryDecision::Retry(d) => d,
            RetryDecision::Exhausted => panic!("should retry"),
        };
        assert!(second > first);
    }

    #[test]
    fn test_prepare_for_retry_sets_availability() {
        let policy = policy(0);
        let mut job = running_job(3);
        policy.prepare_for_retry(&mut job, 250, "nope").unwrap();

        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.available_at, 10_250);
        assert_eq!(job.last_error.as_deref(), Some("nope"));
    }
}
