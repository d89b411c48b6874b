// Crash recovery logic
use crate::domain::JobState;
use crate::port::{JobQueue, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::worker::constants::DEFAULT_RECOVERY_WINDOW_MS;

/// Crash recovery service
///
/// On worker-process startup, hands back jobs that were RUNNING when a
/// previous process died so they are not stranded in-flight forever
pub struct RecoveryService {
    queue: Arc<dyn JobQueue>,
    time_provider: Arc<dyn TimeProvider>,
    recovery_window_ms: i64,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Arguments
    /// * `queue` - Job queue
    /// * `time_provider` - Time provider
    /// * `recovery_window_ms` - Optional custom recovery window (default: 5 minutes)
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(queue, time_provider, None);
    /// recovery.recover_orphaned_jobs().await.unwrap();
    /// ```
    pub fn new(
        queue: Arc<dyn JobQueue>,
        time_provider: Arc<dyn TimeProvider>,
        recovery_window_ms: Option<i64>,
    ) -> Self {
        Self {
            queue,
            time_provider,
            recovery_window_ms: recovery_window_ms.unwrap_or(DEFAULT_RECOVERY_WINDOW_MS),
        }
    }

    /// Recover orphaned jobs on startup
    ///
    /// Algorithm:
    /// 1. Find all RUNNING jobs with `started_at < now - recovery_window`
    /// 2. Release each back to QUEUED; the interrupted attempt is not counted
    /// 3. RUNNING jobs without `started_at` are inconsistent and released too
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        let now = self.time_provider.now_millis();
        let cutoff = now - self.recovery_window_ms;

        info!(
            cutoff_time = %cutoff,
            recovery_window_ms = %self.recovery_window_ms,
            "Starting orphaned job recovery"
        );

        let running_jobs = self.queue.find_by_state(JobState::Running).await?;
        let mut recovered_count = 0;

        for job in running_jobs {
            match job.started_at {
                Some(started_at) if started_at >= cutoff => continue,
                Some(started_at) => {
                    info!(
                        job_id = %job.id,
                        started_at = %started_at,
                        cutoff = %cutoff,
                        "Recovering orphaned job"
                    );
                }
                None => {
                    warn!(job_id = %job.id, "RUNNING job without started_at, releasing");
                }
            }

            self.queue.release(&job.id).await?;
            recovered_count += 1;
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}
