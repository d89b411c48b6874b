// Completion Event

use crate::domain::job::{Job, JobId, JobKind};
use crate::domain::tenant::TenantContext;
use serde::{Deserialize, Serialize};

/// Published once per successfully executed job.
///
/// The tenant context is snapshotted here so listeners never need the
/// worker's scope to know where the job ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub job_id: JobId,
    pub kind: JobKind,
    pub queue: String,
    pub tenant: TenantContext,
    pub attempt: i32,
    pub finished_at: i64,
}

impl CompletionEvent {
    pub fn new(job: &Job, tenant: TenantContext, finished_at: i64) -> Self {
        Self {
            job_id: job.id.clone(),
            kind: job.kind,
            queue: job.queue.clone(),
            tenant,
            attempt: job.attempts,
            finished_at,
        }
    }
}
