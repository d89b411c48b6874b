// Enqueue Use Case

use crate::application::tenant_resolver::TenantResolver;
use crate::application::worker::constants::{DEFAULT_MAX_ATTEMPTS, MAX_ATTEMPTS_LIMIT};
use crate::domain::{Job, JobKind, JobPayload, DEFAULT_QUEUE};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobQueue, Tenancy, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::info;

const MAX_QUEUE_NAME_LEN: usize = 64;

/// Dispatch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub kind: JobKind,

    #[serde(default = "default_queue")]
    pub queue: String,

    #[serde(default = "default_payload")]
    pub payload: serde_json::Value,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: i32,
}

fn default_queue() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_payload() -> serde_json::Value {
    serde_json::json!({})
}

fn default_max_attempts() -> i32 {
    DEFAULT_MAX_ATTEMPTS
}

impl DispatchRequest {
    pub fn new(kind: JobKind, payload: serde_json::Value) -> Self {
        Self {
            kind,
            queue: default_queue(),
            payload,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn create_user() -> Self {
        Self::new(JobKind::CreateUser, default_payload())
    }

    pub fn log_value(attribute: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(
            JobKind::LogValue,
            serde_json::json!({ "attribute": attribute.into(), "target": target.into() }),
        )
    }

    pub fn on_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Validate a dispatch request before it reaches the store
pub fn validate_request(req: &DispatchRequest) -> Result<()> {
    if req.queue.is_empty() {
        return Err(AppError::Validation("Queue name must not be empty".to_string()));
    }
    if req.queue.len() > MAX_QUEUE_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Queue name too long ({} > {})",
            req.queue.len(),
            MAX_QUEUE_NAME_LEN
        )));
    }
    if !req
        .queue
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(AppError::Validation(format!(
            "Queue name must be alphanumeric (with '_' or '-'): {}",
            req.queue
        )));
    }
    if !req.payload.is_object() {
        return Err(AppError::Validation("Payload must be a JSON object".to_string()));
    }
    if !(1..=MAX_ATTEMPTS_LIMIT).contains(&req.max_attempts) {
        return Err(AppError::Validation(format!(
            "max_attempts {} out of range (1..={})",
            req.max_attempts, MAX_ATTEMPTS_LIMIT
        )));
    }
    Ok(())
}

/// Execute enqueue use case
///
/// # Arguments
///
/// * `queue` - Job queue
/// * `tenancy` - Tenancy collaborator of the dispatching scope
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Dispatch request
pub async fn execute(
    queue: &dyn JobQueue,
    tenancy: &dyn Tenancy,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: DispatchRequest,
) -> Result<String> {
    validate_request(&req)?;

    let tenant = TenantResolver::resolve(tenancy);

    // Create new job (with injected ID and timestamp for determinism)
    let job = Job::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        req.queue,
        req.kind,
        JobPayload::new(req.payload),
    )
    .with_tenant(&tenant)
    .with_max_attempts(req.max_attempts);

    let job_id = queue.enqueue(&job).await?;

    info!(
        job_id = %job_id,
        kind = %job.kind,
        queue = %job.queue,
        tenant = %tenant,
        "Job dispatched"
    );

    Ok(job_id)
}
