// Job Domain Model

use crate::domain::error::{DomainError, Result};
use crate::domain::tenant::TenantContext;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Job State
///
/// A job is in exactly one of these at any time. `Failed` is the dead set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Queued,
    Running,
    Done,
    Failed,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "QUEUED"),
            JobState::Running => write!(f, "RUNNING"),
            JobState::Done => write!(f, "DONE"),
            JobState::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "QUEUED" => Ok(JobState::Queued),
            "RUNNING" => Ok(JobState::Running),
            "DONE" => Ok(JobState::Done),
            "FAILED" => Ok(JobState::Failed),
            other => Err(DomainError::UnknownJobState(other.to_string())),
        }
    }
}

/// Job Kind - one variant per registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Creates a user record with random placeholder fields
    CreateUser,
    /// Writes a tenant attribute to a named marker location
    LogValue,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::CreateUser => "create_user",
            JobKind::LogValue => "log_value",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create_user" => Ok(JobKind::CreateUser),
            "log_value" => Ok(JobKind::LogValue),
            other => Err(DomainError::UnknownJobKind(other.to_string())),
        }
    }
}

/// Job Payload (JSON serializable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn empty() -> Self {
        Self(serde_json::json!({}))
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub queue: String,
    pub kind: JobKind,
    pub payload: JobPayload,

    /// Tenant stamped at dispatch time, `None` for central jobs
    pub tenant_id: Option<String>,

    pub state: JobState,

    pub created_at: i64,   // epoch ms
    pub available_at: i64, // epoch ms, earliest time the job may be claimed
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,

    // Retry bookkeeping
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_factor: f64,
    pub last_error: Option<String>,
}

impl Job {
    /// Create a new central job
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `queue` - Queue name
    /// * `kind` - Job kind
    /// * `payload` - Kind-specific payload
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        queue: impl Into<String>,
        kind: JobKind,
        payload: JobPayload,
    ) -> Self {
        Self {
            id: id.into(),
            queue: queue.into(),
            kind,
            payload,
            tenant_id: None,
            state: JobState::Queued,
            created_at,
            available_at: created_at,
            started_at: None,
            finished_at: None,
            attempts: 0,
            max_attempts: crate::application::worker::constants::DEFAULT_MAX_ATTEMPTS,
            backoff_factor: crate::application::worker::constants::DEFAULT_BACKOFF_FACTOR,
            last_error: None,
        }
    }

    /// Create a test job with deterministic ID and timestamp.
    ///
    /// Uses a simple counter for deterministic test IDs (test-1, test-2, ...).
    /// Timestamps start at 1000 and increment by 1000.
    ///
    /// **Note**: This method should only be used in tests. For production code,
    /// always inject ID and time via providers.
    pub fn new_test(queue: impl Into<String>, kind: JobKind, payload: JobPayload) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let id = format!("test-{}", counter);
        let created_at = (counter * 1000) as i64;

        Self::new(id, created_at, queue, kind, payload)
    }

    /// Stamp the tenant context the job must run under
    pub fn with_tenant(mut self, tenant: &TenantContext) -> Self {
        self.tenant_id = tenant.tenant_id().map(str::to_string);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Tenant context stamped on this job
    pub fn tenant_context(&self) -> TenantContext {
        TenantContext::from_tenant_id(self.tenant_id.clone())
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    fn transition_error(&self, to: JobState) -> DomainError {
        DomainError::InvalidStateTransition {
            from: self.state.to_string(),
            to: to.to_string(),
        }
    }

    /// Claim the job for execution. Each claim consumes one attempt.
    pub fn start(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Queued {
            return Err(self.transition_error(JobState::Running));
        }
        self.state = JobState::Running;
        self.started_at = Some(now_millis);
        self.attempts += 1;
        Ok(())
    }

    /// Transition to Done state with explicit timestamp
    pub fn complete(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Done));
        }
        self.state = JobState::Done;
        self.finished_at = Some(now_millis);
        Ok(())
    }

    /// Put a failed attempt back into the pending set
    pub fn requeue(&mut self, available_at: i64, reason: impl Into<String>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Queued));
        }
        self.state = JobState::Queued;
        self.available_at = available_at;
        self.started_at = None;
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Move to the dead set
    pub fn bury(&mut self, now_millis: i64, reason: impl Into<String>) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Failed));
        }
        self.state = JobState::Failed;
        self.finished_at = Some(now_millis);
        self.last_error = Some(reason.into());
        Ok(())
    }

    /// Hand a cancelled in-flight job back without consuming the attempt
    pub fn release(&mut self) -> Result<()> {
        if self.state != JobState::Running {
            return Err(self.transition_error(JobState::Queued));
        }
        self.state = JobState::Queued;
        self.started_at = None;
        self.attempts = (self.attempts - 1).max(0);
        Ok(())
    }

    /// Operator retry of a dead job: fresh attempt budget
    pub fn revive(&mut self, now_millis: i64) -> Result<()> {
        if self.state != JobState::Failed {
            return Err(self.transition_error(JobState::Queued));
        }
        self.state = JobState::Queued;
        self.attempts = 0;
        self.available_at = now_millis;
        self.started_at = None;
        self.finished_at = None;
        Ok(())
    }
}
