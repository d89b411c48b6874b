// Job Handler Port
// One handler per job kind; the worker dispatches through HandlerRegistry

use crate::domain::{JobId, JobKind, JobPayload, Tenant, TenantContext};
use crate::port::PersistenceError;
use async_trait::async_trait;
use thiserror::Error;

/// Job-level errors
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Tenant lookup failed: {0}")]
    TenantLookup(String),

    #[error("No handler registered for job kind: {0}")]
    NoHandler(JobKind),
}

impl JobError {
    /// Retryable failures go through `JobQueue::fail`, the rest are buried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobError::Persistence(_) | JobError::Io(_) | JobError::TenantLookup(_)
        )
    }
}

/// Execution scope of one job run
///
/// Built by the worker for each claim and passed down the call chain; there
/// is no ambient "current tenant" lookup.
#[derive(Debug, Clone)]
pub struct JobContext {
    pub job_id: JobId,
    pub attempt: i32,
    pub tenant: TenantContext,
    /// Loaded tenant record, `None` for central jobs
    pub tenant_record: Option<Tenant>,
}

impl JobContext {
    pub fn central(job_id: impl Into<String>, attempt: i32) -> Self {
        Self {
            job_id: job_id.into(),
            attempt,
            tenant: TenantContext::Central,
            tenant_record: None,
        }
    }

    pub fn for_tenant(job_id: impl Into<String>, attempt: i32, tenant: Tenant) -> Self {
        Self {
            job_id: job_id.into(),
            attempt,
            tenant: tenant.context(),
            tenant_record: Some(tenant),
        }
    }

    /// Tenant attribute lookup; always `None` in central context
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.tenant_record.as_ref().and_then(|t| t.attribute(key))
    }
}

/// Job handler trait
///
/// Implementations:
/// - CreateUserJob: creates a user through the UserStore
/// - LogValueJob: writes a tenant attribute through the MarkerWriter
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Kind this handler serves
    fn kind(&self) -> JobKind;

    /// Run one attempt of the job under `ctx`
    ///
    /// # Errors
    /// - JobError::Persistence / JobError::Io are retried
    /// - JobError::InvalidPayload sends the job to the dead set
    async fn handle(&self, ctx: &JobContext, payload: &JobPayload) -> Result<(), JobError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed
        Success,
        /// Always fail with a retryable IO error
        Fail(String),
        /// Fail with a non-retryable payload error
        Reject(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Sleep before succeeding
        Sleep(Duration),
    }

    /// Mock handler recording every context it ran under
    pub struct MockJobHandler {
        kind: JobKind,
        behavior: MockBehavior,
        calls: Arc<Mutex<Vec<JobContext>>>,
    }

    impl MockJobHandler {
        pub fn new(kind: JobKind, behavior: MockBehavior) -> Self {
            Self {
                kind,
                behavior,
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn new_success(kind: JobKind) -> Self {
            Self::new(kind, MockBehavior::Success)
        }

        pub fn new_fail(kind: JobKind, message: impl Into<String>) -> Self {
            Self::new(kind, MockBehavior::Fail(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn calls(&self) -> Vec<JobContext> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl JobHandler for MockJobHandler {
        fn kind(&self) -> JobKind {
            self.kind
        }

        async fn handle(&self, ctx: &JobContext, _payload: &JobPayload) -> Result<(), JobError> {
            self.calls.lock().unwrap().push(ctx.clone());

            match self.behavior.clone() {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(msg) => Err(JobError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    msg,
                ))),
                MockBehavior::Reject(msg) => Err(JobError::InvalidPayload(msg)),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::Sleep(duration) => {
                    tokio::time::sleep(duration).await;
                    Ok(())
                }
            }
        }
    }
}
