// Job handlers and the registry the worker dispatches through

pub mod create_user;
pub mod log_value;

pub use create_user::CreateUserJob;
pub use log_value::{LogValueJob, LogValuePayload};

use crate::domain::{JobKind, JobPayload};
use crate::port::{JobContext, JobError, JobHandler, MarkerWriter, UserStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Maps each job kind to its handler
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in handlers wired to their collaborators
    pub fn with_defaults(users: Arc<dyn UserStore>, markers: Arc<dyn MarkerWriter>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CreateUserJob::new(users)));
        registry.register(Arc::new(LogValueJob::new(markers)));
        registry
    }

    /// Register a handler, replacing any previous one for the same kind
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(&kind).cloned()
    }

    /// Run the handler for `kind` under `ctx`
    pub async fn execute(
        &self,
        kind: JobKind,
        ctx: &JobContext,
        payload: &JobPayload,
    ) -> Result<(), JobError> {
        let handler = self.get(kind).ok_or(JobError::NoHandler(kind))?;
        handler.handle(ctx, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::job_handler::mocks::MockJobHandler;

    #[tokio::test]
    async fn test_missing_handler_is_not_retryable() {
        let registry = HandlerRegistry::new();
        let ctx = JobContext::central("job-1", 1);
        let err = registry
            .execute(JobKind::LogValue, &ctx, &JobPayload::empty())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::NoHandler(JobKind::LogValue)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_register_replaces_existing_handler() {
        let mut registry = HandlerRegistry::new();
        let first = Arc::new(MockJobHandler::new_fail(JobKind::CreateUser, "old"));
        let second = Arc::new(MockJobHandler::new_success(JobKind::CreateUser));
        registry.register(first.clone());
        registry.register(second.clone());

        let ctx = JobContext::central("job-1", 1);
        registry
            .execute(JobKind::CreateUser, &ctx, &JobPayload::empty())
            .await
            .unwrap();
        assert_eq!(first.call_count(), 0);
        assert_eq!(second.call_count(), 1);
    }
}
