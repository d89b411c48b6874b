// Domain Layer - Pure business logic and entities

pub mod error;
pub mod event;
pub mod job;
pub mod queue;
pub mod tenant;

// Re-exports
pub use error::DomainError;
pub use event::CompletionEvent;
pub use job::{Job, JobId, JobKind, JobPayload, JobState};
pub use queue::{FailOutcome, DEFAULT_QUEUE};
pub use tenant::{HasDatabase, HasDomains, Tenant, TenantContext, TenantDatabase, TenantDomains};
