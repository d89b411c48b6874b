// Application Layer - Use Cases and Business Logic

pub mod dispatch;
pub mod events;
pub mod jobs;
pub mod recovery;
pub mod retry;
pub mod tenant_resolver;
pub mod worker;

// Re-exports
pub use dispatch::{DispatchRequest, DispatchService};
pub use events::{CompletionBus, CompletionListener, ContextMarkerListener};
pub use jobs::{CreateUserJob, HandlerRegistry, LogValueJob};
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use tenant_resolver::TenantResolver;
pub use worker::{
    shutdown_channel, JobRun, ShutdownSender, ShutdownToken, Worker, WorkerBuilder, WorkerConfig,
    WorkerExit,
};
