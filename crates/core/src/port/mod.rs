// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod job_handler;
pub mod job_queue;
pub mod marker;
pub mod restart_signal;
pub mod tenancy;
pub mod time_provider;
pub mod user_store;

// Re-exports
pub use id_provider::IdProvider;
pub use job_handler::{JobContext, JobError, JobHandler};
pub use job_queue::JobQueue;
pub use marker::MarkerWriter;
pub use restart_signal::RestartSignal;
pub use tenancy::{StaticTenancy, Tenancy, TenantDirectory};
pub use time_provider::TimeProvider;
pub use user_store::{NewUser, PersistenceError, UserId, UserStore};
