// tenantq Infrastructure - SQLite Adapter
// Implements: JobQueue, TenantDirectory, UserStore, RestartSignal

mod connection;
mod error;
mod job_queue;
mod migration;
mod restart_signal;
mod tenant_directory;
mod user_store;

pub use connection::{create_pool, file_url};
pub use job_queue::SqliteJobQueue;
pub use migration::{current_version, run_migrations};
pub use restart_signal::SqliteRestartSignal;
pub use tenant_directory::SqliteTenantDirectory;
pub use user_store::SqliteUserStore;
