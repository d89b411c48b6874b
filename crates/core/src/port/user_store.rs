// User Store Port (persistence collaborator)

use crate::domain::TenantContext;
use async_trait::async_trait;
use thiserror::Error;

/// User ID (UUID v4)
pub type UserId = String;

/// Fields of a user about to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Errors raised by the backing store on writes
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Write rejected by a uniqueness constraint
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Persistence collaborator used by job handlers.
///
/// The tenant context is passed explicitly; the store decides how records
/// are scoped to it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(
        &self,
        tenant: &TenantContext,
        user: NewUser,
    ) -> Result<UserId, PersistenceError>;

    async fn count_users(&self, tenant: &TenantContext) -> Result<i64, PersistenceError>;
}
