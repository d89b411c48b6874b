// Tenant Context Resolver
//
// Dispatch side: `resolve` reads the tenancy collaborator so the job can be
// stamped with the tenant it was dispatched under.
// Worker side: `bind` turns the stamped id back into a JobContext for one run.

use crate::domain::{Job, TenantContext};
use crate::port::{JobContext, JobError, Tenancy, TenantDirectory};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
}

impl TenantResolver {
    pub fn new(directory: Arc<dyn TenantDirectory>) -> Self {
        Self { directory }
    }

    /// Context of the calling scope as reported by the tenancy collaborator
    pub fn resolve(tenancy: &dyn Tenancy) -> TenantContext {
        TenantContext::from_tenant_id(tenancy.current_tenant_id())
    }

    /// Build the execution context for a claimed job
    ///
    /// # Errors
    /// - `JobError::TenantNotFound` if the stamped tenant no longer exists
    /// - `JobError::TenantLookup` if the directory cannot be reached
    pub async fn bind(&self, job: &Job) -> Result<JobContext, JobError> {
        let tenant_id = match job.tenant_id.as_deref() {
            None => return Ok(JobContext::central(job.id.clone(), job.attempts)),
            Some(id) => id,
        };

        let tenant = self
            .directory
            .find(tenant_id)
            .await
            .map_err(|e| JobError::TenantLookup(e.to_string()))?;

        match tenant {
            Some(tenant) => {
                debug!(job_id = %job.id, tenant = %tenant_id, "Bound job to tenant");
                Ok(JobContext::for_tenant(job.id.clone(), job.attempts, tenant))
            }
            None => {
                warn!(job_id = %job.id, tenant = %tenant_id, "Job stamped with unknown tenant");
                Err(JobError::TenantNotFound(tenant_id.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobKind, JobPayload, Tenant};
    use crate::port::tenancy::mocks::InMemoryTenantDirectory;
    use crate::port::StaticTenancy;

    fn resolver() -> TenantResolver {
        let directory =
            InMemoryTenantDirectory::with_tenants([Tenant::new("acme", 0).with_attribute("abc", "1")]);
        TenantResolver::new(Arc::new(directory))
    }

    #[test]
    fn test_resolve_from_tenancy() {
        assert_eq!(
            TenantResolver::resolve(&StaticTenancy::tenant("acme")),
            TenantContext::tenant("acme")
        );
        assert_eq!(
            TenantResolver::resolve(&StaticTenancy::central()),
            TenantContext::Central
        );
    }

    #[tokio::test]
    async fn test_bind_central_job() {
        let job = Job::new_test("default", JobKind::CreateUser, JobPayload::empty());
        let ctx = resolver().bind(&job).await.unwrap();
        assert_eq!(ctx.tenant, TenantContext::Central);
        assert!(ctx.tenant_record.is_none());
    }

    #[tokio::test]
    async fn test_bind_loads_tenant_record() {
        let job = Job::new_test("default", JobKind::CreateUser, JobPayload::empty())
            .with_tenant(&TenantContext::tenant("acme"));
        let ctx = resolver().bind(&job).await.unwrap();
        assert_eq!(ctx.tenant, TenantContext::tenant("acme"));
        assert_eq!(ctx.attribute("abc"), Some("1"));
    }

    #[tokio::test]
    async fn test_bind_unknown_tenant_is_not_retryable() {
        let job = Job::new_test("default", JobKind::CreateUser, JobPayload::empty())
            .with_tenant(&TenantContext::tenant("ghost"));
        let err = resolver().bind(&job).await.unwrap_err();
        assert!(matches!(err, JobError::TenantNotFound(ref id) if id == "ghost"));
        assert!(!err.is_retryable());
    }
}
