// Tenancy Ports
//
// `Tenancy` answers "which tenant is active in the dispatching scope".
// `TenantDirectory` is the store of tenant records consulted when a worker
// binds a job to its tenant.

use crate::domain::Tenant;
use crate::error::Result;
use async_trait::async_trait;

/// Tenancy collaborator: current tenant of the calling scope, if any
pub trait Tenancy: Send + Sync {
    fn current_tenant_id(&self) -> Option<String>;
}

/// Tenancy fixed at construction (CLI invocations, tests)
#[derive(Debug, Clone, Default)]
pub struct StaticTenancy {
    tenant_id: Option<String>,
}

impl StaticTenancy {
    pub fn central() -> Self {
        Self { tenant_id: None }
    }

    pub fn tenant(id: impl Into<String>) -> Self {
        Self {
            tenant_id: Some(id.into()),
        }
    }

    pub fn new(tenant_id: Option<String>) -> Self {
        Self { tenant_id }
    }
}

impl Tenancy for StaticTenancy {
    fn current_tenant_id(&self) -> Option<String> {
        self.tenant_id.clone()
    }
}

/// Tenant record store
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Find tenant by ID
    async fn find(&self, id: &str) -> Result<Option<Tenant>>;

    /// Register a new tenant (fails with `AppError::Validation` on duplicate id)
    async fn create(&self, tenant: &Tenant) -> Result<()>;

    /// All tenants ordered by id
    async fn list(&self) -> Result<Vec<Tenant>>;
}

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryTenantDirectory {
        tenants: Mutex<BTreeMap<String, Tenant>>,
    }

    impl InMemoryTenantDirectory {
        pub fn with_tenants(tenants: impl IntoIterator<Item = Tenant>) -> Self {
            let directory = Self::default();
            {
                let mut map = directory.tenants.lock().unwrap();
                for tenant in tenants {
                    map.insert(tenant.id.clone(), tenant);
                }
            }
            directory
        }
    }

    #[async_trait]
    impl TenantDirectory for InMemoryTenantDirectory {
        async fn find(&self, id: &str) -> Result<Option<Tenant>> {
            Ok(self.tenants.lock().unwrap().get(id).cloned())
        }

        async fn create(&self, tenant: &Tenant) -> Result<()> {
            let mut tenants = self.tenants.lock().unwrap();
            if tenants.contains_key(&tenant.id) {
                return Err(AppError::Validation(format!(
                    "Tenant {} already exists",
                    tenant.id
                )));
            }
            tenants.insert(tenant.id.clone(), tenant.clone());
            Ok(())
        }

        async fn list(&self) -> Result<Vec<Tenant>> {
            Ok(self.tenants.lock().unwrap().values().cloned().collect())
        }
    }
}
