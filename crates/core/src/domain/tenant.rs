// Tenant Domain Model
//
// A tenant is composed from independent capabilities (a dedicated database,
// a set of domains). Each capability is its own component struct plus a trait;
// `Tenant` implements the traits by delegating to the components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prefix used to derive a tenant database name from its id
pub const DATABASE_PREFIX: &str = "tenant";

/// Execution context a job runs under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TenantContext {
    Central,
    Tenant(String),
}

impl TenantContext {
    pub fn tenant(id: impl Into<String>) -> Self {
        TenantContext::Tenant(id.into())
    }

    pub fn from_tenant_id(id: Option<String>) -> Self {
        match id {
            Some(id) => TenantContext::Tenant(id),
            None => TenantContext::Central,
        }
    }

    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            TenantContext::Central => None,
            TenantContext::Tenant(id) => Some(id),
        }
    }

    /// Marker text recorded after a job ran: `tenant_<id>` or `central`
    pub fn marker(&self) -> String {
        match self {
            TenantContext::Central => "central".to_string(),
            TenantContext::Tenant(id) => format!("tenant_{}", id),
        }
    }
}

impl std::fmt::Display for TenantContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.marker())
    }
}

/// Database capability component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDatabase {
    name: String,
}

impl TenantDatabase {
    pub fn for_tenant(tenant_id: &str) -> Self {
        Self {
            name: format!("{}{}", DATABASE_PREFIX, tenant_id),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Domains capability component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDomains {
    hosts: Vec<String>,
}

impl TenantDomains {
    /// Add a hostname, normalized to lowercase. Duplicates are ignored.
    pub fn add(&mut self, host: impl Into<String>) {
        let host = host.into().trim().to_ascii_lowercase();
        if !host.is_empty() && !self.hosts.contains(&host) {
            self.hosts.push(host);
        }
    }

    pub fn contains(&self, host: &str) -> bool {
        let host = host.trim().to_ascii_lowercase();
        self.hosts.iter().any(|h| *h == host)
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }
}

/// Entity owning a dedicated database
pub trait HasDatabase {
    fn database(&self) -> &TenantDatabase;

    fn database_name(&self) -> &str {
        self.database().name()
    }
}

/// Entity reachable through one or more domains
pub trait HasDomains {
    fn domains(&self) -> &TenantDomains;

    fn owns_domain(&self, host: &str) -> bool {
        self.domains().contains(host)
    }
}

/// Tenant record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: String,
    pub created_at: i64,
    /// Free-form attributes (`tenant('abc')` style lookups)
    pub data: BTreeMap<String, String>,
    database: TenantDatabase,
    domains: TenantDomains,
}

impl Tenant {
    pub fn new(id: impl Into<String>, created_at: i64) -> Self {
        let id = id.into();
        Self {
            database: TenantDatabase::for_tenant(&id),
            id,
            created_at,
            data: BTreeMap::new(),
            domains: TenantDomains::default(),
        }
    }

    pub fn with_database(mut self, database: TenantDatabase) -> Self {
        self.database = database;
        self
    }

    pub fn with_domain(mut self, host: impl Into<String>) -> Self {
        self.domains.add(host);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    pub fn context(&self) -> TenantContext {
        TenantContext::tenant(self.id.clone())
    }
}

impl HasDatabase for Tenant {
    fn database(&self) -> &TenantDatabase {
        &self.database
    }
}

impl HasDomains for Tenant {
    fn domains(&self) -> &TenantDomains {
        &self.domains
    }
}
