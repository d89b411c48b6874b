// SQLite TenantDirectory Implementation

use crate::error::{is_unique_violation, map_sqlx_error};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use tenantq_core::domain::{HasDatabase, HasDomains, Tenant, TenantDatabase};
use tenantq_core::error::{AppError, Result};
use tenantq_core::port::TenantDirectory;

pub struct SqliteTenantDirectory {
    pool: SqlitePool,
}

impl SqliteTenantDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn domains_of(&self, tenant_id: &str) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT domain FROM tenant_domains WHERE tenant_id = ? ORDER BY rowid")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn hydrate(&self, row: TenantRow) -> Result<Tenant> {
        let domains = self.domains_of(&row.id).await?;
        let data: BTreeMap<String, String> = serde_json::from_str(&row.data)?;

        let mut tenant = Tenant::new(row.id, row.created_at)
            .with_database(TenantDatabase::named(row.database_name));
        for host in domains {
            tenant = tenant.with_domain(host);
        }
        for (key, value) in data {
            tenant = tenant.with_attribute(key, value);
        }
        Ok(tenant)
    }
}

#[async_trait]
impl TenantDirectory for SqliteTenantDirectory {
    async fn find(&self, id: &str) -> Result<Option<Tenant>> {
        let row = sqlx::query_as::<_, TenantRow>(
            "SELECT id, database_name, data, created_at FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn create(&self, tenant: &Tenant) -> Result<()> {
        let data = serde_json::to_string(&tenant.data)?;
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("INSERT INTO tenants (id, database_name, data, created_at) VALUES (?, ?, ?, ?)")
            .bind(&tenant.id)
            .bind(tenant.database_name())
            .bind(&data)
            .bind(tenant.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Validation(format!("Tenant {} already exists", tenant.id))
                } else {
                    map_sqlx_error(e)
                }
            })?;

        for host in tenant.domains().hosts() {
            sqlx::query("INSERT INTO tenant_domains (domain, tenant_id) VALUES (?, ?)")
                .bind(host)
                .bind(&tenant.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        AppError::Validation(format!("Domain {} is already taken", host))
                    } else {
                        map_sqlx_error(e)
                    }
                })?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Tenant>> {
        let rows = sqlx::query_as::<_, TenantRow>(
            "SELECT id, database_name, data, created_at FROM tenants ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut tenants = Vec::with_capacity(rows.len());
        for row in rows {
            tenants.push(self.hydrate(row).await?);
        }
        Ok(tenants)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TenantRow {
    id: String,
    database_name: String,
    data: String,
    created_at: i64,
}
