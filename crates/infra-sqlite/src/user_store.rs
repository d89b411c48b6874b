// SQLite UserStore Implementation
//
// Users live in one table partitioned by `tenant_scope` (the context marker),
// so a tenant job can never see or collide with another tenant's rows.

use crate::error::map_persistence_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tenantq_core::domain::TenantContext;
use tenantq_core::port::{NewUser, PersistenceError, TimeProvider, UserId, UserStore};
use uuid::Uuid;

pub struct SqliteUserStore {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteUserStore {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn create_user(
        &self,
        tenant: &TenantContext,
        user: NewUser,
    ) -> Result<UserId, PersistenceError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO users (id, tenant_scope, name, email, password, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(tenant.marker())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password)
        .bind(self.time_provider.now_millis())
        .execute(&self.pool)
        .await
        .map_err(map_persistence_error)?;

        Ok(id)
    }

    async fn count_users(&self, tenant: &TenantContext) -> Result<i64, PersistenceError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE tenant_scope = ?")
            .bind(tenant.marker())
            .fetch_one(&self.pool)
            .await
            .map_err(map_persistence_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use tenantq_core::port::time_provider::SystemTimeProvider;

    async fn setup() -> SqliteUserStore {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteUserStore::new(pool, Arc::new(SystemTimeProvider))
    }

    fn user(email: &str) -> NewUser {
        NewUser {
            name: "someone".to_string(),
            email: email.to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_users_are_scoped_per_tenant() {
        let store = setup().await;
        let acme = TenantContext::tenant("acme");

        store.create_user(&acme, user("a@example.com")).await.unwrap();
        store.create_user(&acme, user("b@example.com")).await.unwrap();
        store
            .create_user(&TenantContext::Central, user("a@example.com"))
            .await
            .unwrap();

        assert_eq!(store.count_users(&acme).await.unwrap(), 2);
        assert_eq!(store.count_users(&TenantContext::Central).await.unwrap(), 1);
        assert_eq!(
            store.count_users(&TenantContext::tenant("globex")).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let store = setup().await;
        let acme = TenantContext::tenant("acme");
        store.create_user(&acme, user("a@example.com")).await.unwrap();

        let err = store
            .create_user(&acme, user("a@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));
    }
}
