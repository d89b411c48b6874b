// SQLite RestartSignal Implementation
//
// Stored in the central `control` table, never in tenant-scoped data, so a
// broadcast reaches every worker regardless of the tenant it last served.

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tenantq_core::error::Result;
use tenantq_core::port::RestartSignal;

const RESTART_KEY: &str = "workers.restart";

pub struct SqliteRestartSignal {
    pool: SqlitePool,
}

impl SqliteRestartSignal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RestartSignal for SqliteRestartSignal {
    async fn last_restart(&self) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT value FROM control WHERE key = ?")
            .bind(RESTART_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }

    async fn broadcast(&self, at_millis: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO control (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(RESTART_KEY)
        .bind(at_millis)
        .bind(at_millis)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }
}
