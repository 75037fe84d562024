use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::{fmt, time::Duration};
use tracing::{debug, info};

use crate::{
    domain::{BatchResult, ServiceFilter, ServiceRecord, ServiceUpsert},
    error::RegistryError,
    ports::RegistryStore,
};

/// Statistics about the connection pool
#[derive(Debug, Clone)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_size: u32,
}

/// Registry store on a PostgreSQL `services` table keyed by name.
#[derive(Clone)]
pub struct PostgresRegistryStore {
    pool: PgPool,
    max_connections: u32,
}

impl fmt::Debug for PostgresRegistryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresRegistryStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

impl PostgresRegistryStore {
    pub async fn connect(
        connection_string: &str,
        max_connections: u32,
    ) -> Result<Self, RegistryError> {
        let max_connections = max_connections.max(1);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .max_lifetime(Duration::from_secs(1800))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(connection_string)
            .await
            .map_err(|e| {
                RegistryError::Connection(format!(
                    "Database connection failed: {e}"
                ))
            })?;

        info!(max_connections, "Registry database pool initialized");

        Ok(Self {
            pool,
            max_connections,
        })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        let max_connections = pool.options().get_max_connections();
        Self {
            pool,
            max_connections,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle() as u32,
            max_size: self.max_connections,
        }
    }

    /// Apply embedded migrations.
    pub async fn initialize_schema(&self) -> Result<(), RegistryError> {
        crate::MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| RegistryError::Migration(e.to_string()))
    }

    fn map_row(row: &PgRow) -> Result<ServiceRecord, RegistryError> {
        let read = |column: &str, e: sqlx::Error| {
            RegistryError::Query(format!("Failed to read {column}: {e}"))
        };

        Ok(ServiceRecord {
            name: row.try_get("name").map_err(|e| read("name", e))?,
            last_seen: row
                .try_get("last_seen")
                .map_err(|e| read("last_seen", e))?,
            active: row.try_get("active").map_err(|e| read("active", e))?,
            updated_at: row
                .try_get("updated_at")
                .map_err(|e| read("updated_at", e))?,
        })
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    async fn bulk_upsert(
        &self,
        ops: Vec<ServiceUpsert>,
    ) -> Result<BatchResult, RegistryError> {
        let mut result = BatchResult {
            submitted: ops.len(),
            ..BatchResult::default()
        };
        if ops.is_empty() {
            return Ok(result);
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            RegistryError::BatchWrite(format!("Failed to start transaction: {e}"))
        })?;

        // One statement per op: a multi-row ON CONFLICT cannot touch the same
        // key twice, and in-order application gives last-write-wins.
        for op in &ops {
            let row = sqlx::query(
                r#"
                INSERT INTO services (name, last_seen, active, updated_at)
                VALUES ($1, $2, TRUE, NOW())
                ON CONFLICT (name) DO UPDATE
                SET last_seen = EXCLUDED.last_seen,
                    active = TRUE,
                    updated_at = NOW()
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(&op.name)
            .bind(op.last_seen)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                RegistryError::BatchWrite(format!(
                    "Failed to upsert service {}: {e}",
                    op.name
                ))
            })?;

            let inserted: bool = row.try_get("inserted").map_err(|e| {
                RegistryError::BatchWrite(format!(
                    "Failed to read upsert outcome: {e}"
                ))
            })?;
            if inserted {
                result.inserted += 1;
            } else {
                result.updated += 1;
            }
        }

        tx.commit().await.map_err(|e| {
            RegistryError::BatchWrite(format!(
                "Failed to commit transaction: {e}"
            ))
        })?;

        debug!(
            submitted = result.submitted,
            inserted = result.inserted,
            updated = result.updated,
            "registry batch committed"
        );
        Ok(result)
    }

    async fn mark_stale(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RegistryError> {
        let done = sqlx::query(
            r#"
            UPDATE services
            SET active = FALSE, updated_at = NOW()
            WHERE active AND last_seen < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            RegistryError::BatchWrite(format!("Failed to mark stale services: {e}"))
        })?;

        Ok(done.rows_affected())
    }

    async fn list_services(
        &self,
        filter: ServiceFilter,
    ) -> Result<Vec<ServiceRecord>, RegistryError> {
        let rows = sqlx::query(
            r#"
            SELECT name, last_seen, active, updated_at
            FROM services
            WHERE ($1::BOOLEAN IS NULL OR active = $1)
            ORDER BY name
            "#,
        )
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            RegistryError::Query(format!("Failed to list services: {e}"))
        })?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| {
                RegistryError::Connection(format!("Registry ping failed: {e}"))
            })
    }
}
