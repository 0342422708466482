//! Dependency health checks.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::warn;

use crate::error::{Result, ServiceError};
use crate::ratelimit::CounterStore;

/// Status reported when every dependency answers.
pub const STATUS_OK: &str = "OK";
/// Status reported when the counter store does not answer.
pub const STATUS_COUNTER_STORE_DOWN: &str = "redis: client is closed";
/// Status reported when the database does not answer.
pub const STATUS_DATABASE_DOWN: &str = "database: database is closed";

/// Connectivity probes for the service's backing stores.
#[async_trait]
pub trait HealthRepository: Send + Sync {
    async fn counter_store_ping(&self) -> Result<()>;
    async fn db_ping(&self) -> Result<()>;
}

/// Probes the live counter store and database pool.
pub struct StoreHealthRepository {
    counter_store: Arc<dyn CounterStore>,
    pool: SqlitePool,
}

impl StoreHealthRepository {
    pub fn new(counter_store: Arc<dyn CounterStore>, pool: SqlitePool) -> Self {
        Self {
            counter_store,
            pool,
        }
    }
}

#[async_trait]
impl HealthRepository for StoreHealthRepository {
    async fn counter_store_ping(&self) -> Result<()> {
        Ok(self.counter_store.ping().await?)
    }

    async fn db_ping(&self) -> Result<()> {
        if self.pool.is_closed() {
            return Err(ServiceError::Database(sqlx::Error::PoolClosed));
        }
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Result of a health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub status: &'static str,
    pub service_name: String,
    pub instance_id: String,
    pub healthy: bool,
}

/// Reports whether this instance can reach its dependencies.
pub struct HealthCheckService {
    service_name: String,
    instance_id: String,
    repo: Arc<dyn HealthRepository>,
}

impl HealthCheckService {
    pub fn new(service_name: String, instance_id: String, repo: Arc<dyn HealthRepository>) -> Self {
        Self {
            service_name,
            instance_id,
            repo,
        }
    }

    /// Ping the counter store, then the database. Stops at the first failure.
    pub async fn check(&self) -> HealthReport {
        let status = if let Err(e) = self.repo.counter_store_ping().await {
            warn!(error = %e, "Counter store health check failed");
            STATUS_COUNTER_STORE_DOWN
        } else if let Err(e) = self.repo.db_ping().await {
            warn!(error = %e, "Database health check failed");
            STATUS_DATABASE_DOWN
        } else {
            STATUS_OK
        };

        HealthReport {
            status,
            service_name: self.service_name.clone(),
            instance_id: self.instance_id.clone(),
            healthy: status == STATUS_OK,
        }
    }
}
