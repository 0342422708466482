use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::TokenManager;
use crate::config::{Policies, ServiceConfig, StoreFailureMode};
use crate::error::Result;
use crate::health::{HealthCheckService, StoreHealthRepository};
use crate::ratelimit::{AdmissionController, CounterStore};
use crate::user::{SqlUserRepository, UserService};

/// Shared handles passed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub policies: Arc<Policies>,
    pub on_store_error: StoreFailureMode,
    pub users: Arc<UserService>,
    pub tokens: Arc<TokenManager>,
    pub health: Arc<HealthCheckService>,
}

impl AppState {
    /// Wire handlers, services and repositories over the given stores.
    pub fn new(
        config: &ServiceConfig,
        counter_store: Arc<dyn CounterStore>,
        pool: SqlitePool,
        tokens: TokenManager,
    ) -> Result<Self> {
        let tokens = Arc::new(tokens);

        let health_repo = Arc::new(StoreHealthRepository::new(
            counter_store.clone(),
            pool.clone(),
        ));
        let health = HealthCheckService::new(
            config.server.service_name.clone(),
            config.instance_id(),
            health_repo,
        );

        let user_repo = Arc::new(SqlUserRepository::new(pool));
        let users = UserService::new(user_repo, tokens.clone());

        Ok(Self {
            admission: Arc::new(AdmissionController::new(counter_store)),
            policies: Arc::new(config.policies()?),
            on_store_error: config.rate_limiting.on_store_error,
            users: Arc::new(users),
            tokens,
            health: Arc::new(health),
        })
    }
}
