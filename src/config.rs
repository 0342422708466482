//! Configuration management for the account service.
//!
//! Values come from an optional YAML file, overridden by environment
//! variables of the form `ACCOUNT__<SECTION>__<FIELD>`
//! (e.g. `ACCOUNT__REDIS__URL`). Every field has a default.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ServiceError};
use crate::ratelimit::{Policy, PolicyConfig};

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "ACCOUNT";

/// Main configuration for the account service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limiting: RateLimitingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP listen address
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Name reported by the health check
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Instance id reported by the health check; random when empty
    #[serde(default)]
    pub instance_id: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            service_name: default_service_name(),
            instance_id: String::new(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_service_name() -> String {
    "user-service".to_string()
}

/// Relational store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://accounts.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

/// Counter store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

/// Token signing configuration.
///
/// RS256 is used when both key paths are set, HS256 with `jwt_secret`
/// otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default)]
    pub private_key_path: Option<String>,

    #[serde(default)]
    pub public_key_path: Option<String>,

    /// Access token lifetime in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            private_key_path: None,
            public_key_path: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

/// Longest accepted access token lifetime.
pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 3600;

fn default_token_ttl() -> u64 {
    24 * 3600
}

impl AuthConfig {
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

/// What the HTTP layer does when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFailureMode {
    /// Reject the request with 503
    #[default]
    Deny,
    /// Let the request through and log a warning
    Allow,
}

/// Where rate limit counters are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterStoreKind {
    /// Shared Redis counters at `redis.url`
    #[default]
    Redis,
    /// Counters local to this process
    Memory,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitingConfig {
    /// Policy for unauthenticated routes, keyed by client address
    #[serde(default = "default_by_address")]
    pub by_address: PolicyConfig,

    /// Policy for authenticated routes, keyed by user id
    #[serde(default = "default_by_subject")]
    pub by_subject: PolicyConfig,

    #[serde(default)]
    pub on_store_error: StoreFailureMode,

    #[serde(default)]
    pub store: CounterStoreKind,

    /// How often the memory store drops expired counters
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            by_address: default_by_address(),
            by_subject: default_by_subject(),
            on_store_error: StoreFailureMode::default(),
            store: CounterStoreKind::default(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

impl RateLimitingConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }
}

fn default_purge_interval() -> u64 {
    60
}

fn default_by_address() -> PolicyConfig {
    PolicyConfig::new("ip", 60, 60)
}

fn default_by_subject() -> PolicyConfig {
    PolicyConfig::new("user", 120, 60)
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub filter: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "account_service=info,tower_http=info".to_string()
}

/// Both policies, validated.
#[derive(Debug, Clone)]
pub struct Policies {
    pub by_address: Policy,
    pub by_subject: Policy,
}

impl ServiceConfig {
    /// Load configuration from an optional file plus environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: ServiceConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        let policies = self.policies()?;
        if policies.by_address.namespace() == policies.by_subject.namespace() {
            return Err(ServiceError::Config(
                "by_address and by_subject policies must use different namespaces".to_string(),
            ));
        }

        let rsa_paths = (
            self.auth.private_key_path.is_some(),
            self.auth.public_key_path.is_some(),
        );
        if rsa_paths.0 != rsa_paths.1 {
            return Err(ServiceError::Config(
                "private_key_path and public_key_path must be set together".to_string(),
            ));
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(ServiceError::Config(format!(
                "token_ttl_secs must be between 1 and {}",
                MAX_TOKEN_TTL_SECS
            )));
        }
        if self.rate_limiting.store == CounterStoreKind::Memory
            && self.rate_limiting.purge_interval_secs == 0
        {
            return Err(ServiceError::Config(
                "purge_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn policies(&self) -> Result<Policies> {
        Ok(Policies {
            by_address: self.rate_limiting.by_address.build()?,
            by_subject: self.rate_limiting.by_subject.build()?,
        })
    }

    /// Configured instance id, or a fresh random one.
    pub fn instance_id(&self) -> String {
        if self.server.instance_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            self.server.instance_id.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_addr.port(), 8080);
        assert_eq!(config.server.service_name, "user-service");
        assert_eq!(config.auth.token_ttl(), Duration::from_secs(86400));
        assert_eq!(config.rate_limiting.on_store_error, StoreFailureMode::Deny);

        let policies = config.policies().unwrap();
        assert_eq!(policies.by_address.namespace(), "ip");
        assert_eq!(policies.by_subject.namespace(), "user");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_yaml_partial() {
        let yaml = r#"
server:
  bind_addr: "127.0.0.1:9000"
  instance_id: node-a
rate_limiting:
  by_address:
    namespace: ip
    max_count: 3
    window_secs: 60
  on_store_error: allow
"#;
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_addr.port(), 9000);
        assert_eq!(config.instance_id(), "node-a");
        assert_eq!(config.rate_limiting.by_address.max_count, 3);
        assert_eq!(config.rate_limiting.by_subject, default_by_subject());
        assert_eq!(config.rate_limiting.on_store_error, StoreFailureMode::Allow);
    }

    #[test]
    fn test_invalid_policy_fails_fast() {
        let yaml = r#"
rate_limiting:
  by_address:
    namespace: ip
    max_count: 0
    window_secs: 60
"#;
        assert!(matches!(
            ServiceConfig::from_yaml(yaml),
            Err(ServiceError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_shared_namespace_rejected() {
        let yaml = r#"
rate_limiting:
  by_address: { namespace: rl, max_count: 5, window_secs: 60 }
  by_subject: { namespace: rl, max_count: 5, window_secs: 60 }
"#;
        assert!(matches!(
            ServiceConfig::from_yaml(yaml),
            Err(ServiceError::Config(_))
        ));
    }

    #[test]
    fn test_half_configured_rsa_rejected() {
        let yaml = r#"
auth:
  private_key_path: ./private_key.pem
"#;
        assert!(ServiceConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_token_ttl_bounds() {
        let too_long = format!("auth:\n  token_ttl_secs: {}\n", MAX_TOKEN_TTL_SECS + 1);
        assert!(matches!(
            ServiceConfig::from_yaml(&too_long),
            Err(ServiceError::Config(_))
        ));
        assert!(ServiceConfig::from_yaml("auth:\n  token_ttl_secs: 0\n").is_err());

        let longest = format!("auth:\n  token_ttl_secs: {}\n", MAX_TOKEN_TTL_SECS);
        assert!(ServiceConfig::from_yaml(&longest).is_ok());
    }

    #[test]
    fn test_memory_counter_store() {
        let yaml = r#"
rate_limiting:
  store: memory
  purge_interval_secs: 30
"#;
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.rate_limiting.store, CounterStoreKind::Memory);
        assert_eq!(config.rate_limiting.purge_interval(), Duration::from_secs(30));
        assert_eq!(
            ServiceConfig::default().rate_limiting.store,
            CounterStoreKind::Redis
        );

        let no_purge = "rate_limiting:\n  store: memory\n  purge_interval_secs: 0\n";
        assert!(ServiceConfig::from_yaml(no_purge).is_err());
    }

    #[test]
    fn test_random_instance_id_when_unset() {
        let config = ServiceConfig::default();
        let id = config.instance_id();
        assert_eq!(id.len(), 36);
        assert_ne!(id, config.instance_id());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ServiceConfig::load(None).unwrap();
        assert_eq!(config.database.max_connections, 10);
    }
}
