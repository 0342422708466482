//! Relational store connection and schema migrations.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::{Result, ServiceError};

/// Open a connection pool for the configured database.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    // Every connection to `:memory:` is a separate database, and it is
    // dropped with its connection.
    let in_memory = config.url.contains(":memory:");
    let max_connections = if in_memory { 1 } else { config.max_connections };

    let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
    if in_memory {
        pool_options = pool_options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }
    let pool = pool_options.connect_with(options).await?;

    info!(url = %config.url, max_connections = max_connections, "Database pool ready");
    Ok(pool)
}

/// Apply pending migrations from `migrations/`.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied");
    Ok(())
}

/// Translate driver errors into service errors callers can match on.
pub(crate) fn catch_db_error(err: sqlx::Error) -> ServiceError {
    match err {
        sqlx::Error::RowNotFound => ServiceError::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            ServiceError::Duplicate(db.message().to_string())
        }
        other => ServiceError::Database(other),
    }
}

/// Migrated in-memory database for tests.
#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let config = DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    };
    let pool = connect(&config).await.unwrap();
    migrate(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_create_users_table() {
        let pool = test_pool().await;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            catch_db_error(sqlx::Error::RowNotFound),
            ServiceError::NotFound
        ));
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_duplicate() {
        let pool = test_pool().await;
        sqlx::query("CREATE TABLE t (v TEXT UNIQUE)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO t (v) VALUES ('a')")
            .execute(&pool)
            .await
            .unwrap();

        let err = sqlx::query("INSERT INTO t (v) VALUES ('a')")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(catch_db_error(err), ServiceError::Duplicate(_)));
    }
}
