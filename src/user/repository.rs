//! User persistence.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use super::model::{NewUser, User};
use crate::db::catch_db_error;
use crate::error::{Result, ServiceError};

/// Storage operations on user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. Taken usernames or emails yield `Duplicate`.
    async fn create_user(&self, new_user: NewUser) -> Result<User>;

    async fn get_user_by_username(&self, username: &str) -> Result<User>;

    async fn get_user_by_id(&self, id: &str) -> Result<User>;

    /// Replace display name and email. An unknown id yields `NotFound`.
    async fn update_user_by_id(&self, id: &str, display_name: &str, email: &str) -> Result<()>;
}

/// [`UserRepository`] over the relational store.
#[derive(Clone)]
pub struct SqlUserRepository {
    pool: SqlitePool,
}

impl SqlUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn get_user_by_field(&self, field: UserLookup, value: &str) -> Result<User> {
        let sql = match field {
            UserLookup::Id => "SELECT * FROM users WHERE id = ?",
            UserLookup::Username => "SELECT * FROM users WHERE username = ?",
        };

        sqlx::query_as::<_, User>(sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await
            .map_err(catch_db_error)
    }
}

#[derive(Debug, Clone, Copy)]
enum UserLookup {
    Id,
    Username,
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn create_user(&self, new_user: NewUser) -> Result<User> {
        let now = Utc::now();
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: new_user.username,
            email: new_user.email,
            password: new_user.password_hash,
            display_name: new_user.display_name,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO users (id, username, email, password, display_name, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password)
        .bind(&user.display_name)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(catch_db_error)?;

        debug!(user_id = %user.id, username = %user.username, "Created user");
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.get_user_by_field(UserLookup::Username, username).await
    }

    async fn get_user_by_id(&self, id: &str) -> Result<User> {
        self.get_user_by_field(UserLookup::Id, id).await
    }

    async fn update_user_by_id(&self, id: &str, display_name: &str, email: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET display_name = ?, email = ?, updated_at = ? WHERE id = ?",
        )
        .bind(display_name)
        .bind(email)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(catch_db_error)?;

        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound);
        }

        debug!(user_id = %id, "Updated user profile");
        Ok(())
    }
}
