//! Account business logic between HTTP handlers and the repository.

use std::sync::Arc;
use tracing::{debug, info};

use super::model::{NewUser, User};
use super::repository::UserRepository;
use crate::auth::{hash_password, verify_password, TokenManager};
use crate::error::{Result, ServiceError};

/// Registration, login and profile operations.
pub struct UserService {
    repo: Arc<dyn UserRepository>,
    tokens: Arc<TokenManager>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, tokens: Arc<TokenManager>) -> Self {
        Self { repo, tokens }
    }

    /// Hash the password and store a new account.
    pub async fn create_user(
        &self,
        username: &str,
        password: &str,
        display_name: &str,
        email: &str,
    ) -> Result<User> {
        let password_hash = hash_password(password)?;

        let user = self
            .repo
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                display_name: display_name.to_string(),
            })
            .await?;

        info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// Check credentials and issue an access token.
    ///
    /// Unknown usernames and wrong passwords both yield
    /// `InvalidCredentials` so callers cannot probe for accounts.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = match self.repo.get_user_by_username(username).await {
            Ok(user) => user,
            Err(ServiceError::NotFound) => {
                debug!(username = %username, "Login for unknown user");
                return Err(ServiceError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        };

        if !verify_password(&user.password, password)? {
            debug!(user_id = %user.id, "Login with wrong password");
            return Err(ServiceError::InvalidCredentials);
        }

        self.tokens.issue(&user.id)
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<User> {
        self.repo.get_user_by_id(id).await
    }

    pub async fn update_user_by_id(&self, id: &str, display_name: &str, email: &str) -> Result<()> {
        self.repo.update_user_by_id(id, display_name, email).await
    }
}
