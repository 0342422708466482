//! Access token issuance and verification.

use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AuthConfig;
use crate::error::{Result, ServiceError};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Signs and verifies access tokens with one key pair.
pub struct TokenManager {
    algorithm: Algorithm,
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl TokenManager {
    /// HS256 with a shared secret.
    pub fn from_secret(secret: &str, ttl: Duration) -> Result<Self> {
        if secret.is_empty() {
            return Err(ServiceError::Config("jwt secret must not be empty".to_string()));
        }
        Ok(Self {
            algorithm: Algorithm::HS256,
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        })
    }

    /// RS256 with PEM-encoded private and public keys.
    pub fn from_rsa_pem(private_pem: &[u8], public_pem: &[u8], ttl: Duration) -> Result<Self> {
        Ok(Self {
            algorithm: Algorithm::RS256,
            encoding: EncodingKey::from_rsa_pem(private_pem)?,
            decoding: DecodingKey::from_rsa_pem(public_pem)?,
            ttl,
        })
    }

    /// RS256 with keys read from PEM files.
    pub fn from_rsa_pem_files(
        private_key: impl AsRef<Path>,
        public_key: impl AsRef<Path>,
        ttl: Duration,
    ) -> Result<Self> {
        let private_pem = std::fs::read(private_key)?;
        let public_pem = std::fs::read(public_key)?;
        Self::from_rsa_pem(&private_pem, &public_pem, ttl)
    }

    /// Build from configuration: RS256 when key paths are set, HS256 otherwise.
    pub fn from_config(config: &AuthConfig) -> Result<Self> {
        match (&config.private_key_path, &config.public_key_path) {
            (Some(private_key), Some(public_key)) => {
                Self::from_rsa_pem_files(private_key, public_key, config.token_ttl())
            }
            _ => Self::from_secret(&config.jwt_secret, config.token_ttl()),
        }
    }

    /// Issue a token for `user_id`.
    pub fn issue(&self, user_id: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                ServiceError::Config(format!("token ttl of {:?} is out of range", self.ttl))
            })?;
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now,
            exp,
        };
        Ok(encode(&Header::new(self.algorithm), &claims, &self.encoding)?)
    }

    /// Verify a token's signature and expiry and return its claims.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.set_required_spec_claims(&["exp", "sub"]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAY: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn test_issue_and_verify() {
        let tokens = TokenManager::from_secret("test-secret", DAY).unwrap();

        let token = tokens.issue("user-1").unwrap();
        let claims = tokens.verify(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, DAY.as_secs() as i64);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = TokenManager::from_secret("secret-a", DAY).unwrap();
        let verifier = TokenManager::from_secret("secret-b", DAY).unwrap();

        let token = issuer.issue("user-1").unwrap();
        assert!(matches!(verifier.verify(&token), Err(ServiceError::Token(_))));
    }

    #[test]
    fn test_expired_token_rejected() {
        let tokens = TokenManager::from_secret("test-secret", DAY).unwrap();
        let claims = Claims {
            sub: "user-1".to_string(),
            iat: 1_000,
            exp: 2_000,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();

        assert!(tokens.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        let tokens = TokenManager::from_secret("test-secret", DAY).unwrap();
        assert!(tokens.verify("not.a.token").is_err());
    }

    #[test]
    fn test_from_config_uses_secret() {
        let config = AuthConfig {
            jwt_secret: "configured".to_string(),
            token_ttl_secs: 60,
            ..AuthConfig::default()
        };
        let tokens = TokenManager::from_config(&config).unwrap();
        assert_eq!(tokens.ttl(), Duration::from_secs(60));

        let issuer = TokenManager::from_secret("configured", DAY).unwrap();
        let token = issuer.issue("user-1").unwrap();
        assert_eq!(tokens.verify(&token).unwrap().sub, "user-1");
    }

    #[test]
    fn test_from_config_missing_key_file() {
        let config = AuthConfig {
            private_key_path: Some("/nonexistent/private_key.pem".to_string()),
            public_key_path: Some("/nonexistent/public_key.pem".to_string()),
            ..AuthConfig::default()
        };
        assert!(matches!(
            TokenManager::from_config(&config),
            Err(ServiceError::Io(_))
        ));
    }

    #[test]
    fn test_unrepresentable_ttl_is_an_error() {
        let tokens = TokenManager::from_secret("test-secret", Duration::from_secs(u64::MAX)).unwrap();
        assert!(matches!(tokens.issue("user-1"), Err(ServiceError::Config(_))));

        let tokens =
            TokenManager::from_secret("test-secret", Duration::from_secs(i64::MAX as u64)).unwrap();
        assert!(matches!(tokens.issue("user-1"), Err(ServiceError::Config(_))));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenManager::from_secret("", DAY),
            Err(ServiceError::Config(_))
        ));
    }
}
