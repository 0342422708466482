//! Error types for the account service.

use thiserror::Error;

use crate::ratelimit::StoreError;

/// Main error type for account service operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A rate limit policy that can never admit anything
    #[error("Invalid rate limit policy: {0}")]
    InvalidPolicy(String),

    /// Counter store unreachable or returned an error
    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),

    /// Relational store errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration errors
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The requested record does not exist
    #[error("Record not found")]
    NotFound,

    /// A unique column already holds the value
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("invalid username or password")]
    InvalidCredentials,

    /// Token signing or verification errors
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Password hashing error: {0}")]
    PasswordHash(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for account service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
