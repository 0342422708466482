//! Counter store trait for abstracting Redis and in-process implementations.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Redis connection or command failure
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    /// The store could not be reached for a non-Redis reason
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Trait for counter store implementations.
///
/// This trait abstracts over the `RedisCounterStore` and the
/// `MemoryCounterStore` so the admission controller can work with either.
/// Implementations must serialize concurrent increments on the same key;
/// no ordering is required across keys.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Get the current count for a key.
    ///
    /// An absent key is a count of zero, never an error.
    async fn get_count(&self, key: &str) -> Result<u64, StoreError>;

    /// Atomically increment the counter for a key and return the new count.
    ///
    /// A missing counter is created at 1. The TTL is applied only when the
    /// key has none, so later increments never extend the window.
    async fn increment_and_expire(&self, key: &str, ttl: Duration) -> Result<u64, StoreError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;
}
