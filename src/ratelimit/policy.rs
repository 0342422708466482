//! Rate limit policies and their configuration form.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, ServiceError};

/// Longest window a counter store can expire, in milliseconds. Redis keeps
/// expire times as signed 64-bit values.
pub const MAX_WINDOW_MILLIS: u128 = i64::MAX as u128;

/// A validated rate limit policy.
///
/// At most `max_count` requests per subject are admitted inside one fixed
/// window of `window` length. The window starts with the first request and
/// is not extended by later ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    namespace: String,
    max_count: u64,
    window: Duration,
}

impl Policy {
    /// Create a policy, rejecting values that could never admit a request
    /// or that would let keys of different subjects collide.
    pub fn new(namespace: impl Into<String>, max_count: u64, window: Duration) -> Result<Self> {
        let namespace = namespace.into();

        if namespace.is_empty() {
            return Err(ServiceError::InvalidPolicy(
                "namespace must not be empty".to_string(),
            ));
        }
        if namespace.contains(':') {
            return Err(ServiceError::InvalidPolicy(format!(
                "namespace {:?} must not contain ':'",
                namespace
            )));
        }
        if max_count == 0 {
            return Err(ServiceError::InvalidPolicy(format!(
                "max_count for {:?} must be greater than zero",
                namespace
            )));
        }
        if window.as_millis() == 0 {
            return Err(ServiceError::InvalidPolicy(format!(
                "window for {:?} must be at least one millisecond",
                namespace
            )));
        }
        if window.as_millis() > MAX_WINDOW_MILLIS {
            return Err(ServiceError::InvalidPolicy(format!(
                "window for {:?} exceeds {} milliseconds",
                namespace, MAX_WINDOW_MILLIS
            )));
        }

        Ok(Self {
            namespace,
            max_count,
            window,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn max_count(&self) -> u64 {
        self.max_count
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Policy as written in configuration files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Key prefix separating this policy's counters from others
    pub namespace: String,
    /// Requests admitted per window
    pub max_count: u64,
    /// Window length in seconds
    pub window_secs: u64,
}

impl PolicyConfig {
    pub fn new(namespace: &str, max_count: u64, window_secs: u64) -> Self {
        Self {
            namespace: namespace.to_string(),
            max_count,
            window_secs,
        }
    }

    /// Validate into a [`Policy`].
    pub fn build(&self) -> Result<Policy> {
        Policy::new(
            self.namespace.clone(),
            self.max_count,
            Duration::from_secs(self.window_secs),
        )
    }
}
