//! Admission control over a shared counter store.

use std::sync::Arc;
use tracing::{debug, error, trace};

use crate::error::Result;

use super::key::RateLimitKey;
use super::policy::Policy;
use super::store::CounterStore;

/// Reason attached to every denial.
pub const LIMIT_EXCEEDED_REASON: &str = "rate limit exceeded";

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Why the request was denied, if it was
    pub reason: Option<&'static str>,
}

impl Decision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny() -> Self {
        Self {
            allowed: false,
            reason: Some(LIMIT_EXCEEDED_REASON),
        }
    }
}

/// Decides whether a request may proceed under a policy.
///
/// The controller holds no counters of its own. All shared state lives in
/// the store, so one instance can serve any number of concurrent callers.
pub struct AdmissionController {
    store: Arc<dyn CounterStore>,
}

impl AdmissionController {
    /// Create a controller over the given store.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Check one request from `subject` against `policy`.
    ///
    /// A request found at or over the limit is denied without touching the
    /// counter. Store failures are returned as errors; the caller chooses
    /// whether to fail open or closed.
    pub async fn admit(&self, policy: &Policy, subject: &str) -> Result<Decision> {
        let key = RateLimitKey::new(policy, subject);

        let current = self.store.get_count(key.as_str()).await.map_err(|e| {
            error!(key = %key, error = %e, "Failed to read rate limit counter");
            e
        })?;

        trace!(
            key = %key,
            current = current,
            max_count = policy.max_count(),
            "Checking rate limit"
        );

        if current >= policy.max_count() {
            debug!(key = %key, current = current, "Rate limit exceeded");
            return Ok(Decision::deny());
        }

        let count = self
            .store
            .increment_and_expire(key.as_str(), policy.window())
            .await
            .map_err(|e| {
                error!(key = %key, error = %e, "Failed to increment rate limit counter");
                e
            })?;

        // Another caller took the last slot between our read and increment.
        if count > policy.max_count() {
            debug!(key = %key, count = count, "Rate limit exceeded after increment");
            return Ok(Decision::deny());
        }

        Ok(Decision::allow())
    }
}
