//! In-process counter store.
//!
//! Counters live in a sharded map and expire lazily: an expired entry is
//! treated as absent on the next access, and a background task started with
//! [`MemoryCounterStore::spawn_purge_task`] drops them for good. Selected
//! with `rate_limiting.store: memory` for single-instance deployments.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::store::{CounterStore, StoreError};

#[derive(Debug, Clone, Copy)]
struct Entry {
    count: u64,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// A counter store backed by a concurrent in-process map.
///
/// Each increment holds the shard lock for its key, which gives the same
/// per-key atomicity the Redis transaction provides.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, Entry>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining time to live of a key, if it exists and has one.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entry = self.counters.get(key)?;
        if entry.is_expired(now) {
            return None;
        }
        entry.expires_at.map(|at| at.saturating_duration_since(now))
    }

    /// Drop expired counters.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.counters.retain(|_, entry| !entry.is_expired(now));
    }

    /// Purge expired counters every `every` until the handle is aborted.
    pub fn spawn_purge_task(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                store.purge_expired();
                debug!(live = store.counters.len(), "Purged expired counters");
            }
        })
    }

    /// Get the number of live counters.
    pub fn counter_count(&self) -> usize {
        let now = Instant::now();
        self.counters
            .iter()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn get_count(&self, key: &str) -> Result<u64, StoreError> {
        let now = Instant::now();
        Ok(self
            .counters
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.count)
            .unwrap_or(0))
    }

    async fn increment_and_expire(&self, key: &str, ttl: Duration) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Entry {
            count: 0,
            expires_at: None,
        });

        if entry.is_expired(now) {
            *entry = Entry {
                count: 0,
                expires_at: None,
            };
        }

        entry.count += 1;
        if entry.expires_at.is_none() {
            entry.expires_at = Some(now + ttl);
        }

        Ok(entry.count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
