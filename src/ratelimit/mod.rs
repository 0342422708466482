//! Request throttling: policies, key derivation, counter stores and the
//! admission controller.

mod key;
mod limiter;
mod memory;
mod policy;
mod redis_store;
mod store;

pub use key::{KeyStrategy, RateLimitKey};
pub use limiter::{AdmissionController, Decision, LIMIT_EXCEEDED_REASON};
pub use memory::MemoryCounterStore;
pub use policy::{Policy, PolicyConfig};
pub use redis_store::RedisCounterStore;
pub use store::{CounterStore, StoreError};
