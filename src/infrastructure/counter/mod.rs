//! Rate-limit counter storage.
//!
//! Provides a [`CounterStore`] trait with two implementations, one of which is
//! chosen once at startup from configuration:
//! - [`LocalCounterStore`] - in-process map, single instance
//! - [`RedisCounterStore`] - shared counters for horizontally scaled deployments

mod local_counter;
mod redis_counter;
mod service;

pub use local_counter::LocalCounterStore;
pub use redis_counter::RedisCounterStore;
#[cfg(test)]
pub use service::MockCounterStore;
pub use service::{CounterStore, StoreError, StoreResult};
