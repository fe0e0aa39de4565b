//! Counter store trait and error types.

use async_trait::async_trait;
use std::time::Duration;

/// Errors that can occur during counter operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    /// Backend unreachable, timed out, or returned an error.
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for counter operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Atomic fixed-window counter storage.
///
/// `increment` must be linearizable per `(key, window_id)`: concurrent callers each
/// observe a distinct count, and no update is lost. Counters are never decremented;
/// a new `window_id` starts a fresh counter.
///
/// # Implementations
///
/// - [`crate::infrastructure::counter::LocalCounterStore`] - in-process, mutex-guarded
/// - [`crate::infrastructure::counter::RedisCounterStore`] - shared across instances
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increments the counter for `key` in bucket `window_id` and returns the new
    /// count. The bucket expires `ttl` after it is created.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the backend cannot be reached within
    /// its timeout. Callers decide whether that fails open or closed.
    async fn increment(&self, key: &str, window_id: i64, ttl: Duration) -> StoreResult<u64>;

    /// Checks if the backend is reachable.
    async fn health_check(&self) -> bool;

    /// Short backend name for logs and the health endpoint.
    fn backend(&self) -> &'static str;
}
