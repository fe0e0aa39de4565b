//! Redis-backed counter store.

use super::service::{CounterStore, StoreError, StoreResult};
use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio_retry::Retry;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

/// Counter store shared by every instance through Redis.
///
/// Each increment is one `MULTI`/`EXEC` transaction of `INCR` and `PEXPIRE`, so the
/// count and its expiry are applied atomically. Every call is bounded by `timeout`;
/// an elapsed timeout or a Redis error surfaces as [`StoreError::Unavailable`].
pub struct RedisCounterStore {
    client: ConnectionManager,
    timeout: Duration,
    key_prefix: String,
}

impl RedisCounterStore {
    /// Connects to Redis with a short retry/backoff and validates with PING.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL is invalid or the server stays
    /// unreachable after the retries.
    pub async fn connect(redis_url: &str, timeout: Duration) -> StoreResult<Self> {
        info!("Connecting to Redis counter store");

        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid Redis URL: {}", e)))?;

        // 100ms, 200ms, 400ms before jitter.
        let strategy = ExponentialBackoff::from_millis(2)
            .factor(50)
            .max_delay(Duration::from_secs(1))
            .map(jitter)
            .take(3);

        let manager = Retry::start(strategy, || {
            let client = client.clone();
            // One reconnect per attempt; the backoff comes from `strategy`.
            let config = ConnectionManagerConfig::new().set_number_of_retries(1);
            async move {
                let mut manager = ConnectionManager::new_with_config(client, config)
                    .await
                    .inspect_err(|e| {
                        warn!("Redis connection attempt failed: {}", e);
                    })?;
                manager.ping::<()>().await?;
                Ok::<_, redis::RedisError>(manager)
            }
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("Failed to connect to Redis: {}", e)))?;

        info!("✓ Connected to Redis counter store");

        Ok(Self {
            client: manager,
            timeout,
            key_prefix: "shield:rl:".to_string(),
        })
    }

    /// Constructs the full Redis key with namespace prefix and window bucket.
    fn build_key(&self, key: &str, window_id: i64) -> String {
        format!("{}{}:{}", self.key_prefix, key, window_id)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str, window_id: i64, ttl: Duration) -> StoreResult<u64> {
        let full_key = self.build_key(key, window_id);
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let mut conn = self.client.clone();

        let mut pipe = redis::pipe();
        pipe.atomic()
            .incr(&full_key, 1u64)
            .pexpire(&full_key, ttl_ms)
            .ignore();
        let exec = pipe.query_async::<(u64,)>(&mut conn);

        match tokio::time::timeout(self.timeout, exec).await {
            Ok(Ok((count,))) => {
                debug!("Counter {} -> {}", full_key, count);
                Ok(count)
            }
            Ok(Err(e)) => Err(StoreError::Unavailable(format!(
                "Redis INCR failed for {}: {}",
                full_key, e
            ))),
            Err(_) => Err(StoreError::Unavailable(format!(
                "Redis INCR timed out after {:?}",
                self.timeout
            ))),
        }
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.client.clone();
        matches!(
            tokio::time::timeout(self.timeout, conn.ping::<()>()).await,
            Ok(Ok(()))
        )
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_gives_up_quickly_when_unreachable() {
        let result = tokio::time::timeout(
            Duration::from_secs(15),
            RedisCounterStore::connect("redis://127.0.0.1:1/", Duration::from_millis(200)),
        )
        .await
        .expect("connect should not hang");

        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let result = RedisCounterStore::connect("not a url", Duration::from_millis(200)).await;

        assert!(
            matches!(result, Err(StoreError::Unavailable(ref msg)) if msg.contains("Invalid Redis URL"))
        );
    }
}
