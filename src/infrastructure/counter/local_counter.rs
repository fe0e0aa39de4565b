//! In-process counter store.

use super::service::{CounterStore, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// One fixed-window bucket.
#[derive(Debug, Clone, Copy)]
struct CounterRecord {
    count: u64,
    expires_at: Instant,
}

/// Counter store backed by a mutex-protected map.
///
/// Suitable for a single instance. Expired buckets are replaced lazily on access and
/// removed in bulk by [`LocalCounterStore::spawn_sweeper`].
pub struct LocalCounterStore {
    records: Mutex<HashMap<String, CounterRecord>>,
}

impl LocalCounterStore {
    pub fn new() -> Self {
        debug!("Using LocalCounterStore (single-instance rate limiting)");
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    fn bucket_key(key: &str, window_id: i64) -> String {
        format!("{key}:{window_id}")
    }

    /// Removes every expired bucket. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        before - records.len()
    }

    /// Number of live buckets, expired ones included until swept.
    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Starts a background task purging expired buckets every `every`.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let purged = self.purge_expired();
                if purged > 0 {
                    debug!(purged, "Swept expired rate-limit buckets");
                }
            }
        })
    }
}

impl Default for LocalCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CounterStore for LocalCounterStore {
    async fn increment(&self, key: &str, window_id: i64, ttl: Duration) -> StoreResult<u64> {
        let now = Instant::now();
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);

        let record = records
            .entry(Self::bucket_key(key, window_id))
            .or_insert(CounterRecord {
                count: 0,
                expires_at: now + ttl,
            });

        if record.expires_at <= now {
            *record = CounterRecord {
                count: 0,
                expires_at: now + ttl,
            };
        }

        record.count += 1;
        Ok(record.count)
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}
