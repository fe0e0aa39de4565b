//! Fixed-window rate limiting over named policies.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::entities::LimiterPolicy;
use crate::domain::request_context::RequestContext;
use crate::infrastructure::counter::{CounterStore, StoreError};

/// Outcome of checking one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Policy scope or activation does not match; no budget consumed.
    NotApplicable,
    Allowed {
        limit: u64,
        remaining: u64,
        reset_after: Duration,
    },
    Denied {
        limit: u64,
        retry_after: Duration,
    },
}

/// Errors from [`RateLimiterRegistry::enforce`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum LimiterError {
    #[error("Unknown rate-limit policy: {0}")]
    UnknownPolicy(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Named limiter policies sharing one [`CounterStore`].
///
/// Uses fixed windows: `window_id = floor(now / window)`. A client can therefore
/// send up to twice the limit across a window boundary; that burst is accepted.
pub struct RateLimiterRegistry {
    policies: Vec<LimiterPolicy>,
    store: Arc<dyn CounterStore>,
}

impl RateLimiterRegistry {
    pub fn new(policies: Vec<LimiterPolicy>, store: Arc<dyn CounterStore>) -> Self {
        Self { policies, store }
    }

    /// Policies in priority order.
    pub fn policies(&self) -> &[LimiterPolicy] {
        &self.policies
    }

    pub fn policy(&self, name: &str) -> Option<&LimiterPolicy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    /// Counts the request against `policy_name` at the current time.
    ///
    /// # Errors
    ///
    /// - [`LimiterError::UnknownPolicy`] if no policy has that name
    /// - [`LimiterError::Store`] if the counter store is unavailable
    pub fn enforce<'a>(
        &'a self,
        policy_name: &str,
        ctx: &RequestContext,
    ) -> impl Future<Output = Result<Decision, LimiterError>> + Send + use<'a> {
        self.enforce_at(policy_name, ctx, Utc::now().timestamp_millis())
    }

    /// Same as [`enforce`](Self::enforce) with an explicit clock, in Unix milliseconds.
    ///
    /// Everything read from `ctx` is extracted before the returned future is built,
    /// so the future does not borrow the request.
    pub fn enforce_at<'a>(
        &'a self,
        policy_name: &str,
        ctx: &RequestContext,
        now_ms: i64,
    ) -> impl Future<Output = Result<Decision, LimiterError>> + Send + use<'a> {
        let resolved = self
            .policy(policy_name)
            .map(|policy| (policy, policy.counter_key(ctx)))
            .ok_or_else(|| LimiterError::UnknownPolicy(policy_name.to_string()));

        async move {
            let (policy, key) = resolved?;
            Ok(self.check(policy, key, now_ms).await?)
        }
    }

    /// Counts a request against an already-resolved policy.
    ///
    /// `key` comes from [`LimiterPolicy::counter_key`]; `None` means the policy does
    /// not apply and the store is not touched.
    pub async fn check(
        &self,
        policy: &LimiterPolicy,
        key: Option<String>,
        now_ms: i64,
    ) -> Result<Decision, StoreError> {
        let Some(key) = key else {
            return Ok(Decision::NotApplicable);
        };

        let window_ms = policy.window_ms().max(1);
        let window_id = now_ms.div_euclid(window_ms);
        let until_reset_ms = window_ms - now_ms.rem_euclid(window_ms);

        let count = self.increment_detached(key, window_id, policy.window).await?;

        let reset_after = Duration::from_millis(u64::try_from(until_reset_ms).unwrap_or(0));
        if count > policy.max_requests {
            Ok(Decision::Denied {
                limit: policy.max_requests,
                retry_after: reset_after,
            })
        } else {
            Ok(Decision::Allowed {
                limit: policy.max_requests,
                remaining: policy.max_requests - count,
                reset_after,
            })
        }
    }

    /// Runs the increment on its own task so that a dropped request future (client
    /// disconnect) cannot cancel it half way.
    async fn increment_detached(
        &self,
        key: String,
        window_id: i64,
        ttl: Duration,
    ) -> Result<u64, StoreError> {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move { store.increment(&key, window_id, ttl).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("increment task failed: {}", e)))?
    }
}

/// Whole seconds a client should wait, rounded up.
pub fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
