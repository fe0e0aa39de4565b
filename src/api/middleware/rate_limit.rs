//! Rate limiting stage: trusted-IP bypass, then every matching limiter policy.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::Utc;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::pipeline::{Stage, reject};
use crate::application::services::{
    BypassPolicy, Decision, RateLimiterRegistry, RequestAuditLog, SuspectList, ceil_secs,
};
use crate::domain::entities::AuditEvent;
use crate::domain::request_context::{Outcome, RequestContext};
use crate::error::AppError;

/// Which family of rate-limit headers is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HeaderStyle {
    /// `RateLimit-Limit`, `RateLimit-Remaining`, `RateLimit-Reset`.
    #[default]
    Standard,
    /// `X-RateLimit-Limit`, `X-RateLimit-Remaining`, `X-RateLimit-Reset`.
    Legacy,
}

impl HeaderStyle {
    fn names(&self) -> [&'static str; 3] {
        match self {
            HeaderStyle::Standard => ["ratelimit-limit", "ratelimit-remaining", "ratelimit-reset"],
            HeaderStyle::Legacy => [
                "x-ratelimit-limit",
                "x-ratelimit-remaining",
                "x-ratelimit-reset",
            ],
        }
    }

    /// Writes limit, remaining budget and seconds until reset.
    pub fn apply(&self, headers: &mut HeaderMap, limit: u64, remaining: u64, reset: Duration) {
        let [limit_name, remaining_name, reset_name] = self.names();
        for (name, value) in [
            (limit_name, limit),
            (remaining_name, remaining),
            (reset_name, ceil_secs(reset)),
        ] {
            headers.insert(HeaderName::from_static(name), HeaderValue::from(value));
        }
    }
}

impl FromStr for HeaderStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(HeaderStyle::Standard),
            "legacy" => Ok(HeaderStyle::Legacy),
            other => Err(format!(
                "RATE_LIMIT_HEADERS must be 'standard' or 'legacy', got '{}'",
                other
            )),
        }
    }
}

/// What to do when the counter store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreFailureMode {
    /// Treat the check as allowed and log a warning.
    #[default]
    FailOpen,
    /// Answer 503.
    FailClosed,
}

impl FromStr for StoreFailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "open" => Ok(StoreFailureMode::FailOpen),
            "closed" => Ok(StoreFailureMode::FailClosed),
            other => Err(format!(
                "RATE_LIMIT_FAIL_MODE must be 'open' or 'closed', got '{}'",
                other
            )),
        }
    }
}

pub struct RateLimitStage {
    registry: Arc<RateLimiterRegistry>,
    bypass: BypassPolicy,
    suspects: Arc<SuspectList>,
    header_style: HeaderStyle,
    failure_mode: StoreFailureMode,
    audit: RequestAuditLog,
}

impl RateLimitStage {
    pub fn new(
        registry: Arc<RateLimiterRegistry>,
        bypass: BypassPolicy,
        suspects: Arc<SuspectList>,
        header_style: HeaderStyle,
        failure_mode: StoreFailureMode,
        audit: RequestAuditLog,
    ) -> Self {
        Self {
            registry,
            bypass,
            suspects,
            header_style,
            failure_mode,
            audit,
        }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    /// Trusted clients skip the registry without touching any counter. Everyone
    /// else is counted against each matching policy in priority order until the
    /// first denial.
    async fn run(&self, mut ctx: RequestContext) -> Outcome {
        if let Some(ip) = ctx.client_ip {
            if self.bypass.is_trusted(ip) {
                return Outcome::Continue(ctx);
            }
            ctx.suspicious = self.suspects.contains(ip);
        }

        let now_ms = Utc::now().timestamp_millis();
        let mut reported = None;

        for policy in self.registry.policies() {
            let key = policy.counter_key(&ctx);
            let checked = self.registry.check(policy, key, now_ms).await;
            match checked {
                Ok(Decision::NotApplicable) => {}
                Ok(Decision::Allowed {
                    limit,
                    remaining,
                    reset_after,
                }) => reported = Some((limit, remaining, reset_after)),
                Ok(Decision::Denied { limit, retry_after }) => {
                    tracing::warn!(
                        policy = policy.name,
                        ip = ?ctx.client_ip,
                        path = ctx.path(),
                        "Rate limit exceeded"
                    );
                    self.header_style
                        .apply(&mut ctx.response_headers, limit, 0, retry_after);
                    let error = AppError::RateLimitExceeded {
                        message: policy.message,
                        window_label: policy.window_label,
                        retry_after_secs: ceil_secs(retry_after),
                    };
                    let reason = format!("rate limit: {}", policy.name);
                    return reject(ctx, error, reason);
                }
                Err(e) => match self.failure_mode {
                    StoreFailureMode::FailOpen => {
                        tracing::warn!(
                            policy = policy.name,
                            backend = self.registry.store().backend(),
                            error = %e,
                            "Counter store unavailable, allowing request"
                        );
                        self.audit.record(AuditEvent::degraded(
                            ctx.method().as_str(),
                            ctx.path(),
                            ctx.client_ip,
                            format!("rate limit store unavailable ({}): {}", policy.name, e),
                        ));
                    }
                    StoreFailureMode::FailClosed => {
                        tracing::error!(
                            policy = policy.name,
                            error = %e,
                            "Counter store unavailable, rejecting request"
                        );
                        return reject(ctx, AppError::StoreUnavailable, "rate limit store unavailable");
                    }
                },
            }
        }

        if let Some((limit, remaining, reset_after)) = reported {
            self.header_style
                .apply(&mut ctx.response_headers, limit, remaining, reset_after);
        }

        Outcome::Continue(ctx)
    }
}
