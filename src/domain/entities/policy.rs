//! Rate-limiter policy definitions.
//!
//! A [`LimiterPolicy`] is immutable once the registry is built. The catalog in
//! [`LimiterPolicy::catalog`] is ordered by priority: the rate-limit stage walks it
//! front to back and stops at the first denial.

use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::domain::request_context::RequestContext;

/// Which parts of the request make up the counter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Client IP plus a digest of the `User-Agent` header.
    IpAndUserAgent,
    /// Client IP only.
    Ip,
    /// Client IP plus the authenticated user id, or `anonymous`.
    IpAndUser,
}

impl KeyStrategy {
    /// Derives the counter key for a request.
    ///
    /// The user agent is hashed so distributed keys stay bounded in length no matter
    /// what the client sends.
    pub fn derive(&self, ctx: &RequestContext) -> String {
        let ip = ctx
            .client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        match self {
            KeyStrategy::Ip => ip,
            KeyStrategy::IpAndUserAgent => {
                let ua = ctx.user_agent().unwrap_or_default();
                let digest = Sha256::digest(ua.as_bytes());
                format!("{ip}|{}", &hex::encode(digest)[..16])
            }
            KeyStrategy::IpAndUser => {
                let user = ctx.user_id.as_deref().unwrap_or("anonymous");
                format!("{ip}|{user}")
            }
        }
    }
}

/// Path predicate deciding whether a policy applies to a request.
#[derive(Debug, Clone)]
pub enum PathScope {
    /// Every path.
    All,
    /// Every path except those equal to, or nested under, one of the prefixes.
    AllExcept(Vec<String>),
    /// Paths equal to, or nested under, one of the listed paths.
    Paths(Vec<String>),
    /// Paths containing the given segment anywhere (`/api/admin/...`, `/admin`).
    Segment(String),
}

impl PathScope {
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathScope::All => true,
            PathScope::AllExcept(prefixes) => !prefixes.iter().any(|p| is_under(path, p)),
            PathScope::Paths(paths) => paths.iter().any(|p| is_under(path, p)),
            PathScope::Segment(segment) => path.split('/').any(|s| s == segment),
        }
    }
}

/// `true` if `path` equals `prefix` or continues it with a `/`.
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// When a policy is active, in addition to its path scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Always,
    /// Only for clients currently on the suspect list.
    SuspiciousOnly,
}

/// A named fixed-window rate-limit policy.
#[derive(Debug, Clone)]
pub struct LimiterPolicy {
    pub name: &'static str,
    pub window: Duration,
    pub max_requests: u64,
    pub key_strategy: KeyStrategy,
    pub scope: PathScope,
    pub activation: Activation,
    /// Body `error` message of the 429 response.
    pub message: &'static str,
    /// Human-readable window, returned as `retryAfter` (e.g. `"15 minutes"`).
    pub window_label: &'static str,
}

impl LimiterPolicy {
    /// Whether the policy applies to this request at all.
    pub fn applies_to(&self, ctx: &RequestContext) -> bool {
        let active = match self.activation {
            Activation::Always => true,
            Activation::SuspiciousOnly => ctx.suspicious,
        };
        active && self.scope.matches(ctx.path())
    }

    /// Counter key for this request (`policy:derived-key`), or `None` when the
    /// policy does not apply.
    pub fn counter_key(&self, ctx: &RequestContext) -> Option<String> {
        self.applies_to(ctx)
            .then(|| format!("{}:{}", self.name, self.key_strategy.derive(ctx)))
    }

    pub fn window_ms(&self) -> i64 {
        i64::try_from(self.window.as_millis()).unwrap_or(i64::MAX)
    }

    /// The storefront policy set, in priority order.
    pub fn catalog() -> Vec<LimiterPolicy> {
        const FIFTEEN_MINUTES: Duration = Duration::from_secs(15 * 60);

        vec![
            LimiterPolicy {
                name: "general",
                window: FIFTEEN_MINUTES,
                max_requests: 100,
                key_strategy: KeyStrategy::IpAndUserAgent,
                scope: PathScope::AllExcept(vec![
                    "/health".to_string(),
                    "/api/health".to_string(),
                    "/api/webhooks".to_string(),
                ]),
                activation: Activation::Always,
                message: "Too many requests from this IP, please try again later.",
                window_label: "15 minutes",
            },
            LimiterPolicy {
                name: "auth",
                window: FIFTEEN_MINUTES,
                max_requests: 5,
                key_strategy: KeyStrategy::Ip,
                scope: PathScope::Paths(vec![
                    "/api/auth/login".to_string(),
                    "/api/auth/register".to_string(),
                    "/api/auth/forgot-password".to_string(),
                    "/api/auth/reset-password".to_string(),
                ]),
                activation: Activation::Always,
                message: "Too many authentication attempts, please try again later.",
                window_label: "15 minutes",
            },
            LimiterPolicy {
                name: "payment",
                window: FIFTEEN_MINUTES,
                max_requests: 10,
                key_strategy: KeyStrategy::IpAndUser,
                scope: PathScope::Segment("payments".to_string()),
                activation: Activation::Always,
                message: "Too many payment requests, please try again later.",
                window_label: "15 minutes",
            },
            LimiterPolicy {
                name: "admin",
                window: FIFTEEN_MINUTES,
                max_requests: 50,
                key_strategy: KeyStrategy::IpAndUser,
                scope: PathScope::Segment("admin".to_string()),
                activation: Activation::Always,
                message: "Too many admin requests, please try again later.",
                window_label: "15 minutes",
            },
            LimiterPolicy {
                name: "upload",
                window: Duration::from_secs(60 * 60),
                max_requests: 10,
                key_strategy: KeyStrategy::IpAndUser,
                scope: PathScope::Segment("upload".to_string()),
                activation: Activation::Always,
                message: "Too many upload requests, please try again later.",
                window_label: "1 hour",
            },
            LimiterPolicy {
                name: "search",
                window: Duration::from_secs(5 * 60),
                max_requests: 30,
                key_strategy: KeyStrategy::Ip,
                scope: PathScope::Segment("search".to_string()),
                activation: Activation::Always,
                message: "Too many search requests, please try again later.",
                window_label: "5 minutes",
            },
            LimiterPolicy {
                name: "strict",
                window: Duration::from_secs(60),
                max_requests: 5,
                key_strategy: KeyStrategy::Ip,
                scope: PathScope::All,
                activation: Activation::SuspiciousOnly,
                message: "Too many requests, please slow down.",
                window_label: "1 minute",
            },
        ]
    }
}
