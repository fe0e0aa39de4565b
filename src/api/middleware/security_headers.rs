//! Static security response headers.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};

use super::pipeline::Stage;
use crate::domain::request_context::{Outcome, RequestContext};

/// Payment gateway origins the storefront checkout loads from.
const PAYMENT_SCRIPT_ORIGINS: &str = "https://checkout.razorpay.com https://*.razorpay.com";
const PAYMENT_FRAME_ORIGINS: &str = "https://api.razorpay.com https://checkout.razorpay.com";
const PAYMENT_CONNECT_ORIGINS: &str = "https://api.razorpay.com https://lumberjack.razorpay.com";

/// Path prefixes whose responses must never be cached.
const NO_STORE_PREFIXES: &[&str] = &["/api/auth", "/api/admin"];

pub fn content_security_policy() -> String {
    [
        "default-src 'self'".to_string(),
        format!("script-src 'self' {PAYMENT_SCRIPT_ORIGINS}"),
        "style-src 'self' 'unsafe-inline' https://fonts.googleapis.com".to_string(),
        "font-src 'self' https://fonts.gstatic.com".to_string(),
        "img-src 'self' data: https:".to_string(),
        format!("connect-src 'self' {PAYMENT_CONNECT_ORIGINS}"),
        format!("frame-src 'self' {PAYMENT_FRAME_ORIGINS}"),
        "object-src 'none'".to_string(),
        "base-uri 'self'".to_string(),
        "form-action 'self'".to_string(),
        "frame-ancestors 'none'".to_string(),
    ]
    .join("; ")
}

/// Security headers applied to every response.
///
/// Both header maps are built once; per request they are only cloned.
pub struct SecurityHeaderPolicy {
    headers: HeaderMap,
    no_store: HeaderMap,
}

impl SecurityHeaderPolicy {
    /// `production` adds `Strict-Transport-Security`.
    pub fn new(production: bool) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        );
        headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
        headers.insert(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        );
        headers.insert(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        );
        headers.insert(
            HeaderName::from_static("permissions-policy"),
            HeaderValue::from_static("geolocation=(), microphone=(), camera=()"),
        );
        // Built from constants only, so it is always a valid header value.
        if let Ok(csp) = HeaderValue::from_str(&content_security_policy()) {
            headers.insert(header::CONTENT_SECURITY_POLICY, csp);
        }
        if production {
            headers.insert(
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains; preload"),
            );
        }

        let mut no_store = HeaderMap::new();
        no_store.insert(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        no_store.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

        Self { headers, no_store }
    }

    /// Writes the static set, plus cache suppression for sensitive paths.
    pub fn apply_headers(&self, path: &str, target: &mut HeaderMap) {
        target.extend(self.headers.clone());
        if is_sensitive(path) {
            target.extend(self.no_store.clone());
        }
    }
}

fn is_sensitive(path: &str) -> bool {
    NO_STORE_PREFIXES.iter().any(|prefix| {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

pub struct SecurityHeadersStage {
    policy: SecurityHeaderPolicy,
}

impl SecurityHeadersStage {
    pub fn new(policy: SecurityHeaderPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for SecurityHeadersStage {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    async fn run(&self, mut ctx: RequestContext) -> Outcome {
        let path = ctx.path().to_string();
        self.policy.apply_headers(&path, &mut ctx.response_headers);
        Outcome::Continue(ctx)
    }
}
