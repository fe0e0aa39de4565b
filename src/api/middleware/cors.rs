//! Origin allowlist and CORS response headers.

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode, header};
use std::collections::HashSet;

use super::pipeline::{Stage, reject};
use crate::domain::request_context::{Outcome, RequestContext};
use crate::error::AppError;

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS";
const ALLOWED_HEADERS: &str =
    "Content-Type, Authorization, X-Requested-With, Accept, Origin, X-Razorpay-Signature";
const EXPOSED_HEADERS: &str = "RateLimit-Limit, RateLimit-Remaining, RateLimit-Reset, \
X-RateLimit-Limit, X-RateLimit-Remaining, X-RateLimit-Reset, Retry-After, X-Razorpay-Signature";
const MAX_AGE_SECS: u32 = 86_400;

/// Result of checking a request origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsDecision {
    /// No `Origin` header: same-origin request or a non-browser client.
    NoOrigin,
    Allow,
    Deny,
}

/// Literal-match origin allowlist.
#[derive(Debug, Clone, Default)]
pub struct CorsPolicy {
    allowed: HashSet<String>,
}

impl CorsPolicy {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: origins
                .into_iter()
                .map(|o| o.into().trim_end_matches('/').to_string())
                .collect(),
        }
    }

    pub fn evaluate(&self, origin: Option<&str>) -> CorsDecision {
        match origin {
            None => CorsDecision::NoOrigin,
            Some(origin) if self.allowed.contains(origin) => CorsDecision::Allow,
            Some(_) => CorsDecision::Deny,
        }
    }

    /// Like [`CorsPolicy::evaluate`] on the raw header. A present `Origin` that is
    /// not visible ASCII is denied rather than treated as missing.
    pub fn evaluate_header(&self, origin: Option<&HeaderValue>) -> CorsDecision {
        match origin.map(HeaderValue::to_str) {
            None => CorsDecision::NoOrigin,
            Some(Ok(origin)) => self.evaluate(Some(origin)),
            Some(Err(_)) => CorsDecision::Deny,
        }
    }

    /// Headers for a response to an allowed origin.
    fn allow_headers(&self, origin: HeaderValue, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSED_HEADERS),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }

    fn preflight_headers(&self, headers: &mut HeaderMap) {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS),
        );
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from(MAX_AGE_SECS));
    }
}

fn is_preflight(ctx: &RequestContext) -> bool {
    ctx.method() == Method::OPTIONS
        && ctx
            .headers()
            .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
}

pub struct CorsStage {
    policy: CorsPolicy,
}

impl CorsStage {
    pub fn new(policy: CorsPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Stage for CorsStage {
    fn name(&self) -> &'static str {
        "cors"
    }

    async fn run(&self, mut ctx: RequestContext) -> Outcome {
        let decision = self.policy.evaluate_header(ctx.headers().get(header::ORIGIN));
        match decision {
            CorsDecision::NoOrigin => Outcome::Continue(ctx),
            CorsDecision::Deny => {
                tracing::warn!(
                    origin = ?ctx.headers().get(header::ORIGIN),
                    ip = ?ctx.client_ip,
                    "CORS origin rejected"
                );
                reject(ctx, AppError::CorsRejected, "cors origin rejected")
            }
            CorsDecision::Allow => {
                if let Some(origin) = ctx.headers().get(header::ORIGIN).cloned() {
                    self.policy.allow_headers(origin, &mut ctx.response_headers);
                }
                if is_preflight(&ctx) {
                    self.policy.preflight_headers(&mut ctx.response_headers);
                    return ctx.respond(StatusCode::NO_CONTENT);
                }
                Outcome::Continue(ctx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::Request;

    fn stage() -> CorsStage {
        CorsStage::new(CorsPolicy::new(["https://shop.example.in/"]))
    }

    fn ctx(builder: axum::http::request::Builder) -> RequestContext {
        RequestContext::new(builder.body(Body::empty()).unwrap(), false)
    }

    #[test]
    fn test_evaluate() {
        let policy = CorsPolicy::new(["https://shop.example.in"]);

        assert_eq!(policy.evaluate(None), CorsDecision::NoOrigin);
        assert_eq!(
            policy.evaluate(Some("https://shop.example.in")),
            CorsDecision::Allow
        );
        assert_eq!(
            policy.evaluate(Some("https://shop.example.in.evil.com")),
            CorsDecision::Deny
        );
        assert_eq!(
            policy.evaluate(Some("http://shop.example.in")),
            CorsDecision::Deny
        );
    }

    #[tokio::test]
    async fn test_allowed_origin_gets_headers() {
        let outcome = stage()
            .run(ctx(Request::builder()
                .uri("/api/products")
                .header("origin", "https://shop.example.in")))
            .await;

        match outcome {
            Outcome::Continue(ctx) => {
                let h = &ctx.response_headers;
                assert_eq!(h["access-control-allow-origin"], "https://shop.example.in");
                assert_eq!(h["access-control-allow-credentials"], "true");
                assert_eq!(h["vary"], "Origin");
                assert!(
                    h["access-control-expose-headers"]
                        .to_str()
                        .unwrap()
                        .contains("Retry-After")
                );
            }
            Outcome::ShortCircuit(_) => panic!("origin should be allowed"),
        }
    }

    #[tokio::test]
    async fn test_disallowed_origin_rejected() {
        let outcome = stage()
            .run(ctx(Request::builder()
                .uri("/api/products")
                .header("origin", "https://evil.example.com")))
            .await;

        assert!(matches!(outcome, Outcome::ShortCircuit(ref r) if r.status() == 403));
    }

    #[tokio::test]
    async fn test_preflight_short_circuits() {
        let outcome = stage()
            .run(ctx(Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/cart/items")
                .header("origin", "https://shop.example.in")
                .header("access-control-request-method", "POST")))
            .await;

        match outcome {
            Outcome::ShortCircuit(response) => {
                assert_eq!(response.status(), StatusCode::NO_CONTENT);
                let h = response.headers();
                assert_eq!(h["access-control-max-age"], "86400");
                assert!(
                    h["access-control-allow-headers"]
                        .to_str()
                        .unwrap()
                        .contains("X-Razorpay-Signature")
                );
                assert_eq!(h["access-control-allow-methods"], ALLOWED_METHODS);
            }
            Outcome::Continue(_) => panic!("preflight should be answered"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_origin_rejected() {
        let origin = HeaderValue::from_bytes(b"https://shop.example.in\xff").unwrap();
        assert_eq!(
            CorsPolicy::new(["https://shop.example.in"]).evaluate_header(Some(&origin)),
            CorsDecision::Deny
        );

        let outcome = stage()
            .run(ctx(Request::builder()
                .uri("/api/products")
                .header("origin", origin)))
            .await;

        assert!(matches!(outcome, Outcome::ShortCircuit(ref r) if r.status() == 403));
    }

    #[tokio::test]
    async fn test_no_origin_passes() {
        let outcome = stage()
            .run(ctx(Request::builder().uri("/api/products")))
            .await;

        match outcome {
            Outcome::Continue(ctx) => {
                assert!(ctx.response_headers.get("access-control-allow-origin").is_none())
            }
            Outcome::ShortCircuit(_) => panic!("no origin should pass"),
        }
    }
}
