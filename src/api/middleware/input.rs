//! Input hygiene stages: sanitize, detect, validate.
//!
//! They always run in that order, so the detectors and the validator only ever see
//! sanitized data.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::pipeline::{Stage, reject};
use crate::application::services::{DetectorChain, RuleCatalog, Sanitizer, SuspectList};
use crate::domain::request_context::{Outcome, RequestContext};
use crate::error::AppError;
use crate::utils::form::encode_form;

/// Binds the route's rule sets and params, then strips markup from body, query and
/// params.
pub struct SanitizeStage {
    sanitizer: Sanitizer,
    catalog: Arc<RuleCatalog>,
}

impl SanitizeStage {
    pub fn new(sanitizer: Sanitizer, catalog: Arc<RuleCatalog>) -> Self {
        Self { sanitizer, catalog }
    }
}

#[async_trait]
impl Stage for SanitizeStage {
    fn name(&self) -> &'static str {
        "sanitize"
    }

    async fn run(&self, mut ctx: RequestContext) -> Outcome {
        if let Some(route) = self.catalog.route(ctx.method(), ctx.path()) {
            ctx.rule_sets = route.rule_sets;
            ctx.input.params = Value::Object(route.params);
        }

        let sanitized = [&ctx.input.body, &ctx.input.query, &ctx.input.params]
            .map(|value| self.sanitizer.sanitize(value));
        let [body, query, params] = match sanitized {
            [Ok(body), Ok(query), Ok(params)] => [body, query, params],
            _ => {
                let max_depth = self.sanitizer.max_depth();
                tracing::warn!(ip = ?ctx.client_ip, path = ctx.path(), max_depth, "Payload too deeply nested");
                return reject(ctx, AppError::PayloadTooDeep { max_depth }, "payload too deep");
            }
        };

        if query != ctx.input.query && ctx.replace_query(&encode_form(&query)).is_err() {
            return reject(ctx, AppError::MalformedBody, "unencodable query");
        }

        ctx.input.body = body;
        ctx.input.query = query;
        ctx.input.params = params;
        Outcome::Continue(ctx)
    }
}

/// Rejects requests whose body or query trips a heuristic detector and flags the
/// client as a suspect.
pub struct DetectStage {
    chain: DetectorChain,
    suspects: Arc<SuspectList>,
}

impl DetectStage {
    pub fn new(chain: DetectorChain, suspects: Arc<SuspectList>) -> Self {
        Self { chain, suspects }
    }
}

#[async_trait]
impl Stage for DetectStage {
    fn name(&self) -> &'static str {
        "detect"
    }

    async fn run(&self, ctx: RequestContext) -> Outcome {
        let hit = self
            .chain
            .scan("body", &ctx.input.body)
            .or_else(|| self.chain.scan("query", &ctx.input.query));

        let Some(hit) = hit else {
            return Outcome::Continue(ctx);
        };

        tracing::warn!(
            detector = hit.detector,
            field = %hit.field,
            ip = ?ctx.client_ip,
            path = ctx.path(),
            "Suspicious input detected"
        );
        if let Some(ip) = ctx.client_ip {
            self.suspects.flag(ip);
        }
        let reason = format!("{} in {}", hit.detector, hit.field);
        reject(ctx, AppError::SuspiciousInput, reason)
    }
}

/// Runs the rule sets bound by [`SanitizeStage`].
pub struct ValidateStage {
    catalog: Arc<RuleCatalog>,
}

impl ValidateStage {
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl Stage for ValidateStage {
    fn name(&self) -> &'static str {
        "validate"
    }

    async fn run(&self, ctx: RequestContext) -> Outcome {
        if ctx.rule_sets.is_empty() {
            return Outcome::Continue(ctx);
        }

        match self.catalog.validate_all(&ctx.input, ctx.rule_sets) {
            Ok(errors) if errors.is_empty() => Outcome::Continue(ctx),
            Ok(errors) => {
                tracing::info!(
                    path = ctx.path(),
                    errors = errors.len(),
                    "Request failed validation"
                );
                let reason = format!("validation failed: {} field(s)", errors.len());
                reject(ctx, AppError::ValidationFailed(errors), reason)
            }
            Err(e) => {
                tracing::error!(error = %e, path = ctx.path(), "Route bound to missing rule set");
                reject(ctx, AppError::Internal, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::request_context::Payload;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::http::Method;
    use serde_json::json;

    fn ctx(method: Method, uri: &str, body: Value) -> RequestContext {
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::empty())
            .unwrap();
        let mut ctx = RequestContext::new(req, true);
        ctx.input.body = body;
        ctx.payload = Payload::Json;
        ctx
    }

    fn catalog() -> Arc<RuleCatalog> {
        Arc::new(RuleCatalog::storefront())
    }

    #[tokio::test]
    async fn test_sanitize_binds_route_and_cleans_input() {
        let stage = SanitizeStage::new(Sanitizer::default(), catalog());
        let request = ctx(
            Method::POST,
            "/api/products/64b7f0c2a1b2c3d4e5f60718/reviews?ref=%3Cb%3Email%3C%2Fb%3E",
            json!({"rating": 5, "comment": "<p>Lovely <b>fabric</b></p>"}),
        );

        match stage.run(request).await {
            Outcome::Continue(ctx) => {
                assert_eq!(ctx.rule_sets, &["object_id_param", "review"]);
                assert_eq!(ctx.input.params, json!({"id": "64b7f0c2a1b2c3d4e5f60718"}));
                assert_eq!(ctx.input.body["comment"], "Lovely fabric");
                assert_eq!(ctx.input.query, json!({"ref": "mail"}));

                let (req, _) = ctx.into_request();
                assert_eq!(req.uri().query(), Some("ref=mail"));
            }
            Outcome::ShortCircuit(_) => panic!("should continue"),
        }
    }

    #[tokio::test]
    async fn test_sanitize_rejects_deep_payload() {
        let stage = SanitizeStage::new(Sanitizer::new(4), catalog());
        let request = ctx(
            Method::POST,
            "/api/cart/items",
            json!({"a": {"b": {"c": {"d": 1}}}}),
        );

        assert!(matches!(
            stage.run(request).await,
            Outcome::ShortCircuit(ref r) if r.status() == 400
        ));
    }

    #[tokio::test]
    async fn test_detect_flags_suspect() {
        let suspects = Arc::new(SuspectList::default());
        let stage = DetectStage::new(DetectorChain::default(), suspects.clone());

        let outcome = stage
            .run(ctx(Method::POST, "/api/auth/login", json!({"email": "1 OR 1=1"})))
            .await;

        assert!(matches!(outcome, Outcome::ShortCircuit(ref r) if r.status() == 400));
        assert!(suspects.contains("203.0.113.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_detect_scans_query() {
        let stage = DetectStage::new(DetectorChain::default(), Arc::new(SuspectList::default()));

        let outcome = stage
            .run(ctx(
                Method::GET,
                "/api/search?q=javascript:alert(1)",
                Value::Null,
            ))
            .await;

        assert!(matches!(outcome, Outcome::ShortCircuit(_)));
    }

    #[tokio::test]
    async fn test_detect_passes_benign_input() {
        let stage = DetectStage::new(DetectorChain::default(), Arc::new(SuspectList::default()));

        let outcome = stage
            .run(ctx(Method::POST, "/api/addresses", json!({"fullName": "Seán O'Brien"})))
            .await;

        assert!(matches!(outcome, Outcome::Continue(_)));
    }

    #[tokio::test]
    async fn test_validate_reports_details() {
        let mut request = ctx(
            Method::POST,
            "/api/cart/items",
            json!({"productId": "abc", "quantity": 0}),
        );
        request.rule_sets = &["cart_item"];

        match ValidateStage::new(catalog()).run(request).await {
            Outcome::ShortCircuit(response) => {
                assert_eq!(response.status(), 400);
                let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                    .await
                    .unwrap();
                let body: Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(body["error"], "Validation failed");
                assert_eq!(body["details"].as_array().unwrap().len(), 2);
            }
            Outcome::Continue(_) => panic!("expected validation failure"),
        }
    }

    #[tokio::test]
    async fn test_unbound_route_skips_validation() {
        let request = ctx(Method::POST, "/api/wishlist", json!({"anything": 1}));

        assert!(matches!(
            ValidateStage::new(catalog()).run(request).await,
            Outcome::Continue(_)
        ));
    }
}
