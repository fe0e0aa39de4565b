//! The request-defense layer: builds the stage pipeline and wraps a router with it.

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::body_limit::{BodyLimitStage, DEFAULT_MAX_BODY_BYTES};
use super::cors::{CorsPolicy, CorsStage};
use super::input::{DetectStage, SanitizeStage, ValidateStage};
use super::ip_filter::IpFilterStage;
use super::pipeline::{AuditReason, Pipeline};
use super::rate_limit::{HeaderStyle, RateLimitStage, StoreFailureMode};
use super::security_headers::{SecurityHeaderPolicy, SecurityHeadersStage};
use crate::application::services::{
    BypassPolicy, DetectorChain, IpList, RateLimiterRegistry, RequestAuditLog, RuleCatalog,
    Sanitizer, SuspectList, sanitizer::DEFAULT_MAX_DEPTH,
};
use crate::domain::entities::{AuditEvent, LimiterPolicy};
use crate::domain::request_context::{Outcome, RequestContext};
use crate::infrastructure::counter::CounterStore;

/// Settings for [`Shield`], usually derived from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct ShieldConfig {
    /// Enables HSTS and scanner blocking.
    pub production: bool,
    /// Read the client IP from `X-Forwarded-For` / `X-Real-IP`.
    pub behind_proxy: bool,
    pub trusted_ips: IpList,
    pub blocked_ips: IpList,
    pub allowed_origins: Vec<String>,
    pub header_style: HeaderStyle,
    pub failure_mode: StoreFailureMode,
    pub max_body_bytes: usize,
    pub max_payload_depth: usize,
    /// How long a client flagged by a detector stays under the strict limiter.
    pub suspect_ttl: Duration,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            production: false,
            behind_proxy: false,
            trusted_ips: IpList::default(),
            blocked_ips: IpList::default(),
            allowed_origins: Vec::new(),
            header_style: HeaderStyle::default(),
            failure_mode: StoreFailureMode::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_payload_depth: DEFAULT_MAX_DEPTH,
            suspect_ttl: Duration::from_secs(15 * 60),
        }
    }
}

/// The assembled defense pipeline plus the audit log that observes it.
pub struct Shield {
    pipeline: Pipeline,
    audit: RequestAuditLog,
    suspects: Arc<SuspectList>,
    behind_proxy: bool,
}

impl Shield {
    /// Builds the stages in their fixed order:
    /// ip filter, rate limit, security headers, CORS, body limit, sanitize, detect,
    /// validate.
    pub fn new(config: ShieldConfig, store: Arc<dyn CounterStore>, audit: RequestAuditLog) -> Self {
        let registry = Arc::new(RateLimiterRegistry::new(LimiterPolicy::catalog(), store));
        let suspects = Arc::new(SuspectList::new(config.suspect_ttl));
        let catalog = Arc::new(RuleCatalog::storefront());

        let pipeline = Pipeline::new()
            .stage(IpFilterStage::new(config.blocked_ips, config.production))
            .stage(RateLimitStage::new(
                registry,
                BypassPolicy::new(config.trusted_ips),
                suspects.clone(),
                config.header_style,
                config.failure_mode,
                audit.clone(),
            ))
            .stage(SecurityHeadersStage::new(SecurityHeaderPolicy::new(
                config.production,
            )))
            .stage(CorsStage::new(CorsPolicy::new(config.allowed_origins)))
            .stage(BodyLimitStage::new(config.max_body_bytes))
            .stage(SanitizeStage::new(
                Sanitizer::new(config.max_payload_depth),
                catalog.clone(),
            ))
            .stage(DetectStage::new(DetectorChain::default(), suspects.clone()))
            .stage(ValidateStage::new(catalog));

        Self {
            pipeline,
            audit,
            suspects,
            behind_proxy: config.behind_proxy,
        }
    }

    /// Clients currently flagged by the detectors.
    pub fn suspects(&self) -> Arc<SuspectList> {
        self.suspects.clone()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// Runs the pipeline around `next`, then records the outcome in the audit log.
    pub async fn handle(&self, req: Request, next: Next) -> Response {
        let started = Instant::now();
        let method = req.method().to_string();
        let path = req.uri().path().to_string();

        let ctx = RequestContext::new(req, self.behind_proxy);
        let client_ip = ctx.client_ip;

        let response = match self.pipeline.run(ctx).await {
            Outcome::ShortCircuit(response) => response,
            Outcome::Continue(ctx) => {
                let (req, headers) = ctx.into_request();
                let mut response = next.run(req).await;
                response.headers_mut().extend(headers);
                response
            }
        };

        let mut event = AuditEvent::completed(
            &method,
            &path,
            client_ip,
            response.status().as_u16(),
            started.elapsed(),
        );
        if let Some(AuditReason(reason)) = response.extensions().get::<AuditReason>() {
            event = event.with_reason(reason.clone());
        }
        self.audit.record(event);

        response
    }
}

/// Middleware entry point for [`axum::middleware::from_fn_with_state`].
pub async fn layer(State(shield): State<Arc<Shield>>, req: Request, next: Next) -> Response {
    shield.handle(req, next).await
}

/// Wraps every route of `router`, including its fallback, with the shield.
pub fn protect<S>(router: Router<S>, shield: Arc<Shield>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(shield, layer))
}
