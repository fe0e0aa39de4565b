#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Extension, Json, Router,
    routing::{get, post},
};
use axum_test::TestServer;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use storefront_shield::api::middleware::{Shield, ShieldConfig};
use storefront_shield::application::services::{IpList, RequestAuditLog};
use storefront_shield::domain::entities::AuditEvent;
use storefront_shield::domain::request_context::ValidatedInput;
use storefront_shield::infrastructure::counter::{
    CounterStore, LocalCounterStore, StoreError, StoreResult,
};
use storefront_shield::routes::shielded_router;
use storefront_shield::state::AppState;
use tokio::sync::mpsc;

pub const CLIENT_IP: &str = "203.0.113.10";
pub const SHOP_ORIGIN: &str = "https://shop.example.in";

/// Store that is always down.
pub struct FailingStore;

#[async_trait]
impl CounterStore for FailingStore {
    async fn increment(&self, _key: &str, _window_id: i64, _ttl: Duration) -> StoreResult<u64> {
        Err(StoreError::Unavailable("connection refused".to_string()))
    }

    async fn health_check(&self) -> bool {
        false
    }

    fn backend(&self) -> &'static str {
        "failing"
    }
}

pub fn test_config() -> ShieldConfig {
    ShieldConfig {
        behind_proxy: true,
        allowed_origins: vec![SHOP_ORIGIN.to_string()],
        ..ShieldConfig::default()
    }
}

pub fn config_with_lists(trusted: &str, blocked: &str) -> ShieldConfig {
    ShieldConfig {
        trusted_ips: IpList::parse(trusted).unwrap(),
        blocked_ips: IpList::parse(blocked).unwrap(),
        ..test_config()
    }
}

/// Echoes whatever the shield handed over, so tests can see the sanitized input.
async fn echo(Extension(ValidatedInput(input)): Extension<ValidatedInput>) -> Json<Value> {
    Json(json!({
        "body": input.body,
        "query": input.query,
        "params": input.params,
    }))
}

async fn ok() -> Json<Value> {
    Json(json!({ "success": true }))
}

/// Minimal storefront routes standing in for the real handlers.
pub fn storefront() -> Router {
    Router::new()
        .route("/api/auth/login", post(ok))
        .route("/api/auth/register", post(echo))
        .route("/api/products", get(ok))
        .route("/api/products/search", get(echo))
        .route("/api/products/{id}/reviews", post(echo))
        .route("/api/cart/items", post(echo))
        .route("/api/addresses", post(echo))
        .route("/api/upload", post(ok))
}

pub struct TestApp {
    pub server: TestServer,
    pub audit_rx: mpsc::Receiver<AuditEvent>,
}

impl TestApp {
    /// Drains every audit event queued so far.
    pub fn audit_events(&mut self) -> Vec<AuditEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = self.audit_rx.try_recv() {
            events.push(ev);
        }
        events
    }
}

pub fn create_app_with(config: ShieldConfig, store: Arc<dyn CounterStore>) -> TestApp {
    let (audit, audit_rx) = RequestAuditLog::channel(1_000);
    let shield = Arc::new(Shield::new(config, store.clone(), audit.clone()));
    let state = AppState::new(store, audit);

    let server = TestServer::new(shielded_router(state, shield, storefront())).unwrap();
    TestApp { server, audit_rx }
}

pub fn create_app(config: ShieldConfig) -> TestApp {
    create_app_with(config, Arc::new(LocalCounterStore::new()))
}

pub fn create_default_app() -> TestApp {
    create_app(test_config())
}
