mod common;

use axum::http::StatusCode;
use common::{CLIENT_IP, FailingStore, create_app, create_app_with, create_default_app, test_config};
use serde_json::{Value, json};
use std::sync::Arc;
use storefront_shield::api::middleware::ShieldConfig;
use storefront_shield::api::middleware::rate_limit::{HeaderStyle, StoreFailureMode};
use storefront_shield::application::services::IpList;
use storefront_shield::domain::entities::Severity;

fn login_body() -> Value {
    json!({ "email": "shopper@example.in", "password": "hunter2" })
}

#[tokio::test]
async fn test_sixth_login_is_rejected() {
    let app = create_default_app();

    for attempt in 1..=5 {
        let response = app
            .server
            .post("/api/auth/login")
            .add_header("X-Forwarded-For", CLIENT_IP)
            .json(&login_body())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK, "attempt {attempt}");
    }

    let response = app
        .server
        .post("/api/auth/login")
        .add_header("X-Forwarded-For", CLIENT_IP)
        .json(&login_body())
        .await;

    response.assert_status(StatusCode::TOO_MANY_REQUESTS);

    let json = response.json::<Value>();
    assert_eq!(
        json["error"],
        "Too many authentication attempts, please try again later."
    );
    assert_eq!(json["retryAfter"], "15 minutes");

    let retry_after: u64 = response
        .header("retry-after")
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 15 * 60);
    assert_eq!(response.header("ratelimit-remaining"), "0");
}

#[tokio::test]
async fn test_limits_are_per_client() {
    let app = create_default_app();

    for _ in 0..6 {
        app.server
            .post("/api/auth/login")
            .add_header("X-Forwarded-For", CLIENT_IP)
            .json(&login_body())
            .await;
    }

    app.server
        .post("/api/auth/login")
        .add_header("X-Forwarded-For", "203.0.113.99")
        .json(&login_body())
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_allowed_response_reports_budget() {
    let app = create_default_app();

    let response = app
        .server
        .get("/api/products")
        .add_header("X-Forwarded-For", CLIENT_IP)
        .await;

    response.assert_status_ok();
    assert_eq!(response.header("ratelimit-limit"), "100");
    assert_eq!(response.header("ratelimit-remaining"), "99");
    assert!(response.headers().get("x-ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_legacy_header_style() {
    let app = create_app(ShieldConfig {
        header_style: HeaderStyle::Legacy,
        ..test_config()
    });

    let response = app
        .server
        .post("/api/upload")
        .add_header("X-Forwarded-For", CLIENT_IP)
        .await;

    response.assert_status_ok();
    // The most specific matching policy (upload) is reported.
    assert_eq!(response.header("x-ratelimit-limit"), "10");
    assert_eq!(response.header("x-ratelimit-remaining"), "9");
    assert!(response.headers().get("ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_trusted_ip_is_never_limited() {
    let app = create_app(ShieldConfig {
        trusted_ips: IpList::parse("203.0.113.0/24").unwrap(),
        ..test_config()
    });

    // Far past the login limit of 5.
    for _ in 0..1_000 {
        app.server
            .post("/api/auth/login")
            .add_header("X-Forwarded-For", CLIENT_IP)
            .json(&login_body())
            .await
            .assert_status_ok();
    }
}

#[tokio::test]
async fn test_forged_leading_forwarded_entry_is_ignored() {
    let app = create_default_app();
    let forwarded = format!("10.0.0.1, {CLIENT_IP}");

    for attempt in 1..=5 {
        let response = app
            .server
            .post("/api/auth/login")
            .add_header("X-Forwarded-For", forwarded.as_str())
            .json(&login_body())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK, "attempt {attempt}");
    }

    // A private leading entry does not make the client trusted.
    app.server
        .post("/api/auth/login")
        .add_header("X-Forwarded-For", forwarded.as_str())
        .json(&login_body())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_rotating_leading_forwarded_entry_shares_one_counter() {
    let app = create_default_app();

    for attempt in 1..=5 {
        let forwarded = format!("198.18.0.{attempt}, {CLIENT_IP}");
        let response = app
            .server
            .post("/api/auth/login")
            .add_header("X-Forwarded-For", forwarded.as_str())
            .json(&login_body())
            .await;
        assert_eq!(response.status_code(), StatusCode::OK, "attempt {attempt}");
    }

    app.server
        .post("/api/auth/login")
        .add_header("X-Forwarded-For", format!("198.18.0.99, {CLIENT_IP}").as_str())
        .json(&login_body())
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_store_outage_fails_open_with_audit_event() {
    let mut app = create_app_with(test_config(), Arc::new(FailingStore));

    let response = app
        .server
        .get("/api/products")
        .add_header("X-Forwarded-For", CLIENT_IP)
        .await;

    response.assert_status_ok();

    let events = app.audit_events();
    let degraded = events
        .iter()
        .find(|ev| {
            ev.reason
                .as_deref()
                .is_some_and(|r| r.contains("store unavailable"))
        })
        .expect("degraded event");
    assert_eq!(degraded.severity, Severity::Warn);
    assert_eq!(degraded.client_ip, Some(CLIENT_IP.parse().unwrap()));
}

#[tokio::test]
async fn test_store_outage_fails_closed_when_configured() {
    let app = create_app_with(
        ShieldConfig {
            failure_mode: StoreFailureMode::FailClosed,
            ..test_config()
        },
        Arc::new(FailingStore),
    );

    let response = app
        .server
        .get("/api/products")
        .add_header("X-Forwarded-For", CLIENT_IP)
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        response.json::<Value>()["error"],
        "Rate limiting temporarily unavailable"
    );
}

#[tokio::test]
async fn test_health_is_outside_general_limiter() {
    let app = create_default_app();

    let response = app
        .server
        .get("/health")
        .add_header("X-Forwarded-For", CLIENT_IP)
        .await;

    response.assert_status_ok();
    assert!(response.headers().get("ratelimit-limit").is_none());
}
