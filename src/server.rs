//! HTTP server initialization and runtime setup.
//!
//! Handles counter store selection, audit worker spawning, and Axum server lifecycle.

use crate::api::middleware::Shield;
use crate::application::services::RequestAuditLog;
use crate::config::Config;
use crate::domain::audit_worker::run_audit_worker;
use crate::infrastructure::counter::{CounterStore, LocalCounterStore, RedisCounterStore};
use crate::routes::app_router;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::extract::Request;
use axum::{Router, ServiceExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Picks the counter store for this process.
///
/// A configured Redis that cannot be reached is a startup error: silently falling
/// back to local counters would split limits across instances.
pub async fn build_counter_store(config: &Config) -> Result<Arc<dyn CounterStore>> {
    match &config.redis_url {
        Some(redis_url) => {
            let store = RedisCounterStore::connect(redis_url, config.redis_timeout)
                .await
                .context("Failed to connect to Redis counter store")?;
            tracing::info!("Counter store: Redis");
            Ok(Arc::new(store))
        }
        None => {
            let store = Arc::new(LocalCounterStore::new());
            store.clone().spawn_sweeper(SWEEP_INTERVAL);
            tracing::warn!("REDIS_URL not set, rate limits are tracked per instance");
            Ok(store)
        }
    }
}

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - Counter store (Redis or in-memory)
/// - Background audit worker
/// - The shield pipeline around the router, with its suspect-list sweeper
/// - Axum HTTP server with graceful shutdown
///
/// # Errors
///
/// Returns an error if:
/// - Redis is configured but unreachable
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    let store = build_counter_store(&config).await?;

    let (audit, audit_rx) = RequestAuditLog::channel(config.audit_queue_capacity);
    tokio::spawn(run_audit_worker(audit_rx));
    tracing::info!("Audit worker started");

    let shield = Arc::new(Shield::new(
        config.shield_config(),
        store.clone(),
        audit.clone(),
    ));
    shield.suspects().spawn_sweeper(SWEEP_INTERVAL);
    tracing::info!(stages = ?shield.stage_names(), "Shield pipeline ready");

    let state = AppState::new(store, audit);
    let app = app_router(state, shield, Router::new());

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
