//! # Storefront Shield
//!
//! Request-defense pipeline for a retail storefront API built with Axum.
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Limiter policies, audit events, request context
//! - **Application Layer** ([`application`]) - Rate limiting, sanitization, detection,
//!   validation and the audit log
//! - **Infrastructure Layer** ([`infrastructure`]) - Counter stores (Redis, in-memory)
//! - **API Layer** ([`api`]) - The shield middleware, health endpoints and error bodies
//!
//! ## Features
//!
//! - Fixed-window rate limits per route class, shared across instances through Redis
//! - IP allow/block lists and scanner user-agent blocking
//! - Security headers and CORS origin checks
//! - Body size and nesting limits
//! - Input sanitization, SQL injection and XSS detection, declarative validation
//! - Non-blocking structured audit log
//!
//! ## Quick Start
//!
//! ```bash
//! export REDIS_URL="redis://localhost:6379"  # Optional
//! export ALLOWED_ORIGINS="http://localhost:5173"
//!
//! cargo run
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::api::middleware::{Shield, ShieldConfig, protect};
    pub use crate::application::services::{RequestAuditLog, RuleCatalog};
    pub use crate::domain::entities::{AuditEvent, FieldError, LimiterPolicy};
    pub use crate::domain::request_context::{AuthenticatedUser, ValidatedInput};
    pub use crate::error::AppError;
    pub use crate::infrastructure::counter::{CounterStore, LocalCounterStore};
    pub use crate::routes::app_router;
    pub use crate::state::AppState;
}
