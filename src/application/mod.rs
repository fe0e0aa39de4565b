//! Application layer: the defense services the pipeline stages are built from.
//!
//! Services are plain values with no knowledge of HTTP responses; the stages in
//! [`crate::api::middleware`] turn their results into short-circuit responses.
//!
//! # Available Services
//!
//! - [`services::rate_limiter::RateLimiterRegistry`] - Named fixed-window limiters
//! - [`services::bypass::BypassPolicy`] - Trusted-IP bypass
//! - [`services::sanitizer::Sanitizer`] - Recursive markup stripping
//! - [`services::rule_sets::RuleCatalog`] - Field validation rule sets and route bindings
//! - [`services::detectors::DetectorChain`] - SQL-injection and XSS heuristics
//! - [`services::audit_log::RequestAuditLog`] - Non-blocking audit log

pub mod services;
