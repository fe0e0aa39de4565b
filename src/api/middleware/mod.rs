//! HTTP middleware for request processing and protection.
//!
//! The defense pipeline is a chain of [`pipeline::Stage`]s assembled by
//! [`shield::Shield`], plus request tracing.

pub mod body_limit;
pub mod cors;
pub mod input;
pub mod ip_filter;
pub mod pipeline;
pub mod rate_limit;
pub mod security_headers;
pub mod shield;
pub mod tracing;

pub use shield::{Shield, ShieldConfig, protect};
