//! HTTP layer: the defense middleware and the few endpoints the service owns.
//!
//! # Modules
//!
//! - [`dto`] - Response bodies
//! - [`handlers`] - Health check and JSON 404 fallback
//! - [`middleware`] - Defense pipeline and tracing
//! - [`routes`] - Route configuration

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod routes;
