//! Domain layer: policies, request context, and audit events.
//!
//! Nothing here performs I/O except the audit worker, which only writes to the
//! `tracing` subscriber.

pub mod audit_worker;
pub mod entities;
pub mod request_context;
