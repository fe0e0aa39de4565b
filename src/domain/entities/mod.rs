//! Core entities of the defense pipeline.
//!
//! - [`LimiterPolicy`] - named fixed-window rate-limit policy
//! - [`AuditEvent`] - security-relevant outcome for the audit log
//! - [`FieldError`] - single validation failure

mod audit_event;
mod field_error;
mod policy;

pub use audit_event::{AuditEvent, Severity};
pub use field_error::FieldError;
pub use policy::{Activation, KeyStrategy, LimiterPolicy, PathScope};
