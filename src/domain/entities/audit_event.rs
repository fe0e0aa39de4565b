//! Security audit event model.

use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::time::Duration;

/// Severity tag attached to every audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
}

/// A security-relevant outcome observed by the pipeline.
///
/// Events are handed to [`crate::application::services::RequestAuditLog`] and written
/// by [`crate::domain::audit_worker::run_audit_worker`] off the request path.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub client_ip: Option<IpAddr>,
    pub status: u16,
    pub duration: Duration,
    pub severity: Severity,
    pub reason: Option<String>,
}

impl AuditEvent {
    /// Event written when a request leaves the pipeline.
    ///
    /// Any 4xx/5xx outcome is tagged [`Severity::Warn`].
    pub fn completed(
        method: &str,
        path: &str,
        client_ip: Option<IpAddr>,
        status: u16,
        duration: Duration,
    ) -> Self {
        let severity = if status >= 400 {
            Severity::Warn
        } else {
            Severity::Info
        };

        Self {
            timestamp: Utc::now(),
            method: method.to_string(),
            path: path.to_string(),
            client_ip,
            status,
            duration,
            severity,
            reason: None,
        }
    }

    /// Warn-level event for an infrastructure problem that did not stop the request.
    pub fn degraded(method: &str, path: &str, client_ip: Option<IpAddr>, reason: String) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.to_string(),
            path: path.to_string(),
            client_ip,
            status: 0,
            duration: Duration::ZERO,
            severity: Severity::Warn,
            reason: Some(reason),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_severity_from_status() {
        let ok = AuditEvent::completed("GET", "/api/products", None, 200, Duration::from_millis(3));
        assert_eq!(ok.severity, Severity::Info);

        let limited = AuditEvent::completed("POST", "/api/auth/login", None, 429, Duration::ZERO);
        assert_eq!(limited.severity, Severity::Warn);
    }

    #[test]
    fn test_degraded_event() {
        let ip: IpAddr = "203.0.113.9".parse().unwrap();
        let event = AuditEvent::degraded("GET", "/api/search", Some(ip), "store down".into());

        assert_eq!(event.severity, Severity::Warn);
        assert_eq!(event.client_ip, Some(ip));
        assert_eq!(event.reason.as_deref(), Some("store down"));
    }
}
