use tokio::sync::mpsc;

use crate::domain::entities::{AuditEvent, Severity};

/// Drains the audit channel and writes each event as a structured `tracing` record
/// on the `audit` target.
///
/// Runs until every [`crate::application::services::RequestAuditLog`] handle is dropped.
pub async fn run_audit_worker(mut rx: mpsc::Receiver<AuditEvent>) {
    while let Some(ev) = rx.recv().await {
        let ip = ev
            .client_ip
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "-".to_string());
        let reason = ev.reason.as_deref().unwrap_or("-");
        let duration_ms = u64::try_from(ev.duration.as_millis()).unwrap_or(u64::MAX);
        let timestamp = ev.timestamp.to_rfc3339();

        match ev.severity {
            Severity::Info => tracing::info!(
                target: "audit",
                %timestamp,
                method = %ev.method,
                path = %ev.path,
                ip = %ip,
                status = ev.status,
                duration_ms,
                reason,
                "request completed"
            ),
            Severity::Warn => tracing::warn!(
                target: "audit",
                %timestamp,
                method = %ev.method,
                path = %ev.path,
                ip = %ip,
                status = ev.status,
                duration_ms,
                reason,
                "security event"
            ),
        }
    }

    tracing::debug!("Audit channel closed, worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_worker_exits_when_senders_dropped() {
        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(run_audit_worker(rx));

        tx.send(AuditEvent::completed("GET", "/", None, 200, Duration::ZERO))
            .await
            .unwrap();
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker should stop")
            .unwrap();
    }
}
