//! Best-effort, non-blocking audit log handle.

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::entities::AuditEvent;

/// Cheap-to-clone sender side of the audit channel.
///
/// [`record`](Self::record) never waits: when the queue is full or the worker has
/// stopped, the event is dropped and the request carries on.
#[derive(Debug, Clone)]
pub struct RequestAuditLog {
    tx: mpsc::Sender<AuditEvent>,
}

impl RequestAuditLog {
    pub fn new(tx: mpsc::Sender<AuditEvent>) -> Self {
        Self { tx }
    }

    /// Creates a log handle and the receiver for
    /// [`run_audit_worker`](crate::domain::audit_worker::run_audit_worker).
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AuditEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// `true` once the worker has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Free slots left in the queue.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }

    /// Queues `event`; returns `false` if it was dropped.
    pub fn record(&self, event: AuditEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(ev)) => {
                tracing::debug!(path = %ev.path, "Audit queue full, event dropped");
                false
            }
            Err(TrySendError::Closed(ev)) => {
                tracing::debug!(path = %ev.path, "Audit worker stopped, event dropped");
                false
            }
        }
    }
}
