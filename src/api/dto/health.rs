//! Health endpoint body.

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: &'static str,
    pub version: &'static str,
    pub checks: HealthChecks,
}

#[derive(Debug, Serialize)]
pub struct HealthChecks {
    pub counter_store: CheckStatus,
    pub audit_queue: CheckStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentState {
    Ok,
    Error,
}

/// State of one dependency of the pipeline.
#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub status: ComponentState,

    /// Counter store implementation (`redis`, `local`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'static str>,

    pub message: String,
}

impl CheckStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ComponentState::Ok,
            backend: None,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ComponentState::Error,
            backend: None,
            message: message.into(),
        }
    }

    pub fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn is_ok(&self) -> bool {
        self.status == ComponentState::Ok
    }
}
