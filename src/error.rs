use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::domain::entities::FieldError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    success: bool,
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

impl ErrorBody {
    fn new(error: &'static str) -> Self {
        Self {
            success: false,
            error,
            max_size: None,
            max_depth: None,
            details: None,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    error: &'static str,
    retry_after: &'static str,
}

/// Terminal outcomes of the defense pipeline.
///
/// Each variant maps to one fixed JSON shape; none of them ever reaches a route
/// handler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    RateLimitExceeded {
        message: &'static str,
        /// Human window label returned as `retryAfter`.
        window_label: &'static str,
        retry_after_secs: u64,
    },

    #[error("Access denied")]
    AccessDenied,

    #[error("Not allowed by CORS")]
    CorsRejected,

    #[error("Request entity too large")]
    PayloadTooLarge { max_size: String },

    #[error("Malformed request body")]
    MalformedBody,

    #[error("Request payload is too deeply nested")]
    PayloadTooDeep { max_depth: usize },

    #[error("Validation failed")]
    ValidationFailed(Vec<FieldError>),

    #[error("Invalid input detected")]
    SuspiciousInput,

    #[error("Rate limiting temporarily unavailable")]
    StoreUnavailable,

    #[error("Route not found")]
    NotFound,

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::AccessDenied | AppError::CorsRejected => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::MalformedBody
            | AppError::PayloadTooDeep { .. }
            | AppError::ValidationFailed(_)
            | AppError::SuspiciousInput => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match self {
            AppError::RateLimitExceeded {
                message,
                window_label,
                retry_after_secs,
            } => {
                let mut response = (
                    status,
                    Json(RateLimitBody {
                        error: message,
                        retry_after: window_label,
                    }),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                return response;
            }
            AppError::AccessDenied => ErrorBody::new("Access denied"),
            AppError::CorsRejected => ErrorBody::new("Not allowed by CORS"),
            AppError::PayloadTooLarge { max_size } => ErrorBody {
                max_size: Some(max_size),
                ..ErrorBody::new("Request entity too large")
            },
            AppError::MalformedBody => ErrorBody::new("Malformed request body"),
            AppError::PayloadTooDeep { max_depth } => ErrorBody {
                max_depth: Some(max_depth),
                ..ErrorBody::new("Request payload is too deeply nested")
            },
            AppError::ValidationFailed(details) => ErrorBody {
                details: Some(details),
                ..ErrorBody::new("Validation failed")
            },
            AppError::SuspiciousInput => ErrorBody::new("Invalid input detected"),
            AppError::StoreUnavailable => ErrorBody::new("Rate limiting temporarily unavailable"),
            AppError::NotFound => ErrorBody::new("Route not found"),
            AppError::Internal => ErrorBody::new("Internal server error"),
        };

        (status, Json(body)).into_response()
    }
}

/// Formats a byte count the way it is reported to clients (`10MB`, `512KB`).
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * KB;

    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{}B", bytes)
    }
}
