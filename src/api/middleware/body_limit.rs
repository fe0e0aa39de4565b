//! Request body size ceiling and decoding.

use async_trait::async_trait;
use axum::body::to_bytes;
use axum::http::header;
use http_body_util::LengthLimitError;
use serde_json::Value;

use super::pipeline::{Stage, reject};
use crate::domain::request_context::{Outcome, Payload, RequestContext};
use crate::error::{AppError, format_size};
use crate::utils::form::decode_form;

/// Default body ceiling: 10 MB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// How a body is decoded, from its `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind(content_type: Option<&str>) -> BodyKind {
    let Some(content_type) = content_type else {
        return BodyKind::Other;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if mime == "application/json" || mime.ends_with("+json") {
        BodyKind::Json
    } else if mime == "application/x-www-form-urlencoded" {
        BodyKind::Form
    } else {
        BodyKind::Other
    }
}

/// Buffers the body up to `max_bytes` and decodes JSON and form payloads.
///
/// Oversized bodies are rejected with 413 either from `Content-Length` up front or
/// while streaming. Other content types are only size-checked.
pub struct BodyLimitStage {
    max_bytes: usize,
}

impl BodyLimitStage {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    fn too_large(&self, ctx: RequestContext) -> Outcome {
        tracing::warn!(
            ip = ?ctx.client_ip,
            path = ctx.path(),
            limit = self.max_bytes,
            "Request body too large"
        );
        let error = AppError::PayloadTooLarge {
            max_size: format_size(self.max_bytes),
        };
        reject(ctx, error, "payload too large")
    }
}

#[async_trait]
impl Stage for BodyLimitStage {
    fn name(&self) -> &'static str {
        "body_limit"
    }

    async fn run(&self, mut ctx: RequestContext) -> Outcome {
        let declared = ctx
            .header(header::CONTENT_LENGTH)
            .and_then(|v| v.parse::<u64>().ok());
        if declared.is_some_and(|len| len > self.max_bytes as u64) {
            return self.too_large(ctx);
        }

        let bytes = match to_bytes(ctx.take_body(), self.max_bytes).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.into_inner().is::<LengthLimitError>() {
                    return self.too_large(ctx);
                }
                tracing::debug!(path = ctx.path(), "Failed to read request body");
                return reject(ctx, AppError::MalformedBody, "unreadable body");
            }
        };

        if bytes.is_empty() {
            ctx.payload = Payload::Empty;
            return Outcome::Continue(ctx);
        }

        match body_kind(ctx.header(header::CONTENT_TYPE)) {
            BodyKind::Json => match serde_json::from_slice::<Value>(&bytes) {
                Ok(body) => {
                    ctx.input.body = body;
                    ctx.payload = Payload::Json;
                }
                Err(e) => {
                    tracing::debug!(error = %e, path = ctx.path(), "Malformed JSON body");
                    return reject(ctx, AppError::MalformedBody, "malformed json");
                }
            },
            BodyKind::Form => {
                ctx.input.body = decode_form(&bytes);
                ctx.payload = Payload::Form;
            }
            BodyKind::Other => ctx.payload = Payload::Opaque(bytes),
        }

        Outcome::Continue(ctx)
    }
}
