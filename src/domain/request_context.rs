//! Per-request state threaded through the pipeline stages.
//!
//! A [`RequestContext`] owns the request head and body while the stages run. Each
//! stage consumes the context and returns an [`Outcome`]: either the (possibly
//! updated) context for the next stage, or a terminal response.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, Method, header, request::Parts, uri::InvalidUri},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::net::IpAddr;

use crate::utils::client_ip::resolve_client_ip;
use crate::utils::form::{decode_form, encode_form};

/// Authenticated user id, inserted into request extensions by an upstream auth layer.
///
/// Read by [`crate::domain::entities::KeyStrategy::IpAndUser`].
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub String);

/// Sanitized and validated request input, available to handlers as
/// `Extension<ValidatedInput>`.
#[derive(Debug, Clone)]
pub struct ValidatedInput(pub RequestInput);

/// JSON-shaped view of the untrusted parts of a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestInput {
    pub body: Value,
    pub query: Value,
    pub params: Value,
}

/// How the request body was decoded, and how it is re-encoded for the handler.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Not read yet; forwarded untouched.
    Pending,
    Empty,
    Json,
    Form,
    /// Size-checked but not decoded (e.g. multipart uploads).
    Opaque(Bytes),
}

/// Result of a single pipeline stage.
pub enum Outcome {
    Continue(RequestContext),
    ShortCircuit(Response),
}

pub struct RequestContext {
    parts: Parts,
    body: Body,
    pub payload: Payload,
    pub client_ip: Option<IpAddr>,
    pub user_id: Option<String>,
    pub input: RequestInput,
    /// Validation rule sets bound to this route; empty if none.
    pub rule_sets: &'static [&'static str],
    /// Client is on the suspect list; activates the strict limiter.
    pub suspicious: bool,
    /// Headers added to whatever response the request ends with.
    pub response_headers: HeaderMap,
}

impl RequestContext {
    pub fn new(request: Request, behind_proxy: bool) -> Self {
        let (parts, body) = request.into_parts();

        let client_ip = resolve_client_ip(&parts.headers, &parts.extensions, behind_proxy);
        let user_id = parts
            .extensions
            .get::<AuthenticatedUser>()
            .map(|AuthenticatedUser(id)| id.clone());
        let query = parts
            .uri
            .query()
            .map(|q| decode_form(q.as_bytes()))
            .unwrap_or_else(|| Value::Object(Map::new()));

        Self {
            parts,
            body,
            payload: Payload::Pending,
            client_ip,
            user_id,
            input: RequestInput {
                body: Value::Null,
                query,
                params: Value::Object(Map::new()),
            },
            rule_sets: &[],
            suspicious: false,
            response_headers: HeaderMap::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    pub fn header(&self, name: impl header::AsHeaderName) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header(header::USER_AGENT)
    }

    /// Takes the raw body out of the context, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Replaces the query string of the request URI, keeping the path.
    pub fn replace_query(&mut self, query: &str) -> Result<(), InvalidUri> {
        let path_and_query = if query.is_empty() {
            self.parts.uri.path().to_string()
        } else {
            format!("{}?{}", self.parts.uri.path(), query)
        };

        let mut uri_parts = self.parts.uri.clone().into_parts();
        uri_parts.path_and_query = Some(path_and_query.parse()?);
        // Only the path-and-query component changed, so reassembly cannot fail.
        if let Ok(uri) = axum::http::Uri::from_parts(uri_parts) {
            self.parts.uri = uri;
        }
        Ok(())
    }

    /// Ends the pipeline with `response`, carrying over accumulated headers.
    pub fn respond(self, response: impl IntoResponse) -> Outcome {
        let mut response = response.into_response();
        response.headers_mut().extend(self.response_headers);
        Outcome::ShortCircuit(response)
    }

    /// Rebuilds the request for the route handler.
    ///
    /// Decoded payloads are re-encoded from the sanitized input, and the input itself
    /// is attached as a [`ValidatedInput`] extension. Returns the headers that must be
    /// merged into the handler's response.
    pub fn into_request(self) -> (Request, HeaderMap) {
        let RequestContext {
            mut parts,
            body,
            payload,
            input,
            response_headers,
            ..
        } = self;

        let rewritten = match payload {
            Payload::Pending => None,
            Payload::Empty => Some(Bytes::new()),
            Payload::Json => Some(Bytes::from(
                serde_json::to_vec(&input.body).unwrap_or_default(),
            )),
            Payload::Form => Some(Bytes::from(encode_form(&input.body))),
            Payload::Opaque(bytes) => Some(bytes),
        };

        let body = match rewritten {
            Some(bytes) => {
                parts
                    .headers
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                Body::from(bytes)
            }
            None => body,
        };

        parts.extensions.insert(ValidatedInput(input));

        (Request::from_parts(parts, body), response_headers)
    }
}
