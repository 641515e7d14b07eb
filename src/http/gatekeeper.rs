//! Front-door handling: authentication and body capture.
//!
//! # Responsibilities
//! - Reject requests without the configured pre-shared key
//! - Buffer the inbound body and re-install an identical one
//! - Parse the body for the interaction record
//! - Open the call context for the exchange

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use crate::capture::record::decode_json_or_text;
use crate::error::ProxyError;
use crate::http::server::AppState;
use crate::proxy::CallContext;

/// Header carrying the pre-shared key.
pub const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Whether `request` may pass given the configured key. An empty key
/// disables the check.
pub fn is_authorized<B>(api_key: &str, request: &Request<B>) -> bool {
    if api_key.is_empty() {
        return true;
    }
    request
        .headers()
        .get(X_API_KEY)
        .is_some_and(|v| v.as_bytes() == api_key.as_bytes())
}

/// Middleware enforcing the pre-shared key before any other work happens.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !is_authorized(&state.api_key, &request) {
        tracing::warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request with missing or invalid API key"
        );
        return ProxyError::Unauthorized.into_response();
    }
    next.run(request).await
}

/// Read the full inbound body, returning an equivalent request and the
/// call context for the exchange.
pub async fn capture_request(
    request: Request<Body>,
    max_body_bytes: usize,
) -> Result<(Request<Body>, CallContext), ProxyError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, max_body_bytes)
        .await
        .map_err(ProxyError::RequestBody)?;

    let request_body = parse_request_body(&bytes);
    let ctx = CallContext::new(request_body, decoded_path(parts.uri.path()), parts.method.clone());

    Ok((Request::from_parts(parts, Body::from(bytes)), ctx))
}

/// Percent-decoded form of the path for the record. The forwarded URI keeps
/// its original encoding.
fn decoded_path(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(path) => path.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn parse_request_body(bytes: &[u8]) -> Value {
    decode_json_or_text(bytes).unwrap_or_else(|text| {
        if !bytes.is_empty() {
            tracing::warn!(bytes = bytes.len(), "Could not parse request body as JSON");
        }
        text
    })
}
