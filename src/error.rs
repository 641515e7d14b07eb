//! Request-path error type.
//!
//! Every failure that can end an exchange before the upstream response is
//! handed back maps onto exactly one status code here. Failures after the
//! upstream answered never reach this type; they degrade the captured record
//! instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors surfaced to the client by the proxy itself.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// Pre-shared key missing or wrong.
    #[error("Unauthorized")]
    Unauthorized,

    /// The inbound body could not be read into memory.
    #[error("Error reading request body: {0}")]
    RequestBody(#[source] axum::Error),

    /// DNS, connect, TLS or protocol failure talking to the upstream.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    /// The upstream answered but its body could not be read to the end.
    #[error("error reading upstream response body: {0}")]
    UpstreamBody(#[source] axum::Error),

    /// The rewritten outbound request could not be assembled.
    #[error("invalid outbound request: {0}")]
    InvalidRequest(#[from] axum::http::Error),

    /// The configured upstream endpoint is unusable.
    #[error("invalid upstream endpoint {0:?}: {1}")]
    Endpoint(String, String),

    /// The spawned exchange task panicked or was cancelled.
    #[error("exchange task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::Upstream(_) | ProxyError::UpstreamBody(_) => StatusCode::BAD_GATEWAY,
            ProxyError::RequestBody(_)
            | ProxyError::InvalidRequest(_)
            | ProxyError::Endpoint(..)
            | ProxyError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = match &self {
            ProxyError::Unauthorized => "Unauthorized".to_string(),
            ProxyError::RequestBody(_) => "Error reading request body".to_string(),
            other => other.to_string(),
        };
        (self.status(), body).into_response()
    }
}
