//! Per-request call context.

use std::time::Instant;

use axum::http::Method;
use serde_json::Value;

/// State carried from the gatekeeper to the interception transport.
///
/// Deliberately not `Clone`: each context belongs to exactly one in-flight
/// exchange and is consumed when its record is built.
#[derive(Debug)]
pub struct CallContext {
    /// Parsed inbound body (JSON, or the raw text).
    pub request_body: Value,
    pub path: String,
    pub method: Method,
    /// Taken once the inbound body has been fully read.
    pub started: Instant,
}

impl CallContext {
    pub fn new(request_body: Value, path: impl Into<String>, method: Method) -> Self {
        Self {
            request_body,
            path: path.into(),
            method,
            started: Instant::now(),
        }
    }
}
