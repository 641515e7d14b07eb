//! Interception transport.
//!
//! # Responsibilities
//! - Perform the single network round-trip to the upstream
//! - Buffer the full upstream body and hand the caller an identical copy
//! - Decode the body for the record (JSON, event stream, or text)
//! - Emit exactly one interaction record per successful round-trip
//!
//! # Design Decisions
//! - Transport failures propagate untouched and produce no record
//! - The record is emitted before the response is released to the caller
//! - Nothing after a successful round-trip can fail the client response

use std::sync::{Arc, Once};
use std::time::Duration;

use axum::{
    body::Body,
    http::{HeaderMap, Request, Response},
};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde_json::Value;

use crate::capture::record::{decode_json_or_text, InteractionRecord};
use crate::capture::stream;
use crate::capture::LogSink;
use crate::config::UpstreamConfig;
use crate::error::ProxyError;
use crate::proxy::context::CallContext;

/// Upstream response headers carrying a request id, highest priority first.
pub const CORRELATION_HEADERS: [&str; 3] = [
    "apim-request-id",
    "x-ms-request-id",
    "x-ms-correlation-request-id",
];

/// HTTP(S) client used for the upstream leg.
pub type UpstreamClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Build the pooled HTTP/1.1 + HTTP/2 client with rustls for `https` upstreams.
pub fn build_client(config: &UpstreamConfig) -> UpstreamClient {
    static CRYPTO_PROVIDER: Once = Once::new();
    CRYPTO_PROVIDER.call_once(|| {
        // Fails only if another component already installed one, which is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();
    });

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    if config.connect_timeout_secs > 0 {
        http.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
    }

    let https = HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .enable_http2()
        .wrap_connector(http);

    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .build(https)
}

/// First non-empty correlation header, in priority order.
pub fn correlation_id(headers: &HeaderMap) -> Option<String> {
    CORRELATION_HEADERS.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    })
}

/// Decode captured upstream bytes into the logged response payload.
pub fn decode_response(bytes: &[u8]) -> Value {
    decode_json_or_text(bytes).unwrap_or_else(|text| match text.as_str() {
        Some(body) if stream::is_event_stream(body) => stream::reconstruct(body),
        _ => text,
    })
}

/// Performs the upstream call and records the exchange.
pub struct InterceptTransport {
    client: UpstreamClient,
    sink: Arc<dyn LogSink>,
}

impl InterceptTransport {
    pub fn new(client: UpstreamClient, sink: Arc<dyn LogSink>) -> Self {
        Self { client, sink }
    }

    /// Send `request` upstream, capture the response, and return an
    /// unconsumed response with the same status, headers and bytes.
    pub async fn round_trip(
        &self,
        request: Request<Body>,
        ctx: CallContext,
    ) -> Result<Response<Body>, ProxyError> {
        let response: Response<Incoming> = self.client.request(request).await?;
        let correlation_id = correlation_id(response.headers());

        let (parts, body) = response.into_parts();
        // The client is owed the whole upstream body, so this leg is unbounded.
        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX)
            .await
            .map_err(ProxyError::UpstreamBody)?;
        let duration = ctx.started.elapsed();

        let record = InteractionRecord {
            timestamp: chrono::Utc::now(),
            request_body: ctx.request_body,
            response: decode_response(&bytes),
            duration,
            path: ctx.path,
            method: ctx.method.to_string(),
            correlation_id,
        };
        self.sink.emit(&record).await;

        Ok(Response::from_parts(parts, Body::from(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use serde_json::json;

    #[test]
    fn test_correlation_priority() {
        let mut headers = HeaderMap::new();
        assert_eq!(correlation_id(&headers), None);

        headers.insert("x-ms-correlation-request-id", HeaderValue::from_static("third"));
        assert_eq!(correlation_id(&headers).as_deref(), Some("third"));

        headers.insert("x-ms-request-id", HeaderValue::from_static("second"));
        assert_eq!(correlation_id(&headers).as_deref(), Some("second"));

        headers.insert("apim-request-id", HeaderValue::from_static("first"));
        assert_eq!(correlation_id(&headers).as_deref(), Some("first"));
    }

    #[test]
    fn test_empty_correlation_header_falls_through() {
        let mut headers = HeaderMap::new();
        headers.insert("apim-request-id", HeaderValue::from_static(""));
        headers.insert("x-ms-request-id", HeaderValue::from_static("fallback"));
        assert_eq!(correlation_id(&headers).as_deref(), Some("fallback"));
    }

    #[test]
    fn test_decode_response_variants() {
        assert_eq!(decode_response(br#"{"id":"x"}"#), json!({"id": "x"}));
        assert_eq!(decode_response(b"upstream exploded"), json!("upstream exploded"));

        let streamed = decode_response(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\
              data: [DONE]\n",
        );
        assert_eq!(streamed["choices"][0]["message"]["content"], "Hello");
        assert_eq!(streamed["choices"][0]["message"]["role"], "assistant");
    }
}
