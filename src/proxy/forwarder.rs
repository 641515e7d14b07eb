//! Forwarding engine.
//!
//! # Responsibilities
//! - Rewrite each request's scheme and authority to the single upstream
//! - Keep path, query, method, headers and body intact
//! - Force the outbound `Host` header to the upstream host
//! - Hand the request to the interception transport, exactly once
//!
//! # Design Decisions
//! - No retries, no circuit breaking: one attempt per inbound request
//! - Hop-by-hop headers are connection-scoped and dropped on both legs

use std::net::SocketAddr;
use std::str::FromStr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{
        header::{self, HeaderName},
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderValue, Request, Response, Uri,
    },
};
use url::Url;

use crate::error::ProxyError;
use crate::proxy::context::CallContext;
use crate::proxy::transport::InterceptTransport;

const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// The fixed destination every request is rewritten to.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
    base_path: String,
    base_query: Option<String>,
    host: HeaderValue,
}

impl Upstream {
    /// Parse an absolute `http`/`https` endpoint URL.
    pub fn parse(endpoint: &str) -> Result<Self, ProxyError> {
        let invalid = |reason: String| ProxyError::Endpoint(endpoint.to_string(), reason);

        let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" => Scheme::HTTP,
            "https" => Scheme::HTTPS,
            other => return Err(invalid(format!("unsupported scheme {:?}", other))),
        };
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| invalid("missing host".to_string()))?;
        let authority = match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Ok(Self {
            scheme,
            host: HeaderValue::from_str(&authority).map_err(|e| invalid(e.to_string()))?,
            authority: Authority::from_str(&authority).map_err(|e| invalid(e.to_string()))?,
            base_path: url.path().to_string(),
            base_query: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        })
    }

    /// Place `uri`'s path and query beneath the upstream base URL.
    pub fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, ProxyError> {
        let path = join_path(&self.base_path, uri.path());
        let query = match (self.base_query.as_deref(), uri.query()) {
            (Some(base), Some(q)) if !q.is_empty() => Some(format!("{}&{}", base, q)),
            (Some(base), _) => Some(base.to_string()),
            (None, q) => q.filter(|q| !q.is_empty()).map(str::to_string),
        };
        let path_and_query = match query {
            Some(q) => format!("{}?{}", path, q),
            None => path,
        };

        Ok(Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(PathAndQuery::from_str(&path_and_query).map_err(axum::http::Error::from)?)
            .build()?)
    }
}

/// Join two paths with exactly one slash between them.
fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Remove connection-scoped headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_str(name.trim()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Append the client address to `X-Forwarded-For`.
fn append_forwarded_for(headers: &mut HeaderMap, client: SocketAddr) {
    let ip = client.ip().to_string();
    let prior: Vec<&str> = headers
        .get_all(&X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    let value = if prior.is_empty() {
        ip
    } else {
        format!("{}, {}", prior.join(", "), ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Routes every request to the upstream through the injected transport.
pub struct Forwarder {
    upstream: Upstream,
    transport: InterceptTransport,
}

impl Forwarder {
    pub fn new(upstream: Upstream, transport: InterceptTransport) -> Self {
        Self {
            upstream,
            transport,
        }
    }

    /// Build the outbound request from the inbound one, without touching the
    /// body or method.
    pub fn rewrite(&self, request: Request<Body>) -> Result<Request<Body>, ProxyError> {
        let (mut parts, body) = request.into_parts();
        let client = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let mut headers = std::mem::take(&mut parts.headers);
        strip_hop_by_hop(&mut headers);
        headers.insert(header::HOST, self.upstream.host.clone());
        if let Some(client) = client {
            append_forwarded_for(&mut headers, client);
        }

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(self.upstream.rewrite_uri(&parts.uri)?)
            .body(body)?;
        *outbound.headers_mut() = headers;
        Ok(outbound)
    }

    /// Forward one request. The response comes back with its status and
    /// body untouched.
    pub async fn forward(
        &self,
        request: Request<Body>,
        ctx: CallContext,
    ) -> Result<Response<Body>, ProxyError> {
        let outbound = self.rewrite(request)?;

        tracing::debug!(
            method = %outbound.method(),
            uri = %outbound.uri(),
            "Forwarding to upstream"
        );

        let mut response = self.transport.round_trip(outbound, ctx).await?;
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }
}
