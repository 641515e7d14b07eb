//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID, API key check)
//! - Bind server to listener
//! - Run each exchange on its own task and map failures to status codes
//! - Wait for detached exchanges before reporting shutdown complete
//! - Observability (metrics, request IDs)

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::capture::LogSink;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::gatekeeper::{capture_request, require_api_key};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::ExchangeTracker;
use crate::observability::metrics;
use crate::proxy::{build_client, Forwarder, InterceptTransport, Upstream};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
    pub api_key: Arc<str>,
    pub max_body_bytes: usize,
    pub exchanges: ExchangeTracker,
}

/// HTTP server for the capture proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    exchanges: ExchangeTracker,
}

impl HttpServer {
    /// Create a new HTTP server that records every exchange into `sink`.
    pub fn new(config: ProxyConfig, sink: Arc<dyn LogSink>) -> Result<Self, ProxyError> {
        let upstream = Upstream::parse(&config.upstream.endpoint)?;
        let client = build_client(&config.upstream);
        let transport = InterceptTransport::new(client, sink);

        let state = AppState {
            forwarder: Arc::new(Forwarder::new(upstream, transport)),
            api_key: Arc::from(config.auth.api_key.as_str()),
            max_body_bytes: config.capture.max_body_bytes,
            exchanges: ExchangeTracker::new(),
        };
        let exchanges = state.exchanges.clone();

        let router = Self::build_router(state);
        Ok(Self {
            router,
            config,
            exchanges,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .layer(middleware::from_fn_with_state(state.clone(), require_api_key))
            .with_state(state)
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests
    /// and any exchange still running without its client.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let Self {
            router,
            config,
            exchanges,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %config.upstream.endpoint,
            "HTTP server starting"
        );
        if config.auth.is_enabled() {
            tracing::info!("API key authentication enabled");
        } else {
            tracing::warn!("API key authentication disabled, proxy is open to all requests");
        }

        let app = router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        let pending = exchanges.active_count();
        if pending > 0 {
            tracing::info!(pending, "Waiting for detached exchanges");
        }
        let drain_timeout = Duration::from_secs(config.listener.drain_timeout_secs);
        if !exchanges.wait_idle(drain_timeout).await {
            tracing::warn!(
                pending = exchanges.active_count(),
                "Drain timeout elapsed, remaining exchanges will not be recorded"
            );
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Captures the body, then forwards and records the exchange.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        "Proxying request"
    );

    let result: Result<Response, ProxyError> = async {
        let (request, ctx) = capture_request(request, state.max_body_bytes).await?;

        // The exchange owns its task: a client hanging up must not cancel
        // the upstream call or lose its record.
        let forwarder = state.forwarder.clone();
        let guard = state.exchanges.track();
        tokio::spawn(
            async move {
                let response = forwarder.forward(request, ctx).await;
                drop(guard);
                response
            }
            .instrument(tracing::Span::current()),
        )
        .await?
    }
    .await;

    match result {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response
        }
        Err(e) => {
            let status = e.status();
            if status == StatusCode::BAD_GATEWAY {
                metrics::record_upstream_error();
            }
            metrics::record_request(&method, status.as_u16(), start_time);
            tracing::error!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = status.as_u16(),
                error = %e,
                "Proxy error"
            );
            e.into_response()
        }
    }
}
