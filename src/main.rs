//! Capture proxy.
//!
//! A transparent reverse proxy built with Tokio and Axum that logs every
//! exchange with an AI-service endpoint.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                    CAPTURE PROXY                     │
//!                        │                                                      │
//!   Client Request       │  ┌────────────┐    ┌────────────┐    ┌────────────┐  │
//!   ─────────────────────┼─▶│   http     │───▶│ gatekeeper │───▶│ forwarder  │  │
//!                        │  │  server    │    │ auth+body  │    │ host swap  │  │
//!                        │  └────────────┘    └────────────┘    └─────┬──────┘  │
//!                        │                                            │         │
//!                        │                                            ▼         │
//!   Client Response      │                   ┌────────────┐    ┌────────────┐  │
//!   ◀────────────────────┼───────────────────│  capture   │◀───│ intercept  │◀─┼── Upstream
//!                        │                   │ sink JSONL │    │ transport  │  │
//!                        │                   └────────────┘    └────────────┘  │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use capture_proxy::capture::{FileSink, LogSink};
use capture_proxy::config::{resolve_config, ConfigOverrides};
use capture_proxy::lifecycle::{wait_for_signal, Shutdown};
use capture_proxy::observability::{logging, metrics};
use capture_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "capture-proxy")]
#[command(about = "Transparent reverse proxy that logs AI-service requests and responses", long_about = None)]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream endpoint URL.
    #[arg(long, env = "AZURE_OPENAI_ENDPOINT")]
    upstream: Option<String>,

    /// Listen address, e.g. `:8080` or `127.0.0.1:8080`.
    #[arg(long, env = "LISTEN_ADDR")]
    listen: Option<String>,

    /// Interaction log destination.
    #[arg(long, env = "LOG_FILE_PATH")]
    log_file: Option<PathBuf>,

    /// Pre-shared key clients must send in `X-API-Key`.
    #[arg(long, env = "PROXY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            upstream_endpoint: self.upstream.clone(),
            bind_address: self.listen.clone(),
            log_file_path: self.log_file.as_ref().map(|p| p.display().to_string()),
            api_key: self.api_key.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref(), &cli.overrides())?;

    logging::init_tracing(&config.observability);
    tracing::info!("capture-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.endpoint,
        log_file = %config.capture.log_file_path,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let sink = Arc::new(FileSink::open(&config.capture.log_file_path).await?);
    tracing::info!(
        path = %sink.path().display(),
        "Logging requests and responses"
    );

    let listener = TcpListener::bind(config.listener.socket_addr()?).await?;
    let server = HttpServer::new(config, sink.clone())?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    let result = server.run(listener, server_shutdown).await;
    sink.close().await;
    result?;

    tracing::info!("Shutdown complete");
    Ok(())
}
