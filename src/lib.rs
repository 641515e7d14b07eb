//! Capture proxy library.
//!
//! A transparent reverse proxy in front of a single AI-service endpoint that
//! records every request/response pair, including reconstructed streaming
//! responses, as JSON lines.

pub mod capture;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;

pub use capture::{FileSink, InteractionRecord, LogSink, MemorySink};
pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
