//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, trace span)
//!     → gatekeeper.rs (API key check, body capture, call context)
//!     → proxy::Forwarder (upstream rewrite + interception)
//!     → Send upstream response to client
//! ```

pub mod gatekeeper;
pub mod request;
pub mod server;

pub use gatekeeper::X_API_KEY;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
