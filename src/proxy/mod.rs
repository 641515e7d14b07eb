//! Forwarding and interception subsystem.
//!
//! # Data Flow
//! ```text
//! (Request, CallContext) from the gatekeeper
//!     → forwarder.rs (authority + Host rewrite)
//!     → transport.rs (upstream round-trip, response capture)
//!     → capture::LogSink (one record)
//!     → Response back to the gatekeeper, byte-identical
//! ```
//!
//! # Design Decisions
//! - The call context is an explicit parameter, never looked up ambiently
//! - The transport is injected into the forwarder at construction

pub mod context;
pub mod forwarder;
pub mod transport;

pub use context::CallContext;
pub use forwarder::{Forwarder, Upstream};
pub use transport::{build_client, InterceptTransport, UpstreamClient};
