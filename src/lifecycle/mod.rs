//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → open connections drain
//!     → detached exchanges drain (in_flight.rs, bounded wait)
//!     → capture log closed by the owner of the sink
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, close the capture log last
//! - Records still being written when the process dies are lost (at-most-once)

pub mod in_flight;
pub mod shutdown;
pub mod signals;

pub use in_flight::{ExchangeGuard, ExchangeTracker};
pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
