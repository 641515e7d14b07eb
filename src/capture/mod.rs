//! Interaction capture subsystem.
//!
//! # Data Flow
//! ```text
//! upstream response bytes
//!     → JSON parse                 (record.rs)
//!     → else event-stream rebuild  (stream.rs)
//!     → else raw text              (record.rs)
//!     → InteractionRecord
//!     → LogSink::emit              (sink.rs, one JSON line per record)
//! ```

pub mod record;
pub mod sink;
pub mod stream;

pub use record::InteractionRecord;
pub use sink::{FileSink, LogSink, MemorySink, SinkError};
