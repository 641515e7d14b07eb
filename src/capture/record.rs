//! The persisted interaction record.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One captured request/response exchange.
///
/// Serialized field names are part of the on-disk format consumed by
/// downstream tooling, so they are fixed here rather than derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    /// When the record was built, after the upstream body was fully read.
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,

    /// Parsed JSON request body, or the raw text when it was not JSON.
    #[serde(rename = "RequestBody")]
    pub request_body: Value,

    /// Parsed JSON, reconstructed event stream, or raw text.
    #[serde(rename = "Response")]
    pub response: Value,

    /// Inbound body read complete → upstream body read complete, in nanoseconds.
    #[serde(rename = "Duration", with = "duration_nanos")]
    pub duration: Duration,

    #[serde(rename = "Path")]
    pub path: String,

    #[serde(rename = "Method")]
    pub method: String,

    /// Upstream request id for cross-referencing its diagnostic logs.
    #[serde(rename = "CorrelationID")]
    pub correlation_id: Option<String>,
}

/// Decode a captured body: JSON when it parses, otherwise its text.
pub fn decode_json_or_text(bytes: &[u8]) -> Result<Value, Value> {
    serde_json::from_slice(bytes).map_err(|_| text_payload(bytes))
}

/// The lossless-as-possible text form of a body that is not JSON.
pub fn text_payload(bytes: &[u8]) -> Value {
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

mod duration_nanos {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
