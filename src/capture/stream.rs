//! Event-stream reconstruction.
//!
//! Streaming chat completions arrive as `data: <json>` lines, each carrying a
//! fragment of the generated text. For the capture log only the readable text
//! matters, so the fragments are folded back into a single non-streaming
//! completion. Chunk ids, usage counts and finish reasons are dropped.

use serde_json::{json, Value};

/// Prefix marking an event-stream data line.
pub const DATA_PREFIX: &str = "data: ";

/// Terminal sentinel sent after the last chunk.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Whether `text` contains at least one event-stream data line.
pub fn is_event_stream(text: &str) -> bool {
    text.lines().any(|line| line.starts_with(DATA_PREFIX))
}

/// Fold an event stream into `{"choices":[{"message":{"role":"assistant","content":...}}]}`.
pub fn reconstruct(text: &str) -> Value {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": accumulate_content(text),
            }
        }]
    })
}

/// Concatenate the content fragments of every parseable chunk, in line order.
///
/// Both the `delta` (streaming) and `message` (non-streaming) shapes are read
/// from the first choice; when a chunk carries both, delta comes first.
/// Unparseable chunks and the `[DONE]` sentinel are skipped.
pub fn accumulate_content(text: &str) -> String {
    let mut content = String::new();

    for data in text.lines().filter_map(|line| line.strip_prefix(DATA_PREFIX)) {
        if data == DONE_SENTINEL {
            continue;
        }

        let chunk: Value = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::trace!(error = %e, "Skipping unparseable stream chunk");
                continue;
            }
        };

        let Some(choice) = chunk
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            continue;
        };

        for shape in ["delta", "message"] {
            if let Some(fragment) = choice
                .get(shape)
                .and_then(|part| part.get("content"))
                .and_then(Value::as_str)
            {
                content.push_str(fragment);
            }
        }
    }

    content
}
