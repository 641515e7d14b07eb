//! Append-only destinations for interaction records.
//!
//! # Responsibilities
//! - Serialise each record as one newline-terminated JSON object
//! - Append it as a unit, never rewriting earlier entries
//! - Absorb every failure: the request path never sees a logging error
//!
//! # Design Decisions
//! - Appends go through an async mutex so concurrent records never interleave
//! - The line is fully serialised before the lock is taken
//! - Failures are traced and counted so operators can detect record loss

use std::path::{Path, PathBuf};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::capture::record::InteractionRecord;
use crate::observability::metrics;

/// Errors raised while appending records.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to create parent directories: {0}")]
    CreateDir(#[source] std::io::Error),

    #[error("failed to open capture log: {0}")]
    Open(#[source] std::io::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to append record: {0}")]
    Write(#[source] std::io::Error),

    #[error("capture log is closed")]
    Closed,
}

/// Destination for captured exchanges.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Append one record. Never fails from the caller's point of view.
    async fn emit(&self, record: &InteractionRecord);

    /// Flush and release the destination. Safe to call more than once.
    async fn close(&self);
}

/// JSON-lines file opened in append mode.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl FileSink {
    /// Open (or create) `path` for appending, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(SinkError::CreateDir)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(SinkError::Open)?;

        tracing::info!(path = %path.display(), "Capture log opened");

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &InteractionRecord) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        let file = guard.as_mut().ok_or(SinkError::Closed)?;
        file.write_all(&line).await.map_err(SinkError::Write)?;
        // tokio files complete writes in the background; wait for this one.
        file.flush().await.map_err(SinkError::Write)
    }
}

#[async_trait]
impl LogSink for FileSink {
    async fn emit(&self, record: &InteractionRecord) {
        match self.append(record).await {
            Ok(()) => {
                metrics::record_capture_written();
                tracing::info!(
                    "Logged {} {} - {:?}",
                    record.method,
                    record.path,
                    record.duration
                );
            }
            Err(e) => {
                metrics::record_capture_failed();
                tracing::error!(
                    error = %e,
                    path = %self.path.display(),
                    method = %record.method,
                    request_path = %record.path,
                    "Failed to write interaction record"
                );
            }
        }
    }

    async fn close(&self) {
        let Some(mut file) = self.file.lock().await.take() else {
            return;
        };
        if let Err(e) = file.flush().await {
            tracing::error!(error = %e, "Error flushing capture log");
        }
        if let Err(e) = file.sync_all().await {
            tracing::error!(error = %e, "Error syncing capture log");
        }
        tracing::info!(path = %self.path.display(), "Capture log closed");
    }
}

/// Keeps records in memory. Used by tests and embedders that ship records
/// elsewhere themselves.
#[derive(Default)]
pub struct MemorySink {
    records: StdMutex<Vec<InteractionRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record emitted so far, in append order.
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn emit(&self, record: &InteractionRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
            metrics::record_capture_written();
        }
    }

    async fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn record(path: &str) -> InteractionRecord {
        InteractionRecord {
            timestamp: chrono::Utc::now(),
            request_body: json!({"prompt": path}),
            response: json!("ok"),
            duration: Duration::from_millis(5),
            path: path.into(),
            method: "POST".into(),
            correlation_id: Some("abc".into()),
        }
    }

    fn read_lines(path: &Path) -> Vec<InteractionRecord> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/capture.json");

        let sink = FileSink::open(&path).await.unwrap();
        sink.emit(&record("/a")).await;
        sink.emit(&record("/b")).await;
        sink.close().await;

        let records = read_lines(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, "/a");
        assert_eq!(records[1].path, "/b");
        assert_eq!(records[1].correlation_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_reopen_preserves_prior_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");

        let first = FileSink::open(&path).await.unwrap();
        first.emit(&record("/first")).await;
        first.close().await;

        let second = FileSink::open(&path).await.unwrap();
        second.emit(&record("/second")).await;
        second.close().await;

        let paths: Vec<_> = read_lines(&path).into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/first", "/second"]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_emit_after_close_is_absorbed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");

        let sink = FileSink::open(&path).await.unwrap();
        sink.close().await;
        sink.close().await;
        sink.emit(&record("/late")).await;

        assert!(read_lines(&path).is_empty());
        assert!(matches!(sink.append(&record("/late")).await, Err(SinkError::Closed)));
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.json");
        let sink = Arc::new(FileSink::open(&path).await.unwrap());

        let mut tasks = Vec::new();
        for i in 0..32 {
            let sink = sink.clone();
            tasks.push(tokio::spawn(async move {
                let mut r = record(&format!("/{}", i));
                r.response = json!("x".repeat(8 * 1024));
                sink.emit(&r).await;
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        sink.close().await;

        assert_eq!(read_lines(&path).len(), 32);
    }

    #[tokio::test]
    async fn test_open_fails_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let result = FileSink::open(blocker.join("capture.json")).await;
        assert!(matches!(result, Err(SinkError::CreateDir(_))));
    }

    #[tokio::test]
    async fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.emit(&record("/1")).await;
        sink.emit(&record("/2")).await;
        let paths: Vec<_> = sink.records().into_iter().map(|r| r.path).collect();
        assert_eq!(paths, ["/1", "/2"]);
    }
}
