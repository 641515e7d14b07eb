//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): requests by method, status
//! - `proxy_request_duration_seconds` (histogram): end-to-end latency by method
//! - `proxy_upstream_errors_total` (counter): exchanges that never got a response
//! - `capture_records_total` (counter): interaction records appended
//! - `capture_write_failures_total` (counter): interaction records lost
//!
//! # Design Decisions
//! - Exposition is optional; without an installed recorder every call is a no-op

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within the tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, address = %addr, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_error() {
    metrics::counter!("proxy_upstream_errors_total").increment(1);
}

pub fn record_capture_written() {
    metrics::counter!("capture_records_total").increment(1);
}

pub fn record_capture_failed() {
    metrics::counter!("capture_write_failures_total").increment(1);
}
