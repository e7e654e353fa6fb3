//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, bytes, connections)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by source, status
//! - `gateway_request_duration_seconds` (histogram): time to finish a transfer
//! - `gateway_bytes_sent_total` (counter): body bytes by source
//! - `gateway_active_connections` (gauge): current connection count
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels stay low-cardinality (no URLs, no file names)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Error installing the Prometheus exporter.
#[derive(Debug, thiserror::Error)]
#[error("failed to install metrics exporter on {address}: {message}")]
pub struct MetricsError {
    pub address: SocketAddr,
    pub message: String,
}

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(address: SocketAddr) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(address)
        .install()
        .map_err(|e| MetricsError {
            address,
            message: e.to_string(),
        })?;

    tracing::info!(address = %address, "Metrics exporter listening");
    Ok(())
}

/// Record a finished request.
pub fn record_request(source: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "source" => source,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "source" => source)
        .record(start.elapsed().as_secs_f64());
}

/// Record body bytes written to a client.
pub fn record_bytes_sent(source: &'static str, bytes: u64) {
    metrics::counter!("gateway_bytes_sent_total", "source" => source).increment(bytes);
}

/// Publish the current number of open client connections.
pub fn record_active_connections(active: u64) {
    metrics::gauge!("gateway_active_connections").set(active as f64);
}
