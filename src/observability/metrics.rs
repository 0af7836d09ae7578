//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define panel metrics (connections, requests, render latency, bytes out)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `panel_connections_total` (counter): accept outcomes by `outcome`
//! - `panel_active_connections` (gauge): live connection table size
//! - `panel_requests_total` (counter): dispatched requests by `route`
//! - `panel_request_render_seconds` (histogram): handler + render time
//! - `panel_response_bytes_total` (counter): body bytes handed to the transport
//! - `panel_connection_closes_total` (counter): teardowns by `reason`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no recorder installed
//!   every call is a no-op, so the engine records unconditionally
//! - Label values are static strings to avoid per-request allocation

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_connection_accepted(active: usize) {
    ::metrics::counter!("panel_connections_total", "outcome" => "accepted").increment(1);
    ::metrics::gauge!("panel_active_connections").set(active as f64);
}

pub fn record_connection_rejected() {
    ::metrics::counter!("panel_connections_total", "outcome" => "rejected").increment(1);
}

pub fn record_connection_closed(reason: &'static str, active: usize) {
    ::metrics::counter!("panel_connection_closes_total", "reason" => reason).increment(1);
    ::metrics::gauge!("panel_active_connections").set(active as f64);
}

/// Record one dispatched request, timed from `start_time`.
pub fn record_request(route: &'static str, start_time: Instant) {
    ::metrics::counter!("panel_requests_total", "route" => route).increment(1);
    ::metrics::histogram!("panel_request_render_seconds").record(start_time.elapsed().as_secs_f64());
}

pub fn record_response_bytes(bytes: usize) {
    ::metrics::counter!("panel_response_bytes_total").increment(bytes as u64);
}
