//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): inbound HTTP requests by method, status, backend
//! - `proxy_request_duration_seconds` (histogram): inbound HTTP latency
//! - `proxy_backend_attempt_failures_total` (counter): failed attempts per backend
//! - `proxy_backend_failure_score` (gauge): current failure score per backend
//! - `proxy_backend_in_flight` (gauge): in-flight attempts per backend
//! - `proxy_websocket_sessions_active` (gauge): open relays
//! - `proxy_websocket_frames_total` (counter): relayed frames by direction

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::load_balancer::BackendSnapshot;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics recorder"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    counter!(
        "proxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "backend" => backend.to_string()
    )
    .increment(1);
    histogram!("proxy_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_attempt_failure(backend: &str) {
    counter!("proxy_backend_attempt_failures_total", "backend" => backend.to_string()).increment(1);
}

pub fn record_backend_counters(snapshot: &[BackendSnapshot]) {
    for backend in snapshot {
        gauge!("proxy_backend_failure_score", "backend" => backend.address.clone())
            .set(f64::from(backend.failure_score));
        gauge!("proxy_backend_in_flight", "backend" => backend.address.clone())
            .set(f64::from(backend.in_flight));
    }
}

pub fn websocket_opened() {
    gauge!("proxy_websocket_sessions_active").increment(1.0);
}

pub fn websocket_closed() {
    gauge!("proxy_websocket_sessions_active").decrement(1.0);
}

/// `direction` is `upstream` (client → backend) or `downstream`.
pub fn record_frame(direction: &'static str) {
    counter!("proxy_websocket_frames_total", "direction" => direction).increment(1);
}
