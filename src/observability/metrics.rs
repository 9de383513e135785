//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): proxied requests by method, status, backend
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_backend_alive` (gauge): 1=alive, 0=down, per backend
//! - `gateway_rate_limited_total` (counter): admissions denied
//! - `gateway_forward_retries_total` (counter): failover retries
//! - `gateway_refill_failures_total` (counter): skipped refill steps

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on its own listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_request(method: &str, status: u16, backend: &str, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
        ("backend", backend.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_backend_alive(backend: &str, alive: bool) {
    gauge!("gateway_backend_alive", "backend" => backend.to_string())
        .set(if alive { 1.0 } else { 0.0 });
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_forward_retry() {
    counter!("gateway_forward_retries_total").increment(1);
}

pub fn record_refill_failure() {
    counter!("gateway_refill_failures_total").increment(1);
}
