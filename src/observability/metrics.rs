//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_idempotency_total` (counter): guard decisions by outcome
//! - `gateway_idempotency_records` (gauge): entries in the idempotency store
//! - `gateway_body_rejected_total` (counter): raw body rejections by reason
//! - `gateway_webhooks_total` (counter): webhook deliveries by result
//!
//! # Design Decisions
//! - Recording without an installed exporter is a no-op (tests, `--check`)
//! - Prometheus exporter serves its own listener

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record a guard decision (`replayed`, `stored`, `not_stored`, `in_flight_waited`, ...).
pub fn record_idempotency(outcome: &'static str) {
    counter!("gateway_idempotency_total", "outcome" => outcome).increment(1);
}

/// Record the current number of store entries.
pub fn record_store_size(size: usize) {
    gauge!("gateway_idempotency_records").set(size as f64);
}

/// Record a rejected request body.
pub fn record_body_rejected(reason: &'static str) {
    counter!("gateway_body_rejected_total", "reason" => reason).increment(1);
}

/// Record a webhook delivery outcome.
pub fn record_webhook(result: &'static str) {
    counter!("gateway_webhooks_total", "result" => result).increment(1);
}
