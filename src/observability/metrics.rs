//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_rate_limited_total` (counter): denials by policy
//! - `gateway_rate_windows` (gauge): live windows per policy after a sweep
//! - `gateway_validation_failures_total` (counter): rejections by reason
//! - `gateway_threats_detected_total` (counter): signature hits by kind
//! - `gateway_honeypot_hits_total` (counter): silently dropped submissions
//! - `gateway_deliveries_total` (counter): relay outcomes
//!
//! Without an installed recorder every call is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("gateway_requests_total", &labels).increment(1);
    histogram!("gateway_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(policy: &'static str) {
    counter!("gateway_rate_limited_total", "policy" => policy).increment(1);
}

pub fn record_rate_windows(policy: &'static str, live: usize) {
    gauge!("gateway_rate_windows", "policy" => policy).set(live as f64);
}

pub fn record_validation_failure(reason: &'static str) {
    counter!("gateway_validation_failures_total", "reason" => reason).increment(1);
}

pub fn record_threat(kind: &'static str) {
    counter!("gateway_threats_detected_total", "kind" => kind).increment(1);
}

pub fn record_honeypot_hit() {
    counter!("gateway_honeypot_hits_total").increment(1);
}

pub fn record_delivery(outcome: &'static str) {
    counter!("gateway_deliveries_total", "outcome" => outcome).increment(1);
}
