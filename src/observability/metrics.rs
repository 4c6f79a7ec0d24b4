//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hostd_requests_total` (counter): requests by route group and status
//! - `hostd_request_duration_seconds` (histogram): latency by route group
//! - `hostd_auth_denied_total` (counter): gate rejections by route name
//! - `hostd_listener_bind_failures_total` (counter): listeners that failed to bind
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - The Prometheus endpoint is optional and bound to its own address

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(group: &'static str, status: u16, start: Instant) {
    metrics::counter!("hostd_requests_total", "group" => group, "status" => status.to_string())
        .increment(1);
    metrics::histogram!("hostd_request_duration_seconds", "group" => group)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_denial(route: &str) {
    metrics::counter!("hostd_auth_denied_total", "route" => route.to_string()).increment(1);
}

pub fn record_bind_failure(kind: &'static str) {
    metrics::counter!("hostd_listener_bind_failures_total", "kind" => kind).increment(1);
}
