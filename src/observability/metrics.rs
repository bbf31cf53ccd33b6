//! Metrics collection and exposition.
//!
//! # Metrics
//! - `proxy_requests_total` (counter): responses written, by status code
//! - `proxy_blocked_total` (counter): policy redirects, by reason (`url`, `content`)
//! - `proxy_active_connections` (gauge): current client connection count
//! - `proxy_origin_duration_seconds` (histogram): origin connect-to-response time
//!
//! Without an installed exporter every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count a response written to a client.
pub fn record_response(code: &str) {
    metrics::counter!("proxy_requests_total", "code" => code.to_string()).increment(1);
}

/// Count a policy redirect.
pub fn record_blocked(reason: &'static str) {
    metrics::counter!("proxy_blocked_total", "reason" => reason).increment(1);
}

pub fn record_active_connections(active: u64) {
    metrics::gauge!("proxy_active_connections").set(active as f64);
}

/// Record how long an origin exchange took.
pub fn record_origin_duration(start: Instant) {
    metrics::histogram!("proxy_origin_duration_seconds").record(start.elapsed().as_secs_f64());
}
