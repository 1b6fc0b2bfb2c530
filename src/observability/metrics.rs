//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_rejections_total` (counter): rejections by guard, status
//! - `guard_rate_limit_buckets` (gauge): live rate limit buckets
//! - `guard_envelope_total` (counter): envelope operations by direction, outcome
//! - `guard_tokens_issued_total` (counter): identity tokens issued
//!
//! Recording is a no-op until [`init_metrics`] installs the recorder.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Start the Prometheus scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_rejection(guard: &'static str, status: u16) {
    counter!("guard_rejections_total", "guard" => guard, "status" => status.to_string())
        .increment(1);
}

pub fn record_token_issued() {
    counter!("guard_tokens_issued_total").increment(1);
}

pub fn record_bucket_count(count: usize) {
    gauge!("guard_rate_limit_buckets").set(count as f64);
}

pub fn record_envelope(direction: &'static str, outcome: &'static str) {
    counter!("guard_envelope_total", "direction" => direction, "outcome" => outcome).increment(1);
}
