//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define breaker and gateway metrics
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service outcomes and transitions
//!
//! # Metrics
//! - `circuit_breaker_requests_total` (counter): calls by service, result (success/failure/rejected)
//! - `circuit_breaker_failures_total` (counter): failed calls by service
//! - `circuit_breaker_state_changes_total` (counter): transitions by service, from, to
//! - `circuit_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `circuit_breaker_request_duration_seconds` (histogram): guarded call latency
//! - `gateway_requests_total` / `gateway_request_duration_seconds`: inbound API traffic
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so tests need no exporter
//! - Histogram buckets tuned for downstream call latencies

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::resilience::BreakerState;

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record the outcome of a permitted guarded call.
pub fn record_call(service: &str, result: &'static str, duration: Duration) {
    ::metrics::counter!(
        "circuit_breaker_requests_total",
        "service" => service.to_string(),
        "result" => result
    )
    .increment(1);

    if result == "failure" {
        ::metrics::counter!("circuit_breaker_failures_total", "service" => service.to_string())
            .increment(1);
    }

    ::metrics::histogram!(
        "circuit_breaker_request_duration_seconds",
        "service" => service.to_string(),
        "result" => result
    )
    .record(duration.as_secs_f64());
}

/// Record a call rejected by an open breaker.
pub fn record_rejected(service: &str) {
    ::metrics::counter!(
        "circuit_breaker_requests_total",
        "service" => service.to_string(),
        "result" => "rejected"
    )
    .increment(1);
}

/// Record a breaker state transition.
pub fn record_state_change(service: &str, from: BreakerState, to: BreakerState) {
    ::metrics::counter!(
        "circuit_breaker_state_changes_total",
        "service" => service.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);

    record_state(service, to);
}

/// Set the current state gauge.
pub fn record_state(service: &str, state: BreakerState) {
    ::metrics::gauge!("circuit_breaker_state", "service" => service.to_string())
        .set(state as u8 as f64);
}

/// Record an inbound gateway request.
pub fn record_request(route: &'static str, status: u16, start: Instant) {
    let labels = [("route", route.to_string()), ("status", status.to_string())];
    ::metrics::counter!("gateway_requests_total", &labels).increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());
}
