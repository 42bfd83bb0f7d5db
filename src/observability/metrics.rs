//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, breaker state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-service metrics
//!
//! # Metrics
//! - `gateway_requests_total` (counter): dispatched calls by service, outcome
//! - `gateway_request_duration_seconds` (histogram): dispatch latency by service
//! - `gateway_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_breaker_transitions_total` (counter): state changes by service, target state
//! - `gateway_breaker_rejections_total` (counter): calls refused by an open breaker
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed (tests, embedding)
//! - Labels are bounded: unknown services share one label value

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::circuit_breaker::BreakerState;

/// Install the Prometheus recorder and start its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one dispatched call.
pub fn record_dispatch(service: &str, outcome: &'static str, started: Instant) {
    counter!(
        "gateway_requests_total",
        "service" => service.to_owned(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_owned())
        .record(started.elapsed().as_secs_f64());
}

pub fn record_breaker_state(service: &str, state: BreakerState) {
    gauge!("gateway_breaker_state", "service" => service.to_owned()).set(state_value(state));
}

pub fn record_breaker_transition(service: &str, to: BreakerState) {
    counter!(
        "gateway_breaker_transitions_total",
        "service" => service.to_owned(),
        "to" => to.as_str()
    )
    .increment(1);
    record_breaker_state(service, to);
}

pub fn record_breaker_rejection(service: &str) {
    counter!("gateway_breaker_rejections_total", "service" => service.to_owned()).increment(1);
}

fn state_value(state: BreakerState) -> f64 {
    match state {
        BreakerState::Closed => 0.0,
        BreakerState::HalfOpen => 1.0,
        BreakerState::Open => 2.0,
    }
}
