//! Metrics collection.
//!
//! # Metrics
//! - `interconnect_calls_total` (counter): logical calls by service, method, outcome
//! - `interconnect_call_duration_seconds` (histogram): latency including retries
//! - `interconnect_retries_total` (counter): retry attempts by service
//! - `interconnect_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `interconnect_events_published_total` (counter): by service, event type
//! - `interconnect_handler_failures_total` (counter): by service, event type
//! - `interconnect_event_history_size` (gauge): events retained per dispatcher
//!
//! # Design Decisions
//! - Uses the `metrics` facade; the binary or host process installs a recorder
//! - Without a recorder every call is a no-op

use std::time::Instant;

use crate::resilience::CircuitState;

/// Record a finished logical call.
pub fn record_call(service: &str, method: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "interconnect_calls_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);

    metrics::histogram!(
        "interconnect_call_duration_seconds",
        "service" => service.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(service: &str) {
    metrics::counter!("interconnect_retries_total", "service" => service.to_string()).increment(1);
}

pub fn record_circuit_state(service: &str, state: CircuitState) {
    metrics::gauge!("interconnect_circuit_state", "service" => service.to_string())
        .set(state.as_gauge());
}

pub fn record_event_published(service: &str, event_type: &str) {
    metrics::counter!(
        "interconnect_events_published_total",
        "service" => service.to_string(),
        "event_type" => event_type.to_string()
    )
    .increment(1);
}

pub fn record_handler_failure(service: &str, event_type: &str) {
    metrics::counter!(
        "interconnect_handler_failures_total",
        "service" => service.to_string(),
        "event_type" => event_type.to_string()
    )
    .increment(1);
}

pub fn record_history_size(service: &str, size: usize) {
    metrics::gauge!("interconnect_event_history_size", "service" => service.to_string())
        .set(size as f64);
}
