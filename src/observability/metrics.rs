//! Metrics collection and exposition.
//!
//! # Metrics
//! - `failover_circuit_transitions_total` (counter): state changes by address, target state
//! - `failover_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `failover_retries_total` (counter): retries by target address
//! - `failover_terminal_failures_total` (counter): terminal failures by reason
//! - `failover_unknown_address_total` (counter): outcomes dropped for unknown addresses
//!
//! Recording is a no-op until a recorder is installed.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::circuit::StateKind;

/// Install the Prometheus recorder and its scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_circuit_transition(address: &str, to: StateKind) {
    metrics::counter!(
        "failover_circuit_transitions_total",
        "address" => address.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_circuit_state(address, to);
}

/// Publish the current state gauge, including for circuits that never transition.
pub fn record_circuit_state(address: &str, state: StateKind) {
    metrics::gauge!("failover_circuit_state", "address" => address.to_string()).set(state.gauge_value());
}

pub fn record_retry(address: &str) {
    metrics::counter!("failover_retries_total", "address" => address.to_string()).increment(1);
}

pub fn record_terminal_failure(reason: &'static str) {
    metrics::counter!("failover_terminal_failures_total", "reason" => reason).increment(1);
}

pub fn record_unknown_address() {
    metrics::counter!("failover_unknown_address_total").increment(1);
}
