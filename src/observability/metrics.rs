//! Metrics collection and exposition.
//!
//! # Metrics
//! - `policyd_connections_accepted_total` (counter): clients accepted
//! - `policyd_connections_total` (counter): finished connections by `outcome`
//! - `policyd_active_connections` (gauge): connections currently in flight
//!
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::net::connection::{ConnectionError, ConnectionOutcome};

const ACCEPTED_TOTAL: &str = "policyd_connections_accepted_total";
const FINISHED_TOTAL: &str = "policyd_connections_total";
const ACTIVE: &str = "policyd_active_connections";

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn connection_opened() {
    metrics::counter!(ACCEPTED_TOTAL).increment(1);
    metrics::gauge!(ACTIVE).increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!(ACTIVE).decrement(1.0);
}

pub fn record_outcome(result: &Result<ConnectionOutcome, ConnectionError>) {
    let outcome = match result {
        Ok(outcome) => outcome.as_str(),
        Err(ConnectionError::Read(_)) => "read_failed",
    };
    metrics::counter!(FINISHED_TOTAL, "outcome" => outcome).increment(1);
}
