//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define dispatch metrics (requests, latency, RPC errors)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `switchyard_requests_total` (counter): requests by verb, status, target kind
//! - `switchyard_request_duration_seconds` (histogram): latency by verb, target kind
//! - `switchyard_rpc_errors_total` (counter): JSON-RPC error envelopes by code
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels stay low-cardinality: no paths or route names

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "switchyard_requests_total";
pub const REQUEST_DURATION: &str = "switchyard_request_duration_seconds";
pub const RPC_ERRORS_TOTAL: &str = "switchyard_rpc_errors_total";

/// Start the Prometheus exporter on `addr`. Requires a running Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint started");
    Ok(())
}

/// Record one finished request.
pub fn record_request(verb: &str, status: u16, kind: &'static str, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "verb" => verb.to_string(),
        "status" => status.to_string(),
        "kind" => kind
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION,
        "verb" => verb.to_string(),
        "kind" => kind
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rpc_error(code: i64) {
    metrics::counter!(RPC_ERRORS_TOTAL, "code" => code.to_string()).increment(1);
}
