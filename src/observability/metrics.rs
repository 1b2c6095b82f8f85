//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_allocations_total` (counter): allocations by scope, channel, path
//! - `router_queue_timeouts_total` (counter): expired waiters by scope, reason
//! - `router_quarantines_total` (counter): quarantine episodes by scope, channel
//! - `router_inflight` (gauge): in-flight allocations per channel
//! - `router_pending` (gauge): queued allocations per scope
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels are scope and channel id only, both low cardinality

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// How an allocation found its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationPath {
    Sticky,
    Weighted,
}

impl AllocationPath {
    fn as_str(self) -> &'static str {
        match self {
            AllocationPath::Sticky => "sticky",
            AllocationPath::Weighted => "weighted",
        }
    }
}

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus metrics endpoint started");
    Ok(())
}

pub fn record_allocation(scope: &str, channel_id: &str, path: AllocationPath) {
    metrics::counter!(
        "router_allocations_total",
        "scope" => scope.to_string(),
        "channel" => channel_id.to_string(),
        "path" => path.as_str()
    )
    .increment(1);
}

pub fn record_queue_timeout(scope: &str, reason: &'static str) {
    metrics::counter!(
        "router_queue_timeouts_total",
        "scope" => scope.to_string(),
        "reason" => reason
    )
    .increment(1);
}

pub fn record_quarantine(scope: &str, channel_id: &str) {
    metrics::counter!(
        "router_quarantines_total",
        "scope" => scope.to_string(),
        "channel" => channel_id.to_string()
    )
    .increment(1);
}

pub fn set_in_flight(scope: &str, channel_id: &str, count: usize) {
    metrics::gauge!(
        "router_inflight",
        "scope" => scope.to_string(),
        "channel" => channel_id.to_string()
    )
    .set(count as f64);
}

pub fn set_pending(scope: &str, count: usize) {
    metrics::gauge!("router_pending", "scope" => scope.to_string()).set(count as f64);
}
