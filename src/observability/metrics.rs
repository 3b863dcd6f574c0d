//! Metrics collection and exposition.
//!
//! # Metrics
//! - `zbmanager_lifecycle_total` (counter): lifecycle calls by action, outcome
//! - `zbmanager_process_up` (gauge): 1=running, 0=stopped
//! - `zbmanager_config_writes_total` (counter): saved proxy documents
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; the Prometheus exporter is
//!   installed only when enabled in config

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_lifecycle(action: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    metrics::counter!("zbmanager_lifecycle_total", "action" => action, "outcome" => outcome)
        .increment(1);
}

pub fn record_process_up(up: bool) {
    metrics::gauge!("zbmanager_process_up").set(if up { 1.0 } else { 0.0 });
}

pub fn record_config_write() {
    metrics::counter!("zbmanager_config_writes_total").increment(1);
}
