//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

pub fn record_connect() {
    metrics::gauge!("relay_connections_active").increment(1.0);
    metrics::counter!("relay_connections_total").increment(1);
}

pub fn record_disconnect() {
    metrics::gauge!("relay_connections_active").decrement(1.0);
}

/// Record one relayed frame and its fan-out.
pub fn record_relay(delivered: usize, pruned: usize) {
    metrics::counter!("relay_frames_total").increment(1);
    metrics::counter!("relay_deliveries_total").increment(delivered as u64);
    if pruned > 0 {
        metrics::counter!("relay_peers_pruned_total").increment(pruned as u64);
    }
}
