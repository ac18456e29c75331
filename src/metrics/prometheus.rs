use std::net::SocketAddr;

use ::metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus HTTP exporter on the given port.
/// After this call, any metrics recorded via the `metrics` crate
/// macros (counter!, histogram!) are automatically exported at /metrics.
pub fn init_metrics_server(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)))
        .install()?;
    Ok(())
}

// ── Refresh metrics ──────────────────────────────────────────────

/// `outcome` is one of applied / failed / stale / discarded.
pub fn record_fetch(outcome: &'static str) {
    counter!("dashboard_fetches_total", "outcome" => outcome).increment(1);
}

pub fn record_fetch_latency(latency_ms: f64) {
    histogram!("dashboard_fetch_latency_ms").record(latency_ms);
}

pub fn record_tick_skipped() {
    counter!("dashboard_ticks_skipped_total").increment(1);
}

// ── Ingest metrics ───────────────────────────────────────────────

pub fn record_series_errors(count: usize) {
    if count > 0 {
        counter!("dashboard_series_errors_total").increment(count as u64);
    }
}
