use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus exporter and register all application metrics.
/// Returns a `PrometheusHandle` whose `render()` method produces the
/// text/plain Prometheus scrape payload.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    // Pre-register counters so they appear even before the first increment.
    counter!("trade_events_total").absolute(0);
    counter!("whale_entries_total").absolute(0);
    counter!("whale_exits_total").absolute(0);
    counter!("exits_suppressed_total").absolute(0);
    counter!("new_pool_alerts_total").absolute(0);

    // Pre-register gauges at zero.
    gauge!("tracked_whales").set(0.0);
    gauge!("active_exit_watchers").set(0.0);

    Ok(handle)
}
