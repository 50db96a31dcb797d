use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter and register all application metrics.
/// With no address configured the recorder is skipped entirely and every
/// metrics macro stays a no-op.
pub fn init_metrics(addr: Option<&str>) {
    let addr = match addr {
        Some(a) => a,
        None => {
            tracing::debug!("metrics exporter disabled, no listen address configured");
            return;
        }
    };

    let socket: SocketAddr = addr
        .parse()
        .expect("metrics address must be host:port");

    PrometheusBuilder::new()
        .with_http_listener(socket)
        .install()
        .expect("failed to install Prometheus exporter");

    tracing::info!(addr = %socket, "prometheus exporter listening");

    // Pre-register counters so they appear even before the first increment.
    counter!("signals_ingested_total").absolute(0);
    counter!("duplicate_drafts_total").absolute(0);
    counter!("activations_total").absolute(0);
    counter!("entry2_activations_total").absolute(0);
    counter!("target_hits_total").absolute(0);
    counter!("expiries_total").absolute(0);
    counter!("price_lookup_failures_total").absolute(0);
    counter!("lease_renewal_failures_total").absolute(0);

    // Pre-register gauges at zero.
    gauge!("active_signals").set(0.0);
    gauge!("is_leader").set(0.0);

    // Histograms are lazily created on first record; force creation.
    histogram!("tick_duration_seconds").record(0.0);
    histogram!("ingest_batch_duration_seconds").record(0.0);
}
