//! Logging and Prometheus metrics.

use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Prometheus handle for on-demand scrape output (GET /metrics).
pub type PrometheusHandle = metrics_exporter_prometheus::PrometheusHandle;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` selects the filter (default `info`); `json` switches the
/// output to one JSON object per line. Safe to call more than once.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Install the global metrics recorder and return a handle for rendering.
///
/// No HTTP listener is started; the router renders the handle itself.
///
/// # Errors
/// Returns an error if a recorder is already installed or building fails.
pub fn init_metrics() -> Result<PrometheusHandle, metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Like `init_metrics`, but a second installation is not an error.
#[must_use]
pub fn init_metrics_handle() -> Option<Arc<PrometheusHandle>> {
    init_metrics().ok().map(Arc::new)
}

/// Counts a finished registration email by outcome label.
pub fn record_email_outcome(outcome: &str) {
    metrics::counter!("emails_total", "outcome" => outcome.to_string()).increment(1);
}
