use std::env;
use std::sync::OnceLock;

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub const SEARCH_REQUESTS_TOTAL: &str = "lbb_search_requests_total";
pub const SEARCH_COMPANIES_TOTAL: &str = "lbb_search_companies_total";
pub const BACKEND_FAILURES_TOTAL: &str = "lbb_backend_failures_total";

/// Starts the Prometheus exporter on `0.0.0.0:<port>`, the port coming from
/// `port_env` or `default_port`. Must run inside a Tokio runtime; the HTTP
/// listener is spawned onto it. Later calls return the first handle.
pub fn init_metrics(port_env: &str, default_port: u16) -> Option<&'static PrometheusHandle> {
    if let Some(existing) = PROMETHEUS_HANDLE.get() {
        return Some(existing);
    }

    let port = env::var(port_env)
        .ok()
        .and_then(|raw| raw.trim().parse::<u16>().ok())
        .unwrap_or(default_port);

    let (recorder, exporter) = match PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .build()
    {
        Ok(parts) => parts,
        Err(err) => {
            warn!(error = %err, metrics_port = port, "failed to build prometheus exporter");
            return None;
        }
    };

    let handle = recorder.handle();
    if let Err(err) = metrics::set_global_recorder(recorder) {
        warn!(error = %err, "a metrics recorder is already installed");
        return None;
    }

    tokio::spawn(async move {
        // `ExporterError` implements neither Debug nor Display in this version.
        if let Err(_err) = exporter.await {
            warn!("prometheus exporter stopped");
        }
    });

    let _ = PROMETHEUS_HANDLE.set(handle);
    info!(metrics_port = port, "started prometheus exporter");
    PROMETHEUS_HANDLE.get()
}

/// Count one served search and the number of companies it matched.
///
/// A no-op until a recorder is installed, so library code can call it freely.
pub fn record_search(endpoint: &'static str, hiring_type: &'static str, companies: usize) {
    counter!(SEARCH_REQUESTS_TOTAL, "endpoint" => endpoint, "hiring_type" => hiring_type)
        .increment(1);
    counter!(SEARCH_COMPANIES_TOTAL, "endpoint" => endpoint, "hiring_type" => hiring_type)
        .increment(companies as u64);
}

/// Count a failed call to the office index or office store.
pub fn record_backend_failure(backend: &'static str) {
    counter!(BACKEND_FAILURES_TOTAL, "backend" => backend).increment(1);
}
