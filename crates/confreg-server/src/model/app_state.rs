use metrics_exporter_prometheus::PrometheusHandle;

use confreg_config::ConfigRegistry;

/// Shared state handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub registry: ConfigRegistry,
    /// Renders `/metrics`; `None` when metrics are disabled
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(registry: ConfigRegistry, metrics_handle: Option<PrometheusHandle>) -> Self {
        Self {
            registry,
            metrics_handle,
        }
    }
}
