//! Application state

use metrics_exporter_prometheus::PrometheusHandle;
use pixgate_core::ProxyService;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<ProxyService>,
}

impl AppState {
    pub fn new(resolver: Arc<ProxyService>) -> Self {
        Self { resolver }
    }
}

/// Handle for rendering Prometheus metrics
pub struct MetricsHandle {
    handle: PrometheusHandle,
}

impl MetricsHandle {
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }
}
