//! Application state shared across handlers.

use std::sync::Arc;

use kx_core::dashboard::DashboardAggregator;
use kx_core::events::EventBus;
use kx_core::gate::AlertGate;
use kx_core::messaging::MessageQueue;
use kx_core::pipeline::Pipeline;
use kx_core::tracker::IncidentTracker;
use metrics_exporter_prometheus::PrometheusHandle;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The assembled pipeline.
    pub pipeline: Arc<Pipeline>,
    /// Incident tracker for lifecycle queries and updates.
    pub tracker: Arc<IncidentTracker>,
    /// Dashboard aggregator for metrics queries.
    pub dashboard: Arc<DashboardAggregator>,
    /// Alert gate for maintenance operations.
    pub gate: Arc<AlertGate>,
    /// Event bus for component health reporting.
    pub bus: Arc<EventBus>,
    /// Message queue for health reporting.
    pub queue: Arc<dyn MessageQueue>,
    /// Prometheus metrics handle for rendering scrape output.
    pub prometheus_handle: Option<Arc<PrometheusHandle>>,
}

impl AppState {
    /// Creates application state from an assembled pipeline.
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            tracker: pipeline.tracker(),
            dashboard: pipeline.dashboard(),
            gate: pipeline.gate(),
            bus: pipeline.bus(),
            queue: pipeline.queue(),
            pipeline,
            prometheus_handle: None,
        }
    }

    /// Attaches the Prometheus handle.
    pub fn with_prometheus_handle(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus_handle = Some(Arc::new(handle));
        self
    }
}
