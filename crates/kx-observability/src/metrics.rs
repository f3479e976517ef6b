//! Metrics registration and Prometheus export for Klaxon.
//!
//! The pipeline crates emit metrics through the `metrics` facade; this
//! module installs the Prometheus recorder and attaches descriptions to
//! every series the pipeline produces.

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Installs the Prometheus recorder and registers all metric
/// descriptions. Returns the handle used to render scrape output.
///
/// # Errors
///
/// Returns an error when a global recorder is already installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(handle)
}

/// Attaches descriptions to every metric the pipeline emits. Safe to call
/// before or without a recorder; descriptions are then dropped silently.
pub fn register_metrics() {
    // Event intake
    describe_counter!(
        "kx_events_consumed_total",
        "Total messages consumed from event topics"
    );
    describe_counter!(
        "kx_events_malformed_total",
        "Total messages dropped because they failed to decode"
    );
    describe_counter!(
        "kx_events_skipped_total",
        "Total scored events skipped because their score sits at or below the alerting floor"
    );
    describe_counter!(
        "kx_events_dead_lettered_total",
        "Total messages republished to a dead-letter topic"
    );
    describe_counter!(
        "kx_scoring_fallbacks_total",
        "Total events scored by the level-based fallback"
    );
    describe_histogram!(
        "kx_event_processing_seconds",
        "Time spent processing one message, by stage"
    );

    // Gate
    describe_counter!(
        "kx_alerts_admitted_total",
        "Total alerts admitted by the gate"
    );
    describe_counter!(
        "kx_alerts_suppressed_total",
        "Total alerts dropped as duplicates inside the suppression window"
    );
    describe_counter!(
        "kx_alerts_rate_limited_total",
        "Total alerts dropped by the per-service quota"
    );
    describe_gauge!(
        "kx_gate_suppression_entries",
        "Fingerprints currently held in the suppression table"
    );
    describe_gauge!(
        "kx_gate_tracked_services",
        "Services with a nonzero alert counter"
    );

    // Output
    describe_counter!(
        "kx_alerts_published_total",
        "Total alerts published to the tiered alert streams"
    );
    describe_counter!(
        "kx_sink_deliveries_total",
        "Total successful sink deliveries, by channel"
    );
    describe_counter!(
        "kx_sink_failures_total",
        "Total failed sink deliveries, by channel"
    );

    // Incidents
    describe_counter!(
        "kx_incidents_created_total",
        "Total incidents created, by severity"
    );
    describe_counter!(
        "kx_incident_events_total",
        "Total incident lifecycle events appended, by type"
    );
    describe_counter!(
        "kx_incidents_expired_total",
        "Total incidents removed by retention sweeps"
    );

    // Dashboard and event bus
    describe_gauge!(
        "kx_dashboard_history_size",
        "Alerts currently held in the dashboard history"
    );
    describe_gauge!(
        "kx_system_health_score",
        "Aggregate system health score, 0 to 100"
    );
    describe_counter!(
        "kx_bus_events_published_total",
        "Total events published on the internal event bus, by type"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_without_recorder_is_a_noop() {
        register_metrics();
        register_metrics();
    }
}
