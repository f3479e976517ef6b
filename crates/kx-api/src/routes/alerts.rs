//! Alert publishing and gate maintenance endpoints.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};

use crate::dto::{
    AlertAcceptedResponse, CacheSweepResponse, CounterResetResponse, GateStatsResponse,
};
use crate::error::ApiError;
use crate::state::AppState;
use kx_observability::alert_span;

/// Creates alert routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/test", post(publish_test_alert))
        .route("/stats", get(gate_stats))
        .route("/maintenance/reset-counts", post(reset_counters))
        .route("/maintenance/clean-cache", post(sweep_suppression))
}

/// Publish a synthetic alert through the full pipeline.
#[utoipa::path(
    post,
    path = "/api/alerts/test",
    responses(
        (status = 202, description = "Test alert accepted", body = AlertAcceptedResponse),
        (status = 500, description = "Publish failed")
    ),
    tag = "Alerts"
)]
async fn publish_test_alert(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<AlertAcceptedResponse>), ApiError> {
    let alert = state.pipeline.publish_test_alert().await?;

    alert_span!(alert.alert_id).in_scope(|| {
        tracing::info!(service_name = %alert.service_name, "test alert accepted");
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(AlertAcceptedResponse {
            status: "accepted".to_string(),
            alert: alert.into(),
        }),
    ))
}

/// Current gate table sizes.
#[utoipa::path(
    get,
    path = "/api/alerts/stats",
    responses(
        (status = 200, description = "Gate statistics", body = GateStatsResponse)
    ),
    tag = "Alerts"
)]
async fn gate_stats(State(state): State<AppState>) -> Result<Json<GateStatsResponse>, ApiError> {
    let stats = state.gate.stats().await?;

    Ok(Json(GateStatsResponse {
        suppression_entries: stats.suppression_entries,
        tracked_services: stats.tracked_services,
        counted_alerts: stats.counted_alerts,
    }))
}

/// Zero the per-service rate counters.
#[utoipa::path(
    post,
    path = "/api/alerts/maintenance/reset-counts",
    responses(
        (status = 200, description = "Counters reset", body = CounterResetResponse)
    ),
    tag = "Alerts"
)]
async fn reset_counters(
    State(state): State<AppState>,
) -> Result<Json<CounterResetResponse>, ApiError> {
    let services_reset = state.gate.reset_counters().await?;

    Ok(Json(CounterResetResponse { services_reset }))
}

/// Drop expired suppression entries.
#[utoipa::path(
    post,
    path = "/api/alerts/maintenance/clean-cache",
    responses(
        (status = 200, description = "Suppression cache swept", body = CacheSweepResponse)
    ),
    tag = "Alerts"
)]
async fn sweep_suppression(
    State(state): State<AppState>,
) -> Result<Json<CacheSweepResponse>, ApiError> {
    let entries_removed = state.gate.sweep_suppression().await?;

    Ok(Json(CacheSweepResponse { entries_removed }))
}
