//! Metrics endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::dto::DashboardMetricsResponse;
use crate::state::AppState;

/// Creates metrics routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(prometheus_metrics))
        .route("/api/metrics", get(json_metrics))
}

/// Prometheus metrics endpoint.
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus metrics", content_type = "text/plain")
    ),
    tag = "Metrics"
)]
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    match &state.prometheus_handle {
        Some(handle) => {
            let metrics = handle.render();
            (
                StatusCode::OK,
                [(
                    header::CONTENT_TYPE,
                    "text/plain; version=0.0.4; charset=utf-8",
                )],
                metrics,
            )
        }
        None => {
            // Fallback if Prometheus is not initialized
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Prometheus metrics not initialized".to_string(),
            )
        }
    }
}

/// JSON metrics endpoint for dashboards that do not scrape Prometheus.
#[utoipa::path(
    get,
    path = "/api/metrics",
    responses(
        (status = 200, description = "Metrics in JSON format", body = DashboardMetricsResponse)
    ),
    tag = "Metrics"
)]
async fn json_metrics(State(state): State<AppState>) -> Json<DashboardMetricsResponse> {
    let snapshot = state.dashboard.snapshot().await;
    Json(snapshot.into())
}
