//! Dashboard read endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use validator::Validate;

use crate::dto::{
    status_label, AlertResponse, DashboardMetricsResponse, DashboardSummaryResponse, LimitQuery,
    ServiceStatusResponse,
};
use crate::error::ApiError;
use crate::state::AppState;

/// Creates dashboard routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(dashboard_metrics))
        .route("/summary", get(dashboard_summary))
        .route("/status", get(service_status))
        .route("/alerts/recent", get(recent_alerts))
        .route("/alerts/service/:service", get(alerts_for_service))
}

/// Full dashboard snapshot.
#[utoipa::path(
    get,
    path = "/api/dashboard/metrics",
    responses(
        (status = 200, description = "Dashboard metrics", body = DashboardMetricsResponse)
    ),
    tag = "Dashboard"
)]
async fn dashboard_metrics(
    State(state): State<AppState>,
) -> Json<DashboardMetricsResponse> {
    let snapshot = state.dashboard.snapshot().await;
    Json(snapshot.into())
}

/// Compact summary for landing pages.
#[utoipa::path(
    get,
    path = "/api/dashboard/summary",
    responses(
        (status = 200, description = "Dashboard summary", body = DashboardSummaryResponse)
    ),
    tag = "Dashboard"
)]
async fn dashboard_summary(
    State(state): State<AppState>,
) -> Json<DashboardSummaryResponse> {
    let summary = state.dashboard.summary().await;
    Json(summary.into())
}

/// Per-service health statuses.
#[utoipa::path(
    get,
    path = "/api/dashboard/status",
    responses(
        (status = 200, description = "Service statuses", body = ServiceStatusResponse)
    ),
    tag = "Dashboard"
)]
async fn service_status(State(state): State<AppState>) -> Json<ServiceStatusResponse> {
    let statuses = state.dashboard.service_statuses().await;
    Json(ServiceStatusResponse {
        services: statuses
            .into_iter()
            .map(|(service, status)| (service, status_label(status)))
            .collect(),
        generated_at: Utc::now(),
    })
}

/// Most recent alerts across all services.
#[utoipa::path(
    get,
    path = "/api/dashboard/alerts/recent",
    params(
        ("limit" = Option<usize>, Query, description = "Maximum number of alerts (default 10)")
    ),
    responses(
        (status = 200, description = "Recent alerts", body = Vec<AlertResponse>),
        (status = 422, description = "Invalid query parameters")
    ),
    tag = "Dashboard"
)]
async fn recent_alerts(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    query.validate()?;

    let alerts = state.dashboard.recent(query.limit.unwrap_or(10)).await;
    let data: Vec<AlertResponse> = alerts.into_iter().map(Into::into).collect();

    Ok(Json(data))
}

/// Recent alerts for one service.
#[utoipa::path(
    get,
    path = "/api/dashboard/alerts/service/{service}",
    params(
        ("service" = String, Path, description = "Service name"),
        ("limit" = Option<usize>, Query, description = "Maximum number of alerts (default 10)")
    ),
    responses(
        (status = 200, description = "Alerts for the service", body = Vec<AlertResponse>),
        (status = 422, description = "Invalid query parameters")
    ),
    tag = "Dashboard"
)]
async fn alerts_for_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<AlertResponse>>, ApiError> {
    query.validate()?;

    let alerts = state
        .dashboard
        .alerts_for_service(&service, query.limit.unwrap_or(10))
        .await;
    let data: Vec<AlertResponse> = alerts.into_iter().map(Into::into).collect();

    Ok(Json(data))
}
