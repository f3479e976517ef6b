//! Incident query and lifecycle endpoints.

use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use tracing::Instrument;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    CleanupQuery, CleanupResponse, CommentRequest, IncidentDetailResponse, IncidentResponse,
    LimitQuery, ListIncidentsQuery, PaginatedResponse, SearchIncidentsQuery,
};
use crate::error::ApiError;
use crate::state::AppState;
use kx_core::store::{IncidentFilter, Pagination};
use kx_core::{AlertStatus, Severity};
use kx_observability::incident_span;

/// Creates incident routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_incidents))
        .route("/recent", get(recent_incidents))
        .route("/search", get(search_incidents))
        .route("/cleanup", delete(cleanup_incidents))
        .route("/alert/:alert_id", get(get_by_alert_id))
        .route("/related/:correlation_id", get(get_related))
        .route("/:id", get(get_incident))
        .route("/:id/comments", post(add_comment))
}

/// Parses a comma-separated status filter, skipping unknown values.
fn parse_statuses(raw: &str) -> Option<Vec<AlertStatus>> {
    let statuses: Vec<AlertStatus> = raw
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if statuses.is_empty() {
        None
    } else {
        Some(statuses)
    }
}

/// Parses a comma-separated severity filter, skipping unknown values.
fn parse_severities(raw: &str) -> Option<Vec<Severity>> {
    let severities: Vec<Severity> = raw
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();
    if severities.is_empty() {
        None
    } else {
        Some(severities)
    }
}

/// List incidents with filtering and pagination.
#[utoipa::path(
    get,
    path = "/api/incidents",
    params(
        ("service" = Option<String>, Query, description = "Filter by service name"),
        ("status" = Option<String>, Query, description = "Filter by status (comma-separated)"),
        ("severity" = Option<String>, Query, description = "Filter by severity (comma-separated)"),
        ("since" = Option<String>, Query, description = "Filter by created after timestamp"),
        ("until" = Option<String>, Query, description = "Filter by created before timestamp"),
        ("page" = Option<u32>, Query, description = "Page number (1-indexed)"),
        ("per_page" = Option<u32>, Query, description = "Items per page (max 200)")
    ),
    responses(
        (status = 200, description = "List of incidents", body = PaginatedResponse<IncidentResponse>),
        (status = 422, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Incidents"
)]
async fn list_incidents(
    State(state): State<AppState>,
    Query(query): Query<ListIncidentsQuery>,
) -> Result<Json<PaginatedResponse<IncidentResponse>>, ApiError> {
    query.validate()?;

    let filter = IncidentFilter {
        service_name: query.service,
        status: query.status.as_deref().and_then(parse_statuses),
        severity: query.severity.as_deref().and_then(parse_severities),
        since: query.since,
        until: query.until,
    };
    let pagination = Pagination::from_query(query.page, query.per_page);

    let result = state.tracker.list(&filter, &pagination).await?;

    Ok(Json(PaginatedResponse::from_result(result)))
}

/// Most recently created incidents.
#[utoipa::path(
    get,
    path = "/api/incidents/recent",
    params(
        ("limit" = Option<usize>, Query, description = "Maximum number of incidents (default 20)")
    ),
    responses(
        (status = 200, description = "Recent incidents", body = Vec<IncidentResponse>),
        (status = 422, description = "Invalid query parameters")
    ),
    tag = "Incidents"
)]
async fn recent_incidents(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<IncidentResponse>>, ApiError> {
    query.validate()?;

    let incidents = state.tracker.recent(query.limit.unwrap_or(20)).await?;
    let data: Vec<IncidentResponse> = incidents.into_iter().map(Into::into).collect();

    Ok(Json(data))
}

/// Full-text search over incident titles and descriptions.
#[utoipa::path(
    get,
    path = "/api/incidents/search",
    params(
        ("q" = String, Query, description = "Search text"),
        ("page" = Option<u32>, Query, description = "Page number (1-indexed)"),
        ("per_page" = Option<u32>, Query, description = "Items per page (max 200)")
    ),
    responses(
        (status = 200, description = "Matching incidents", body = Vec<IncidentResponse>),
        (status = 422, description = "Invalid query parameters")
    ),
    tag = "Incidents"
)]
async fn search_incidents(
    State(state): State<AppState>,
    Query(query): Query<SearchIncidentsQuery>,
) -> Result<Json<Vec<IncidentResponse>>, ApiError> {
    query.validate()?;

    let pagination = Pagination::from_query(query.page, query.per_page);
    let incidents = state.tracker.search(&query.q, &pagination).await?;
    let data: Vec<IncidentResponse> = incidents.into_iter().map(Into::into).collect();

    Ok(Json(data))
}

/// Get a single incident by ID.
#[utoipa::path(
    get,
    path = "/api/incidents/{id}",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    responses(
        (status = 200, description = "Incident details", body = IncidentDetailResponse),
        (status = 404, description = "Incident not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Incidents"
)]
async fn get_incident(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<IncidentDetailResponse>, ApiError> {
    let incident = state
        .tracker
        .get(id)
        .instrument(incident_span!(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Incident {} not found", id)))?;

    Ok(Json(incident.into()))
}

/// Get the incident that owns an alert.
#[utoipa::path(
    get,
    path = "/api/incidents/alert/{alert_id}",
    params(
        ("alert_id" = String, Path, description = "Alert ID")
    ),
    responses(
        (status = 200, description = "Incident details", body = IncidentDetailResponse),
        (status = 404, description = "No incident for this alert")
    ),
    tag = "Incidents"
)]
async fn get_by_alert_id(
    State(state): State<AppState>,
    Path(alert_id): Path<String>,
) -> Result<Json<IncidentDetailResponse>, ApiError> {
    let incident = state
        .tracker
        .get_by_alert_id(&alert_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No incident for alert {}", alert_id)))?;

    Ok(Json(incident.into()))
}

/// Incidents sharing a correlation ID.
#[utoipa::path(
    get,
    path = "/api/incidents/related/{correlation_id}",
    params(
        ("correlation_id" = String, Path, description = "Correlation ID")
    ),
    responses(
        (status = 200, description = "Related incidents", body = Vec<IncidentResponse>)
    ),
    tag = "Incidents"
)]
async fn get_related(
    State(state): State<AppState>,
    Path(correlation_id): Path<String>,
) -> Result<Json<Vec<IncidentResponse>>, ApiError> {
    let incidents = state.tracker.related(&correlation_id).await?;
    let data: Vec<IncidentResponse> = incidents.into_iter().map(Into::into).collect();

    Ok(Json(data))
}

/// Add a comment to an incident's event log.
#[utoipa::path(
    post,
    path = "/api/incidents/{id}/comments",
    params(
        ("id" = Uuid, Path, description = "Incident ID")
    ),
    request_body = CommentRequest,
    responses(
        (status = 200, description = "Updated incident", body = IncidentDetailResponse),
        (status = 404, description = "Incident not found"),
        (status = 422, description = "Invalid comment")
    ),
    tag = "Incidents"
)]
async fn add_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<IncidentDetailResponse>, ApiError> {
    request.validate()?;

    let user_id = request.user_id.as_deref().unwrap_or("anonymous");
    let incident = state
        .tracker
        .add_comment(id, &request.comment, user_id)
        .instrument(incident_span!(id, user_id = %user_id))
        .await?;

    Ok(Json(incident.into()))
}

/// Remove terminal incidents past the retention window.
#[utoipa::path(
    delete,
    path = "/api/incidents/cleanup",
    params(
        ("days_old" = Option<i64>, Query, description = "Age threshold in days (default: retention config)")
    ),
    responses(
        (status = 200, description = "Cleanup result", body = CleanupResponse),
        (status = 422, description = "Invalid query parameters")
    ),
    tag = "Incidents"
)]
async fn cleanup_incidents(
    State(state): State<AppState>,
    Query(query): Query<CleanupQuery>,
) -> Result<Json<CleanupResponse>, ApiError> {
    query.validate()?;

    let days_old = query
        .days_old
        .unwrap_or(state.tracker.config().retention_days);
    let incidents_removed = state.tracker.expire_old(days_old).await?;

    Ok(Json(CleanupResponse { incidents_removed }))
}
