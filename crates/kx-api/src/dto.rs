//! Data Transfer Objects (DTOs) for API requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use kx_core::alert::Alert;
use kx_core::dashboard::{
    AlertTrends, DashboardMetrics, DashboardSummary, ServiceCount, ServiceStatus, TrendPoint,
};
use kx_core::incident::{Incident, IncidentEvent, IncidentMetrics};
use kx_core::store::PaginatedResult;

// ============================================================================
// Alert DTOs
// ============================================================================

/// An alert as returned by the API.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertResponse {
    pub alert_id: String,
    pub correlation_id: String,
    pub service_name: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    pub severity: String,
    pub status: String,
    pub title: String,
    pub description: String,
    pub anomaly_score: f64,
    pub anomaly_type: String,
    pub fingerprint: String,
    pub tags: Vec<String>,
    pub escalation_level: u8,
    pub created_at: DateTime<Utc>,
}

impl From<Alert> for AlertResponse {
    fn from(alert: Alert) -> Self {
        Self {
            alert_id: alert.alert_id,
            correlation_id: alert.correlation_id,
            service_name: alert.service_name,
            hostname: alert.hostname,
            pod_name: alert.pod_name,
            severity: alert.severity.to_string(),
            status: alert.status.as_str().to_string(),
            title: alert.title,
            description: alert.description,
            anomaly_score: alert.anomaly_score,
            anomaly_type: alert.anomaly_type,
            fingerprint: alert.fingerprint,
            tags: alert.tags,
            escalation_level: alert.escalation_level,
            created_at: alert.created_at,
        }
    }
}

/// Response for a published test alert.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertAcceptedResponse {
    pub status: String,
    pub alert: AlertResponse,
}

// ============================================================================
// Incident DTOs
// ============================================================================

/// Response for a single incident in list views.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentResponse {
    pub id: Uuid,
    pub alert_id: String,
    pub correlation_id: String,
    pub service_name: String,
    pub hostname: String,
    pub severity: String,
    pub status: String,
    pub title: String,
    pub anomaly_score: f64,
    pub anomaly_type: String,
    pub impact_score: u32,
    pub escalation_level: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Detailed incident response including the event log and metrics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentDetailResponse {
    #[serde(flatten)]
    pub incident: IncidentResponse,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    pub fingerprint: String,
    pub metadata: HashMap<String, serde_json::Value>,
    pub events: Vec<IncidentEventResponse>,
    pub metrics: IncidentMetricsResponse,
    pub affected_services: Vec<String>,
    pub related_alerts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Lifecycle event in an incident's log.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentEventResponse {
    pub id: Uuid,
    pub event_type: String,
    pub description: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Derived incident metrics.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentMetricsResponse {
    pub time_to_acknowledge_ms: Option<i64>,
    pub time_to_resolve_ms: Option<i64>,
    pub escalation_count: u32,
    pub notifications_sent: u32,
    pub automated_actions_triggered: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<String>,
}

fn summarize(incident: &Incident) -> IncidentResponse {
    IncidentResponse {
        id: incident.id,
        alert_id: incident.alert_id.clone(),
        correlation_id: incident.correlation_id.clone(),
        service_name: incident.service_name.clone(),
        hostname: incident.hostname.clone(),
        severity: incident.severity.to_string(),
        status: incident.status.as_str().to_string(),
        title: incident.title.clone(),
        anomaly_score: incident.anomaly_score,
        anomaly_type: incident.anomaly_type.clone(),
        impact_score: incident.impact_score,
        escalation_level: incident.escalation_level,
        assigned_to: incident.assigned_to.clone(),
        tags: incident.tags.clone(),
        created_at: incident.created_at,
        updated_at: incident.updated_at,
        resolved_at: incident.resolved_at,
    }
}

impl From<Incident> for IncidentResponse {
    fn from(incident: Incident) -> Self {
        summarize(&incident)
    }
}

impl From<Incident> for IncidentDetailResponse {
    fn from(incident: Incident) -> Self {
        let summary = summarize(&incident);
        Self {
            incident: summary,
            description: incident.description,
            pod_name: incident.pod_name,
            fingerprint: incident.fingerprint,
            metadata: incident.metadata,
            events: incident.events.into_iter().map(Into::into).collect(),
            metrics: incident.metrics.into(),
            affected_services: incident.affected_services,
            related_alerts: incident.related_alerts,
            resolution: incident.resolution,
            root_cause: incident.root_cause,
            expires_at: incident.expires_at,
        }
    }
}

impl From<IncidentEvent> for IncidentEventResponse {
    fn from(event: IncidentEvent) -> Self {
        Self {
            id: event.id,
            event_type: event.event_type.as_str().to_string(),
            description: event.description,
            user_id: event.user_id,
            timestamp: event.timestamp,
        }
    }
}

impl From<IncidentMetrics> for IncidentMetricsResponse {
    fn from(metrics: IncidentMetrics) -> Self {
        Self {
            time_to_acknowledge_ms: metrics.time_to_acknowledge_ms,
            time_to_resolve_ms: metrics.time_to_resolve_ms,
            escalation_count: metrics.escalation_count,
            notifications_sent: metrics.notifications_sent,
            automated_actions_triggered: metrics.automated_actions_triggered,
            business_impact: metrics.business_impact,
        }
    }
}

/// Query parameters for listing incidents.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ListIncidentsQuery {
    /// Filter by service name.
    pub service: Option<String>,
    /// Filter by status (comma-separated).
    pub status: Option<String>,
    /// Filter by severity (comma-separated).
    pub severity: Option<String>,
    /// Filter by created after this timestamp.
    pub since: Option<DateTime<Utc>>,
    /// Filter by created before this timestamp.
    pub until: Option<DateTime<Utc>>,
    /// Page number (1-indexed).
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    /// Items per page.
    #[validate(range(min = 1, max = 200))]
    pub per_page: Option<u32>,
}

/// Query parameters for full-text incident search.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SearchIncidentsQuery {
    /// Text matched against incident titles and descriptions.
    #[validate(length(min = 1, max = 200))]
    pub q: String,
    #[validate(range(min = 1))]
    pub page: Option<u32>,
    #[validate(range(min = 1, max = 200))]
    pub per_page: Option<u32>,
}

/// Query parameter for capped list endpoints.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LimitQuery {
    #[validate(range(min = 1, max = 1000))]
    pub limit: Option<usize>,
}

/// Query parameter for the incident cleanup endpoint.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CleanupQuery {
    /// Remove terminal incidents older than this many days.
    #[validate(range(min = 1))]
    pub days_old: Option<i64>,
}

/// Request to add a comment to an incident.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub comment: String,
    /// Defaults to "anonymous" when omitted.
    pub user_id: Option<String>,
}

/// Response after removing expired incidents.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub incidents_removed: u64,
}

/// Paginated list response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationInfo,
}

/// Pagination metadata.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Converts a store page into a response page.
    pub fn from_result<S>(result: PaginatedResult<S>) -> Self
    where
        T: From<S>,
    {
        Self {
            data: result.items.into_iter().map(T::from).collect(),
            pagination: PaginationInfo {
                page: result.page,
                per_page: result.per_page,
                total_items: result.total,
                total_pages: result.total_pages,
            },
        }
    }
}

// ============================================================================
// Dashboard DTOs
// ============================================================================

/// One per-minute bucket of the alert rate series.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TrendPointDto {
    pub minute: DateTime<Utc>,
    pub count: u64,
}

/// Alert volume over the trailing windows.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AlertTrendsDto {
    pub last_5_minutes: u64,
    pub last_15_minutes: u64,
    pub last_30_minutes: u64,
    pub last_hour: u64,
}

/// Count of alerts attributed to one service.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceCountDto {
    pub service: String,
    pub count: u64,
}

/// Full dashboard snapshot.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardMetricsResponse {
    pub total_alerts: u64,
    pub alerts_by_severity: HashMap<String, u64>,
    pub alerts_by_service: HashMap<String, u64>,
    pub alerts_by_status: HashMap<String, u64>,
    pub alerts_last_5_minutes: u64,
    pub alerts_last_hour: u64,
    pub alerts_last_24_hours: u64,
    pub average_score_by_service: HashMap<String, f64>,
    pub system_health_score: f64,
    pub service_status: HashMap<String, String>,
    pub alerts_per_minute: Vec<TrendPointDto>,
    pub trends: AlertTrendsDto,
    pub top_services: Vec<ServiceCountDto>,
    pub generated_at: DateTime<Utc>,
}

/// Compact dashboard summary.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummaryResponse {
    pub total_alerts: u64,
    pub critical_alerts: u64,
    pub system_health_score: f64,
    pub recent_alerts: Vec<AlertResponse>,
    pub top_services: Vec<ServiceCountDto>,
    pub generated_at: DateTime<Utc>,
}

/// Per-service health statuses.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceStatusResponse {
    pub services: HashMap<String, String>,
    pub generated_at: DateTime<Utc>,
}

pub(crate) fn status_label(status: ServiceStatus) -> String {
    match status {
        ServiceStatus::Healthy => "HEALTHY",
        ServiceStatus::Degraded => "DEGRADED",
        ServiceStatus::Critical => "CRITICAL",
    }
    .to_string()
}

impl From<TrendPoint> for TrendPointDto {
    fn from(point: TrendPoint) -> Self {
        Self {
            minute: point.minute,
            count: point.count,
        }
    }
}

impl From<AlertTrends> for AlertTrendsDto {
    fn from(trends: AlertTrends) -> Self {
        Self {
            last_5_minutes: trends.last_5_minutes,
            last_15_minutes: trends.last_15_minutes,
            last_30_minutes: trends.last_30_minutes,
            last_hour: trends.last_hour,
        }
    }
}

impl From<ServiceCount> for ServiceCountDto {
    fn from(count: ServiceCount) -> Self {
        Self {
            service: count.service,
            count: count.count,
        }
    }
}

impl From<DashboardMetrics> for DashboardMetricsResponse {
    fn from(metrics: DashboardMetrics) -> Self {
        Self {
            total_alerts: metrics.total_alerts,
            alerts_by_severity: metrics.alerts_by_severity,
            alerts_by_service: metrics.alerts_by_service,
            alerts_by_status: metrics.alerts_by_status,
            alerts_last_5_minutes: metrics.alerts_last_5_minutes,
            alerts_last_hour: metrics.alerts_last_hour,
            alerts_last_24_hours: metrics.alerts_last_24_hours,
            average_score_by_service: metrics.average_score_by_service,
            system_health_score: metrics.system_health_score,
            service_status: metrics
                .service_status
                .into_iter()
                .map(|(service, status)| (service, status_label(status)))
                .collect(),
            alerts_per_minute: metrics.alerts_per_minute.into_iter().map(Into::into).collect(),
            trends: metrics.trends.into(),
            top_services: metrics.top_services.into_iter().map(Into::into).collect(),
            generated_at: metrics.generated_at,
        }
    }
}

impl From<DashboardSummary> for DashboardSummaryResponse {
    fn from(summary: DashboardSummary) -> Self {
        Self {
            total_alerts: summary.total_alerts,
            critical_alerts: summary.critical_alerts,
            system_health_score: summary.system_health_score,
            recent_alerts: summary.recent_alerts.into_iter().map(Into::into).collect(),
            top_services: summary.top_services.into_iter().map(Into::into).collect(),
            generated_at: summary.generated_at,
        }
    }
}

// ============================================================================
// Gate and health DTOs
// ============================================================================

/// Gate table sizes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GateStatsResponse {
    pub suppression_entries: usize,
    pub tracked_services: usize,
    pub counted_alerts: u64,
}

/// Response after zeroing the per-service alert counters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CounterResetResponse {
    pub services_reset: usize,
}

/// Response after sweeping stale suppression entries.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CacheSweepResponse {
    pub entries_removed: usize,
}

/// Overall service health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealthInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<ComponentsHealth>,
}

/// Message queue connectivity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueueHealthInfo {
    pub connected: bool,
    pub pending_messages: u64,
    pub consumer_count: u32,
}

/// Per-component health details.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentsHealth {
    pub event_bus: EventBusHealth,
    pub gate: GateHealth,
    pub incidents: IncidentsHealth,
    pub dashboard: DashboardHealth,
}

/// Event bus health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EventBusHealth {
    pub subscriber_count: usize,
    pub dropped_events: u64,
    pub operational: bool,
}

/// Gate table health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GateHealth {
    pub suppression_entries: usize,
    pub tracked_services: usize,
}

/// Incident store health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IncidentsHealth {
    pub open_incidents: u64,
}

/// Dashboard aggregator health.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardHealth {
    pub history_size: usize,
    pub system_health_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kx_core::incident::Incident;
    use kx_core::Severity;

    fn sample_incident() -> Incident {
        let alert = Alert::test_alert();
        Incident::from_alert(&alert, chrono::Duration::days(90))
    }

    #[test]
    fn detail_response_flattens_the_summary() {
        let incident = sample_incident();
        let id = incident.id;
        let detail: IncidentDetailResponse = incident.into();

        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value["id"], serde_json::json!(id));
        assert!(value["events"].is_array());
        assert!(value["metrics"].is_object());
    }

    #[test]
    fn alert_response_uses_display_severity() {
        let mut alert = Alert::test_alert();
        alert.severity = Severity::Critical;
        let response: AlertResponse = alert.into();
        assert_eq!(response.severity, "CRITICAL");
    }

    #[test]
    fn paginated_response_maps_items() {
        let incidents = vec![sample_incident(), sample_incident()];
        let result = PaginatedResult::new(incidents, 2, &kx_core::store::Pagination::default());
        let response: PaginatedResponse<IncidentResponse> =
            PaginatedResponse::from_result(result);
        assert_eq!(response.data.len(), 2);
        assert_eq!(response.pagination.total_items, 2);
        assert_eq!(response.pagination.total_pages, 1);
    }
}
