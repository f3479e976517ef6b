//! HTTP client for communicating with the Klaxon API.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// API client for a running Klaxon server.
#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Creates a new API client.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Checks if the API server is healthy.
    pub async fn health(&self) -> Result<HealthStatus> {
        self.get("/health").await
    }

    /// Lists incidents with optional filtering.
    pub async fn list_incidents(&self, params: &ListIncidentsParams) -> Result<PaginatedIncidents> {
        let mut url = format!("{}/api/incidents", self.base_url);
        let mut query_parts = Vec::new();

        if let Some(service) = &params.service {
            query_parts.push(format!("service={}", service));
        }
        if let Some(status) = &params.status {
            query_parts.push(format!("status={}", status));
        }
        if let Some(severity) = &params.severity {
            query_parts.push(format!("severity={}", severity));
        }
        if let Some(page) = params.page {
            query_parts.push(format!("page={}", page));
        }
        if let Some(per_page) = params.per_page {
            query_parts.push(format!("per_page={}", per_page));
        }

        if !query_parts.is_empty() {
            url.push('?');
            url.push_str(&query_parts.join("&"));
        }

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    /// Gets a single incident by ID.
    pub async fn get_incident(&self, id: Uuid) -> Result<IncidentDetail> {
        self.get(&format!("/api/incidents/{}", id)).await
    }

    /// Adds a comment to an incident's event log.
    pub async fn add_comment(&self, id: Uuid, request: &CommentBody) -> Result<IncidentDetail> {
        self.post(&format!("/api/incidents/{}/comments", id), request)
            .await
    }

    /// Gets the compact dashboard summary.
    pub async fn dashboard_summary(&self) -> Result<DashboardSummaryData> {
        self.get("/api/dashboard/summary").await
    }

    /// Gets suppression and rate limit table sizes.
    pub async fn gate_stats(&self) -> Result<GateStats> {
        self.get("/api/alerts/stats").await
    }

    /// Publishes a synthetic test alert through the pipeline.
    pub async fn test_alert(&self) -> Result<AlertAccepted> {
        self.post_no_body("/api/alerts/test").await
    }

    // Helper methods

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    async fn post_no_body<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to send request")?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            response
                .json()
                .await
                .context("Failed to parse response body")
        } else {
            let error: ApiErrorResponse =
                response.json().await.unwrap_or_else(|_| ApiErrorResponse {
                    code: "UNKNOWN".to_string(),
                    message: "Unknown error".to_string(),
                    details: None,
                    request_id: None,
                });

            anyhow::bail!("API error ({}): {} - {}", status, error.code, error.message)
        }
    }
}

// Request/Response types (matching server DTOs)

#[derive(Debug, Default)]
pub struct ListIncidentsParams {
    pub service: Option<String>,
    pub status: Option<String>,
    pub severity: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CommentBody {
    pub comment: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub queue: QueueHealth,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueHealth {
    pub connected: bool,
    pub pending_messages: u64,
    pub consumer_count: u32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedIncidents {
    pub data: Vec<IncidentSummary>,
    pub pagination: PaginationInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginationInfo {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentSummary {
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
    pub assigned_to: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentDetail {
    #[serde(flatten)]
    pub incident: IncidentSummary,
    pub description: String,
    pub pod_name: Option<String>,
    pub fingerprint: String,
    pub metadata: serde_json::Value,
    pub events: Vec<IncidentEventEntry>,
    pub metrics: serde_json::Value,
    pub affected_services: Vec<String>,
    pub related_alerts: Vec<String>,
    pub resolution: Option<String>,
    pub root_cause: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IncidentEventEntry {
    pub id: Uuid,
    pub event_type: String,
    pub description: String,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardSummaryData {
    pub total_alerts: u64,
    pub critical_alerts: u64,
    pub system_health_score: f64,
    pub recent_alerts: Vec<AlertData>,
    pub top_services: Vec<ServiceCount>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceCount {
    pub service: String,
    pub count: u64,
}

#[allow(dead_code)]
#[derive(Debug, Serialize, Deserialize)]
pub struct AlertData {
    pub alert_id: String,
    pub correlation_id: String,
    pub service_name: String,
    pub hostname: String,
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

#[derive(Debug, Serialize, Deserialize)]
pub struct GateStats {
    pub suppression_entries: usize,
    pub tracked_services: usize,
    pub counted_alerts: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AlertAccepted {
    pub status: String,
    pub alert: AlertData,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
    pub request_id: Option<String>,
}
