//! Incident persistence trait and query types.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::StoreError;
use super::pagination::Pagination;
use crate::alert::{AlertStatus, Severity};
use crate::incident::Incident;

/// Filter for incident list queries. All criteria are conjunctive; `None`
/// means "don't filter on this".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncidentFilter {
    pub service_name: Option<String>,
    pub status: Option<Vec<AlertStatus>>,
    pub severity: Option<Vec<Severity>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl IncidentFilter {
    pub fn matches(&self, incident: &Incident) -> bool {
        if let Some(service) = &self.service_name {
            if &incident.service_name != service {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&incident.status) {
                return false;
            }
        }
        if let Some(severities) = &self.severity {
            if !severities.contains(&incident.severity) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if incident.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if incident.created_at > until {
                return false;
            }
        }
        true
    }
}

/// Storage contract for incidents.
///
/// `alert_id` carries a uniqueness constraint: `create` must reject a second
/// incident with an already-known alert id. `save` is a full-record replace
/// and persists the incident exactly as given, timestamps included.
#[async_trait]
pub trait IncidentRepository: Send + Sync {
    async fn create(&self, incident: &Incident) -> Result<Incident, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, StoreError>;

    async fn get_by_alert_id(&self, alert_id: &str) -> Result<Option<Incident>, StoreError>;

    /// Most recently created incident with this fingerprint that is not in a
    /// terminal status, if any.
    async fn find_open_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Incident>, StoreError>;

    /// Filtered page, newest first.
    async fn list(
        &self,
        filter: &IncidentFilter,
        pagination: &Pagination,
    ) -> Result<Vec<Incident>, StoreError>;

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, StoreError>;

    async fn save(&self, incident: &Incident) -> Result<Incident, StoreError>;

    /// Case-insensitive substring search over title and description,
    /// newest first.
    async fn search(
        &self,
        query: &str,
        pagination: &Pagination,
    ) -> Result<Vec<Incident>, StoreError>;

    /// The `limit` most recently created incidents.
    async fn recent(&self, limit: usize) -> Result<Vec<Incident>, StoreError>;

    /// All incidents sharing a correlation id, oldest first.
    async fn by_correlation(&self, correlation_id: &str) -> Result<Vec<Incident>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Deletes terminal-status incidents created before `cutoff`. Returns
    /// the number deleted. Non-terminal incidents are never touched.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
