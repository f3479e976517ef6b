//! Incident upsert and lifecycle logic.
//!
//! The tracker is the only writer of incident records. Alerts arrive
//! at-least-once, so `upsert` is idempotent: re-delivering an identical
//! alert neither grows the event log nor touches `updated_at`.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::alert::{Alert, AlertStatus};
use crate::incident::{Incident, IncidentEvent, IncidentEventType};
use crate::store::{IncidentFilter, IncidentRepository, PaginatedResult, Pagination, StoreError};

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("Incident not found: {0}")]
    NotFound(String),

    #[error("Incident store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for TrackerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => {
                TrackerError::NotFound(format!("{} {}", entity, id))
            }
            other => TrackerError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Days an incident is kept once it reaches a terminal status.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// How often the retention sweep runs.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_retention_days() -> i64 {
    90
}

fn default_cleanup_interval_secs() -> u64 {
    86_400
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// What `upsert` did with an alert.
#[derive(Debug, Clone)]
pub enum UpsertOutcome {
    /// First alert for this identity; a new incident was opened.
    Created(Incident),
    /// An existing incident changed; the listed event types were appended.
    Updated {
        incident: Incident,
        events: Vec<IncidentEventType>,
    },
    /// Identical re-delivery; nothing was written.
    Unchanged(Incident),
}

impl UpsertOutcome {
    pub fn incident(&self) -> &Incident {
        match self {
            UpsertOutcome::Created(incident) => incident,
            UpsertOutcome::Updated { incident, .. } => incident,
            UpsertOutcome::Unchanged(incident) => incident,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, UpsertOutcome::Created(_))
    }
}

/// Creates and mutates incidents from the alert stream, and serves incident
/// queries for the API.
pub struct IncidentTracker {
    repo: Arc<dyn IncidentRepository>,
    config: TrackerConfig,
}

impl IncidentTracker {
    pub fn new(config: TrackerConfig, repo: Arc<dyn IncidentRepository>) -> Self {
        Self { repo, config }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Creates or updates the incident an alert belongs to.
    ///
    /// Identity resolution: the alert id first, then the most recent open
    /// incident with the same fingerprint (a re-fired alert after the
    /// suppression window carries a fresh alert id but belongs to the
    /// incident already open for its shape). Only when both lookups miss is
    /// a new incident opened.
    #[instrument(skip(self, alert), fields(alert_id = %alert.alert_id, service = %alert.service_name))]
    pub async fn upsert(&self, alert: &Alert) -> Result<UpsertOutcome, TrackerError> {
        let existing = match self.repo.get_by_alert_id(&alert.alert_id).await? {
            Some(incident) => Some(incident),
            None => self.repo.find_open_by_fingerprint(&alert.fingerprint).await?,
        };

        let Some(mut incident) = existing else {
            let retention = Duration::days(self.config.retention_days);
            let incident = Incident::from_alert(alert, retention);
            let created = self.repo.create(&incident).await?;
            info!(
                incident_id = %created.id,
                alert_id = %created.alert_id,
                service = %created.service_name,
                severity = %created.severity,
                impact_score = created.impact_score,
                "incident created"
            );
            metrics::counter!(
                "kx_incidents_created_total",
                "severity" => created.severity.as_str()
            )
            .increment(1);
            return Ok(UpsertOutcome::Created(created));
        };

        let now = Utc::now();
        let mut fired: Vec<IncidentEventType> = Vec::new();

        if incident.alert_id != alert.alert_id
            && !incident.related_alerts.contains(&alert.alert_id)
        {
            incident.related_alerts.push(alert.alert_id.clone());
        }

        if incident.status != alert.status {
            let event_type = IncidentEventType::from_status(alert.status);
            incident.events.push(IncidentEvent::new(
                event_type,
                format!("Status changed from {} to {}", incident.status, alert.status),
                "system",
            ));
            if alert.status == AlertStatus::Acknowledged
                && incident.metrics.time_to_acknowledge_ms.is_none()
            {
                incident.metrics.time_to_acknowledge_ms =
                    Some((now - incident.created_at).num_milliseconds());
            }
            if alert.status == AlertStatus::Resolved && incident.resolved_at.is_none() {
                incident.resolved_at = Some(now);
                incident.metrics.time_to_resolve_ms =
                    Some((now - incident.created_at).num_milliseconds());
            }
            incident.status = alert.status;
            fired.push(event_type);
        }

        if incident.severity != alert.severity {
            incident.events.push(IncidentEvent::new(
                IncidentEventType::Escalated,
                format!(
                    "Severity changed from {} to {}",
                    incident.severity, alert.severity
                ),
                "system",
            ));
            incident.severity = alert.severity;
            incident.metrics.escalation_count += 1;
            fired.push(IncidentEventType::Escalated);
        }

        if let Some(assignee) = &alert.assigned_to {
            if incident.assigned_to.as_deref() != Some(assignee.as_str()) {
                incident.events.push(IncidentEvent::new(
                    IncidentEventType::Assigned,
                    format!("Assigned to {}", assignee),
                    "system",
                ));
                incident.assigned_to = Some(assignee.clone());
                fired.push(IncidentEventType::Assigned);
            }
        }

        if fired.is_empty() {
            debug!(
                incident_id = %incident.id,
                alert_id = %alert.alert_id,
                "alert matched incident with no changes"
            );
            return Ok(UpsertOutcome::Unchanged(incident));
        }

        incident.updated_at = now;
        let saved = self.repo.save(&incident).await?;
        for event_type in &fired {
            metrics::counter!(
                "kx_incident_events_total",
                "event_type" => event_type.as_str()
            )
            .increment(1);
        }
        debug!(
            incident_id = %saved.id,
            events = ?fired,
            "incident updated"
        );
        Ok(UpsertOutcome::Updated {
            incident: saved,
            events: fired,
        })
    }

    /// Appends a COMMENTED event. `NotFound` when the incident is unknown.
    #[instrument(skip(self, comment), fields(incident_id = %incident_id))]
    pub async fn add_comment(
        &self,
        incident_id: Uuid,
        comment: &str,
        user_id: &str,
    ) -> Result<Incident, TrackerError> {
        let mut incident = self
            .repo
            .get(incident_id)
            .await?
            .ok_or_else(|| TrackerError::NotFound(format!("Incident {}", incident_id)))?;

        incident.events.push(IncidentEvent::new(
            IncidentEventType::Commented,
            comment,
            user_id,
        ));
        incident.updated_at = Utc::now();
        let saved = self.repo.save(&incident).await?;
        metrics::counter!(
            "kx_incident_events_total",
            "event_type" => IncidentEventType::Commented.as_str()
        )
        .increment(1);
        Ok(saved)
    }

    /// Deletes terminal incidents older than `max_age_days`. Returns how
    /// many were removed.
    #[instrument(skip(self))]
    pub async fn expire_old(&self, max_age_days: i64) -> Result<u64, TrackerError> {
        let cutoff = Utc::now() - Duration::days(max_age_days);
        let deleted = self.repo.delete_expired(cutoff).await?;
        if deleted > 0 {
            info!(deleted, max_age_days, "expired old incidents");
            metrics::counter!("kx_incidents_expired_total").increment(deleted);
        }
        Ok(deleted)
    }

    /// Retention sweep with the configured age.
    pub async fn run_retention_sweep(&self) -> Result<u64, TrackerError> {
        self.expire_old(self.config.retention_days).await
    }

    // ----- Query facade for the API -----

    pub async fn get(&self, id: Uuid) -> Result<Option<Incident>, TrackerError> {
        Ok(self.repo.get(id).await?)
    }

    pub async fn get_by_alert_id(&self, alert_id: &str) -> Result<Option<Incident>, TrackerError> {
        Ok(self.repo.get_by_alert_id(alert_id).await?)
    }

    pub async fn list(
        &self,
        filter: &IncidentFilter,
        pagination: &Pagination,
    ) -> Result<PaginatedResult<Incident>, TrackerError> {
        let items = self.repo.list(filter, pagination).await?;
        let total = self.repo.count(filter).await?;
        Ok(PaginatedResult::new(items, total, pagination))
    }

    pub async fn search(
        &self,
        query: &str,
        pagination: &Pagination,
    ) -> Result<Vec<Incident>, TrackerError> {
        Ok(self.repo.search(query, pagination).await?)
    }

    pub async fn recent(&self, limit: usize) -> Result<Vec<Incident>, TrackerError> {
        Ok(self.repo.recent(limit).await?)
    }

    pub async fn related(&self, correlation_id: &str) -> Result<Vec<Incident>, TrackerError> {
        Ok(self.repo.by_correlation(correlation_id).await?)
    }

    pub async fn count_open(&self) -> Result<u64, TrackerError> {
        let filter = IncidentFilter {
            status: Some(vec![
                AlertStatus::Open,
                AlertStatus::Acknowledged,
                AlertStatus::Investigating,
            ]),
            ..IncidentFilter::default()
        };
        Ok(self.repo.count(&filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;
    use crate::event::{LogEvent, LogLevel, ScoredEvent};
    use crate::fingerprint::event_fingerprint;
    use crate::store::InMemoryIncidentRepository;

    fn tracker() -> IncidentTracker {
        IncidentTracker::new(
            TrackerConfig::default(),
            Arc::new(InMemoryIncidentRepository::new()),
        )
    }

    fn alert(severity: Severity) -> Alert {
        let event = LogEvent::new("api", "h1", LogLevel::Error, "request took 9.3s");
        let scored = ScoredEvent::new(event, 0.95, "latency_spike", 0.5);
        let fp = event_fingerprint(&scored);
        Alert::from_scored_event(&scored, severity, fp)
    }

    #[tokio::test]
    async fn first_alert_creates_an_incident() {
        let tracker = tracker();
        let alert = alert(Severity::Critical);

        let outcome = tracker.upsert(&alert).await.unwrap();
        assert!(outcome.is_created());
        let incident = outcome.incident();
        assert_eq!(incident.alert_id, alert.alert_id);
        assert_eq!(incident.events.len(), 1);
        assert_eq!(incident.events[0].event_type, IncidentEventType::Created);
        assert_eq!(incident.impact_score, 100 + 47);
    }

    #[tokio::test]
    async fn identical_redelivery_is_a_no_op() {
        let tracker = tracker();
        let alert = alert(Severity::High);

        let created = tracker.upsert(&alert).await.unwrap();
        let first_updated_at = created.incident().updated_at;

        let replay = tracker.upsert(&alert).await.unwrap();
        let incident = match replay {
            UpsertOutcome::Unchanged(incident) => incident,
            other => panic!("expected Unchanged, got {:?}", other),
        };
        assert_eq!(incident.events.len(), 1);
        assert_eq!(incident.updated_at, first_updated_at);
    }

    #[tokio::test]
    async fn status_change_appends_a_mapped_event() {
        let tracker = tracker();
        let mut alert = alert(Severity::High);
        tracker.upsert(&alert).await.unwrap();

        alert.status = AlertStatus::Acknowledged;
        let outcome = tracker.upsert(&alert).await.unwrap();
        let (incident, events) = match outcome {
            UpsertOutcome::Updated { incident, events } => (incident, events),
            other => panic!("expected Updated, got {:?}", other),
        };
        assert_eq!(events, vec![IncidentEventType::Acknowledged]);
        assert_eq!(incident.status, AlertStatus::Acknowledged);
        assert_eq!(incident.events.len(), 2);
        assert!(incident.metrics.time_to_acknowledge_ms.is_some());
        assert!(incident.updated_at > incident.created_at);
    }

    #[tokio::test]
    async fn first_resolution_sets_timing_metrics() {
        let tracker = tracker();
        let mut alert = alert(Severity::High);
        tracker.upsert(&alert).await.unwrap();

        alert.status = AlertStatus::Resolved;
        let outcome = tracker.upsert(&alert).await.unwrap();
        let incident = outcome.incident().clone();
        assert!(incident.resolved_at.is_some());
        let ttr = incident.metrics.time_to_resolve_ms.unwrap();
        assert!(ttr >= 0);

        // A second resolution transition must not move the timestamps.
        let mut back = alert.clone();
        back.status = AlertStatus::Investigating;
        tracker.upsert(&back).await.unwrap();
        let mut again = alert.clone();
        again.status = AlertStatus::Resolved;
        let re_resolved = tracker.upsert(&again).await.unwrap();
        assert_eq!(
            re_resolved.incident().metrics.time_to_resolve_ms,
            Some(ttr)
        );
    }

    #[tokio::test]
    async fn severity_change_escalates() {
        let tracker = tracker();
        let mut alert = alert(Severity::High);
        tracker.upsert(&alert).await.unwrap();

        alert.severity = Severity::Critical;
        let outcome = tracker.upsert(&alert).await.unwrap();
        let (incident, events) = match outcome {
            UpsertOutcome::Updated { incident, events } => (incident, events),
            other => panic!("expected Updated, got {:?}", other),
        };
        assert_eq!(events, vec![IncidentEventType::Escalated]);
        assert_eq!(incident.severity, Severity::Critical);
        assert_eq!(incident.metrics.escalation_count, 1);
    }

    #[tokio::test]
    async fn assignment_fires_only_on_actual_change() {
        let tracker = tracker();
        let mut alert = alert(Severity::High);
        tracker.upsert(&alert).await.unwrap();

        alert.assigned_to = Some("oncall-anna".to_string());
        let outcome = tracker.upsert(&alert).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Updated { ref events, .. }
            if events == &vec![IncidentEventType::Assigned]));

        // Same assignee again: no-op.
        let replay = tracker.upsert(&alert).await.unwrap();
        assert!(matches!(replay, UpsertOutcome::Unchanged(_)));
    }

    #[tokio::test]
    async fn refired_alert_with_same_fingerprint_updates_the_open_incident() {
        let tracker = tracker();
        let first = alert(Severity::Critical);
        let created = tracker.upsert(&first).await.unwrap();
        let incident_id = created.incident().id;

        // Fresh alert id, same fingerprint, classified lower this time.
        let refired = alert(Severity::Info);
        assert_ne!(refired.alert_id, first.alert_id);
        assert_eq!(refired.fingerprint, first.fingerprint);

        let outcome = tracker.upsert(&refired).await.unwrap();
        let (incident, events) = match outcome {
            UpsertOutcome::Updated { incident, events } => (incident, events),
            other => panic!("expected Updated, got {:?}", other),
        };
        assert_eq!(incident.id, incident_id);
        assert_eq!(events, vec![IncidentEventType::Escalated]);
        assert_eq!(incident.events.len(), 2);
        assert_eq!(incident.severity, Severity::Info);
        assert!(incident.related_alerts.contains(&refired.alert_id));
    }

    #[tokio::test]
    async fn closed_incidents_do_not_capture_refired_alerts() {
        let tracker = tracker();
        let mut first = alert(Severity::High);
        let created = tracker.upsert(&first).await.unwrap();

        first.status = AlertStatus::Closed;
        tracker.upsert(&first).await.unwrap();

        let refired = alert(Severity::High);
        let outcome = tracker.upsert(&refired).await.unwrap();
        assert!(outcome.is_created());
        assert_ne!(outcome.incident().id, created.incident().id);
    }

    #[tokio::test]
    async fn comments_append_and_unknown_incident_is_not_found() {
        let tracker = tracker();
        let alert = alert(Severity::Medium);
        let incident_id = tracker.upsert(&alert).await.unwrap().incident().id;

        let commented = tracker
            .add_comment(incident_id, "checked the dashboards, looks like gc", "jo")
            .await
            .unwrap();
        assert_eq!(commented.events.len(), 2);
        assert_eq!(
            commented.events[1].event_type,
            IncidentEventType::Commented
        );
        assert_eq!(commented.events[1].user_id, "jo");

        let missing = tracker
            .add_comment(Uuid::new_v4(), "hello?", "jo")
            .await;
        assert!(matches!(missing, Err(TrackerError::NotFound(_))));
    }

    #[tokio::test]
    async fn expire_old_only_removes_terminal_incidents() {
        let repo = Arc::new(InMemoryIncidentRepository::new());
        let tracker = IncidentTracker::new(TrackerConfig::default(), repo.clone());

        let mut closed = Incident::from_alert(&alert(Severity::High), Duration::days(90));
        closed.status = AlertStatus::Closed;
        closed.created_at = Utc::now() - Duration::days(120);
        repo.create(&closed).await.unwrap();

        let open = Incident::from_alert(&alert(Severity::High), Duration::days(90));
        repo.create(&open).await.unwrap();

        assert_eq!(tracker.expire_old(90).await.unwrap(), 1);
        assert_eq!(repo.len().await, 1);
    }
}
