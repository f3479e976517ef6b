//! Incident record and its append-only event log.
//!
//! An incident is the durable counterpart of an alert: same identifying
//! fields, plus a history of everything that happened to it and derived
//! timing metrics. Incidents are created and mutated only by the
//! [`IncidentTracker`](crate::tracker::IncidentTracker).

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{Alert, AlertStatus, Severity};

/// Impact score ceiling regardless of severity and anomaly score.
pub const MAX_IMPACT_SCORE: u32 = 200;

/// Kind of entry in an incident's event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IncidentEventType {
    Created,
    Acknowledged,
    Investigating,
    Escalated,
    Resolved,
    Closed,
    /// Representable for manual workflows; no automatic transition emits it.
    Reopened,
    Commented,
    Assigned,
}

impl IncidentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentEventType::Created => "CREATED",
            IncidentEventType::Acknowledged => "ACKNOWLEDGED",
            IncidentEventType::Investigating => "INVESTIGATING",
            IncidentEventType::Escalated => "ESCALATED",
            IncidentEventType::Resolved => "RESOLVED",
            IncidentEventType::Closed => "CLOSED",
            IncidentEventType::Reopened => "REOPENED",
            IncidentEventType::Commented => "COMMENTED",
            IncidentEventType::Assigned => "ASSIGNED",
        }
    }

    /// Event type recorded for a transition into `status`. Statuses without
    /// a distinguished event type map to CREATED.
    pub fn from_status(status: AlertStatus) -> Self {
        match status {
            AlertStatus::Acknowledged => IncidentEventType::Acknowledged,
            AlertStatus::Investigating => IncidentEventType::Investigating,
            AlertStatus::Resolved => IncidentEventType::Resolved,
            AlertStatus::Closed => IncidentEventType::Closed,
            _ => IncidentEventType::Created,
        }
    }
}

impl fmt::Display for IncidentEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the audit log. Entries are append-only and never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub id: Uuid,
    pub event_type: IncidentEventType,
    pub description: String,
    /// "system" for pipeline-driven entries, a user id for manual ones.
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
}

impl IncidentEvent {
    pub fn new(
        event_type: IncidentEventType,
        description: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            description: description.into(),
            user_id: user_id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Derived timing and volume metrics, updated as the incident progresses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentMetrics {
    /// Milliseconds from creation to first ACKNOWLEDGED transition.
    pub time_to_acknowledge_ms: Option<i64>,
    /// Milliseconds from creation to first RESOLVED transition.
    pub time_to_resolve_ms: Option<i64>,
    pub escalation_count: u32,
    pub notifications_sent: u32,
    pub automated_actions_triggered: u32,
    pub business_impact: Option<String>,
}

/// Durable incident record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: Uuid,
    /// Alert that opened this incident. Unique across incidents.
    pub alert_id: String,
    pub correlation_id: String,
    pub service_name: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    pub severity: Severity,
    pub status: AlertStatus,
    pub title: String,
    pub description: String,
    pub anomaly_score: f64,
    pub anomaly_type: String,
    pub fingerprint: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub escalation_level: u8,
    /// Append-only audit log, oldest first.
    pub events: Vec<IncidentEvent>,
    pub metrics: IncidentMetrics,
    pub affected_services: Vec<String>,
    /// Triage weight in [0, 200], severity base plus score contribution.
    pub impact_score: u32,
    /// Later alerts that re-fired for this incident's fingerprint.
    #[serde(default)]
    pub related_alerts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_cause: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
    /// Honored by the storage layer's TTL mechanism where available; also
    /// enforced by the retention sweep.
    pub expires_at: DateTime<Utc>,
}

impl Incident {
    /// Opens a new incident for an alert, with a CREATED event already in
    /// the log.
    pub fn from_alert(alert: &Alert, retention: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            alert_id: alert.alert_id.clone(),
            correlation_id: alert.correlation_id.clone(),
            service_name: alert.service_name.clone(),
            hostname: alert.hostname.clone(),
            pod_name: alert.pod_name.clone(),
            severity: alert.severity,
            status: alert.status,
            title: alert.title.clone(),
            description: alert.description.clone(),
            anomaly_score: alert.anomaly_score,
            anomaly_type: alert.anomaly_type.clone(),
            fingerprint: alert.fingerprint.clone(),
            tags: alert.tags.clone(),
            metadata: alert.metadata.clone(),
            assigned_to: alert.assigned_to.clone(),
            escalation_level: alert.escalation_level,
            events: vec![IncidentEvent::new(
                IncidentEventType::Created,
                "Incident created from alert",
                "system",
            )],
            metrics: IncidentMetrics::default(),
            affected_services: vec![alert.service_name.clone()],
            impact_score: impact_score(alert.severity, alert.anomaly_score),
            related_alerts: Vec::new(),
            resolution: None,
            root_cause: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            expires_at: now + retention,
        }
    }

    pub fn latest_event(&self) -> Option<&IncidentEvent> {
        self.events.last()
    }
}

/// Severity base plus `floor(score * 50)`, capped at [`MAX_IMPACT_SCORE`].
pub fn impact_score(severity: Severity, anomaly_score: f64) -> u32 {
    let score_part = (anomaly_score * 50.0).floor() as u32;
    (severity.base_impact() + score_part).min(MAX_IMPACT_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{LogLevel, ScoredEvent};

    fn sample_alert(severity: Severity, score: f64) -> Alert {
        let event = crate::event::LogEvent::new("api", "h1", LogLevel::Error, "boom");
        let scored = ScoredEvent::new(event, score, "latency_spike", 0.5);
        Alert::from_scored_event(&scored, severity, "fp-1".into())
    }

    #[test]
    fn impact_score_combines_base_and_score() {
        assert_eq!(impact_score(Severity::Critical, 0.0), 100);
        assert_eq!(impact_score(Severity::Critical, 0.5), 125);
        assert_eq!(impact_score(Severity::High, 0.99), 124);
        assert_eq!(impact_score(Severity::Info, 0.2), 20);
    }

    #[test]
    fn impact_score_floors_the_score_contribution() {
        // 0.99 * 50 = 49.5, floored to 49
        assert_eq!(impact_score(Severity::Info, 0.99), 59);
    }

    #[test]
    fn impact_score_is_capped() {
        assert_eq!(impact_score(Severity::Critical, 1.0), 150);
        assert!(impact_score(Severity::Critical, 1.0) <= MAX_IMPACT_SCORE);
    }

    #[test]
    fn from_alert_seeds_the_event_log() {
        let alert = sample_alert(Severity::High, 0.8);
        let incident = Incident::from_alert(&alert, Duration::days(90));

        assert_eq!(incident.alert_id, alert.alert_id);
        assert_eq!(incident.events.len(), 1);
        assert_eq!(incident.events[0].event_type, IncidentEventType::Created);
        assert_eq!(incident.events[0].user_id, "system");
        assert_eq!(incident.affected_services, vec!["api".to_string()]);
        assert_eq!(incident.impact_score, 75 + 40);
        assert_eq!(incident.metrics, IncidentMetrics::default());
        assert!(incident.expires_at > incident.created_at);
    }

    #[test]
    fn status_to_event_type_mapping() {
        assert_eq!(
            IncidentEventType::from_status(AlertStatus::Acknowledged),
            IncidentEventType::Acknowledged
        );
        assert_eq!(
            IncidentEventType::from_status(AlertStatus::Investigating),
            IncidentEventType::Investigating
        );
        assert_eq!(
            IncidentEventType::from_status(AlertStatus::Resolved),
            IncidentEventType::Resolved
        );
        assert_eq!(
            IncidentEventType::from_status(AlertStatus::Closed),
            IncidentEventType::Closed
        );
        // No distinguished type for these; the conservative mapping applies.
        assert_eq!(
            IncidentEventType::from_status(AlertStatus::Open),
            IncidentEventType::Created
        );
        assert_eq!(
            IncidentEventType::from_status(AlertStatus::Suppressed),
            IncidentEventType::Created
        );
    }
}
