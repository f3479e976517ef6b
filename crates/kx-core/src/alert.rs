//! Alert model and construction.
//!
//! An [`Alert`] is the pipeline's unit of output: a scored event that passed
//! classification, carrying everything downstream consumers need without
//! re-reading the original event.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{LogLevel, ScoredEvent};

/// Alert severity tier, ordered ascending so `Critical` compares highest.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Info => "INFO",
        }
    }

    /// Base contribution to an incident's impact score.
    pub fn base_impact(&self) -> u32 {
        match self {
            Severity::Critical => 100,
            Severity::High => 75,
            Severity::Medium => 50,
            Severity::Low => 25,
            Severity::Info => 10,
        }
    }

    pub fn all() -> [Severity; 5] {
        [
            Severity::Critical,
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Info,
        ]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            "INFO" => Ok(Severity::Info),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Lifecycle status shared by alerts and incidents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertStatus {
    Open,
    Acknowledged,
    Investigating,
    Resolved,
    Suppressed,
    Closed,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Open => "OPEN",
            AlertStatus::Acknowledged => "ACKNOWLEDGED",
            AlertStatus::Investigating => "INVESTIGATING",
            AlertStatus::Resolved => "RESOLVED",
            AlertStatus::Suppressed => "SUPPRESSED",
            AlertStatus::Closed => "CLOSED",
        }
    }

    /// Terminal statuses are eligible for retention cleanup. RESOLVED is not
    /// terminal: a resolved incident may still be reopened.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AlertStatus::Closed)
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OPEN" => Ok(AlertStatus::Open),
            "ACKNOWLEDGED" => Ok(AlertStatus::Acknowledged),
            "INVESTIGATING" => Ok(AlertStatus::Investigating),
            "RESOLVED" => Ok(AlertStatus::Resolved),
            "SUPPRESSED" => Ok(AlertStatus::Suppressed),
            "CLOSED" => Ok(AlertStatus::Closed),
            other => Err(format!("unknown alert status: {}", other)),
        }
    }
}

/// A classified, deduplicatable alert derived from a scored event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Generated identifier, `ALERT-` plus eight uppercase hex chars.
    pub alert_id: String,
    /// Trace id of the source event when present, else a generated `COR-` id.
    pub correlation_id: String,
    pub source_event_id: String,
    pub service_name: String,
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    pub severity: Severity,
    pub status: AlertStatus,
    pub title: String,
    pub description: String,
    pub anomaly_score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    pub anomaly_type: String,
    /// Dedup key over (service, host, anomaly type, level).
    pub fingerprint: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    pub escalation_level: u8,
    /// When false the gate skips the suppression check entirely for this
    /// alert, both the cache read and the cache update.
    pub suppress_duplicates: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Builds an alert from a scored event and its classified severity.
    ///
    /// The fingerprint is computed by the caller so that the gate and the
    /// alert always agree on the dedup key.
    pub fn from_scored_event(
        scored: &ScoredEvent,
        severity: Severity,
        fingerprint: String,
    ) -> Self {
        let now = Utc::now();
        let event = &scored.event;

        let correlation_id = event
            .trace_id
            .clone()
            .unwrap_or_else(|| format!("COR-{}", short_uid()));

        let title = format!(
            "{} Alert: {} anomaly detected in {}",
            severity, scored.anomaly_type, event.service_name
        );

        let mut description = format!(
            "Anomaly detected in service '{}'\nHost: {}\nLevel: {}\nAnomaly score: {:.2}\nMessage: {}",
            event.service_name, event.hostname, event.level, scored.anomaly_score, event.message
        );
        if !scored.reasons.is_empty() {
            description.push_str(&format!("\nReasons: {}", scored.reasons.join("; ")));
        }

        let mut tags = vec![
            format!("service:{}", event.service_name),
            format!("level:{}", event.level.as_str().to_lowercase()),
            format!("anomaly_type:{}", scored.anomaly_type),
            format!("host:{}", event.hostname),
        ];
        if let Some(pod) = &event.pod_name {
            tags.push(format!("pod:{}", pod));
        }

        let mut metadata = event.metadata.clone();
        metadata.insert(
            "original_timestamp".to_string(),
            serde_json::Value::String(event.timestamp.to_rfc3339()),
        );
        metadata.insert(
            "scored_at".to_string(),
            serde_json::Value::String(scored.scored_at.to_rfc3339()),
        );
        if let Some(trace_id) = &event.trace_id {
            metadata.insert(
                "trace_id".to_string(),
                serde_json::Value::String(trace_id.clone()),
            );
        }
        if let Some(span_id) = &event.span_id {
            metadata.insert(
                "span_id".to_string(),
                serde_json::Value::String(span_id.clone()),
            );
        }
        if !scored.feature_scores.is_empty() {
            if let Ok(scores) = serde_json::to_value(&scored.feature_scores) {
                metadata.insert("feature_scores".to_string(), scores);
            }
        }

        Self {
            alert_id: format!("ALERT-{}", short_uid()),
            correlation_id,
            source_event_id: event.id.clone(),
            service_name: event.service_name.clone(),
            hostname: event.hostname.clone(),
            pod_name: event.pod_name.clone(),
            severity,
            status: AlertStatus::Open,
            title,
            description,
            anomaly_score: scored.anomaly_score,
            reasons: scored.reasons.clone(),
            anomaly_type: scored.anomaly_type.clone(),
            fingerprint,
            tags,
            metadata,
            assigned_to: None,
            escalation_level: 0,
            suppress_duplicates: true,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    /// Synthetic INFO alert for exercising the publish path end to end.
    pub fn test_alert() -> Self {
        let event = crate::event::LogEvent::new(
            "test-service",
            "localhost",
            LogLevel::Info,
            "Synthetic test alert",
        );
        let scored = ScoredEvent::new(event, 0.05, "test", 0.5)
            .with_reasons(vec!["manually triggered test alert".to_string()]);
        let fingerprint = crate::fingerprint::event_fingerprint(&scored);
        Self::from_scored_event(&scored, Severity::Info, fingerprint)
    }
}

/// First eight hex chars of a fresh UUID, uppercased.
fn short_uid() -> String {
    let id = Uuid::new_v4().simple().to_string();
    id[..8].to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::LogEvent;
    use crate::fingerprint::event_fingerprint;

    fn scored(service: &str, level: LogLevel, score: f64) -> ScoredEvent {
        let event = LogEvent::new(service, "host-1", level, "request took 9.3s");
        ScoredEvent::new(event, score, "latency_spike", 0.5)
            .with_reasons(vec!["p99 latency above baseline".to_string()])
    }

    #[test]
    fn severity_ordering_puts_critical_on_top() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Info);
    }

    #[test]
    fn only_closed_is_terminal() {
        assert!(AlertStatus::Closed.is_terminal());
        assert!(!AlertStatus::Resolved.is_terminal());
        assert!(!AlertStatus::Open.is_terminal());
        assert!(!AlertStatus::Suppressed.is_terminal());
    }

    #[test]
    fn alert_id_has_expected_shape() {
        let s = scored("api", LogLevel::Error, 0.95);
        let alert = Alert::from_scored_event(&s, Severity::Critical, "fp".into());
        assert!(alert.alert_id.starts_with("ALERT-"));
        assert_eq!(alert.alert_id.len(), "ALERT-".len() + 8);
        let suffix = &alert.alert_id["ALERT-".len()..];
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn title_and_tags_follow_the_documented_format() {
        let s = scored("api", LogLevel::Error, 0.95);
        let alert = Alert::from_scored_event(&s, Severity::Critical, "fp".into());
        assert_eq!(alert.title, "CRITICAL Alert: latency_spike anomaly detected in api");
        assert!(alert.tags.contains(&"service:api".to_string()));
        assert!(alert.tags.contains(&"level:error".to_string()));
        assert!(alert.tags.contains(&"anomaly_type:latency_spike".to_string()));
        assert!(alert.tags.contains(&"host:host-1".to_string()));
        assert!(!alert.tags.iter().any(|t| t.starts_with("pod:")));
    }

    #[test]
    fn pod_tag_present_when_event_has_pod() {
        let event = LogEvent::new("api", "host-1", LogLevel::Warn, "slow")
            .with_pod_name("api-7d9f");
        let s = ScoredEvent::new(event, 0.6, "latency_spike", 0.5);
        let alert = Alert::from_scored_event(&s, Severity::Medium, "fp".into());
        assert!(alert.tags.contains(&"pod:api-7d9f".to_string()));
    }

    #[test]
    fn correlation_id_prefers_trace_id() {
        let event = LogEvent::new("api", "host-1", LogLevel::Error, "boom")
            .with_trace("trace-abc", "span-1");
        let s = ScoredEvent::new(event, 0.9, "error_burst", 0.5);
        let alert = Alert::from_scored_event(&s, Severity::Critical, "fp".into());
        assert_eq!(alert.correlation_id, "trace-abc");
        assert_eq!(alert.metadata["trace_id"], "trace-abc");
        assert_eq!(alert.metadata["span_id"], "span-1");
    }

    #[test]
    fn correlation_id_generated_without_trace() {
        let s = scored("api", LogLevel::Error, 0.9);
        let alert = Alert::from_scored_event(&s, Severity::High, "fp".into());
        assert!(alert.correlation_id.starts_with("COR-"));
        assert_eq!(alert.correlation_id.len(), "COR-".len() + 8);
    }

    #[test]
    fn new_alert_defaults() {
        let s = scored("api", LogLevel::Error, 0.9);
        let alert = Alert::from_scored_event(&s, Severity::High, "fp".into());
        assert_eq!(alert.status, AlertStatus::Open);
        assert_eq!(alert.escalation_level, 0);
        assert!(alert.suppress_duplicates);
        assert!(alert.resolved_at.is_none());
        assert!(alert.assigned_to.is_none());
        assert!(alert.metadata.contains_key("original_timestamp"));
        assert!(alert.metadata.contains_key("scored_at"));
    }

    #[test]
    fn test_alert_is_info_and_publishable() {
        let alert = Alert::test_alert();
        assert_eq!(alert.severity, Severity::Info);
        assert_eq!(alert.service_name, "test-service");
        assert_eq!(alert.fingerprint, event_fingerprint(&ScoredEvent::new(
            LogEvent::new("test-service", "localhost", LogLevel::Info, "x"),
            0.0,
            "test",
            0.5,
        )));
    }
}
