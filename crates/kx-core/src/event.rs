//! Input event types for the alerting pipeline.
//!
//! A [`LogEvent`] is what the collectors emit; a [`ScoredEvent`] is the same
//! event after the anomaly scorer has attached a score, a type label, and
//! its reasoning. Scored events are what the pipeline consumes.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Log severity level as reported by the emitting service.
///
/// Ordering follows declaration order, so `LogLevel::Error > LogLevel::Warn`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Canonical uppercase name, matching the wire encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// True for levels that indicate a failure rather than routine output.
    pub fn is_error(&self) -> bool {
        matches!(self, LogLevel::Error | LogLevel::Fatal)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// A single log line as shipped by a collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Collector-assigned identifier, opaque to the pipeline.
    pub id: String,
    /// Logical service that emitted the line.
    pub service_name: String,
    /// Host the service instance runs on.
    pub hostname: String,
    /// Pod name when running under an orchestrator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod_name: Option<String>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack_trace: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Collector-supplied context (labels, tags, environment).
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
}

impl LogEvent {
    /// Creates a minimal event with a generated id and the current time.
    pub fn new(
        service_name: impl Into<String>,
        hostname: impl Into<String>,
        level: LogLevel,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            service_name: service_name.into(),
            hostname: hostname.into(),
            pod_name: None,
            level,
            message: message.into(),
            stack_trace: None,
            timestamp: Utc::now(),
            metadata: HashMap::new(),
            trace_id: None,
            span_id: None,
        }
    }

    pub fn with_pod_name(mut self, pod_name: impl Into<String>) -> Self {
        self.pod_name = Some(pod_name.into());
        self
    }

    pub fn with_trace(
        mut self,
        trace_id: impl Into<String>,
        span_id: impl Into<String>,
    ) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }
}

/// A log event with the anomaly scorer's verdict attached.
///
/// `anomaly_score` is in `[0, 1]`. `reasons` preserve the scorer's ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredEvent {
    #[serde(flatten)]
    pub event: LogEvent,
    pub anomaly_score: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
    /// Per-feature score breakdown from the scorer, when available.
    #[serde(default)]
    pub feature_scores: HashMap<String, f64>,
    pub is_anomaly: bool,
    /// Scorer's label for the anomaly shape, e.g. `latency_spike`.
    pub anomaly_type: String,
    pub scored_at: DateTime<Utc>,
}

impl ScoredEvent {
    /// Wraps an event with a score and type, marking it anomalous when the
    /// score exceeds `threshold`.
    pub fn new(
        event: LogEvent,
        anomaly_score: f64,
        anomaly_type: impl Into<String>,
        threshold: f64,
    ) -> Self {
        Self {
            event,
            anomaly_score,
            reasons: Vec::new(),
            feature_scores: HashMap::new(),
            is_anomaly: anomaly_score > threshold,
            anomaly_type: anomaly_type.into(),
            scored_at: Utc::now(),
        }
    }

    pub fn with_reasons(mut self, reasons: Vec<String>) -> Self {
        self.reasons = reasons;
        self
    }

    pub fn service_name(&self) -> &str {
        &self.event.service_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_ordering_follows_severity() {
        assert!(LogLevel::Fatal > LogLevel::Error);
        assert!(LogLevel::Error > LogLevel::Warn);
        assert!(LogLevel::Warn > LogLevel::Info);
        assert!(LogLevel::Trace < LogLevel::Debug);
    }

    #[test]
    fn log_level_round_trips_through_display_and_parse() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Fatal,
        ] {
            let parsed: LogLevel = level.as_str().parse().unwrap();
            assert_eq!(parsed, level);
        }
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
    }

    #[test]
    fn log_level_serializes_uppercase() {
        let json = serde_json::to_string(&LogLevel::Error).unwrap();
        assert_eq!(json, "\"ERROR\"");
    }

    #[test]
    fn scored_event_flattens_log_event_fields() {
        let event = LogEvent::new("payments", "node-1", LogLevel::Error, "timeout");
        let scored = ScoredEvent::new(event, 0.92, "latency_spike", 0.5);
        let json = serde_json::to_value(&scored).unwrap();

        assert_eq!(json["service_name"], "payments");
        assert_eq!(json["anomaly_score"], 0.92);
        assert_eq!(json["is_anomaly"], true);

        let back: ScoredEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.event.service_name, "payments");
        assert_eq!(back.anomaly_type, "latency_spike");
    }

    #[test]
    fn scored_event_anomaly_flag_respects_threshold() {
        let event = LogEvent::new("api", "h1", LogLevel::Warn, "slow");
        let below = ScoredEvent::new(event.clone(), 0.5, "default", 0.5);
        assert!(!below.is_anomaly);
        let above = ScoredEvent::new(event, 0.51, "default", 0.5);
        assert!(above.is_anomaly);
    }
}
