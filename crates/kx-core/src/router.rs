//! Severity-driven alert routing.
//!
//! Pure static mapping, re-evaluated per alert: severity decides which sink
//! channels receive the alert and which of the two publish tiers carries it
//! downstream. No state, no memory.

use serde::{Deserialize, Serialize};

use crate::alert::Severity;

/// Stream topic for CRITICAL and HIGH alerts.
pub const CRITICAL_ALERTS_TOPIC: &str = "alerts.critical";

/// Stream topic for MEDIUM, LOW, and INFO alerts.
pub const INFO_ALERTS_TOPIC: &str = "alerts.info";

/// Named sink channels an alert can fan out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkChannel {
    /// Every alert, regardless of severity.
    Notifications,
    /// CRITICAL and HIGH: candidates for automated remediation.
    AutoAction,
    /// CRITICAL only: page somebody.
    Urgent,
}

impl SinkChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkChannel::Notifications => "notifications",
            SinkChannel::AutoAction => "auto_action",
            SinkChannel::Urgent => "urgent",
        }
    }
}

/// The two downstream publish tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishTier {
    Critical,
    Info,
}

impl PublishTier {
    pub fn for_severity(severity: Severity) -> Self {
        if severity >= Severity::High {
            PublishTier::Critical
        } else {
            PublishTier::Info
        }
    }

    pub fn topic(&self) -> &'static str {
        match self {
            PublishTier::Critical => CRITICAL_ALERTS_TOPIC,
            PublishTier::Info => INFO_ALERTS_TOPIC,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublishTier::Critical => "critical",
            PublishTier::Info => "info",
        }
    }
}

/// Sink channels an alert of this severity fans out to, in dispatch order.
pub fn sink_channels(severity: Severity) -> Vec<SinkChannel> {
    let mut channels = vec![SinkChannel::Notifications];
    if severity >= Severity::High {
        channels.push(SinkChannel::AutoAction);
    }
    if severity == Severity::Critical {
        channels.push(SinkChannel::Urgent);
    }
    channels
}
