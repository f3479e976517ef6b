//! Anomaly scoring seam.
//!
//! The scoring model itself lives behind [`AnomalyScorer`]; the pipeline only
//! depends on the trait. When the scorer fails, events are not dropped: they
//! are forwarded with a deterministic fallback score derived from the log
//! level so downstream alerting degrades instead of going dark.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

use crate::event::{LogEvent, LogLevel, ScoredEvent};

/// Reason string attached to fallback-scored events.
pub const FALLBACK_REASON: &str = "AI service unavailable, default scoring applied";

/// Anomaly type label used when the scorer could not produce one.
pub const FALLBACK_ANOMALY_TYPE: &str = "default";

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Scoring service unavailable: {0}")]
    Unavailable(String),
    #[error("Scoring request invalid: {0}")]
    Invalid(String),
}

impl ScoringError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        ScoringError::Unavailable(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ScoringError::Invalid(msg.into())
    }
}

/// External scoring collaborator.
#[async_trait]
pub trait AnomalyScorer: Send + Sync {
    /// Scores a single event, returning it with score, reasons, and type.
    async fn score(&self, event: &LogEvent) -> Result<ScoredEvent, ScoringError>;
}

/// Deterministic score used when the scorer is unreachable.
pub fn fallback_score(level: LogLevel) -> f64 {
    match level {
        LogLevel::Error | LogLevel::Fatal => 0.7,
        LogLevel::Warn => 0.4,
        _ => 0.1,
    }
}

/// Wraps a scorer with the fallback policy.
pub struct ScoringStage {
    scorer: Arc<dyn AnomalyScorer>,
    anomaly_threshold: f64,
}

impl ScoringStage {
    pub fn new(scorer: Arc<dyn AnomalyScorer>, anomaly_threshold: f64) -> Self {
        Self {
            scorer,
            anomaly_threshold,
        }
    }

    /// Scores an event, substituting the level-derived fallback when the
    /// scorer errors. Never fails and never drops the event.
    pub async fn score_or_fallback(&self, event: LogEvent) -> ScoredEvent {
        match self.scorer.score(&event).await {
            Ok(scored) => scored,
            Err(err) => {
                warn!(
                    service = %event.service_name,
                    error = %err,
                    "anomaly scorer failed, applying fallback score"
                );
                metrics::counter!("kx_scoring_fallbacks_total").increment(1);
                self.fallback(event)
            }
        }
    }

    fn fallback(&self, event: LogEvent) -> ScoredEvent {
        let score = fallback_score(event.level);
        ScoredEvent::new(event, score, FALLBACK_ANOMALY_TYPE, self.anomaly_threshold)
            .with_reasons(vec![FALLBACK_REASON.to_string()])
    }
}

/// Scorer returning a fixed score, for wiring tests and local runs.
pub struct StaticScorer {
    score: f64,
    anomaly_type: String,
    threshold: f64,
}

impl StaticScorer {
    pub fn new(score: f64, anomaly_type: impl Into<String>, threshold: f64) -> Self {
        Self {
            score,
            anomaly_type: anomaly_type.into(),
            threshold,
        }
    }
}

#[async_trait]
impl AnomalyScorer for StaticScorer {
    async fn score(&self, event: &LogEvent) -> Result<ScoredEvent, ScoringError> {
        Ok(ScoredEvent::new(
            event.clone(),
            self.score,
            self.anomaly_type.clone(),
            self.threshold,
        ))
    }
}
