//! # kx-core
//!
//! Core pipeline and data models for Klaxon.
//!
//! This crate provides the alerting pipeline: classification of scored
//! events into severities, duplicate suppression and per-service rate
//! limiting, severity-based routing to sinks and tiered alert streams,
//! incident lifecycle tracking, and the dashboard aggregator.

pub mod alert;
pub mod classify;
pub mod dashboard;
pub mod event;
pub mod events;
pub mod fingerprint;
pub mod gate;
pub mod incident;
pub mod messaging;
pub mod pipeline;
pub mod router;
pub mod scoring;
pub mod sinks;
pub mod store;
pub mod tracker;

pub use alert::{Alert, AlertStatus, Severity};
pub use classify::ClassifierConfig;
pub use dashboard::{
    AlertTrends, DashboardAggregator, DashboardConfig, DashboardMetrics, DashboardSummary,
    ServiceStatus,
};
pub use event::{LogEvent, LogLevel, ScoredEvent};
pub use events::{EventBus, PipelineEvent};
pub use fingerprint::{event_fingerprint, fingerprint};
pub use gate::{AlertGate, GateConfig, GateError};
pub use incident::{Incident, IncidentEvent, IncidentEventType, IncidentMetrics};
pub use messaging::{
    InMemoryMessageQueue, Message, MessageId, MessageQueue, MessageQueueError, QueueHealth,
    Subscription,
};
pub use pipeline::{
    AckPolicy, Pipeline, PipelineBuilder, PipelineConfig, PipelineError, RAW_EVENTS_TOPIC,
    SCORED_EVENTS_TOPIC,
};
pub use router::{PublishTier, SinkChannel, CRITICAL_ALERTS_TOPIC, INFO_ALERTS_TOPIC};
pub use scoring::{AnomalyScorer, ScoringError, ScoringStage, StaticScorer};
pub use sinks::{AlertSink, QueueSink, SinkError, SinkRegistry};
pub use store::{
    GateDecision, GateStats, GateStore, InMemoryGateStore, InMemoryIncidentRepository,
    IncidentFilter, IncidentRepository, PaginatedResult, Pagination, StoreError,
};
pub use tracker::{IncidentTracker, TrackerConfig, TrackerError, UpsertOutcome};
