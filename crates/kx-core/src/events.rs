//! In-process event bus.
//!
//! The push side of the pipeline: dashboards and other live consumers
//! subscribe either to the firehose (broadcast) or to a named topic
//! ("alerts", "metrics", "system") with their own buffer. Publishing never
//! blocks the hot path: non-critical events are dropped, and counted, when
//! a subscriber's buffer is full.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::alert::{Alert, Severity};
use crate::dashboard::DashboardMetrics;
use crate::incident::IncidentEventType;

/// Topic for alert and incident lifecycle events.
pub const ALERTS_TOPIC: &str = "alerts";

/// Topic for dashboard snapshot events.
pub const METRICS_TOPIC: &str = "metrics";

/// Topic for pipeline fault events.
pub const SYSTEM_TOPIC: &str = "system";

const BROADCAST_CAPACITY: usize = 1024;

/// Critical events block up to this long instead of being dropped.
const CRITICAL_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Subscriber not found: {0}")]
    SubscriberNotFound(String),
}

/// Everything the pipeline announces about its own progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// An alert passed the gate and was published downstream.
    AlertAdmitted { alert: Alert },
    /// A duplicate was dropped inside the suppression window.
    AlertSuppressed {
        fingerprint: String,
        service_name: String,
    },
    /// A service hit its alert quota.
    AlertRateLimited { service_name: String },
    /// The dashboard ingested an alert.
    AlertRecorded { alert: Alert },
    /// A new incident was opened.
    IncidentCreated {
        incident_id: Uuid,
        alert_id: String,
        service_name: String,
        severity: Severity,
    },
    /// An existing incident changed.
    IncidentUpdated {
        incident_id: Uuid,
        event_types: Vec<IncidentEventType>,
    },
    /// A fresh dashboard snapshot.
    MetricsUpdated { metrics: DashboardMetrics },
    /// A pipeline component failed.
    SystemError {
        component: String,
        error: String,
        recoverable: bool,
    },
}

impl PipelineEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            PipelineEvent::AlertAdmitted { .. } => "alert_admitted",
            PipelineEvent::AlertSuppressed { .. } => "alert_suppressed",
            PipelineEvent::AlertRateLimited { .. } => "alert_rate_limited",
            PipelineEvent::AlertRecorded { .. } => "alert_recorded",
            PipelineEvent::IncidentCreated { .. } => "incident_created",
            PipelineEvent::IncidentUpdated { .. } => "incident_updated",
            PipelineEvent::MetricsUpdated { .. } => "metrics_updated",
            PipelineEvent::SystemError { .. } => "system_error",
        }
    }

    /// Topic this event is delivered on for named subscribers.
    pub fn topic(&self) -> &'static str {
        match self {
            PipelineEvent::AlertAdmitted { .. }
            | PipelineEvent::AlertSuppressed { .. }
            | PipelineEvent::AlertRateLimited { .. }
            | PipelineEvent::AlertRecorded { .. }
            | PipelineEvent::IncidentCreated { .. }
            | PipelineEvent::IncidentUpdated { .. } => ALERTS_TOPIC,
            PipelineEvent::MetricsUpdated { .. } => METRICS_TOPIC,
            PipelineEvent::SystemError { .. } => SYSTEM_TOPIC,
        }
    }

    /// Critical events are delivered with backpressure instead of drops.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            PipelineEvent::SystemError {
                recoverable: false,
                ..
            }
        )
    }
}

struct NamedSubscriber {
    topic: String,
    sender: mpsc::Sender<PipelineEvent>,
}

/// Broadcast plus named per-topic subscribers, with bounded history.
pub struct EventBus {
    broadcast_tx: broadcast::Sender<PipelineEvent>,
    subscribers: Arc<RwLock<HashMap<String, NamedSubscriber>>>,
    history: Arc<RwLock<VecDeque<PipelineEvent>>>,
    history_size: usize,
    dropped_events: AtomicU64,
}

impl EventBus {
    pub fn new(history_size: usize) -> Self {
        let (broadcast_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            broadcast_tx,
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            history: Arc::new(RwLock::new(VecDeque::with_capacity(history_size))),
            history_size,
            dropped_events: AtomicU64::new(0),
        }
    }

    /// Firehose subscription: every event, dropped on lag.
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.broadcast_tx.subscribe()
    }

    /// Registers a named subscriber for one topic with its own buffer.
    pub async fn register_subscriber(
        &self,
        name: impl Into<String>,
        topic: impl Into<String>,
        buffer: usize,
    ) -> mpsc::Receiver<PipelineEvent> {
        let name = name.into();
        let topic = topic.into();
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let mut subscribers = self.subscribers.write().await;
        debug!(name = %name, topic = %topic, "event subscriber registered");
        subscribers.insert(name, NamedSubscriber { topic, sender: tx });
        rx
    }

    pub async fn unregister_subscriber(&self, name: &str) -> Result<(), EventBusError> {
        let mut subscribers = self.subscribers.write().await;
        subscribers
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EventBusError::SubscriberNotFound(name.to_string()))
    }

    /// Publishes to history, the broadcast channel, and matching named
    /// subscribers. Never returns an error: delivery problems degrade to
    /// logs and counters.
    pub async fn publish(&self, event: PipelineEvent) {
        metrics::counter!(
            "kx_bus_events_published_total",
            "event_type" => event.event_type()
        )
        .increment(1);

        {
            let mut history = self.history.write().await;
            if history.len() >= self.history_size {
                history.pop_front();
            }
            history.push_back(event.clone());
        }

        // No receiver on the firehose is normal.
        let _ = self.broadcast_tx.send(event.clone());

        let subscribers = self.subscribers.read().await;
        for (name, subscriber) in subscribers.iter() {
            if subscriber.topic != event.topic() {
                continue;
            }
            if event.is_critical() {
                let send = subscriber.sender.send_timeout(event.clone(), CRITICAL_SEND_TIMEOUT);
                if let Err(err) = send.await {
                    warn!(
                        subscriber = %name,
                        error = %err,
                        "failed to deliver critical event"
                    );
                }
            } else if subscriber.sender.try_send(event.clone()).is_err() {
                let dropped = self.dropped_events.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 100 == 1 {
                    warn!(
                        subscriber = %name,
                        dropped,
                        "subscriber buffer full, events dropped"
                    );
                }
            }
        }
    }

    /// The `limit` most recent events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Vec<PipelineEvent> {
        let history = self.history.read().await;
        history.iter().rev().take(limit).cloned().collect()
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len() + self.broadcast_tx.receiver_count()
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
