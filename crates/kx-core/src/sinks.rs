//! Alert delivery sinks.
//!
//! A sink is anything that accepts an alert: a chat webhook, an email
//! bridge, an automation trigger. Sinks are registered per channel at
//! startup and dispatched to with per-sink failure isolation, so one broken
//! sink never starves the others.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::alert::Alert;
use crate::messaging::MessageQueue;
use crate::router::{sink_channels, SinkChannel};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SinkError {
    pub fn delivery(msg: impl Into<String>) -> Self {
        SinkError::Delivery(msg.into())
    }
}

/// A destination for alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &str;

    /// Disabled sinks stay registered but are skipped during dispatch.
    fn is_enabled(&self) -> bool {
        true
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError>;
}

/// Channel-keyed sink registry, resolved once at startup.
#[derive(Default)]
pub struct SinkRegistry {
    sinks: HashMap<SinkChannel, Vec<Arc<dyn AlertSink>>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, channel: SinkChannel, sink: Arc<dyn AlertSink>) {
        self.sinks.entry(channel).or_default().push(sink);
    }

    pub fn sink_count(&self, channel: SinkChannel) -> usize {
        self.sinks.get(&channel).map_or(0, |s| s.len())
    }

    /// Fans an alert out to every enabled sink on every channel its severity
    /// maps to. Failures are logged and counted, never propagated; returns
    /// the number of successful deliveries.
    pub async fn dispatch(&self, alert: &Alert) -> usize {
        let mut delivered = 0;
        for channel in sink_channels(alert.severity) {
            let Some(sinks) = self.sinks.get(&channel) else {
                continue;
            };
            for sink in sinks {
                if !sink.is_enabled() {
                    debug!(sink = sink.name(), "skipping disabled sink");
                    continue;
                }
                match sink.send(alert).await {
                    Ok(()) => {
                        delivered += 1;
                        metrics::counter!(
                            "kx_sink_deliveries_total",
                            "channel" => channel.as_str()
                        )
                        .increment(1);
                    }
                    Err(err) => {
                        warn!(
                            sink = sink.name(),
                            channel = channel.as_str(),
                            alert_id = %alert.alert_id,
                            error = %err,
                            "sink delivery failed"
                        );
                        metrics::counter!(
                            "kx_sink_failures_total",
                            "channel" => channel.as_str()
                        )
                        .increment(1);
                    }
                }
            }
        }
        delivered
    }
}

/// Sink that forwards alerts onto a message-queue topic.
pub struct QueueSink {
    name: String,
    topic: String,
    queue: Arc<dyn MessageQueue>,
    enabled: bool,
}

impl QueueSink {
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            queue,
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[async_trait]
impl AlertSink for QueueSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, alert: &Alert) -> Result<(), SinkError> {
        let payload = serde_json::to_vec(alert)?;
        self.queue
            .publish_with_key(&self.topic, &alert.service_name, &payload)
            .await
            .map_err(|err| SinkError::delivery(err.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Severity;
    use crate::event::{LogEvent, LogLevel, ScoredEvent};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingSink {
        name: String,
        enabled: bool,
        sent: AtomicUsize,
    }

    impl RecordingSink {
        fn new(name: &str, enabled: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                enabled,
                sent: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn send(&self, _alert: &Alert) -> Result<(), SinkError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl AlertSink for BrokenSink {
        fn name(&self) -> &str {
            "broken"
        }

        async fn send(&self, _alert: &Alert) -> Result<(), SinkError> {
            Err(SinkError::delivery("wire cut"))
        }
    }

    fn alert(severity: Severity) -> Alert {
        let event = LogEvent::new("api", "h1", LogLevel::Error, "boom");
        let scored = ScoredEvent::new(event, 0.9, "latency_spike", 0.5);
        Alert::from_scored_event(&scored, severity, "fp".into())
    }

    #[tokio::test]
    async fn critical_alert_reaches_all_three_channels() {
        let mut registry = SinkRegistry::new();
        let notifications = RecordingSink::new("notify", true);
        let auto = RecordingSink::new("auto", true);
        let urgent = RecordingSink::new("pager", true);
        registry.register(SinkChannel::Notifications, notifications.clone());
        registry.register(SinkChannel::AutoAction, auto.clone());
        registry.register(SinkChannel::Urgent, urgent.clone());

        let delivered = registry.dispatch(&alert(Severity::Critical)).await;
        assert_eq!(delivered, 3);
        assert_eq!(notifications.sent.load(Ordering::SeqCst), 1);
        assert_eq!(auto.sent.load(Ordering::SeqCst), 1);
        assert_eq!(urgent.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn low_alert_reaches_notifications_only() {
        let mut registry = SinkRegistry::new();
        let notifications = RecordingSink::new("notify", true);
        let auto = RecordingSink::new("auto", true);
        registry.register(SinkChannel::Notifications, notifications.clone());
        registry.register(SinkChannel::AutoAction, auto.clone());

        let delivered = registry.dispatch(&alert(Severity::Low)).await;
        assert_eq!(delivered, 1);
        assert_eq!(auto.sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn one_failing_sink_does_not_block_the_rest() {
        let mut registry = SinkRegistry::new();
        let healthy = RecordingSink::new("healthy", true);
        registry.register(SinkChannel::Notifications, Arc::new(BrokenSink));
        registry.register(SinkChannel::Notifications, healthy.clone());

        let delivered = registry.dispatch(&alert(Severity::Info)).await;
        assert_eq!(delivered, 1);
        assert_eq!(healthy.sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn disabled_sinks_are_skipped() {
        let mut registry = SinkRegistry::new();
        let disabled = RecordingSink::new("off", false);
        registry.register(SinkChannel::Notifications, disabled.clone());

        let delivered = registry.dispatch(&alert(Severity::Info)).await;
        assert_eq!(delivered, 0);
        assert_eq!(disabled.sent.load(Ordering::SeqCst), 0);
    }
}
