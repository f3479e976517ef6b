//! Pipeline assembly and lifecycle.
//!
//! Wires the stages together: the scored-event consumer classifies, gates,
//! and publishes alerts; the incident and dashboard consumers each read
//! both alert tiers under their own consumer group; maintenance timers keep
//! the gate tables and incident store bounded. All tasks stop on the shared
//! shutdown signal.

use std::sync::Arc;
use std::time::Duration as StdDuration;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::alert::Alert;
use crate::classify::ClassifierConfig;
use crate::dashboard::{DashboardAggregator, DashboardConfig};
use crate::event::ScoredEvent;
use crate::events::{EventBus, PipelineEvent};
use crate::fingerprint::event_fingerprint;
use crate::gate::{AlertGate, GateConfig, GateError};
use crate::messaging::{Message, MessageQueue, MessageQueueError};
use crate::router::{PublishTier, SinkChannel, CRITICAL_ALERTS_TOPIC, INFO_ALERTS_TOPIC};
use crate::scoring::ScoringStage;
use crate::sinks::{QueueSink, SinkRegistry};
use crate::store::{InMemoryGateStore, InMemoryIncidentRepository};
use crate::tracker::{IncidentTracker, TrackerConfig, TrackerError, UpsertOutcome};

/// Topic carrying scored events into the pipeline.
pub const SCORED_EVENTS_TOPIC: &str = "events.scored";

/// Topic carrying raw events into the optional scoring stage.
pub const RAW_EVENTS_TOPIC: &str = "events.raw";

pub const ALERT_MANAGER_GROUP: &str = "alert-manager";
pub const INCIDENT_TRACKER_GROUP: &str = "incident-tracker";
pub const DASHBOARD_GROUP: &str = "dashboard";
pub const SCORER_GROUP: &str = "anomaly-scorer";

/// Seconds between liveness log lines.
const LIVENESS_INTERVAL_SECS: u64 = 600;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Queue error: {0}")]
    Queue(#[from] MessageQueueError),

    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    #[error("Tracker error: {0}")]
    Tracker(#[from] TrackerError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What to do with a message whose processing failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckPolicy {
    /// Acknowledge and discard. Keeps the consumer moving at the cost of
    /// silent loss.
    #[default]
    AckAndDrop,
    /// Publish the raw payload to `<topic>.dlq`, then acknowledge.
    DeadLetterAndAck,
}

impl AckPolicy {
    pub fn dlq_topic(topic: &str) -> String {
        format!("{}.dlq", topic)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Scored events at or below this score are skipped outright.
    #[serde(default = "default_min_anomaly_score")]
    pub min_anomaly_score: f64,
    #[serde(default)]
    pub ack_policy: AckPolicy,
    #[serde(default = "default_scored_events_topic")]
    pub scored_events_topic: String,
    #[serde(default = "default_raw_events_topic")]
    pub raw_events_topic: String,
    #[serde(default = "default_alert_group")]
    pub alert_consumer_group: String,
    #[serde(default = "default_incident_group")]
    pub incident_consumer_group: String,
    #[serde(default = "default_dashboard_group")]
    pub dashboard_consumer_group: String,
}

fn default_min_anomaly_score() -> f64 {
    0.1
}

fn default_scored_events_topic() -> String {
    SCORED_EVENTS_TOPIC.to_string()
}

fn default_raw_events_topic() -> String {
    RAW_EVENTS_TOPIC.to_string()
}

fn default_alert_group() -> String {
    ALERT_MANAGER_GROUP.to_string()
}

fn default_incident_group() -> String {
    INCIDENT_TRACKER_GROUP.to_string()
}

fn default_dashboard_group() -> String {
    DASHBOARD_GROUP.to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_anomaly_score: default_min_anomaly_score(),
            ack_policy: AckPolicy::default(),
            scored_events_topic: default_scored_events_topic(),
            raw_events_topic: default_raw_events_topic(),
            alert_consumer_group: default_alert_group(),
            incident_consumer_group: default_incident_group(),
            dashboard_consumer_group: default_dashboard_group(),
        }
    }
}

/// The assembled pipeline. Construct with [`PipelineBuilder`], start with
/// [`Pipeline::start`], stop with [`Pipeline::shutdown`].
pub struct Pipeline {
    config: PipelineConfig,
    queue: Arc<dyn MessageQueue>,
    classifier: ClassifierConfig,
    gate: Arc<AlertGate>,
    sinks: Arc<SinkRegistry>,
    tracker: Arc<IncidentTracker>,
    dashboard: Arc<DashboardAggregator>,
    bus: Arc<EventBus>,
    scoring: Option<Arc<ScoringStage>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Pipeline {
    pub fn builder(queue: Arc<dyn MessageQueue>) -> PipelineBuilder {
        PipelineBuilder::new(queue)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn queue(&self) -> Arc<dyn MessageQueue> {
        self.queue.clone()
    }

    pub fn gate(&self) -> Arc<AlertGate> {
        self.gate.clone()
    }

    pub fn tracker(&self) -> Arc<IncidentTracker> {
        self.tracker.clone()
    }

    pub fn dashboard(&self) -> Arc<DashboardAggregator> {
        self.dashboard.clone()
    }

    pub fn bus(&self) -> Arc<EventBus> {
        self.bus.clone()
    }

    /// Subscribes all consumers and spawns the worker and maintenance
    /// tasks. Idempotent only in the sense that calling it twice doubles
    /// the consumers; call it once.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), PipelineError> {
        let mut handles = Vec::new();

        // Scoring stage, when a scorer is wired in.
        if let Some(scoring) = &self.scoring {
            let subscription = self
                .queue
                .subscribe(&self.config.raw_events_topic, SCORER_GROUP)
                .await?;
            handles.push(tokio::spawn(Self::run_scoring_consumer(
                subscription,
                self.queue.clone(),
                scoring.clone(),
                self.config.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }

        // Scored events → alerts.
        let scored_sub = self
            .queue
            .subscribe(
                &self.config.scored_events_topic,
                &self.config.alert_consumer_group,
            )
            .await?;
        handles.push(tokio::spawn(Self::run_alerting_consumer(
            scored_sub,
            self.queue.clone(),
            self.classifier.clone(),
            self.gate.clone(),
            self.sinks.clone(),
            self.bus.clone(),
            self.config.clone(),
            self.shutdown_tx.subscribe(),
        )));

        // Alerts → incidents, both tiers.
        for topic in [CRITICAL_ALERTS_TOPIC, INFO_ALERTS_TOPIC] {
            let subscription = self
                .queue
                .subscribe(topic, &self.config.incident_consumer_group)
                .await?;
            handles.push(tokio::spawn(Self::run_incident_consumer(
                subscription,
                topic,
                self.queue.clone(),
                self.tracker.clone(),
                self.bus.clone(),
                self.config.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }

        // Alerts → dashboard, both tiers.
        for topic in [CRITICAL_ALERTS_TOPIC, INFO_ALERTS_TOPIC] {
            let subscription = self
                .queue
                .subscribe(topic, &self.config.dashboard_consumer_group)
                .await?;
            handles.push(tokio::spawn(Self::run_dashboard_consumer(
                subscription,
                topic,
                self.queue.clone(),
                self.dashboard.clone(),
                self.shutdown_tx.subscribe(),
            )));
        }

        handles.extend(self.spawn_maintenance_tasks());

        let task_count = handles.len();
        self.tasks.lock().await.extend(handles);
        info!(tasks = task_count, "pipeline started");
        Ok(())
    }

    /// Signals every task to stop and waits for them to finish.
    #[instrument(skip(self))]
    pub async fn shutdown(&self) {
        info!("pipeline shutting down");
        let _ = self.shutdown_tx.send(true);
        let mut tasks = self.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = handle.await;
        }
        info!("pipeline stopped");
    }

    /// Publishes a synthetic INFO alert through the full output path:
    /// tiered stream, sinks, and event bus. Returns the alert.
    #[instrument(skip(self))]
    pub async fn publish_test_alert(&self) -> Result<Alert, PipelineError> {
        let alert = Alert::test_alert();
        Self::publish_alert(&self.queue, &alert).await?;
        self.sinks.dispatch(&alert).await;
        self.bus
            .publish(PipelineEvent::AlertAdmitted {
                alert: alert.clone(),
            })
            .await;
        info!(alert_id = %alert.alert_id, "test alert published");
        Ok(alert)
    }

    async fn publish_alert(
        queue: &Arc<dyn MessageQueue>,
        alert: &Alert,
    ) -> Result<(), PipelineError> {
        let tier = PublishTier::for_severity(alert.severity);
        let payload = serde_json::to_vec(alert)?;
        queue
            .publish_with_key(tier.topic(), &alert.service_name, &payload)
            .await?;
        metrics::counter!(
            "kx_alerts_published_total",
            "tier" => tier.as_str()
        )
        .increment(1);
        Ok(())
    }

    /// Applies the ack policy to a message whose processing failed.
    async fn handle_failed(
        queue: &Arc<dyn MessageQueue>,
        policy: AckPolicy,
        topic: &str,
        message: &Message,
    ) {
        if policy == AckPolicy::DeadLetterAndAck {
            let dlq = AckPolicy::dlq_topic(topic);
            if let Err(err) = queue.publish(&dlq, &message.payload).await {
                error!(topic = %dlq, error = %err, "dead-letter publish failed");
            } else {
                metrics::counter!("kx_events_dead_lettered_total").increment(1);
            }
        }
        if let Err(err) = queue.acknowledge(topic, &message.id).await {
            warn!(topic, error = %err, "acknowledge failed");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_alerting_consumer(
        mut subscription: crate::messaging::Subscription,
        queue: Arc<dyn MessageQueue>,
        classifier: ClassifierConfig,
        gate: Arc<AlertGate>,
        sinks: Arc<SinkRegistry>,
        bus: Arc<EventBus>,
        config: PipelineConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let topic = config.scored_events_topic.clone();
        info!(topic = %topic, group = %config.alert_consumer_group, "alerting consumer started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe = subscription.recv() => {
                    let Some(message) = maybe else {
                        warn!(topic = %topic, "subscription closed");
                        break;
                    };
                    metrics::counter!("kx_events_consumed_total", "topic" => topic.clone())
                        .increment(1);
                    let started = Instant::now();
                    let scored: ScoredEvent = match message.deserialize() {
                        Ok(scored) => scored,
                        Err(err) => {
                            warn!(topic = %topic, error = %err, "dropping malformed scored event");
                            metrics::counter!("kx_events_malformed_total", "topic" => topic.clone())
                                .increment(1);
                            Self::handle_failed(&queue, config.ack_policy, &topic, &message).await;
                            continue;
                        }
                    };

                    match Self::process_scored(
                        &queue, &classifier, &gate, &sinks, &bus, &config, scored,
                    )
                    .await
                    {
                        Ok(()) => {
                            if let Err(err) = queue.acknowledge(&topic, &message.id).await {
                                warn!(topic = %topic, error = %err, "acknowledge failed");
                            }
                        }
                        Err(err) => {
                            // One bad alert must not stall the stream.
                            error!(topic = %topic, error = %err, "alert processing failed");
                            bus.publish(PipelineEvent::SystemError {
                                component: "alerting".to_string(),
                                error: err.to_string(),
                                recoverable: true,
                            })
                            .await;
                            Self::handle_failed(&queue, config.ack_policy, &topic, &message).await;
                        }
                    }
                    metrics::histogram!("kx_event_processing_seconds", "stage" => "alerting")
                        .record(started.elapsed().as_secs_f64());
                }
            }
        }
        debug!(topic = %topic, "alerting consumer stopped");
    }

    async fn process_scored(
        queue: &Arc<dyn MessageQueue>,
        classifier: &ClassifierConfig,
        gate: &Arc<AlertGate>,
        sinks: &Arc<SinkRegistry>,
        bus: &Arc<EventBus>,
        config: &PipelineConfig,
        scored: ScoredEvent,
    ) -> Result<(), PipelineError> {
        if scored.anomaly_score <= config.min_anomaly_score {
            debug!(
                service = %scored.event.service_name,
                score = scored.anomaly_score,
                "score below alerting floor, skipped"
            );
            metrics::counter!("kx_events_skipped_total").increment(1);
            return Ok(());
        }

        let severity = classifier.classify(scored.anomaly_score);
        let fingerprint = event_fingerprint(&scored);
        let alert = Alert::from_scored_event(&scored, severity, fingerprint);

        match gate.admit(&alert).await? {
            crate::store::GateDecision::Suppressed => {
                bus.publish(PipelineEvent::AlertSuppressed {
                    fingerprint: alert.fingerprint.clone(),
                    service_name: alert.service_name.clone(),
                })
                .await;
            }
            crate::store::GateDecision::RateLimited => {
                bus.publish(PipelineEvent::AlertRateLimited {
                    service_name: alert.service_name.clone(),
                })
                .await;
            }
            crate::store::GateDecision::Pass => {
                Self::publish_alert(queue, &alert).await?;
                sinks.dispatch(&alert).await;
                bus.publish(PipelineEvent::AlertAdmitted { alert }).await;
            }
        }
        Ok(())
    }

    async fn run_incident_consumer(
        mut subscription: crate::messaging::Subscription,
        topic: &'static str,
        queue: Arc<dyn MessageQueue>,
        tracker: Arc<IncidentTracker>,
        bus: Arc<EventBus>,
        config: PipelineConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(topic, group = %config.incident_consumer_group, "incident consumer started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe = subscription.recv() => {
                    let Some(message) = maybe else {
                        warn!(topic, "subscription closed");
                        break;
                    };
                    let alert: Alert = match message.deserialize() {
                        Ok(alert) => alert,
                        Err(err) => {
                            warn!(topic, error = %err, "dropping malformed alert");
                            metrics::counter!("kx_events_malformed_total", "topic" => topic)
                                .increment(1);
                            Self::handle_failed(&queue, config.ack_policy, topic, &message).await;
                            continue;
                        }
                    };

                    match tracker.upsert(&alert).await {
                        Ok(UpsertOutcome::Created(incident)) => {
                            bus.publish(PipelineEvent::IncidentCreated {
                                incident_id: incident.id,
                                alert_id: incident.alert_id.clone(),
                                service_name: incident.service_name.clone(),
                                severity: incident.severity,
                            })
                            .await;
                            if let Err(err) = queue.acknowledge(topic, &message.id).await {
                                warn!(topic, error = %err, "acknowledge failed");
                            }
                        }
                        Ok(UpsertOutcome::Updated { incident, events }) => {
                            bus.publish(PipelineEvent::IncidentUpdated {
                                incident_id: incident.id,
                                event_types: events,
                            })
                            .await;
                            if let Err(err) = queue.acknowledge(topic, &message.id).await {
                                warn!(topic, error = %err, "acknowledge failed");
                            }
                        }
                        Ok(UpsertOutcome::Unchanged(_)) => {
                            if let Err(err) = queue.acknowledge(topic, &message.id).await {
                                warn!(topic, error = %err, "acknowledge failed");
                            }
                        }
                        Err(err) => {
                            error!(topic, alert_id = %alert.alert_id, error = %err, "incident upsert failed");
                            bus.publish(PipelineEvent::SystemError {
                                component: "incidents".to_string(),
                                error: err.to_string(),
                                recoverable: true,
                            })
                            .await;
                            Self::handle_failed(&queue, config.ack_policy, topic, &message).await;
                        }
                    }
                }
            }
        }
        debug!(topic, "incident consumer stopped");
    }

    async fn run_dashboard_consumer(
        mut subscription: crate::messaging::Subscription,
        topic: &'static str,
        queue: Arc<dyn MessageQueue>,
        dashboard: Arc<DashboardAggregator>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(topic, "dashboard consumer started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe = subscription.recv() => {
                    let Some(message) = maybe else {
                        warn!(topic, "subscription closed");
                        break;
                    };
                    // Display path: always acknowledge, never dead-letter.
                    match message.deserialize::<Alert>() {
                        Ok(alert) => dashboard.record(&alert).await,
                        Err(err) => {
                            warn!(topic, error = %err, "dropping malformed alert");
                        }
                    }
                    if let Err(err) = queue.acknowledge(topic, &message.id).await {
                        warn!(topic, error = %err, "acknowledge failed");
                    }
                }
            }
        }
        debug!(topic, "dashboard consumer stopped");
    }

    async fn run_scoring_consumer(
        mut subscription: crate::messaging::Subscription,
        queue: Arc<dyn MessageQueue>,
        scoring: Arc<ScoringStage>,
        config: PipelineConfig,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let topic = config.raw_events_topic.clone();
        info!(topic = %topic, "scoring consumer started");
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                maybe = subscription.recv() => {
                    let Some(message) = maybe else {
                        warn!(topic = %topic, "subscription closed");
                        break;
                    };
                    match message.deserialize::<crate::event::LogEvent>() {
                        Ok(event) => {
                            let scored = scoring.score_or_fallback(event).await;
                            match serde_json::to_vec(&scored) {
                                Ok(payload) => {
                                    if let Err(err) = queue
                                        .publish_with_key(
                                            &config.scored_events_topic,
                                            &scored.event.service_name,
                                            &payload,
                                        )
                                        .await
                                    {
                                        error!(error = %err, "scored event publish failed");
                                    }
                                }
                                Err(err) => {
                                    error!(error = %err, "scored event encode failed");
                                }
                            }
                        }
                        Err(err) => {
                            warn!(topic = %topic, error = %err, "dropping malformed raw event");
                            metrics::counter!("kx_events_malformed_total", "topic" => topic.clone())
                                .increment(1);
                        }
                    }
                    if let Err(err) = queue.acknowledge(&topic, &message.id).await {
                        warn!(topic = %topic, error = %err, "acknowledge failed");
                    }
                }
            }
        }
        debug!(topic = %topic, "scoring consumer stopped");
    }

    fn spawn_maintenance_tasks(&self) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        let gate_config = self.gate.config();

        {
            let gate = self.gate.clone();
            handles.push(spawn_periodic(
                "suppression-sweep",
                StdDuration::from_secs(gate_config.sweep_interval_secs),
                self.shutdown_tx.subscribe(),
                move || {
                    let gate = gate.clone();
                    async move {
                        if let Err(err) = gate.sweep_suppression().await {
                            warn!(error = %err, "suppression sweep failed");
                        }
                    }
                },
            ));
        }

        {
            let gate = self.gate.clone();
            handles.push(spawn_periodic(
                "counter-reset",
                StdDuration::from_secs(gate_config.counter_reset_interval_secs),
                self.shutdown_tx.subscribe(),
                move || {
                    let gate = gate.clone();
                    async move {
                        if let Err(err) = gate.reset_counters().await {
                            warn!(error = %err, "counter reset failed");
                        }
                    }
                },
            ));
        }

        {
            let dashboard = self.dashboard.clone();
            handles.push(spawn_periodic(
                "snapshot-broadcast",
                StdDuration::from_secs(dashboard.config().snapshot_interval_secs),
                self.shutdown_tx.subscribe(),
                move || {
                    let dashboard = dashboard.clone();
                    async move {
                        dashboard.broadcast_snapshot().await;
                    }
                },
            ));
        }

        {
            let tracker = self.tracker.clone();
            handles.push(spawn_periodic(
                "incident-retention",
                StdDuration::from_secs(tracker.config().cleanup_interval_secs),
                self.shutdown_tx.subscribe(),
                move || {
                    let tracker = tracker.clone();
                    async move {
                        if let Err(err) = tracker.run_retention_sweep().await {
                            warn!(error = %err, "incident retention sweep failed");
                        }
                    }
                },
            ));
        }

        {
            let gate = self.gate.clone();
            let dashboard = self.dashboard.clone();
            let bus = self.bus.clone();
            handles.push(spawn_periodic(
                "liveness",
                StdDuration::from_secs(LIVENESS_INTERVAL_SECS),
                self.shutdown_tx.subscribe(),
                move || {
                    let gate = gate.clone();
                    let dashboard = dashboard.clone();
                    let bus = bus.clone();
                    async move {
                        let stats = gate.stats().await.unwrap_or_default();
                        let dashboard_history = dashboard.history_len().await;
                        info!(
                            suppression_entries = stats.suppression_entries,
                            tracked_services = stats.tracked_services,
                            dashboard_history,
                            bus_dropped = bus.dropped_count(),
                            "pipeline alive"
                        );
                    }
                },
            ));
        }

        handles
    }
}

/// Runs `tick` on a fixed period until the shutdown signal flips. Missed
/// ticks are skipped, not bunched.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: StdDuration,
    mut shutdown: watch::Receiver<bool>,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; consume it so the task waits a
        // full period before its first run.
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => tick().await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(task = name, "maintenance task stopped");
    })
}

/// Builder with in-memory defaults for every component.
pub struct PipelineBuilder {
    config: PipelineConfig,
    queue: Arc<dyn MessageQueue>,
    classifier: ClassifierConfig,
    gate: Option<Arc<AlertGate>>,
    sinks: Option<Arc<SinkRegistry>>,
    tracker: Option<Arc<IncidentTracker>>,
    dashboard: Option<Arc<DashboardAggregator>>,
    dashboard_config: DashboardConfig,
    tracker_config: TrackerConfig,
    gate_config: GateConfig,
    bus: Option<Arc<EventBus>>,
    scoring: Option<Arc<ScoringStage>>,
}

impl PipelineBuilder {
    pub fn new(queue: Arc<dyn MessageQueue>) -> Self {
        Self {
            config: PipelineConfig::default(),
            queue,
            classifier: ClassifierConfig::default(),
            gate: None,
            sinks: None,
            tracker: None,
            dashboard: None,
            dashboard_config: DashboardConfig::default(),
            tracker_config: TrackerConfig::default(),
            gate_config: GateConfig::default(),
            bus: None,
            scoring: None,
        }
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classifier(mut self, classifier: ClassifierConfig) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn gate(mut self, gate: Arc<AlertGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn gate_config(mut self, config: GateConfig) -> Self {
        self.gate_config = config;
        self
    }

    pub fn sinks(mut self, sinks: SinkRegistry) -> Self {
        self.sinks = Some(Arc::new(sinks));
        self
    }

    pub fn tracker(mut self, tracker: Arc<IncidentTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    pub fn tracker_config(mut self, config: TrackerConfig) -> Self {
        self.tracker_config = config;
        self
    }

    pub fn dashboard(mut self, dashboard: Arc<DashboardAggregator>) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn dashboard_config(mut self, config: DashboardConfig) -> Self {
        self.dashboard_config = config;
        self
    }

    pub fn bus(mut self, bus: Arc<EventBus>) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn scoring(mut self, scoring: ScoringStage) -> Self {
        self.scoring = Some(Arc::new(scoring));
        self
    }

    pub fn build(self) -> Pipeline {
        let bus = self.bus.unwrap_or_else(|| Arc::new(EventBus::default()));
        let gate = self.gate.unwrap_or_else(|| {
            Arc::new(AlertGate::new(
                self.gate_config,
                Arc::new(InMemoryGateStore::new()),
            ))
        });
        let tracker = self.tracker.unwrap_or_else(|| {
            Arc::new(IncidentTracker::new(
                self.tracker_config,
                Arc::new(InMemoryIncidentRepository::new()),
            ))
        });
        let dashboard = self.dashboard.unwrap_or_else(|| {
            Arc::new(DashboardAggregator::new(
                self.dashboard_config,
                bus.clone(),
            ))
        });
        let sinks = self.sinks.unwrap_or_else(|| {
            let mut registry = SinkRegistry::new();
            registry.register(
                SinkChannel::Notifications,
                Arc::new(QueueSink::new(
                    "queue-notifications",
                    "notifications",
                    self.queue.clone(),
                )),
            );
            registry.register(
                SinkChannel::AutoAction,
                Arc::new(QueueSink::new(
                    "queue-auto-actions",
                    "actions.auto",
                    self.queue.clone(),
                )),
            );
            registry.register(
                SinkChannel::Urgent,
                Arc::new(QueueSink::new(
                    "queue-urgent",
                    "notifications.urgent",
                    self.queue.clone(),
                )),
            );
            Arc::new(registry)
        });

        let (shutdown_tx, _) = watch::channel(false);
        Pipeline {
            config: self.config,
            queue: self.queue,
            classifier: self.classifier,
            gate,
            sinks,
            tracker,
            dashboard,
            bus,
            scoring: self.scoring,
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dlq_topic_naming() {
        assert_eq!(AckPolicy::dlq_topic("events.scored"), "events.scored.dlq");
    }

    #[test]
    fn ack_policy_defaults_to_ack_and_drop() {
        assert_eq!(AckPolicy::default(), AckPolicy::AckAndDrop);
        let parsed: AckPolicy = serde_json::from_str("\"dead_letter_and_ack\"").unwrap();
        assert_eq!(parsed, AckPolicy::DeadLetterAndAck);
    }

    #[test]
    fn config_defaults_match_the_documented_topology() {
        let config = PipelineConfig::default();
        assert_eq!(config.scored_events_topic, "events.scored");
        assert_eq!(config.alert_consumer_group, "alert-manager");
        assert_eq!(config.incident_consumer_group, "incident-tracker");
        assert_eq!(config.dashboard_consumer_group, "dashboard");
        assert_eq!(config.min_anomaly_score, 0.1);
    }
}
