//! End-to-end tests for the alerting pipeline over the in-memory stack.
//!
//! Each test builds a full pipeline on an [`InMemoryMessageQueue`], feeds
//! scored events into `events.scored`, and observes the tiered alert
//! streams through independent consumer groups.

use std::sync::Arc;
use std::time::Duration;

use kx_core::event::{LogEvent, LogLevel, ScoredEvent};
use kx_core::gate::GateConfig;
use kx_core::messaging::{InMemoryMessageQueue, MessageQueue, Subscription};
use kx_core::pipeline::{AckPolicy, Pipeline, PipelineConfig, SCORED_EVENTS_TOPIC};
use kx_core::scoring::{ScoringStage, StaticScorer};
use kx_core::{Alert, IncidentEventType, Severity};
use tokio::time::{sleep, timeout};

fn scored_event(
    service: &str,
    host: &str,
    anomaly_type: &str,
    level: LogLevel,
    score: f64,
) -> ScoredEvent {
    let event = LogEvent::new(service, host, level, "request latency exceeded budget");
    ScoredEvent::new(event, score, anomaly_type, 0.5)
}

async fn publish_scored(queue: &Arc<InMemoryMessageQueue>, scored: &ScoredEvent) {
    let payload = serde_json::to_vec(scored).expect("encode scored event");
    queue
        .publish_with_key(SCORED_EVENTS_TOPIC, &scored.event.service_name, &payload)
        .await
        .expect("publish scored event");
}

async fn recv_alert(subscription: &mut Subscription) -> Alert {
    let message = timeout(Duration::from_secs(1), subscription.recv())
        .await
        .expect("timed out waiting for alert")
        .expect("subscription closed");
    message.deserialize().expect("decode alert")
}

async fn expect_no_message(subscription: &mut Subscription) {
    let result = timeout(Duration::from_millis(200), subscription.recv()).await;
    assert!(result.is_err(), "expected no message, got {:?}", result);
}

/// Give the pipeline's own consumers a moment to drain their copies.
async fn settle() {
    sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn storm_then_quiet_then_refire_drives_one_incident() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let mut critical_sub = queue
        .subscribe("alerts.critical", "observer")
        .await
        .expect("subscribe critical");
    let mut info_sub = queue
        .subscribe("alerts.info", "observer")
        .await
        .expect("subscribe info");

    let pipeline = Pipeline::builder(queue.clone() as Arc<dyn MessageQueue>)
        .gate_config(GateConfig {
            suppression_window_secs: 1,
            ..GateConfig::default()
        })
        .build();
    pipeline.start().await.expect("start pipeline");

    // First event: critical alert, new incident.
    publish_scored(
        &queue,
        &scored_event("api", "h1", "latency_spike", LogLevel::Error, 0.95),
    )
    .await;

    let first = recv_alert(&mut critical_sub).await;
    assert_eq!(first.severity, Severity::Critical);
    assert_eq!(first.service_name, "api");
    assert!(first.title.starts_with("CRITICAL Alert: latency_spike"));
    settle().await;

    let tracker = pipeline.tracker();
    let incident = tracker
        .get_by_alert_id(&first.alert_id)
        .await
        .expect("tracker lookup")
        .expect("incident for first alert");
    assert_eq!(incident.severity, Severity::Critical);
    assert_eq!(incident.events.len(), 1);
    assert_eq!(incident.events[0].event_type, IncidentEventType::Created);
    assert_eq!(pipeline.dashboard().history_len().await, 1);

    // Second event inside the window: same fingerprint, suppressed before
    // publication. Nothing reaches either tier and the incident is untouched.
    publish_scored(
        &queue,
        &scored_event("api", "h1", "latency_spike", LogLevel::Error, 0.96),
    )
    .await;
    expect_no_message(&mut critical_sub).await;
    expect_no_message(&mut info_sub).await;
    let unchanged = tracker
        .get(incident.id)
        .await
        .expect("tracker lookup")
        .expect("incident still present");
    assert_eq!(unchanged.events.len(), 1);

    // Let the window lapse, then refire at a quieter score. Same identity,
    // new alert id, INFO tier, and the open incident absorbs it.
    sleep(Duration::from_millis(1100)).await;
    publish_scored(
        &queue,
        &scored_event("api", "h1", "latency_spike", LogLevel::Error, 0.2),
    )
    .await;

    let third = recv_alert(&mut info_sub).await;
    assert_eq!(third.severity, Severity::Info);
    assert_eq!(third.fingerprint, first.fingerprint);
    assert_ne!(third.alert_id, first.alert_id);
    settle().await;

    let updated = tracker
        .get(incident.id)
        .await
        .expect("tracker lookup")
        .expect("incident still present");
    assert_eq!(updated.severity, Severity::Info);
    assert_eq!(updated.events.len(), 2);
    assert_eq!(updated.events[1].event_type, IncidentEventType::Escalated);
    assert!(updated.related_alerts.contains(&third.alert_id));
    assert_eq!(
        tracker.count_open().await.expect("count"),
        1,
        "refire must not open a second incident"
    );

    pipeline.shutdown().await;
}

#[tokio::test]
async fn scores_at_the_floor_never_become_alerts() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let mut critical_sub = queue
        .subscribe("alerts.critical", "observer")
        .await
        .expect("subscribe critical");
    let mut info_sub = queue
        .subscribe("alerts.info", "observer")
        .await
        .expect("subscribe info");

    let pipeline = Pipeline::builder(queue.clone() as Arc<dyn MessageQueue>).build();
    pipeline.start().await.expect("start pipeline");

    publish_scored(
        &queue,
        &scored_event("api", "h1", "noise", LogLevel::Info, 0.05),
    )
    .await;
    publish_scored(
        &queue,
        &scored_event("api", "h1", "noise", LogLevel::Info, 0.1),
    )
    .await;

    expect_no_message(&mut critical_sub).await;
    expect_no_message(&mut info_sub).await;
    assert_eq!(pipeline.dashboard().history_len().await, 0);
    assert_eq!(pipeline.tracker().count_open().await.expect("count"), 0);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn rate_limited_services_stop_publishing() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let mut critical_sub = queue
        .subscribe("alerts.critical", "observer")
        .await
        .expect("subscribe critical");

    let pipeline = Pipeline::builder(queue.clone() as Arc<dyn MessageQueue>)
        .gate_config(GateConfig {
            max_alerts_per_service: 2,
            ..GateConfig::default()
        })
        .build();
    pipeline.start().await.expect("start pipeline");

    // Distinct hosts give distinct fingerprints, so only the quota applies.
    for host in ["h1", "h2", "h3"] {
        publish_scored(
            &queue,
            &scored_event("api", host, "latency_spike", LogLevel::Error, 0.95),
        )
        .await;
    }

    recv_alert(&mut critical_sub).await;
    recv_alert(&mut critical_sub).await;
    expect_no_message(&mut critical_sub).await;

    pipeline.shutdown().await;
}

#[tokio::test]
async fn malformed_payloads_are_dead_lettered_when_configured() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let mut dlq_sub = queue
        .subscribe("events.scored.dlq", "dlq-observer")
        .await
        .expect("subscribe dlq");

    let pipeline = Pipeline::builder(queue.clone() as Arc<dyn MessageQueue>)
        .config(PipelineConfig {
            ack_policy: AckPolicy::DeadLetterAndAck,
            ..PipelineConfig::default()
        })
        .build();
    pipeline.start().await.expect("start pipeline");

    queue
        .publish(SCORED_EVENTS_TOPIC, b"not json")
        .await
        .expect("publish malformed");

    let dead = timeout(Duration::from_secs(1), dlq_sub.recv())
        .await
        .expect("timed out waiting for dead letter")
        .expect("dlq subscription closed");
    assert_eq!(dead.payload, b"not json");

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_alert_reaches_the_info_tier_and_notification_sink() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let mut info_sub = queue
        .subscribe("alerts.info", "observer")
        .await
        .expect("subscribe info");
    let mut notify_sub = queue
        .subscribe("notifications", "observer")
        .await
        .expect("subscribe notifications");

    let pipeline = Pipeline::builder(queue.clone() as Arc<dyn MessageQueue>).build();
    pipeline.start().await.expect("start pipeline");

    let published = pipeline.publish_test_alert().await.expect("test alert");
    assert_eq!(published.severity, Severity::Info);

    let streamed = recv_alert(&mut info_sub).await;
    assert_eq!(streamed.alert_id, published.alert_id);

    let notified = timeout(Duration::from_secs(1), notify_sub.recv())
        .await
        .expect("timed out waiting for notification")
        .expect("notification subscription closed");
    let notified: Alert = notified.deserialize().expect("decode notification");
    assert_eq!(notified.alert_id, published.alert_id);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn scoring_consumer_bridges_raw_events_into_alerts() {
    let queue = Arc::new(InMemoryMessageQueue::new());
    let mut critical_sub = queue
        .subscribe("alerts.critical", "observer")
        .await
        .expect("subscribe critical");

    let scorer = Arc::new(StaticScorer::new(0.95, "latency_spike", 0.5));
    let pipeline = Pipeline::builder(queue.clone() as Arc<dyn MessageQueue>)
        .scoring(ScoringStage::new(scorer, 0.5))
        .build();
    pipeline.start().await.expect("start pipeline");

    let event = LogEvent::new("api", "h1", LogLevel::Error, "connection pool exhausted");
    let payload = serde_json::to_vec(&event).expect("encode raw event");
    queue
        .publish("events.raw", &payload)
        .await
        .expect("publish raw event");

    let alert = recv_alert(&mut critical_sub).await;
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.service_name, "api");
    assert_eq!(alert.anomaly_type, "latency_spike");

    pipeline.shutdown().await;
}
