//! Rolling dashboard aggregation.
//!
//! The aggregator consumes the alert stream independently of the incident
//! tracker: it keeps a bounded most-recent-first history, running counters,
//! and per-minute buckets, and derives snapshots on demand. Nothing here is
//! persisted; a restart starts counting from zero.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::alert::{Alert, Severity};
use crate::events::{EventBus, PipelineEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Alerts kept in the rolling history.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Seconds between periodic snapshot broadcasts.
    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
}

fn default_history_capacity() -> usize {
    1000
}

fn default_snapshot_interval_secs() -> u64 {
    30
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            snapshot_interval_secs: default_snapshot_interval_secs(),
        }
    }
}

/// Per-service health verdict derived from the alert history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Critical,
}

/// One per-minute bucket of the alert rate series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendPoint {
    pub minute: DateTime<Utc>,
    pub count: u64,
}

/// Alert volume over the trailing windows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertTrends {
    pub last_5_minutes: u64,
    pub last_15_minutes: u64,
    pub last_30_minutes: u64,
    pub last_hour: u64,
}

/// Count of alerts attributed to one service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCount {
    pub service: String,
    pub count: u64,
}

/// Point-in-time dashboard snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub total_alerts: u64,
    pub alerts_by_severity: HashMap<String, u64>,
    pub alerts_by_service: HashMap<String, u64>,
    pub alerts_by_status: HashMap<String, u64>,
    pub alerts_last_5_minutes: u64,
    pub alerts_last_hour: u64,
    pub alerts_last_24_hours: u64,
    pub average_score_by_service: HashMap<String, f64>,
    /// 0 (everything on fire) to 100 (quiet).
    pub system_health_score: f64,
    pub service_status: HashMap<String, ServiceStatus>,
    /// Per-minute alert counts over the last 24 hours, oldest first.
    pub alerts_per_minute: Vec<TrendPoint>,
    pub trends: AlertTrends,
    /// Up to five busiest services, descending.
    pub top_services: Vec<ServiceCount>,
    pub generated_at: DateTime<Utc>,
}

/// Compact variant for the summary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_alerts: u64,
    pub critical_alerts: u64,
    pub system_health_score: f64,
    pub recent_alerts: Vec<Alert>,
    pub top_services: Vec<ServiceCount>,
    pub generated_at: DateTime<Utc>,
}

/// `clamp(100 - 20*critical - 10*high, 0, 100)` over whole-history counts.
pub fn health_score(critical_count: u64, high_count: u64) -> f64 {
    (100.0 - 20.0 * critical_count as f64 - 10.0 * high_count as f64).clamp(0.0, 100.0)
}

#[derive(Default)]
struct DashboardState {
    /// Most recent first; bounded by `history_capacity`.
    history: VecDeque<Alert>,
    total_alerts: u64,
    by_severity: HashMap<String, u64>,
    by_service: HashMap<String, u64>,
    by_status: HashMap<String, u64>,
    score_sum_by_service: HashMap<String, f64>,
    /// Minute-truncated timestamp → alert count, pruned to 24 hours.
    minute_buckets: BTreeMap<DateTime<Utc>, u64>,
}

/// Shared aggregation state behind one lock.
pub struct DashboardAggregator {
    config: DashboardConfig,
    state: RwLock<DashboardState>,
    bus: Arc<EventBus>,
}

impl DashboardAggregator {
    pub fn new(config: DashboardConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config,
            state: RwLock::new(DashboardState::default()),
            bus,
        }
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Ingests one alert: history insert, counter updates, then a
    /// non-blocking push of the alert and a fresh snapshot to subscribers.
    pub async fn record(&self, alert: &Alert) {
        {
            let mut state = self.state.write().await;

            state.history.push_front(alert.clone());
            while state.history.len() > self.config.history_capacity {
                state.history.pop_back();
            }

            state.total_alerts += 1;
            *state
                .by_severity
                .entry(alert.severity.as_str().to_string())
                .or_insert(0) += 1;
            *state
                .by_service
                .entry(alert.service_name.clone())
                .or_insert(0) += 1;
            *state
                .by_status
                .entry(alert.status.as_str().to_string())
                .or_insert(0) += 1;
            *state
                .score_sum_by_service
                .entry(alert.service_name.clone())
                .or_insert(0.0) += alert.anomaly_score;

            let minute = truncate_to_minute(alert.created_at);
            *state.minute_buckets.entry(minute).or_insert(0) += 1;
            let horizon = Utc::now() - Duration::hours(24);
            state.minute_buckets.retain(|bucket, _| *bucket >= horizon);

            metrics::gauge!("kx_dashboard_history_size").set(state.history.len() as f64);
        }

        let snapshot = self.snapshot().await;
        debug!(
            alert_id = %alert.alert_id,
            health = snapshot.system_health_score,
            "dashboard updated"
        );
        self.bus
            .publish(PipelineEvent::AlertRecorded {
                alert: alert.clone(),
            })
            .await;
        self.bus
            .publish(PipelineEvent::MetricsUpdated { metrics: snapshot })
            .await;
    }

    /// Builds a snapshot from the current state.
    pub async fn snapshot(&self) -> DashboardMetrics {
        let state = self.state.read().await;
        let now = Utc::now();

        let in_window = |cutoff: DateTime<Utc>| -> u64 {
            state
                .history
                .iter()
                .filter(|a| a.created_at >= cutoff)
                .count() as u64
        };

        let critical_in_history = state
            .history
            .iter()
            .filter(|a| a.severity == Severity::Critical)
            .count() as u64;
        let high_in_history = state
            .history
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count() as u64;

        let mut service_status: HashMap<String, ServiceStatus> = HashMap::new();
        for alert in &state.history {
            let entry = service_status
                .entry(alert.service_name.clone())
                .or_insert(ServiceStatus::Healthy);
            match alert.severity {
                Severity::Critical => *entry = ServiceStatus::Critical,
                Severity::High if *entry != ServiceStatus::Critical => {
                    *entry = ServiceStatus::Degraded;
                }
                _ => {}
            }
        }

        let average_score_by_service: HashMap<String, f64> = state
            .score_sum_by_service
            .iter()
            .filter_map(|(service, sum)| {
                state
                    .by_service
                    .get(service)
                    .filter(|count| **count > 0)
                    .map(|count| (service.clone(), sum / *count as f64))
            })
            .collect();

        let mut top_services: Vec<ServiceCount> = state
            .by_service
            .iter()
            .map(|(service, count)| ServiceCount {
                service: service.clone(),
                count: *count,
            })
            .collect();
        top_services.sort_by(|a, b| b.count.cmp(&a.count).then(a.service.cmp(&b.service)));
        top_services.truncate(5);

        let alerts_per_minute = state
            .minute_buckets
            .iter()
            .map(|(minute, count)| TrendPoint {
                minute: *minute,
                count: *count,
            })
            .collect();

        let score = health_score(critical_in_history, high_in_history);
        metrics::gauge!("kx_system_health_score").set(score);

        DashboardMetrics {
            total_alerts: state.total_alerts,
            alerts_by_severity: state.by_severity.clone(),
            alerts_by_service: state.by_service.clone(),
            alerts_by_status: state.by_status.clone(),
            alerts_last_5_minutes: in_window(now - Duration::minutes(5)),
            alerts_last_hour: in_window(now - Duration::hours(1)),
            alerts_last_24_hours: in_window(now - Duration::hours(24)),
            average_score_by_service,
            system_health_score: score,
            service_status,
            alerts_per_minute,
            trends: AlertTrends {
                last_5_minutes: in_window(now - Duration::minutes(5)),
                last_15_minutes: in_window(now - Duration::minutes(15)),
                last_30_minutes: in_window(now - Duration::minutes(30)),
                last_hour: in_window(now - Duration::hours(1)),
            },
            top_services,
            generated_at: now,
        }
    }

    /// Compact summary with the ten newest alerts.
    pub async fn summary(&self) -> DashboardSummary {
        let snapshot = self.snapshot().await;
        let recent = self.recent(10).await;
        DashboardSummary {
            total_alerts: snapshot.total_alerts,
            critical_alerts: snapshot
                .alerts_by_severity
                .get(Severity::Critical.as_str())
                .copied()
                .unwrap_or(0),
            system_health_score: snapshot.system_health_score,
            recent_alerts: recent,
            top_services: snapshot.top_services,
            generated_at: snapshot.generated_at,
        }
    }

    /// The `limit` newest alerts.
    pub async fn recent(&self, limit: usize) -> Vec<Alert> {
        let state = self.state.read().await;
        state.history.iter().take(limit).cloned().collect()
    }

    /// The `limit` newest alerts for one service.
    pub async fn alerts_for_service(&self, service_name: &str, limit: usize) -> Vec<Alert> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .filter(|a| a.service_name == service_name)
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn service_statuses(&self) -> HashMap<String, ServiceStatus> {
        self.snapshot().await.service_status
    }

    pub async fn history_len(&self) -> usize {
        self.state.read().await.history.len()
    }

    /// Broadcasts a fresh snapshot to push subscribers.
    pub async fn broadcast_snapshot(&self) {
        let snapshot = self.snapshot().await;
        self.bus
            .publish(PipelineEvent::MetricsUpdated { metrics: snapshot })
            .await;
    }
}

fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(at)
}
