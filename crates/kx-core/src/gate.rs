//! Suppression and rate gate.
//!
//! Sits between classification and publication: every candidate alert goes
//! through [`AlertGate::admit`], which drops duplicates inside the
//! suppression window and enforces the per-service quota. State lives in a
//! [`GateStore`] so the decision logic is backend-agnostic.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::alert::Alert;
use crate::store::{GateDecision, GateStats, GateStore, StoreError};

#[derive(Error, Debug)]
pub enum GateError {
    #[error("Gate store error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Seconds after an admitted alert during which duplicates are dropped.
    #[serde(default = "default_suppression_window_secs")]
    pub suppression_window_secs: u64,
    /// Alerts a single service may emit between counter resets.
    #[serde(default = "default_max_alerts_per_service")]
    pub max_alerts_per_service: u32,
    /// How often the suppression table is swept for stale entries.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// How often service counters are reset to zero.
    #[serde(default = "default_counter_reset_interval_secs")]
    pub counter_reset_interval_secs: u64,
}

fn default_suppression_window_secs() -> u64 {
    300
}

fn default_max_alerts_per_service() -> u32 {
    10
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_counter_reset_interval_secs() -> u64 {
    3600
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            suppression_window_secs: default_suppression_window_secs(),
            max_alerts_per_service: default_max_alerts_per_service(),
            sweep_interval_secs: default_sweep_interval_secs(),
            counter_reset_interval_secs: default_counter_reset_interval_secs(),
        }
    }
}

impl GateConfig {
    pub fn suppression_window(&self) -> Duration {
        Duration::seconds(self.suppression_window_secs as i64)
    }
}

/// Decides which candidate alerts proceed to publication.
pub struct AlertGate {
    config: GateConfig,
    store: Arc<dyn GateStore>,
}

impl AlertGate {
    pub fn new(config: GateConfig, store: Arc<dyn GateStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Admission check against the current clock.
    pub async fn admit(&self, alert: &Alert) -> Result<GateDecision, GateError> {
        self.admit_at(alert, Utc::now()).await
    }

    /// Admission check at an explicit instant. The suppression check is
    /// skipped entirely when the alert opted out of deduplication.
    #[instrument(skip(self, alert, now), fields(fingerprint = %alert.fingerprint, service = %alert.service_name))]
    pub async fn admit_at(
        &self,
        alert: &Alert,
        now: DateTime<Utc>,
    ) -> Result<GateDecision, GateError> {
        let decision = self
            .store
            .admit(
                &alert.fingerprint,
                &alert.service_name,
                now,
                self.config.suppression_window(),
                self.config.max_alerts_per_service,
                alert.suppress_duplicates,
            )
            .await?;

        match decision {
            GateDecision::Pass => {
                debug!(
                    alert_id = %alert.alert_id,
                    service = %alert.service_name,
                    severity = %alert.severity,
                    "alert admitted"
                );
                metrics::counter!(
                    "kx_alerts_admitted_total",
                    "severity" => alert.severity.as_str()
                )
                .increment(1);
            }
            GateDecision::Suppressed => {
                debug!(
                    fingerprint = %alert.fingerprint,
                    service = %alert.service_name,
                    "duplicate alert suppressed"
                );
                metrics::counter!("kx_alerts_suppressed_total").increment(1);
            }
            GateDecision::RateLimited => {
                warn!(
                    service = %alert.service_name,
                    max = self.config.max_alerts_per_service,
                    "alert rate limit reached for service"
                );
                metrics::counter!("kx_alerts_rate_limited_total").increment(1);
            }
        }

        Ok(decision)
    }

    /// Removes suppression entries older than the window.
    pub async fn sweep_suppression(&self) -> Result<usize, GateError> {
        let cutoff = Utc::now() - self.config.suppression_window();
        let removed = self.store.sweep_suppression(cutoff).await?;
        if removed > 0 {
            debug!(removed, "swept stale suppression entries");
        }
        Ok(removed)
    }

    pub async fn reset_counters(&self) -> Result<usize, GateError> {
        let services = self.store.reset_counters().await?;
        debug!(services, "service alert counters reset");
        Ok(services)
    }

    pub async fn stats(&self) -> Result<GateStats, GateError> {
        let stats = self.store.stats().await?;
        metrics::gauge!("kx_gate_suppression_entries").set(stats.suppression_entries as f64);
        metrics::gauge!("kx_gate_tracked_services").set(stats.tracked_services as f64);
        Ok(stats)
    }
}
