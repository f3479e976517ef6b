//! Suppression and rate state behind a trait.
//!
//! The gate's correctness rests on `admit` being a single atomic
//! read-modify-write: the suppression lookup, the rate check, and both cache
//! updates happen under one critical section per call. Implementations must
//! not interleave two `admit` calls for the same fingerprint or service, and
//! the maintenance operations (`sweep_suppression`, `reset_counters`) must
//! use the same synchronization as `admit`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::error::StoreError;

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDecision {
    /// Publish the alert; suppression entry and service counter updated.
    Pass,
    /// Duplicate within the suppression window; drop silently.
    Suppressed,
    /// Service hit its per-reset-period alert quota; drop with a log line.
    RateLimited,
}

impl GateDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            GateDecision::Pass => "pass",
            GateDecision::Suppressed => "suppressed",
            GateDecision::RateLimited => "rate_limited",
        }
    }
}

/// Point-in-time sizes of the gate's tables.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GateStats {
    pub suppression_entries: usize,
    pub tracked_services: usize,
    /// Sum of all service counters since the last reset.
    pub counted_alerts: u64,
}

#[async_trait]
pub trait GateStore: Send + Sync {
    /// Atomically decides admission for one candidate alert.
    ///
    /// When `check_suppression` is false the suppression table is neither
    /// read nor written; only the rate quota applies. A `RateLimited`
    /// outcome leaves both tables untouched.
    async fn admit(
        &self,
        fingerprint: &str,
        service_name: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_alerts_per_service: u32,
        check_suppression: bool,
    ) -> Result<GateDecision, StoreError>;

    /// Removes suppression entries last seen before `cutoff`. Returns the
    /// number of entries removed.
    async fn sweep_suppression(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;

    /// Zeroes every service counter. Returns the number of services reset.
    async fn reset_counters(&self) -> Result<usize, StoreError>;

    async fn stats(&self) -> Result<GateStats, StoreError>;
}
