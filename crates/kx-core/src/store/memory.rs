//! In-memory storage backends.
//!
//! These are the default runtime backends and the fixtures every test runs
//! against. [`InMemoryGateStore`] keeps both gate tables behind a single
//! mutex so `admit` is one critical section; [`InMemoryIncidentRepository`]
//! mirrors the semantics a document store would provide, uniqueness
//! constraint included.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::error::StoreError;
use super::gate::{GateDecision, GateStats, GateStore};
use super::incidents::{IncidentFilter, IncidentRepository};
use super::pagination::Pagination;
use crate::incident::Incident;

#[derive(Default)]
struct GateTables {
    /// fingerprint → last admitted alert time
    suppression: HashMap<String, DateTime<Utc>>,
    /// service name → alerts admitted since last reset
    counters: HashMap<String, u32>,
}

/// Gate state in process memory.
#[derive(Default)]
pub struct InMemoryGateStore {
    tables: Mutex<GateTables>,
}

impl InMemoryGateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last admitted time for a fingerprint. Test hook.
    pub async fn last_seen(&self, fingerprint: &str) -> Option<DateTime<Utc>> {
        self.tables.lock().await.suppression.get(fingerprint).copied()
    }

    /// Current counter for a service. Test hook.
    pub async fn service_count(&self, service_name: &str) -> u32 {
        self.tables
            .lock()
            .await
            .counters
            .get(service_name)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl GateStore for InMemoryGateStore {
    async fn admit(
        &self,
        fingerprint: &str,
        service_name: &str,
        now: DateTime<Utc>,
        window: Duration,
        max_alerts_per_service: u32,
        check_suppression: bool,
    ) -> Result<GateDecision, StoreError> {
        let mut tables = self.tables.lock().await;

        if check_suppression {
            if let Some(last_seen) = tables.suppression.get(fingerprint) {
                // Open upper bound: now == last_seen + window is NOT suppressed.
                if now < *last_seen + window {
                    return Ok(GateDecision::Suppressed);
                }
            }
        }

        let count = tables.counters.get(service_name).copied().unwrap_or(0);
        if count >= max_alerts_per_service {
            return Ok(GateDecision::RateLimited);
        }

        if check_suppression {
            tables.suppression.insert(fingerprint.to_string(), now);
        }
        *tables.counters.entry(service_name.to_string()).or_insert(0) += 1;

        Ok(GateDecision::Pass)
    }

    async fn sweep_suppression(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().await;
        let before = tables.suppression.len();
        tables.suppression.retain(|_, last_seen| *last_seen >= cutoff);
        Ok(before - tables.suppression.len())
    }

    async fn reset_counters(&self) -> Result<usize, StoreError> {
        let mut tables = self.tables.lock().await;
        let services = tables.counters.len();
        tables.counters.clear();
        Ok(services)
    }

    async fn stats(&self) -> Result<GateStats, StoreError> {
        let tables = self.tables.lock().await;
        Ok(GateStats {
            suppression_entries: tables.suppression.len(),
            tracked_services: tables.counters.len(),
            counted_alerts: tables.counters.values().map(|c| u64::from(*c)).sum(),
        })
    }
}

/// Incident storage in process memory.
#[derive(Default)]
pub struct InMemoryIncidentRepository {
    incidents: Arc<RwLock<HashMap<Uuid, Incident>>>,
}

impl InMemoryIncidentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_incidents(incidents: Vec<Incident>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.incidents.write().await;
            for incident in incidents {
                map.insert(incident.id, incident);
            }
        }
        repo
    }

    pub async fn len(&self) -> usize {
        self.incidents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.incidents.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.incidents.write().await.clear();
    }

    /// Snapshot of everything stored, newest first. Test hook.
    pub async fn snapshot(&self) -> Vec<Incident> {
        let map = self.incidents.read().await;
        let mut all: Vec<Incident> = map.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }
}

#[async_trait]
impl IncidentRepository for InMemoryIncidentRepository {
    async fn create(&self, incident: &Incident) -> Result<Incident, StoreError> {
        let mut map = self.incidents.write().await;
        if map.contains_key(&incident.id) {
            return Err(StoreError::constraint(format!(
                "incident {} already exists",
                incident.id
            )));
        }
        if map.values().any(|i| i.alert_id == incident.alert_id) {
            return Err(StoreError::constraint(format!(
                "incident for alert {} already exists",
                incident.alert_id
            )));
        }
        map.insert(incident.id, incident.clone());
        Ok(incident.clone())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Incident>, StoreError> {
        Ok(self.incidents.read().await.get(&id).cloned())
    }

    async fn get_by_alert_id(&self, alert_id: &str) -> Result<Option<Incident>, StoreError> {
        let map = self.incidents.read().await;
        Ok(map.values().find(|i| i.alert_id == alert_id).cloned())
    }

    async fn find_open_by_fingerprint(
        &self,
        fingerprint: &str,
    ) -> Result<Option<Incident>, StoreError> {
        let map = self.incidents.read().await;
        Ok(map
            .values()
            .filter(|i| i.fingerprint == fingerprint && !i.status.is_terminal())
            .max_by_key(|i| i.created_at)
            .cloned())
    }

    async fn list(
        &self,
        filter: &IncidentFilter,
        pagination: &Pagination,
    ) -> Result<Vec<Incident>, StoreError> {
        let map = self.incidents.read().await;
        let mut matched: Vec<Incident> = map
            .values()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit())
            .collect())
    }

    async fn count(&self, filter: &IncidentFilter) -> Result<u64, StoreError> {
        let map = self.incidents.read().await;
        Ok(map.values().filter(|i| filter.matches(i)).count() as u64)
    }

    async fn save(&self, incident: &Incident) -> Result<Incident, StoreError> {
        let mut map = self.incidents.write().await;
        if !map.contains_key(&incident.id) {
            return Err(StoreError::not_found("Incident", incident.id.to_string()));
        }
        map.insert(incident.id, incident.clone());
        Ok(incident.clone())
    }

    async fn search(
        &self,
        query: &str,
        pagination: &Pagination,
    ) -> Result<Vec<Incident>, StoreError> {
        let needle = query.to_lowercase();
        let map = self.incidents.read().await;
        let mut matched: Vec<Incident> = map
            .values()
            .filter(|i| {
                i.title.to_lowercase().contains(&needle)
                    || i.description.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matched
            .into_iter()
            .skip(pagination.offset())
            .take(pagination.limit())
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Incident>, StoreError> {
        let map = self.incidents.read().await;
        let mut all: Vec<Incident> = map.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    async fn by_correlation(&self, correlation_id: &str) -> Result<Vec<Incident>, StoreError> {
        let map = self.incidents.read().await;
        let mut matched: Vec<Incident> = map
            .values()
            .filter(|i| i.correlation_id == correlation_id)
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matched)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.incidents.write().await.remove(&id).is_some())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut map = self.incidents.write().await;
        let before = map.len();
        map.retain(|_, i| !(i.status.is_terminal() && i.created_at < cutoff));
        Ok((before - map.len()) as u64)
    }
}

// ====== Gate Store Tests ======

#[cfg(test)]
mod gate_tests {
    use super::*;

    const WINDOW: i64 = 300;

    async fn admit(
        store: &InMemoryGateStore,
        fp: &str,
        service: &str,
        now: DateTime<Utc>,
        max: u32,
    ) -> GateDecision {
        store
            .admit(fp, service, now, Duration::seconds(WINDOW), max, true)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn first_alert_passes_and_records_state() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        assert_eq!(admit(&store, "fp1", "api", now, 10).await, GateDecision::Pass);
        assert_eq!(store.last_seen("fp1").await, Some(now));
        assert_eq!(store.service_count("api").await, 1);
    }

    #[tokio::test]
    async fn duplicate_within_window_is_suppressed() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 10).await;

        let just_before = now + Duration::seconds(WINDOW) - Duration::milliseconds(1);
        assert_eq!(
            admit(&store, "fp1", "api", just_before, 10).await,
            GateDecision::Suppressed
        );
        // Suppressed alert consumes neither a cache slot nor a counter tick.
        assert_eq!(store.last_seen("fp1").await, Some(now));
        assert_eq!(store.service_count("api").await, 1);
    }

    #[tokio::test]
    async fn window_boundary_is_open() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 10).await;

        let at_boundary = now + Duration::seconds(WINDOW);
        assert_eq!(
            admit(&store, "fp1", "api", at_boundary, 10).await,
            GateDecision::Pass
        );
        assert_eq!(store.last_seen("fp1").await, Some(at_boundary));
    }

    #[tokio::test]
    async fn distinct_fingerprints_do_not_suppress_each_other() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 10).await;
        assert_eq!(admit(&store, "fp2", "api", now, 10).await, GateDecision::Pass);
    }

    #[tokio::test]
    async fn rate_limit_rejects_without_side_effects() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        assert_eq!(admit(&store, "fp1", "api", now, 2).await, GateDecision::Pass);
        assert_eq!(admit(&store, "fp2", "api", now, 2).await, GateDecision::Pass);
        assert_eq!(
            admit(&store, "fp3", "api", now, 2).await,
            GateDecision::RateLimited
        );
        assert_eq!(store.service_count("api").await, 2);
        assert_eq!(store.last_seen("fp3").await, None);
    }

    #[tokio::test]
    async fn rate_limit_is_per_service() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 1).await;
        assert_eq!(
            admit(&store, "fp2", "api", now, 1).await,
            GateDecision::RateLimited
        );
        assert_eq!(
            admit(&store, "fp3", "billing", now, 1).await,
            GateDecision::Pass
        );
    }

    #[tokio::test]
    async fn counter_reset_restarts_the_quota() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 1).await;
        assert_eq!(
            admit(&store, "fp2", "api", now, 1).await,
            GateDecision::RateLimited
        );

        assert_eq!(store.reset_counters().await.unwrap(), 1);
        assert_eq!(admit(&store, "fp2", "api", now, 1).await, GateDecision::Pass);
    }

    #[tokio::test]
    async fn suppression_disabled_skips_read_and_write() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 10).await;

        // Within the window, but this candidate opted out of suppression.
        let decision = store
            .admit("fp1", "api", now, Duration::seconds(WINDOW), 10, false)
            .await
            .unwrap();
        assert_eq!(decision, GateDecision::Pass);
        // The opted-out pass must not refresh the entry either.
        assert_eq!(store.last_seen("fp1").await, Some(now));
        assert_eq!(store.service_count("api").await, 2);
    }

    #[tokio::test]
    async fn sweep_removes_only_stale_entries() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "old", "api", now - Duration::seconds(600), 10).await;
        admit(&store, "fresh", "api", now, 10).await;

        let removed = store
            .sweep_suppression(now - Duration::seconds(WINDOW))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.last_seen("old").await, None);
        assert!(store.last_seen("fresh").await.is_some());
    }

    #[tokio::test]
    async fn stats_reflect_table_sizes() {
        let store = InMemoryGateStore::new();
        let now = Utc::now();
        admit(&store, "fp1", "api", now, 10).await;
        admit(&store, "fp2", "billing", now, 10).await;
        admit(&store, "fp3", "billing", now, 10).await;

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.suppression_entries, 3);
        assert_eq!(stats.tracked_services, 2);
        assert_eq!(stats.counted_alerts, 3);
    }
}

// ====== Incident Repository Tests ======

#[cfg(test)]
mod repo_tests {
    use super::*;
    use crate::alert::{Alert, AlertStatus, Severity};
    use crate::event::{LogEvent, LogLevel, ScoredEvent};

    fn incident(service: &str, severity: Severity) -> Incident {
        let event = LogEvent::new(service, "h1", LogLevel::Error, "boom");
        let scored = ScoredEvent::new(event, 0.9, "latency_spike", 0.5);
        let alert = Alert::from_scored_event(&scored, severity, format!("fp-{}", service));
        Incident::from_alert(&alert, Duration::days(90))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let repo = InMemoryIncidentRepository::new();
        let incident = incident("api", Severity::High);
        let created = repo.create(&incident).await.unwrap();
        let fetched = repo.get(created.id).await.unwrap().unwrap();
        assert_eq!(fetched.alert_id, incident.alert_id);
    }

    #[tokio::test]
    async fn create_enforces_alert_id_uniqueness() {
        let repo = InMemoryIncidentRepository::new();
        let first = incident("api", Severity::High);
        repo.create(&first).await.unwrap();

        let mut duplicate = incident("api", Severity::High);
        duplicate.alert_id = first.alert_id.clone();
        let err = repo.create(&duplicate).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn get_by_alert_id_finds_the_incident() {
        let repo = InMemoryIncidentRepository::new();
        let incident = incident("api", Severity::High);
        repo.create(&incident).await.unwrap();

        let found = repo.get_by_alert_id(&incident.alert_id).await.unwrap();
        assert!(found.is_some());
        assert!(repo.get_by_alert_id("ALERT-MISSING").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_open_by_fingerprint_skips_terminal() {
        let repo = InMemoryIncidentRepository::new();
        let mut closed = incident("api", Severity::High);
        closed.status = AlertStatus::Closed;
        repo.create(&closed).await.unwrap();
        assert!(repo
            .find_open_by_fingerprint(&closed.fingerprint)
            .await
            .unwrap()
            .is_none());

        let open = incident("api", Severity::High);
        repo.create(&open).await.unwrap();
        let found = repo
            .find_open_by_fingerprint(&open.fingerprint)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, open.id);
    }

    #[tokio::test]
    async fn save_requires_an_existing_incident() {
        let repo = InMemoryIncidentRepository::new();
        let ghost = incident("api", Severity::Low);
        let err = repo.save(&ghost).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn save_persists_exactly_what_was_given() {
        let repo = InMemoryIncidentRepository::new();
        let mut stored = repo.create(&incident("api", Severity::Low)).await.unwrap();
        let frozen_updated_at = stored.updated_at;
        stored.title = "edited".to_string();
        repo.save(&stored).await.unwrap();

        let fetched = repo.get(stored.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "edited");
        assert_eq!(fetched.updated_at, frozen_updated_at);
    }

    #[tokio::test]
    async fn list_filters_and_paginates_newest_first() {
        let repo = InMemoryIncidentRepository::new();
        for service in ["api", "api", "billing"] {
            repo.create(&incident(service, Severity::High)).await.unwrap();
        }

        let filter = IncidentFilter {
            service_name: Some("api".to_string()),
            ..IncidentFilter::default()
        };
        let page = repo.list(&filter, &Pagination::new(1, 10)).await.unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].created_at >= page[1].created_at);
        assert_eq!(repo.count(&filter).await.unwrap(), 2);

        let severity_filter = IncidentFilter {
            severity: Some(vec![Severity::Critical]),
            ..IncidentFilter::default()
        };
        assert_eq!(repo.count(&severity_filter).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn search_matches_title_and_description() {
        let repo = InMemoryIncidentRepository::new();
        let mut one = incident("api", Severity::High);
        one.title = "HIGH Alert: latency_spike anomaly detected in api".to_string();
        repo.create(&one).await.unwrap();

        let hits = repo.search("LATENCY", &Pagination::default()).await.unwrap();
        assert_eq!(hits.len(), 1);
        let misses = repo.search("nomatch", &Pagination::default()).await.unwrap();
        assert!(misses.is_empty());
    }

    #[tokio::test]
    async fn by_correlation_returns_oldest_first() {
        let repo = InMemoryIncidentRepository::new();
        let mut first = incident("api", Severity::High);
        first.correlation_id = "COR-SAME".to_string();
        first.created_at = Utc::now() - Duration::minutes(10);
        repo.create(&first).await.unwrap();

        let mut second = incident("billing", Severity::Low);
        second.correlation_id = "COR-SAME".to_string();
        repo.create(&second).await.unwrap();

        let related = repo.by_correlation("COR-SAME").await.unwrap();
        assert_eq!(related.len(), 2);
        assert_eq!(related[0].id, first.id);
    }

    #[tokio::test]
    async fn delete_expired_spares_non_terminal_incidents() {
        let repo = InMemoryIncidentRepository::new();
        let old = Utc::now() - Duration::days(120);

        let mut closed_old = incident("api", Severity::High);
        closed_old.status = AlertStatus::Closed;
        closed_old.created_at = old;
        repo.create(&closed_old).await.unwrap();

        let mut open_old = incident("billing", Severity::High);
        open_old.created_at = old;
        repo.create(&open_old).await.unwrap();

        let mut closed_fresh = incident("checkout", Severity::High);
        closed_fresh.status = AlertStatus::Closed;
        repo.create(&closed_fresh).await.unwrap();

        let cutoff = Utc::now() - Duration::days(90);
        assert_eq!(repo.delete_expired(cutoff).await.unwrap(), 1);
        assert_eq!(repo.len().await, 2);
        assert!(repo.get(open_old.id).await.unwrap().is_some());
        assert!(repo.get(closed_fresh.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_reports_whether_anything_was_removed() {
        let repo = InMemoryIncidentRepository::new();
        let stored = repo.create(&incident("api", Severity::Low)).await.unwrap();
        assert!(repo.delete(stored.id).await.unwrap());
        assert!(!repo.delete(stored.id).await.unwrap());
    }
}
