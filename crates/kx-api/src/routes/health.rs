//! Health check endpoints.

use axum::{extract::State, routing::get, Json, Router};
use std::time::Instant;

use crate::dto::{
    ComponentsHealth, DashboardHealth, EventBusHealth, GateHealth, HealthResponse,
    IncidentsHealth, QueueHealthInfo,
};
use crate::state::AppState;

/// Start time for uptime calculation.
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time.
pub fn init_start_time() {
    START_TIME.get_or_init(Instant::now);
}

/// Creates health check routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(health_check_detailed))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

async fn queue_health(state: &AppState) -> QueueHealthInfo {
    match state.queue.health_check().await {
        Ok(health) => QueueHealthInfo {
            connected: health.connected,
            pending_messages: health.pending_messages,
            consumer_count: health.consumer_count,
        },
        Err(_) => QueueHealthInfo {
            connected: false,
            pending_messages: 0,
            consumer_count: 0,
        },
    }
}

/// Health check endpoint.
///
/// Returns overall system health status.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System is healthy", body = HealthResponse),
        (status = 503, description = "System is unhealthy", body = HealthResponse)
    ),
    tag = "Health"
)]
async fn health_check(
    State(state): State<AppState>,
) -> (axum::http::StatusCode, Json<HealthResponse>) {
    let queue = queue_health(&state).await;
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);

    let status = if queue.connected { "healthy" } else { "unhealthy" };
    let http_status = if queue.connected {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            queue,
            components: None,
        }),
    )
}

/// Detailed health check endpoint.
///
/// Returns comprehensive health status including all pipeline components.
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses(
        (status = 200, description = "Detailed system health", body = HealthResponse),
        (status = 503, description = "System is unhealthy", body = HealthResponse)
    ),
    tag = "Health"
)]
async fn health_check_detailed(
    State(state): State<AppState>,
) -> (axum::http::StatusCode, Json<HealthResponse>) {
    let queue = queue_health(&state).await;
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);

    let dropped_events = state.bus.dropped_count();
    let event_bus = EventBusHealth {
        subscriber_count: state.bus.subscriber_count().await,
        dropped_events,
        operational: true,
    };

    let gate_stats = state.gate.stats().await.unwrap_or_default();
    let gate = GateHealth {
        suppression_entries: gate_stats.suppression_entries,
        tracked_services: gate_stats.tracked_services,
    };

    let incidents = IncidentsHealth {
        open_incidents: state.tracker.count_open().await.unwrap_or(0),
    };

    let snapshot = state.dashboard.snapshot().await;
    let dashboard = DashboardHealth {
        history_size: state.dashboard.history_len().await,
        system_health_score: snapshot.system_health_score,
    };

    let status = determine_overall_status(
        queue.connected,
        dropped_events,
        snapshot.system_health_score,
    );

    // Return 503 if the queue is unreachable (critical dependency)
    let http_status = if queue.connected {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: uptime,
            queue,
            components: Some(ComponentsHealth {
                event_bus,
                gate,
                incidents,
                dashboard,
            }),
        }),
    )
}

/// Determine overall system status from component health.
fn determine_overall_status(
    queue_connected: bool,
    dropped_events: u64,
    system_health_score: f64,
) -> String {
    if !queue_connected {
        return "unhealthy".to_string();
    }

    if dropped_events > 0 || system_health_score < 50.0 {
        return "degraded".to_string();
    }

    "healthy".to_string()
}

/// Kubernetes readiness probe.
///
/// Returns 200 if the service is ready to accept traffic.
#[utoipa::path(
    get,
    path = "/ready",
    responses(
        (status = 200, description = "Service is ready"),
        (status = 503, description = "Service is not ready")
    ),
    tag = "Health"
)]
async fn readiness_check(State(state): State<AppState>) -> axum::http::StatusCode {
    match state.queue.health_check().await {
        Ok(health) if health.connected => axum::http::StatusCode::OK,
        _ => axum::http::StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Kubernetes liveness probe.
///
/// Returns 200 if the service is alive.
#[utoipa::path(
    get,
    path = "/live",
    responses(
        (status = 200, description = "Service is alive")
    ),
    tag = "Health"
)]
async fn liveness_check() -> axum::http::StatusCode {
    axum::http::StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    use kx_core::messaging::InMemoryMessageQueue;
    use kx_core::Pipeline;

    use crate::state::AppState;

    fn create_test_state() -> AppState {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let pipeline = Arc::new(Pipeline::builder(queue).build());
        AppState::new(pipeline)
    }

    fn create_test_router() -> Router {
        let state = create_test_state();
        Router::new().merge(routes()).with_state(state)
    }

    #[tokio::test]
    async fn test_health_check_basic() {
        let app = create_test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: HealthResponse =
            serde_json::from_slice(&body).expect("Failed to parse response");

        assert_eq!(result.status, "healthy");
        assert!(!result.version.is_empty());
        assert!(result.queue.connected);
    }

    #[tokio::test]
    async fn test_health_check_detailed() {
        let app = create_test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health/detailed")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: serde_json::Value =
            serde_json::from_slice(&body).expect("Failed to parse response");

        assert!(result.get("version").is_some());
        assert!(result.get("status").is_some());
        assert!(result.get("queue").is_some());

        let components = result.get("components").unwrap();
        assert!(components.get("event_bus").is_some());
        assert!(components.get("gate").is_some());
        assert!(components.get("incidents").is_some());
        assert!(components.get("dashboard").is_some());
    }

    #[tokio::test]
    async fn test_liveness_check() {
        let app = create_test_router();

        let response = app
            .oneshot(Request::builder().uri("/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness_check_healthy() {
        let app = create_test_router();

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_determine_overall_status() {
        // All healthy
        assert_eq!(determine_overall_status(true, 0, 100.0), "healthy");

        // Queue down
        assert_eq!(determine_overall_status(false, 0, 100.0), "unhealthy");

        // Dropped bus events
        assert_eq!(determine_overall_status(true, 3, 100.0), "degraded");

        // Low health score
        assert_eq!(determine_overall_status(true, 0, 25.0), "degraded");

        // Queue down takes priority
        assert_eq!(determine_overall_status(false, 3, 25.0), "unhealthy");
    }

    #[tokio::test]
    async fn test_health_response_includes_uptime() {
        init_start_time();
        let app = create_test_router();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let result: HealthResponse =
            serde_json::from_slice(&body).expect("Failed to parse response");

        let _ = result.uptime_seconds;
    }
}
