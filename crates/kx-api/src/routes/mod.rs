//! API route definitions.

pub mod alerts;
pub mod dashboard;
pub mod health;
pub mod incidents;
pub mod metrics;

use axum::Router;

use crate::state::AppState;

/// Creates the complete API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .nest("/api", api_routes())
        .merge(health::routes())
        .merge(metrics::routes())
        .with_state(state)
}

/// Creates versioned API routes.
fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/incidents", incidents::routes())
        .nest("/dashboard", dashboard::routes())
        .nest("/alerts", alerts::routes())
}
