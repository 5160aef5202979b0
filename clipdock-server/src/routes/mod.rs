use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::handlers::{active, health, jobs, targets};
use crate::infra::app_state::AppState;

/// Consumer-facing protocol routes, served at the root so sandboxed
/// panels only need the host and port.
pub fn create_protocol_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/jobs/next", get(jobs::poll_next))
        .route("/jobs/{consumer}/next", get(jobs::poll_next_for))
        .route("/jobs", post(jobs::submit))
        .route("/jobs/{id}/result", post(jobs::report_result))
        .route("/active-project", post(active::report))
        .route("/active-project/{consumer}", post(active::report_for))
}

/// Versioned admin API.
pub fn create_api_router() -> Router<AppState> {
    Router::new().nest("/api/v1", create_v1_router())
}

fn create_v1_router() -> Router<AppState> {
    Router::new()
        .route("/targets", get(targets::list_targets))
        .route("/targets", post(targets::upsert_target))
        .route("/targets/{id}", delete(targets::delete_target))
        .route("/targets/{id}/start", post(targets::start_target))
        .route("/targets/{id}/stop", post(targets::stop_target))
        .route("/targets/{id}/restart", post(targets::restart_target))
        .route("/targets/{id}/resync", post(targets::resync_target))
}
