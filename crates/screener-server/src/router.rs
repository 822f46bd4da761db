//! Router construction for the screening server.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::SharedState;

/// Build the full axum router with all routes and middleware.
pub fn build_router(state: SharedState) -> Router {
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/upload", post(handlers::upload::upload))
        .route(
            "/api/filter",
            get(handlers::filter::get_filter).post(handlers::filter::set_filter),
        )
        .route("/api/process", post(handlers::process::process))
        .route("/api/status/:job_id", get(handlers::jobs::status))
        .route("/api/download/:job_id", get(handlers::jobs::download))
        .route("/api/jobs", get(handlers::jobs::list_jobs))
        .route("/api/events", get(handlers::events::events))
        .layer(DefaultBodyLimit::max(upload_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
