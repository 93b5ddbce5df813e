//! Router construction for the control plane.

use axum::{
    routing::{get, post},
    Extension, Router,
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Build the full axum router with all routes and shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tasks",
            post(handlers::tasks::create_task).get(handlers::tasks::list_tasks),
        )
        .route("/tasks/:id", get(handlers::tasks::get_task))
        .route("/tasks/:id/retry", post(handlers::tasks::retry_task))
        .route(
            "/processing-jobs",
            post(handlers::processing_jobs::create_processing_job),
        )
        .route(
            "/processing-lock",
            get(handlers::processing_lock::lock_status)
                .delete(handlers::processing_lock::release_lock),
        )
        .route("/queue-stats", get(handlers::stats::queue_stats))
        .route(
            "/recent-views",
            get(handlers::history::list_recent_views)
                .post(handlers::history::record_recent_view),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
}
