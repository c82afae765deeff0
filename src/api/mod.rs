pub mod handlers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Build the bridge router. The caller owns the outer layers (CORS,
/// request-id) so tests can mount this bare.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/oauth/init", get(handlers::oauth_init))
        .route("/oauth/status", get(handlers::oauth_status))
        .route("/oauth/callback", get(handlers::oauth_callback))
        .route("/oauth/refresh", post(handlers::oauth_refresh))
        .route("/pipelines", get(handlers::list_pipelines))
        .route("/pipelines/:name/tasks", get(handlers::pipeline_tasks))
        .route("/tasks/query", post(handlers::tasks_query))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .fallback(fallback_404)
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}
