// [[EKO]]/apps/studio-server/src/server/mod.rs
// Purpose: HTTP surface. Route table and middleware stack.
// Architecture: API Layer
// Dependencies: Axum, Tower, tower-http

pub mod handlers;

use axum::{
    Router,
    routing::{get, post},
    http::Method,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;

use crate::runtime::StudioRuntime;

pub fn router(runtime: Arc<StudioRuntime>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/tasks/start", post(handlers::start_task))
        .route("/tasks/:task_id", get(handlers::get_task))
        .route("/ws/tasks/:task_id", get(handlers::ws_task_stream))
        .route("/logs", get(handlers::list_logs))
        .route("/logs/:file/summary", get(handlers::get_log_summary))
        .route("/ws/replay", get(handlers::ws_replay_stream))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(runtime)
}
