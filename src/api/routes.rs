use axum::{
    http::{HeaderValue, Method},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{agent, health, replay, sessions};
use super::state::AppState;

/// Origins allowed to call the sidecar; it only serves local hosts
const ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:5678",
    "http://127.0.0.1:5678",
    "http://localhost:3000",
    "http://127.0.0.1:3000",
];

pub fn create_router(state: Arc<AppState>) -> Router {
    let origins: Vec<HeaderValue> = ALLOWED_ORIGINS
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(health::health_check))
        // Agent runs
        .route("/agent/run", post(agent::run_agent))
        .route("/agent/:session_id/cancel", post(agent::cancel_run))
        // Model-free replay
        .route("/replay", post(replay::run_replay))
        // Browser sessions
        .route("/sessions", get(sessions::list_sessions))
        .route("/sessions/:session_id", delete(sessions::close_session))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
