use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::api::state::AppState;
use crate::browser::SessionProvider;
use crate::error::{AppError, Result};
use crate::models::{GenericResponse, SessionListResponse};

pub async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.sessions.list(),
    })
}

/// Close a pooled browser session, cancelling its run first if one is active
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<GenericResponse>> {
    if state.cancel_run(&session_id) {
        // The run closes its own session on the way out
        tracing::info!("Cancelled active run for session {}", session_id);
        return Ok(Json(GenericResponse {
            status: "cancelling".to_string(),
        }));
    }

    if !state.sessions.contains(&session_id) {
        return Err(AppError::SessionNotFound(session_id));
    }

    state
        .sessions
        .close(&session_id, false)
        .await
        .map_err(|e| AppError::BrowserError(e.to_string()))?;

    Ok(Json(GenericResponse {
        status: "closed".to_string(),
    }))
}
