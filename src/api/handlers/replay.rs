use axum::{extract::State, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::state::AppState;
use crate::browser::SessionProvider;
use crate::error::{AppError, Result};
use crate::models::{ReplayRequest, ReplayResponse};
use crate::replay::ReplayExecutor;

/// Replay a recorded action log. Sessions created for the request are
/// closed afterwards; a named session stays open for reuse.
pub async fn run_replay(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReplayRequest>,
) -> Result<Json<ReplayResponse>> {
    if request.actions.is_empty() {
        return Err(AppError::ValidationError("actions must not be empty".to_string()));
    }

    let ephemeral = request.session_id.is_none();
    let session_id = request
        .session_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if state.active_runs.contains_key(&session_id) {
        return Err(AppError::Conflict(session_id));
    }

    let mut config = state.agent_config.clone();
    config.headless = request.headless;
    let timeout_ms = request.action_timeout_ms.unwrap_or(config.action_timeout_ms);

    let sessions = Arc::clone(&state.sessions);
    let task = tokio::spawn(async move {
        let page = sessions
            .acquire(&session_id, &config.launch_options(None))
            .await
            .map_err(|e| AppError::BrowserError(e.to_string()))?;

        let opened = match request.start_url.as_deref() {
            Some(url) => page
                .navigate(url, timeout_ms)
                .await
                .map_err(|e| AppError::BrowserError(format!("Failed to open {}: {}", url, e))),
            None => Ok(()),
        };

        let report = match opened {
            Ok(()) => Ok(ReplayExecutor::new(timeout_ms)
                .with_variables(request.variables)
                .with_continue_on_error(request.continue_on_error)
                .replay(page.as_ref(), &request.actions)
                .await),
            Err(e) => Err(e),
        };

        if ephemeral {
            if let Err(e) = sessions.close(&session_id, false).await {
                tracing::warn!("Failed to close replay session {}: {}", session_id, e);
            }
        }

        report.map(|report| ReplayResponse { session_id, report })
    });

    let response = task
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Replay task failed: {}", e)))??;

    if !response.report.success {
        tracing::warn!(
            "Replay finished with {} failed and {} skipped actions",
            response.report.failed,
            response.report.skipped
        );
    }

    Ok(Json(response))
}
