use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::agent::AgentRunner;
use crate::api::state::AppState;
use crate::browser::SessionProvider;
use crate::config::{resolve_llm_config, AgentConfig};
use crate::error::{AppError, Result};
use crate::llm::LLMClient;
use crate::models::{AgentRunResult, GenericResponse, RunAgentRequest};

/// Run the agent to completion and return its result.
///
/// The run executes on its own task so a dropped connection does not skip
/// session cleanup.
pub async fn run_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RunAgentRequest>,
) -> Result<Json<AgentRunResult>> {
    if request.goal.trim().is_empty() {
        return Err(AppError::ValidationError("goal must not be empty".to_string()));
    }

    let config = agent_config_for(&state.agent_config, &request);
    let llm_config = resolve_llm_config(
        request.llm_provider.as_deref(),
        request.llm_model.as_deref(),
        request.api_key.as_deref(),
    )
    .map_err(|e| AppError::ValidationError(e.to_string()))?;
    let client = LLMClient::new(llm_config).map_err(|e| AppError::LLMError(e.to_string()))?;

    let session_id = request
        .session_id
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let sessions: Arc<dyn SessionProvider> = state.sessions.clone();
    let runner = AgentRunner::new(sessions, Arc::new(client), config);
    let guard = state
        .begin_run(&session_id, runner.cancel_token())
        .ok_or_else(|| AppError::Conflict(session_id.clone()))?;

    tracing::info!("Starting agent run for session {}", session_id);

    let RunAgentRequest {
        goal,
        start_url,
        resume,
        timeout_secs,
        ..
    } = request;

    let task = tokio::spawn(async move {
        let _guard = guard;
        match timeout_secs {
            Some(secs) => {
                runner
                    .run_with_timeout(
                        &goal,
                        start_url.as_deref(),
                        &session_id,
                        resume,
                        Duration::from_secs(secs),
                    )
                    .await
            }
            None => {
                runner
                    .run(&goal, start_url.as_deref(), &session_id, resume)
                    .await
            }
        }
    });

    let result = task
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Agent task failed: {}", e)))?;

    Ok(Json(result))
}

/// Cancel the active run of a session
pub async fn cancel_run(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<GenericResponse>> {
    if !state.cancel_run(&session_id) {
        return Err(AppError::SessionNotFound(session_id));
    }
    tracing::info!("Cancellation requested for session {}", session_id);
    Ok(Json(GenericResponse {
        status: "cancelling".to_string(),
    }))
}

/// Server defaults with the request's overrides applied
fn agent_config_for(defaults: &AgentConfig, request: &RunAgentRequest) -> AgentConfig {
    let mut config = defaults.clone();
    if let Some(v) = request.max_steps {
        config.max_steps = v;
    }
    if let Some(v) = request.planning_interval {
        config.planning_interval = v;
    }
    if let Some(v) = request.max_actions {
        config.max_actions = v;
    }
    if let Some(v) = request.action_timeout_ms {
        config.action_timeout_ms = v;
    }
    if let Some(v) = request.headless {
        config.headless = v;
    }
    if let Some(v) = request.use_vision {
        config.use_vision = v;
    }
    if let Some(v) = request.persist_cookies {
        config.persist_cookies = v;
    }
    if request.proxy_url.is_some() {
        config.proxy_url = request.proxy_url.clone();
    }
    config.normalize();
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_overrides() {
        let request: RunAgentRequest = serde_json::from_value(serde_json::json!({
            "goal": "check the title",
            "max_steps": 4,
            "max_actions": 99,
            "headless": false
        }))
        .unwrap();

        let config = agent_config_for(&AgentConfig::default(), &request);
        assert_eq!(config.max_steps, 4);
        assert_eq!(config.max_actions, 10);
        assert!(!config.headless);
        assert_eq!(config.planning_interval, 3);
    }
}
