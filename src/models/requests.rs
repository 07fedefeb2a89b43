use serde::Deserialize;
use std::collections::HashMap;

use super::replay_action::PlaywrightAction;
use super::resume::ResumeContext;

/// Request to run the autonomous agent against a goal
#[derive(Debug, Deserialize)]
pub struct RunAgentRequest {
    pub goal: String,
    /// Page to open before the first step
    pub start_url: Option<String>,
    /// Reuse a pooled session; a fresh id is generated when absent
    pub session_id: Option<String>,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub api_key: Option<String>,
    pub max_steps: Option<usize>,
    pub planning_interval: Option<usize>,
    pub max_actions: Option<usize>,
    pub action_timeout_ms: Option<u64>,
    pub headless: Option<bool>,
    pub use_vision: Option<bool>,
    pub persist_cookies: Option<bool>,
    pub proxy_url: Option<String>,
    /// Wall-clock limit for the whole run
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub resume: Option<ResumeContext>,
}

/// Request to replay a recorded action log without a model
#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub actions: Vec<PlaywrightAction>,
    pub start_url: Option<String>,
    pub session_id: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default = "default_headless")]
    pub headless: bool,
    pub action_timeout_ms: Option<u64>,
}

fn default_headless() -> bool {
    true
}
