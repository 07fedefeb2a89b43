use std::env;
use std::str::FromStr;

use crate::agent::executor::ExecutorConfig;
use crate::agent::navigator::effective_max_actions;
use crate::browser::{DomChangeThresholds, LaunchOptions, Viewport};
use crate::llm::{LLMConfig, LLMProvider};

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub host: String,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8765),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8765,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// Tunables of one agent run
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: usize,
    pub action_timeout_ms: u64,
    pub planning_interval: usize,
    pub max_actions: usize,
    pub delay_min_ms: u64,
    pub delay_max_ms: u64,
    pub headless: bool,
    pub proxy_url: Option<String>,
    pub persist_cookies: bool,
    pub use_vision: bool,
    /// Consecutive zero-success steps before handing over to a human
    pub escalation_threshold: usize,
    /// Consecutive failures inside one batch before the rest is dropped
    pub batch_failure_limit: usize,
    pub dom_change: DomChangeThresholds,
    /// History entries shown to the models
    pub history_window: usize,
    pub viewport: Viewport,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 25,
            action_timeout_ms: 10_000,
            planning_interval: 3,
            max_actions: 10,
            delay_min_ms: 400,
            delay_max_ms: 1200,
            headless: true,
            proxy_url: None,
            persist_cookies: false,
            use_vision: true,
            escalation_threshold: 5,
            batch_failure_limit: 3,
            dom_change: DomChangeThresholds::default(),
            history_window: 8,
            viewport: Viewport::default(),
        }
    }
}

impl AgentConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparseable values keep defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let mut config = Self {
            max_steps: parse_or(get("AUTOPILOT_MAX_STEPS"), defaults.max_steps),
            action_timeout_ms: parse_or(
                get("AUTOPILOT_ACTION_TIMEOUT_MS"),
                defaults.action_timeout_ms,
            ),
            planning_interval: parse_or(
                get("AUTOPILOT_PLANNING_INTERVAL"),
                defaults.planning_interval,
            ),
            max_actions: parse_or(get("AUTOPILOT_MAX_ACTIONS"), defaults.max_actions),
            delay_min_ms: parse_or(get("AUTOPILOT_DELAY_MIN_MS"), defaults.delay_min_ms),
            delay_max_ms: parse_or(get("AUTOPILOT_DELAY_MAX_MS"), defaults.delay_max_ms),
            headless: get("AUTOPILOT_HEADLESS")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.headless),
            proxy_url: get("AUTOPILOT_PROXY_URL"),
            persist_cookies: get("AUTOPILOT_PERSIST_COOKIES")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.persist_cookies),
            use_vision: get("AUTOPILOT_USE_VISION")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.use_vision),
            escalation_threshold: parse_or(
                get("AUTOPILOT_ESCALATION_THRESHOLD"),
                defaults.escalation_threshold,
            ),
            history_window: parse_or(get("AUTOPILOT_HISTORY_WINDOW"), defaults.history_window),
            ..defaults
        };
        config.normalize();
        config
    }

    /// Clamp values into their usable ranges
    pub fn normalize(&mut self) {
        self.max_steps = self.max_steps.max(1);
        self.planning_interval = self.planning_interval.max(1);
        self.max_actions = effective_max_actions(self.max_actions);
        self.escalation_threshold = self.escalation_threshold.max(1);
        self.batch_failure_limit = self.batch_failure_limit.max(1);
        if self.delay_max_ms < self.delay_min_ms {
            self.delay_max_ms = self.delay_min_ms;
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            action_timeout_ms: self.action_timeout_ms,
            max_consecutive_failures: self.batch_failure_limit,
            dom_change: self.dom_change,
        }
    }

    pub fn launch_options(&self, start_url: Option<&str>) -> LaunchOptions {
        LaunchOptions {
            headless: self.headless,
            proxy_url: self.proxy_url.clone(),
            viewport: self.viewport,
            start_url: start_url.map(|u| u.to_string()),
        }
    }
}

/// Model settings from `LLM_PROVIDER`, `LLM_MODEL` and the provider's key variable
pub fn llm_config_from_env() -> anyhow::Result<LLMConfig> {
    resolve_llm_config(None, None, None)
}

/// Model settings with explicit values taking precedence over the environment.
///
/// `LLM_MODEL` only applies when the provider also comes from the environment.
pub fn resolve_llm_config(
    provider: Option<&str>,
    model: Option<&str>,
    api_key: Option<&str>,
) -> anyhow::Result<LLMConfig> {
    let non_empty = |v: &String| !v.trim().is_empty();

    let explicit_provider = provider.map(|p| p.to_string()).filter(non_empty);
    let provider_from_env = explicit_provider.is_none();
    let provider = match explicit_provider.or_else(|| env::var("LLM_PROVIDER").ok().filter(non_empty)) {
        Some(p) => LLMProvider::from_str(&p)?,
        None => LLMProvider::Gemini,
    };

    let model = model
        .map(|m| m.to_string())
        .filter(non_empty)
        .or_else(|| {
            provider_from_env
                .then(|| env::var("LLM_MODEL").ok())
                .flatten()
                .filter(non_empty)
        })
        .unwrap_or_else(|| provider.default_model().to_string());

    let mut config = LLMConfig::new(provider, model);
    let key = api_key
        .map(|k| k.to_string())
        .or_else(|| env::var(provider.api_key_env_var()).ok())
        .filter(non_empty);
    if let Some(key) = key {
        config = config.with_api_key(key);
    }
    Ok(config)
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::from_lookup(|_| None);
        assert_eq!(config.max_steps, 25);
        assert_eq!(config.planning_interval, 3);
        assert_eq!(config.max_actions, 10);
        assert_eq!(config.escalation_threshold, 5);
        assert_eq!(config.batch_failure_limit, 3);
        assert_eq!(config.dom_change, DomChangeThresholds::default());
        assert!(config.headless);
        assert!(!config.persist_cookies);
    }

    #[test]
    fn test_overrides_and_clamping() {
        let config = AgentConfig::from_lookup(lookup(&[
            ("AUTOPILOT_MAX_STEPS", "7"),
            ("AUTOPILOT_MAX_ACTIONS", "40"),
            ("AUTOPILOT_HEADLESS", "false"),
            ("AUTOPILOT_DELAY_MIN_MS", "900"),
            ("AUTOPILOT_DELAY_MAX_MS", "100"),
            ("AUTOPILOT_PROXY_URL", "http://proxy:8080"),
            ("AUTOPILOT_PLANNING_INTERVAL", "zero"),
        ]));
        assert_eq!(config.max_steps, 7);
        assert_eq!(config.max_actions, 10);
        assert!(!config.headless);
        assert_eq!(config.delay_max_ms, 900);
        assert_eq!(config.proxy_url.as_deref(), Some("http://proxy:8080"));
        assert_eq!(config.planning_interval, 3);
    }

    #[test]
    fn test_explicit_llm_settings_win() {
        let config = resolve_llm_config(Some("claude"), Some("claude-x"), Some("sk-test")).unwrap();
        assert_eq!(config.provider, LLMProvider::Anthropic);
        assert_eq!(config.model, "claude-x");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));

        assert!(resolve_llm_config(Some("nope"), None, None).is_err());
    }

    #[test]
    fn test_executor_config_mirrors_agent_config() {
        let mut config = AgentConfig::default();
        config.batch_failure_limit = 2;
        config.action_timeout_ms = 500;
        let exec = config.executor_config();
        assert_eq!(exec.max_consecutive_failures, 2);
        assert_eq!(exec.action_timeout_ms, 500);
    }
}
