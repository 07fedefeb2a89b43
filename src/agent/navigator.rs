use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;

use super::message_builder::UserMessageBuilder;
use crate::browser::ElementSnapshot;
use crate::llm::prompts::NAVIGATOR_SYSTEM_PROMPT;
use crate::llm::{parse_lenient, ChatModel, PromptMessage};
use crate::models::{ActionItem, ActionRecord, CurrentState, NavigatorOutput};

/// Hard upper bound on actions per navigator call
pub const MAX_ACTIONS_CEILING: usize = 10;

pub fn effective_max_actions(requested: usize) -> usize {
    requested.clamp(1, MAX_ACTIONS_CEILING)
}

/// Inputs for one navigator call
pub struct NavigatorRequest<'a> {
    pub goal: &'a str,
    pub directive: Option<&'a str>,
    pub url: &'a str,
    pub title: &'a str,
    pub snapshot: &'a ElementSnapshot,
    pub history: &'a [ActionRecord],
    /// Highlighted screenshot, base64 PNG
    pub screenshot: Option<String>,
    pub max_actions: usize,
    pub instruction: Option<&'a str>,
    pub step: usize,
    pub max_steps: usize,
}

/// Tactical layer: turns the directive into a bounded batch of actions
pub struct Navigator {
    model: Arc<dyn ChatModel>,
    history_window: usize,
}

impl Navigator {
    pub fn new(model: Arc<dyn ChatModel>, history_window: usize) -> Self {
        Self {
            model,
            history_window,
        }
    }

    pub async fn navigate(&self, request: NavigatorRequest<'_>) -> Result<NavigatorOutput> {
        let max_actions = effective_max_actions(request.max_actions);

        let user = UserMessageBuilder::new(request.goal)
            .with_directive(request.directive)
            .with_instruction(request.instruction)
            .with_history(request.history, self.history_window)
            .with_step(request.step, request.max_steps)
            .with_max_actions(max_actions)
            .with_browser_state(request.url, request.title, request.snapshot)
            .build();

        let response = self
            .model
            .chat(vec![
                PromptMessage::system(NAVIGATOR_SYSTEM_PROMPT),
                PromptMessage::user(user).with_image(request.screenshot),
            ])
            .await?;

        Ok(parse_output(&response, max_actions))
    }
}

/// Parse a navigator response, dropping unusable action items and capping
/// the batch. Falls back to a single wait when nothing usable remains.
pub fn parse_output(text: &str, max_actions: usize) -> NavigatorOutput {
    let value = match parse_lenient::<Value>(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Navigator output unparseable, using fallback: {}", e);
            return NavigatorOutput::fallback();
        }
    };

    let (current_state, raw_actions) = split_output(value);

    let mut actions: Vec<ActionItem> = raw_actions
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<ActionItem>(raw.clone()) {
            Ok(action) => Some(action),
            Err(e) => {
                tracing::warn!("Skipping invalid navigator action {}: {}", raw, e);
                None
            }
        })
        .collect();

    if actions.is_empty() {
        tracing::warn!("Navigator returned no usable actions, using fallback");
        return NavigatorOutput {
            current_state,
            ..NavigatorOutput::fallback()
        };
    }

    let cap = effective_max_actions(max_actions);
    if actions.len() > cap {
        tracing::debug!("Truncating navigator batch from {} to {}", actions.len(), cap);
        actions.truncate(cap);
    }

    NavigatorOutput {
        current_state,
        action: actions,
    }
}

/// Accepts `{current_state, action: [...]}`, `{action: {...}}`, a bare
/// array of actions, or a single bare action object
fn split_output(value: Value) -> (CurrentState, Vec<Value>) {
    match value {
        Value::Array(items) => (CurrentState::default(), items),
        Value::Object(mut map) => {
            let current_state = map
                .remove("current_state")
                .and_then(|s| serde_json::from_value(s).ok())
                .unwrap_or_default();

            match map.remove("action").or_else(|| map.remove("actions")) {
                Some(Value::Array(items)) => (current_state, items),
                Some(single @ Value::Object(_)) => (current_state, vec![single]),
                Some(_) => (current_state, Vec::new()),
                None if !map.is_empty() => (current_state, vec![Value::Object(map)]),
                None => (current_state, Vec::new()),
            }
        }
        _ => (CurrentState::default(), Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_batch() {
        let out = parse_output(
            r#"{"current_state": {"evaluation": "Success", "memory": "", "next_goal": "log in"},
                "action": [
                    {"input_text": {"index": 2, "text": "me@example.com"}},
                    {"click_element": {"index": "[5]", "intent": "submit"}}
                ]}"#,
            10,
        );
        assert_eq!(out.current_state.next_goal, "log in");
        assert_eq!(out.action.len(), 2);
        assert_eq!(out.action[1].element_index(), Some(5));
    }

    #[test]
    fn test_truncates_to_ceiling() {
        let items: Vec<String> = (0..25)
            .map(|i| format!(r#"{{"click_element": {{"index": {}}}}}"#, i))
            .collect();
        let text = format!(r#"{{"action": [{}]}}"#, items.join(","));

        assert_eq!(parse_output(&text, 25).action.len(), MAX_ACTIONS_CEILING);
        assert_eq!(parse_output(&text, 4).action.len(), 4);
    }

    #[test]
    fn test_skips_invalid_items() {
        let out = parse_output(
            r#"{"action": [{"teleport": {"to": "moon"}}, {"wait": {"seconds": 2}}]}"#,
            10,
        );
        assert_eq!(out.action.len(), 1);
        assert_eq!(out.action[0].name(), "wait");
    }

    #[test]
    fn test_single_action_object() {
        let out = parse_output(r#"{"go_to_url": {"url": "https://example.com"}}"#, 10);
        assert_eq!(out.action.len(), 1);
        assert_eq!(out.action[0].value(), Some("https://example.com"));
    }

    #[test]
    fn test_malformed_falls_back_to_wait() {
        let out = parse_output("Let me click the button.", 10);
        assert_eq!(out.action, vec![ActionItem::fallback_wait()]);
    }

    #[test]
    fn test_effective_max_actions() {
        assert_eq!(effective_max_actions(0), 1);
        assert_eq!(effective_max_actions(3), 3);
        assert_eq!(effective_max_actions(50), MAX_ACTIONS_CEILING);
    }
}
