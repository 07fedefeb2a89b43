use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::action::ActionItem;

/// Strategic assessment produced by the planner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlannerOutput {
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub challenges: String,
    #[serde(default, deserialize_with = "de_loose_bool")]
    pub done: bool,
    #[serde(default)]
    pub next_steps: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    #[serde(default)]
    pub reasoning: String,
}

impl PlannerOutput {
    /// Output used when the model response cannot be parsed
    pub fn fallback() -> Self {
        Self {
            observation: "Planner output could not be parsed".to_string(),
            challenges: String::new(),
            done: false,
            next_steps: "Continue working toward the goal using the visible page elements."
                .to_string(),
            final_answer: None,
            reasoning: String::new(),
        }
    }
}

/// Navigator's self-assessment for the current step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    #[serde(default, alias = "evaluation_previous_goal")]
    pub evaluation: String,
    #[serde(default)]
    pub memory: String,
    #[serde(default)]
    pub next_goal: String,
}

/// Tactical batch produced by the navigator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigatorOutput {
    #[serde(default)]
    pub current_state: CurrentState,
    #[serde(default)]
    pub action: Vec<ActionItem>,
}

impl NavigatorOutput {
    /// Single short wait, used when the model response cannot be parsed
    pub fn fallback() -> Self {
        Self {
            current_state: CurrentState {
                evaluation: "Unknown".to_string(),
                memory: String::new(),
                next_goal: "Wait for the page and retry".to_string(),
            },
            action: vec![ActionItem::fallback_wait()],
        }
    }
}

/// Models sometimes answer `"done": "true"` or `"done": "yes"`
fn de_loose_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Bool(b) => b,
        Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        Value::Number(n) => n.as_i64().map(|i| i != 0).unwrap_or(false),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_planner_output_loose_done() {
        let out: PlannerOutput =
            serde_json::from_value(json!({"done": "true", "next_steps": "none"})).unwrap();
        assert!(out.done);
        assert_eq!(out.next_steps, "none");
        assert!(out.final_answer.is_none());
    }

    #[test]
    fn test_current_state_alias() {
        let state: CurrentState = serde_json::from_value(json!({
            "evaluation_previous_goal": "Success",
            "memory": "on login page",
            "next_goal": "fill email"
        }))
        .unwrap();
        assert_eq!(state.evaluation, "Success");
    }

    #[test]
    fn test_navigator_fallback_is_single_wait() {
        let out = NavigatorOutput::fallback();
        assert_eq!(out.action.len(), 1);
        assert_eq!(out.action[0].name(), "wait");
    }
}
