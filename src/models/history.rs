use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::{ActionItem, ElementIndex};
use super::replay_action::PlaywrightAction;

/// One attempted tactical action, kept for the whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    /// Loop step that produced the action (0 for resume seeds)
    pub step: usize,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<ElementIndex>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn from_action(
        step: usize,
        action: &ActionItem,
        selector: Option<String>,
        success: bool,
        error: Option<String>,
    ) -> Self {
        Self {
            step,
            operation: action.name().to_string(),
            index: action.element_index(),
            selector,
            value: action.value().map(|v| v.to_string()),
            success,
            error,
            timestamp: Utc::now(),
        }
    }

    /// History entry for an action carried over from an earlier run
    pub fn from_replayed(step: usize, action: &PlaywrightAction, error: Option<String>) -> Self {
        Self {
            step,
            operation: action.operation.as_str().to_string(),
            index: None,
            selector: action.selector.clone(),
            value: action
                .value
                .clone()
                .or_else(|| action.url.clone())
                .or_else(|| action.key.clone()),
            success: error.is_none(),
            error,
            timestamp: Utc::now(),
        }
    }

    /// Compact line for model prompts
    pub fn to_prompt_line(&self) -> String {
        let mut line = self.operation.clone();
        if let Some(index) = self.index {
            line.push_str(&format!(" [{}]", index));
        }
        if let Some(ref value) = self.value {
            line.push_str(&format!(" '{}'", super::action::truncate(value, 40)));
        }
        if self.success {
            line.push_str(" -> ok");
        } else {
            line.push_str(&format!(
                " -> FAILED: {}",
                self.error.as_deref().unwrap_or("unknown error")
            ));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_line_for_failure() {
        let action = ActionItem::ClickElement {
            index: 12,
            intent: None,
        };
        let record = ActionRecord::from_action(
            2,
            &action,
            None,
            false,
            Some("Element index 12 not found".to_string()),
        );
        assert_eq!(
            record.to_prompt_line(),
            "click_element [12] -> FAILED: Element index 12 not found"
        );
    }
}
