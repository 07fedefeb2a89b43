use serde::{Deserialize, Serialize};

use super::action::ActionItem;
use super::replay_action::PlaywrightAction;

/// Correction supplied by a human before a run resumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HumanCorrection {
    /// Selector-based action executed directly
    Action { action: PlaywrightAction },
    /// Index-based action resolved against a fresh snapshot of the page
    ElementAction { action: ActionItem },
    /// Free-text guidance handed to the next navigator call
    Instruction { text: String },
}

/// Seed for a run that continues earlier work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeContext {
    #[serde(default)]
    pub previous_actions: Vec<PlaywrightAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<HumanCorrection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_url: Option<String>,
}

impl ResumeContext {
    pub fn is_empty(&self) -> bool {
        self.previous_actions.is_empty() && self.correction.is_none() && self.resume_url.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_instruction_correction_wire_format() {
        let ctx: ResumeContext = serde_json::from_value(json!({
            "resumeUrl": "https://example.com/apply",
            "correction": {"type": "instruction", "text": "Use the second address"}
        }))
        .unwrap();
        assert_eq!(
            ctx.correction,
            Some(HumanCorrection::Instruction {
                text: "Use the second address".to_string()
            })
        );
        assert!(ctx.previous_actions.is_empty());
        assert!(!ctx.is_empty());
    }

    #[test]
    fn test_element_action_correction() {
        let correction: HumanCorrection = serde_json::from_value(json!({
            "type": "elementAction",
            "action": {"click_element": {"index": 3}}
        }))
        .unwrap();
        match correction {
            HumanCorrection::ElementAction { action } => assert_eq!(action.element_index(), Some(3)),
            other => panic!("unexpected correction: {:?}", other),
        }
    }
}
