use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Element index as assigned by one indexing snapshot (0-based)
pub type ElementIndex = usize;

/// Default scroll distance in pixels
pub const DEFAULT_SCROLL_PX: i64 = 500;

/// A single tactical action emitted by the navigator.
///
/// Serialized externally tagged, so `{"click_element": {"index": 3}}` maps to
/// `ActionItem::ClickElement`. Exactly one key is present per action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionItem {
    ClickElement {
        #[serde(deserialize_with = "de_index")]
        index: ElementIndex,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    InputText {
        #[serde(deserialize_with = "de_index")]
        index: ElementIndex,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    GoToUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    SendKeys {
        keys: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    ScrollDown {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    ScrollUp {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    ScrollToElement {
        #[serde(deserialize_with = "de_index")]
        index: ElementIndex,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    Wait {
        #[serde(default = "default_wait_seconds")]
        seconds: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    Hover {
        #[serde(deserialize_with = "de_index")]
        index: ElementIndex,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    SelectOption {
        #[serde(deserialize_with = "de_index")]
        index: ElementIndex,
        #[serde(alias = "text", alias = "value")]
        option: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        intent: Option<String>,
    },
    Done {
        #[serde(default)]
        text: String,
        #[serde(default = "default_true")]
        success: bool,
    },
}

fn default_wait_seconds() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

/// Accept indices as integers or numeric strings ("3", "[3]")
fn de_index<'de, D>(deserializer: D) -> Result<ElementIndex, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match &value {
        Value::Number(n) => n
            .as_u64()
            .map(|i| i as ElementIndex)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid element index: {}", n))),
        Value::String(s) => s
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<ElementIndex>()
            .map_err(|_| serde::de::Error::custom(format!("invalid element index: {}", s))),
        other => Err(serde::de::Error::custom(format!(
            "invalid element index: {}",
            other
        ))),
    }
}

impl ActionItem {
    /// Short operation name, matches the serialized tag
    pub fn name(&self) -> &'static str {
        match self {
            ActionItem::ClickElement { .. } => "click_element",
            ActionItem::InputText { .. } => "input_text",
            ActionItem::GoToUrl { .. } => "go_to_url",
            ActionItem::SendKeys { .. } => "send_keys",
            ActionItem::ScrollDown { .. } => "scroll_down",
            ActionItem::ScrollUp { .. } => "scroll_up",
            ActionItem::ScrollToElement { .. } => "scroll_to_element",
            ActionItem::Wait { .. } => "wait",
            ActionItem::Hover { .. } => "hover",
            ActionItem::SelectOption { .. } => "select_option",
            ActionItem::Done { .. } => "done",
        }
    }

    /// Index of the targeted element, for element-targeted actions
    pub fn element_index(&self) -> Option<ElementIndex> {
        match self {
            ActionItem::ClickElement { index, .. }
            | ActionItem::InputText { index, .. }
            | ActionItem::ScrollToElement { index, .. }
            | ActionItem::Hover { index, .. }
            | ActionItem::SelectOption { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Literal value carried by the action (typed text, url, key, option)
    pub fn value(&self) -> Option<&str> {
        match self {
            ActionItem::InputText { text, .. } => Some(text),
            ActionItem::GoToUrl { url, .. } => Some(url),
            ActionItem::SendKeys { keys, .. } => Some(keys),
            ActionItem::SelectOption { option, .. } => Some(option),
            ActionItem::Done { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn intent(&self) -> Option<&str> {
        match self {
            ActionItem::ClickElement { intent, .. }
            | ActionItem::InputText { intent, .. }
            | ActionItem::GoToUrl { intent, .. }
            | ActionItem::SendKeys { intent, .. }
            | ActionItem::ScrollDown { intent, .. }
            | ActionItem::ScrollUp { intent, .. }
            | ActionItem::ScrollToElement { intent, .. }
            | ActionItem::Wait { intent, .. }
            | ActionItem::Hover { intent, .. }
            | ActionItem::SelectOption { intent, .. } => intent.as_deref(),
            ActionItem::Done { .. } => None,
        }
    }

    /// Short wait used when the navigator output cannot be understood
    pub fn fallback_wait() -> Self {
        ActionItem::Wait {
            seconds: 1.0,
            intent: Some("Navigator output was unreadable, waiting one step".to_string()),
        }
    }

    /// One-line description for history and prompts
    pub fn describe(&self) -> String {
        match self {
            ActionItem::ClickElement { index, .. } => format!("click_element [{}]", index),
            ActionItem::InputText { index, text, .. } => {
                format!("input_text [{}] '{}'", index, truncate(text, 40))
            }
            ActionItem::GoToUrl { url, .. } => format!("go_to_url {}", url),
            ActionItem::SendKeys { keys, .. } => format!("send_keys {}", keys),
            ActionItem::ScrollDown { amount, .. } => {
                format!("scroll_down {}px", amount.unwrap_or(DEFAULT_SCROLL_PX))
            }
            ActionItem::ScrollUp { amount, .. } => {
                format!("scroll_up {}px", amount.unwrap_or(DEFAULT_SCROLL_PX))
            }
            ActionItem::ScrollToElement { index, .. } => format!("scroll_to_element [{}]", index),
            ActionItem::Wait { seconds, .. } => format!("wait {}s", seconds),
            ActionItem::Hover { index, .. } => format!("hover [{}]", index),
            ActionItem::SelectOption { index, option, .. } => {
                format!("select_option [{}] '{}'", index, truncate(option, 40))
            }
            ActionItem::Done { text, success } => {
                format!("done (success={}) {}", success, truncate(text, 60))
            }
        }
    }
}

/// Safely truncate a string at character boundaries
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        s.chars().take(max_chars).collect::<String>() + "..."
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_externally_tagged_click() {
        let action: ActionItem =
            serde_json::from_value(json!({"click_element": {"index": 4, "intent": "open menu"}}))
                .unwrap();
        assert_eq!(
            action,
            ActionItem::ClickElement {
                index: 4,
                intent: Some("open menu".to_string())
            }
        );
        assert_eq!(action.name(), "click_element");
        assert_eq!(action.element_index(), Some(4));
    }

    #[test]
    fn test_string_index_is_accepted() {
        let action: ActionItem =
            serde_json::from_value(json!({"input_text": {"index": "[7]", "text": "hello"}})).unwrap();
        assert_eq!(action.element_index(), Some(7));
        assert_eq!(action.value(), Some("hello"));
    }

    #[test]
    fn test_select_option_aliases() {
        let action: ActionItem =
            serde_json::from_value(json!({"select_option": {"index": 2, "text": "Canada"}})).unwrap();
        assert_eq!(action.value(), Some("Canada"));
    }

    #[test]
    fn test_done_defaults_to_success() {
        let action: ActionItem = serde_json::from_value(json!({"done": {"text": "finished"}})).unwrap();
        assert_eq!(
            action,
            ActionItem::Done {
                text: "finished".to_string(),
                success: true
            }
        );
    }

    #[test]
    fn test_negative_index_rejected() {
        let result: Result<ActionItem, _> =
            serde_json::from_value(json!({"hover": {"index": -1}}));
        assert!(result.is_err());
    }
}
