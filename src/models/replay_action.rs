use serde::{Deserialize, Serialize};

/// Operation recorded in the replay log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReplayOperation {
    Navigate,
    Click,
    Fill,
    Press,
    Scroll,
    ScrollIntoView,
    Hover,
    Select,
    Wait,
}

impl ReplayOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplayOperation::Navigate => "navigate",
            ReplayOperation::Click => "click",
            ReplayOperation::Fill => "fill",
            ReplayOperation::Press => "press",
            ReplayOperation::Scroll => "scroll",
            ReplayOperation::ScrollIntoView => "scrollIntoView",
            ReplayOperation::Hover => "hover",
            ReplayOperation::Select => "select",
            ReplayOperation::Wait => "wait",
        }
    }
}

/// Profile field a form input was classified as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Name,
    Email,
    Phone,
    Address,
    City,
    State,
    Zip,
    Country,
    Linkedin,
    Github,
    Website,
    Company,
    JobTitle,
    CoverLetter,
    Summary,
    Salary,
    StartDate,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Name => "name",
            FieldType::Email => "email",
            FieldType::Phone => "phone",
            FieldType::Address => "address",
            FieldType::City => "city",
            FieldType::State => "state",
            FieldType::Zip => "zip",
            FieldType::Country => "country",
            FieldType::Linkedin => "linkedin",
            FieldType::Github => "github",
            FieldType::Website => "website",
            FieldType::Company => "company",
            FieldType::JobTitle => "job_title",
            FieldType::CoverLetter => "cover_letter",
            FieldType::Summary => "summary",
            FieldType::Salary => "salary",
            FieldType::StartDate => "start_date",
        }
    }

    /// Template expression that reads this field from a profile
    pub fn profile_expression(&self) -> String {
        format!("{{{{ profile.{} }}}}", self.as_str())
    }
}

/// How a fill value should be re-derived at replay time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ValueSource {
    /// Literal value, replayed as-is
    Static { value: String },
    /// Templated expression resolved against replay variables
    Expression { expression: String },
    /// Named profile field, with the literal seen during the run as fallback
    ProfileField {
        field_type: FieldType,
        expression: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
    /// Placeholder for a value looked up by query at replay time
    RetrievalQuery {
        query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fallback: Option<String>,
    },
}

impl ValueSource {
    pub fn field_type(&self) -> Option<FieldType> {
        match self {
            ValueSource::ProfileField { field_type, .. } => Some(*field_type),
            _ => None,
        }
    }
}

/// One successfully executed step, index-free and replayable without a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaywrightAction {
    pub operation: ReplayOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_source: Option<ValueSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PlaywrightAction {
    fn bare(operation: ReplayOperation) -> Self {
        Self {
            operation,
            selector: None,
            value: None,
            value_source: None,
            url: None,
            key: None,
            scroll_y: None,
            ms: None,
            description: None,
        }
    }

    pub fn navigate(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::bare(ReplayOperation::Navigate)
        }
    }

    pub fn click(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            ..Self::bare(ReplayOperation::Click)
        }
    }

    pub fn fill(selector: &str, value: &str, value_source: Option<ValueSource>) -> Self {
        Self {
            selector: Some(selector.to_string()),
            value: Some(value.to_string()),
            value_source,
            ..Self::bare(ReplayOperation::Fill)
        }
    }

    pub fn press(key: &str) -> Self {
        Self {
            key: Some(key.to_string()),
            ..Self::bare(ReplayOperation::Press)
        }
    }

    pub fn scroll(scroll_y: i64) -> Self {
        Self {
            scroll_y: Some(scroll_y),
            ..Self::bare(ReplayOperation::Scroll)
        }
    }

    pub fn scroll_into_view(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            ..Self::bare(ReplayOperation::ScrollIntoView)
        }
    }

    pub fn hover(selector: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            ..Self::bare(ReplayOperation::Hover)
        }
    }

    pub fn select(selector: &str, value: &str) -> Self {
        Self {
            selector: Some(selector.to_string()),
            value: Some(value.to_string()),
            ..Self::bare(ReplayOperation::Select)
        }
    }

    pub fn wait(ms: u64) -> Self {
        Self {
            ms: Some(ms),
            ..Self::bare(ReplayOperation::Wait)
        }
    }

    pub fn with_description(mut self, description: Option<&str>) -> Self {
        self.description = description.map(|d| d.to_string());
        self
    }

    /// Human-readable summary used when replay actions seed prompt history
    pub fn to_hint_string(&self) -> String {
        let mut parts = vec![self.operation.as_str().to_string()];
        if let Some(ref url) = self.url {
            parts.push(url.clone());
        }
        if let Some(ref selector) = self.selector {
            parts.push(selector.clone());
        }
        if let Some(ref value) = self.value {
            parts.push(format!("'{}'", value));
        }
        if let Some(ref key) = self.key {
            parts.push(key.clone());
        }
        if let Some(y) = self.scroll_y {
            parts.push(format!("{}px", y));
        }
        if let Some(ms) = self.ms {
            parts.push(format!("{}ms", ms));
        }
        parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_camel_case_wire_format() {
        let action = PlaywrightAction::fill(
            "input[name=\"email\"]",
            "a@b.co",
            Some(ValueSource::ProfileField {
                field_type: FieldType::Email,
                expression: FieldType::Email.profile_expression(),
                fallback: Some("a@b.co".to_string()),
            }),
        );
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["operation"], "fill");
        assert_eq!(value["valueSource"]["kind"], "profileField");
        assert_eq!(value["valueSource"]["fieldType"], "email");
        assert_eq!(value["valueSource"]["expression"], "{{ profile.email }}");
        assert!(value.get("scrollY").is_none());
    }

    #[test]
    fn test_scroll_into_view_operation_name() {
        let value = serde_json::to_value(PlaywrightAction::scroll_into_view("#footer")).unwrap();
        assert_eq!(value, json!({"operation": "scrollIntoView", "selector": "#footer"}));
    }
}
