use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use crate::browser::PageDriver;
use crate::models::{PlaywrightAction, ReplayOperation, ValueSource};

/// Longest wait a replayed action may request
const MAX_WAIT_MS: u64 = 60_000;

/// Outcome of one replayed action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayStepResult {
    pub position: usize,
    pub operation: ReplayOperation,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub success: bool,
    pub steps: Vec<ReplayStepResult>,
    pub completed: usize,
    pub failed: usize,
    /// Actions not attempted because an earlier one failed
    pub skipped: usize,
    pub elapsed_ms: u64,
}

/// Replays a recorded action log without any model
pub struct ReplayExecutor {
    timeout_ms: u64,
    continue_on_error: bool,
    variables: HashMap<String, String>,
}

impl ReplayExecutor {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            continue_on_error: false,
            variables: HashMap::new(),
        }
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Replay `actions` in order, stopping at the first failure unless
    /// configured to continue
    pub async fn replay(&self, page: &dyn PageDriver, actions: &[PlaywrightAction]) -> ReplayReport {
        let started = Instant::now();
        let mut steps = Vec::with_capacity(actions.len());

        tracing::info!("Starting replay with {} actions", actions.len());

        for (position, action) in actions.iter().enumerate() {
            let step_started = Instant::now();
            let outcome = self.execute_action(page, action).await;
            let error = outcome.err().map(|e| e.to_string());

            match &error {
                None => tracing::info!(
                    "Replay {}/{} ok: {}",
                    position + 1,
                    actions.len(),
                    action.to_hint_string()
                ),
                Some(e) => tracing::warn!(
                    "Replay {}/{} failed: {}: {}",
                    position + 1,
                    actions.len(),
                    action.to_hint_string(),
                    e
                ),
            }

            let failed = error.is_some();
            steps.push(ReplayStepResult {
                position,
                operation: action.operation,
                success: !failed,
                error,
                description: action.description.clone(),
                duration_ms: step_started.elapsed().as_millis() as u64,
            });

            if failed && !self.continue_on_error {
                break;
            }
        }

        let completed = steps.iter().filter(|s| s.success).count();
        let failed = steps.len() - completed;
        ReplayReport {
            success: failed == 0 && steps.len() == actions.len(),
            skipped: actions.len() - steps.len(),
            steps,
            completed,
            failed,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }
    }

    /// Execute a single recorded action
    pub async fn execute_action(&self, page: &dyn PageDriver, action: &PlaywrightAction) -> Result<()> {
        let timeout_ms = self.timeout_ms;
        let selector = || {
            action
                .selector
                .as_deref()
                .ok_or_else(|| anyhow!("{} action has no selector", action.operation.as_str()))
        };

        match action.operation {
            ReplayOperation::Navigate => {
                let url = action
                    .url
                    .as_deref()
                    .ok_or_else(|| anyhow!("navigate action has no url"))?;
                let url = if url.contains("{{") {
                    resolve_template(url, &self.variables)?
                } else {
                    url.to_string()
                };
                page.navigate(&url, timeout_ms).await
            }
            ReplayOperation::Click => page.click(selector()?, timeout_ms).await,
            ReplayOperation::Fill => {
                let value = self.resolve_value(action)?.unwrap_or_default();
                page.fill(selector()?, &value, timeout_ms).await
            }
            ReplayOperation::Press => {
                let key = action
                    .key
                    .as_deref()
                    .ok_or_else(|| anyhow!("press action has no key"))?;
                page.press_key(key, timeout_ms).await
            }
            ReplayOperation::Scroll => page.scroll_by(action.scroll_y.unwrap_or(0), timeout_ms).await,
            ReplayOperation::ScrollIntoView => page.scroll_into_view(selector()?, timeout_ms).await,
            ReplayOperation::Hover => page.hover(selector()?, timeout_ms).await,
            ReplayOperation::Select => {
                let value = self
                    .resolve_value(action)?
                    .ok_or_else(|| anyhow!("select action has no value"))?;
                page.select_option(selector()?, &value, timeout_ms).await
            }
            ReplayOperation::Wait => {
                let ms = action.ms.unwrap_or(0).min(MAX_WAIT_MS);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(())
            }
        }
    }

    /// Value to use for a fill or select, derived from its value source
    pub fn resolve_value(&self, action: &PlaywrightAction) -> Result<Option<String>> {
        match &action.value_source {
            None => Ok(action.value.clone()),
            Some(source) => resolve_source(source, &self.variables).map(Some),
        }
    }
}

pub fn resolve_source(source: &ValueSource, variables: &HashMap<String, String>) -> Result<String> {
    match source {
        ValueSource::Static { value } => Ok(value.clone()),
        ValueSource::Expression { expression } => resolve_template(expression, variables),
        ValueSource::ProfileField {
            expression,
            fallback,
            ..
        } => match resolve_template(expression, variables) {
            Ok(value) => Ok(value),
            Err(e) => fallback.clone().ok_or(e),
        },
        ValueSource::RetrievalQuery { query, fallback } => variables
            .get(query)
            .cloned()
            .or_else(|| fallback.clone())
            .ok_or_else(|| anyhow!("No value for retrieval query '{}'", query)),
    }
}

fn template_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").ok())
        .as_ref()
}

/// Replace `{{ key }}` placeholders. A dotted key is looked up whole first,
/// then by its last segment (`profile.email` falls back to `email`).
pub fn resolve_template(template: &str, variables: &HashMap<String, String>) -> Result<String> {
    let re = template_regex().ok_or_else(|| anyhow!("template pattern failed to compile"))?;
    let mut missing = Vec::new();

    let resolved = re.replace_all(template, |caps: &regex::Captures| {
        let key = &caps[1];
        let last = key.rsplit('.').next().unwrap_or(key);
        match variables.get(key).or_else(|| variables.get(last)) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                caps[0].to_string()
            }
        }
    });

    if missing.is_empty() {
        Ok(resolved.into_owned())
    } else {
        Err(anyhow!("Unresolved template variables: {}", missing.join(", ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldType;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_template_full_and_last_segment() {
        let v = vars(&[("profile.first_name", "Ada"), ("email", "ada@example.com")]);
        assert_eq!(
            resolve_template("{{profile.first_name}} <{{ profile.email }}>", &v).unwrap(),
            "Ada <ada@example.com>"
        );
    }

    #[test]
    fn test_resolve_template_reports_missing() {
        let err = resolve_template("{{ a }} and {{ b.c }}", &vars(&[("a", "1")]))
            .unwrap_err()
            .to_string();
        assert_eq!(err, "Unresolved template variables: b.c");
    }

    #[test]
    fn test_profile_field_falls_back_to_literal() {
        let source = ValueSource::ProfileField {
            field_type: FieldType::Email,
            expression: FieldType::Email.profile_expression(),
            fallback: Some("seen@run.com".to_string()),
        };
        assert_eq!(resolve_source(&source, &HashMap::new()).unwrap(), "seen@run.com");
        assert_eq!(
            resolve_source(&source, &vars(&[("email", "new@x.com")])).unwrap(),
            "new@x.com"
        );
    }

    #[test]
    fn test_expression_without_variable_fails() {
        let source = ValueSource::Expression {
            expression: "{{ job.title }}".to_string(),
        };
        assert!(resolve_source(&source, &HashMap::new()).is_err());
    }

    #[test]
    fn test_retrieval_query() {
        let source = ValueSource::RetrievalQuery {
            query: "years_experience".to_string(),
            fallback: None,
        };
        assert!(resolve_source(&source, &HashMap::new()).is_err());
        assert_eq!(
            resolve_source(&source, &vars(&[("years_experience", "7")])).unwrap(),
            "7"
        );
    }

    #[test]
    fn test_resolve_value_without_source_uses_literal() {
        let executor = ReplayExecutor::new(1000);
        let action = PlaywrightAction::fill("#q", "rust", None);
        assert_eq!(executor.resolve_value(&action).unwrap().as_deref(), Some("rust"));
    }
}
