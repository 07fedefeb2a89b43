use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::field_inference::value_source_for;
use crate::browser::{
    has_significant_dom_change, index_elements, DomChangeThresholds, ElementSnapshot,
    IndexedElement, PageDriver,
};
use crate::models::action::truncate;
use crate::models::{ActionItem, ElementIndex, PlaywrightAction, DEFAULT_SCROLL_PX};

/// Longest wait the navigator may request
const MAX_WAIT_SECS: f64 = 30.0;

/// Budget for reading a click target's label before clicking it
const DESCRIBE_TIMEOUT_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub action_timeout_ms: u64,
    /// Consecutive failures inside one batch before the rest is dropped
    pub max_consecutive_failures: usize,
    pub dom_change: DomChangeThresholds,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            action_timeout_ms: 10_000,
            max_consecutive_failures: 3,
            dom_change: DomChangeThresholds::default(),
        }
    }
}

/// Outcome of one executed action
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub action: ActionItem,
    /// Selector the index resolved to, for element-targeted actions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set by a `done` action; ends the run
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub done_success: bool,
    /// Replay entry, present only on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<PlaywrightAction>,
}

impl ActionResult {
    fn success(
        action: &ActionItem,
        selector: Option<String>,
        content: impl Into<String>,
        replay: Option<PlaywrightAction>,
    ) -> Self {
        Self {
            action: action.clone(),
            selector,
            success: true,
            error: None,
            content: Some(content.into()),
            is_done: false,
            done_success: false,
            replay,
        }
    }

    fn error(action: &ActionItem, selector: Option<String>, error: impl Into<String>) -> Self {
        Self {
            action: action.clone(),
            selector,
            success: false,
            error: Some(error.into()),
            content: None,
            is_done: false,
            done_success: false,
            replay: None,
        }
    }

    fn done(action: &ActionItem, text: &str, success: bool) -> Self {
        Self {
            action: action.clone(),
            selector: None,
            success: true,
            error: None,
            content: Some(text.to_string()),
            is_done: true,
            done_success: success,
            replay: None,
        }
    }
}

/// Why a batch stopped before running every action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStop {
    Completed,
    Done,
    DomChanged,
    TooManyFailures,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub results: Vec<ActionResult>,
    pub stop: BatchStop,
}

impl BatchOutcome {
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn done(&self) -> Option<&ActionResult> {
        self.results.iter().find(|r| r.is_done)
    }

    pub fn last_error(&self) -> Option<&str> {
        self.results.iter().rev().find_map(|r| r.error.as_deref())
    }
}

/// Runs navigator batches against a live page
pub struct ActionExecutor {
    config: ExecutorConfig,
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `actions` in order. Indices resolve against `snapshot`, the
    /// snapshot the navigator saw. Before every action after the first the
    /// page is re-indexed, and the batch stops if it drifted too far.
    pub async fn execute_batch(
        &self,
        page: &dyn PageDriver,
        actions: &[ActionItem],
        snapshot: &ElementSnapshot,
    ) -> BatchOutcome {
        let mut results = Vec::with_capacity(actions.len());
        let mut consecutive_failures = 0;

        for (i, action) in actions.iter().enumerate() {
            if i > 0 && self.page_drifted(page, snapshot).await {
                tracing::info!(
                    "Page changed after {} of {} actions, dropping the rest",
                    i,
                    actions.len()
                );
                return BatchOutcome {
                    results,
                    stop: BatchStop::DomChanged,
                };
            }

            let result = self.execute_action(page, action, snapshot).await;

            if result.success {
                tracing::info!("✓ {}", action.describe());
                consecutive_failures = 0;
            } else {
                tracing::warn!(
                    "✗ {}: {}",
                    action.describe(),
                    result.error.as_deref().unwrap_or("unknown error")
                );
                consecutive_failures += 1;
            }

            let is_done = result.is_done;
            results.push(result);

            if is_done {
                return BatchOutcome {
                    results,
                    stop: BatchStop::Done,
                };
            }

            if consecutive_failures >= self.config.max_consecutive_failures {
                tracing::warn!(
                    "{} consecutive failures in batch, dropping the rest",
                    consecutive_failures
                );
                return BatchOutcome {
                    results,
                    stop: BatchStop::TooManyFailures,
                };
            }
        }

        BatchOutcome {
            results,
            stop: BatchStop::Completed,
        }
    }

    /// A page that cannot be re-indexed counts as changed
    async fn page_drifted(&self, page: &dyn PageDriver, original: &ElementSnapshot) -> bool {
        match index_elements(page, self.config.action_timeout_ms).await {
            Ok(current) => has_significant_dom_change(
                &original.elements,
                &current.elements,
                &self.config.dom_change,
            ),
            Err(e) => {
                tracing::warn!("Re-index failed mid-batch: {}", e);
                true
            }
        }
    }

    /// Execute one action; failures are reported in the result, never raised
    pub async fn execute_action(
        &self,
        page: &dyn PageDriver,
        action: &ActionItem,
        snapshot: &ElementSnapshot,
    ) -> ActionResult {
        if let ActionItem::Done { text, success } = action {
            return ActionResult::done(action, text, *success);
        }

        let element = match action.element_index() {
            Some(index) => match resolve(snapshot, index) {
                Ok(el) => Some(el),
                Err(e) => return ActionResult::error(action, None, e.to_string()),
            },
            None => None,
        };
        let selector = element.map(|el| el.selector.clone());

        match self.dispatch(page, action, element).await {
            Ok((content, replay)) => ActionResult::success(
                action,
                selector,
                content,
                Some(replay.with_description(action.intent())),
            ),
            Err(e) => ActionResult::error(action, selector, e.to_string()),
        }
    }

    /// Live text and link target of an element, read before the click can
    /// navigate away. Empty when neither is available.
    async fn describe_target(&self, page: &dyn PageDriver, selector: &str) -> String {
        let timeout_ms = self.config.action_timeout_ms.min(DESCRIBE_TIMEOUT_MS);
        let text = page
            .get_text(selector, timeout_ms)
            .await
            .ok()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty());
        let href = page
            .get_attribute(selector, "href", timeout_ms)
            .await
            .ok()
            .flatten()
            .filter(|h| !h.is_empty());

        match (text, href) {
            (Some(text), Some(href)) => format!(" \"{}\" -> {}", truncate(&text, 60), href),
            (Some(text), None) => format!(" \"{}\"", truncate(&text, 60)),
            (None, Some(href)) => format!(" -> {}", href),
            (None, None) => String::new(),
        }
    }

    async fn dispatch(
        &self,
        page: &dyn PageDriver,
        action: &ActionItem,
        element: Option<&IndexedElement>,
    ) -> Result<(String, PlaywrightAction)> {
        let timeout_ms = self.config.action_timeout_ms;
        let target = || {
            element
                .map(|el| el.selector.as_str())
                .ok_or_else(|| anyhow!("{} needs an element", action.name()))
        };

        match action {
            ActionItem::ClickElement { index, .. } => {
                let selector = target()?;
                let label = self.describe_target(page, selector).await;
                page.click(selector, timeout_ms).await?;
                Ok((
                    format!("Clicked element [{}]{}", index, label),
                    PlaywrightAction::click(selector),
                ))
            }
            ActionItem::InputText { index, text, .. } => {
                let selector = target()?;
                page.fill(selector, text, timeout_ms).await?;
                let source = element.and_then(|el| value_source_for(el, text));
                Ok((
                    format!("Typed into element [{}]", index),
                    PlaywrightAction::fill(selector, text, source),
                ))
            }
            ActionItem::GoToUrl { url, .. } => {
                page.navigate(url, timeout_ms).await?;
                Ok((format!("Navigated to {}", url), PlaywrightAction::navigate(url)))
            }
            ActionItem::SendKeys { keys, .. } => {
                page.press_key(keys, timeout_ms).await?;
                Ok((format!("Pressed {}", keys), PlaywrightAction::press(keys)))
            }
            ActionItem::ScrollDown { amount, .. } => {
                let px = amount.unwrap_or(DEFAULT_SCROLL_PX).abs();
                page.scroll_by(px, timeout_ms).await?;
                Ok((format!("Scrolled down {}px", px), PlaywrightAction::scroll(px)))
            }
            ActionItem::ScrollUp { amount, .. } => {
                let px = -amount.unwrap_or(DEFAULT_SCROLL_PX).abs();
                page.scroll_by(px, timeout_ms).await?;
                Ok((format!("Scrolled up {}px", -px), PlaywrightAction::scroll(px)))
            }
            ActionItem::ScrollToElement { index, .. } => {
                let selector = target()?;
                page.scroll_into_view(selector, timeout_ms).await?;
                Ok((
                    format!("Scrolled to element [{}]", index),
                    PlaywrightAction::scroll_into_view(selector),
                ))
            }
            ActionItem::Wait { seconds, .. } => {
                let secs = if seconds.is_finite() {
                    seconds.clamp(0.0, MAX_WAIT_SECS)
                } else {
                    0.0
                };
                tokio::time::sleep(Duration::from_secs_f64(secs)).await;
                Ok((
                    format!("Waited {}s", secs),
                    PlaywrightAction::wait((secs * 1000.0) as u64),
                ))
            }
            ActionItem::Hover { index, .. } => {
                let selector = target()?;
                page.hover(selector, timeout_ms).await?;
                Ok((
                    format!("Hovered over element [{}]", index),
                    PlaywrightAction::hover(selector),
                ))
            }
            ActionItem::SelectOption { index, option, .. } => {
                let selector = target()?;
                page.select_option(selector, option, timeout_ms).await?;
                Ok((
                    format!("Selected '{}' in element [{}]", option, index),
                    PlaywrightAction::select(selector, option),
                ))
            }
            ActionItem::Done { .. } => Err(anyhow!("done is handled before dispatch")),
        }
    }
}

fn resolve(snapshot: &ElementSnapshot, index: ElementIndex) -> Result<&IndexedElement> {
    snapshot.get(index).ok_or_else(|| {
        if snapshot.is_empty() {
            anyhow!(
                "Element index {} not found. No interactive elements on page.",
                index
            )
        } else {
            anyhow!(
                "Element index {} not found. Valid indices: 0-{}",
                index,
                snapshot.len() - 1
            )
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BoundingBox;

    fn snapshot(n: usize) -> ElementSnapshot {
        ElementSnapshot::new(
            (0..n)
                .map(|i| IndexedElement {
                    index: i,
                    element_type: "button".to_string(),
                    text: Some(format!("b{}", i)),
                    placeholder: None,
                    href: None,
                    aria_label: None,
                    selector: format!("#b{}", i),
                    bounding_box: BoundingBox::default(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_resolve_missing_index_message() {
        let err = resolve(&snapshot(3), 7).unwrap_err().to_string();
        assert_eq!(err, "Element index 7 not found. Valid indices: 0-2");

        let err = resolve(&snapshot(0), 0).unwrap_err().to_string();
        assert!(err.contains("No interactive elements"));
    }

    #[test]
    fn test_outcome_helpers() {
        let click = ActionItem::ClickElement {
            index: 1,
            intent: None,
        };
        let outcome = BatchOutcome {
            results: vec![
                ActionResult::error(&click, None, "first"),
                ActionResult::success(&click, Some("#b1".to_string()), "ok", None),
                ActionResult::error(&click, None, "second"),
            ],
            stop: BatchStop::Completed,
        };
        assert_eq!(outcome.success_count(), 1);
        assert_eq!(outcome.last_error(), Some("second"));
        assert!(outcome.done().is_none());
    }
}
