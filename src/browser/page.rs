use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Browser cookie as stored between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
}

/// Page-level automation capability used by the indexer, executor and loop.
///
/// Every call is bounded by `timeout_ms`; implementations return an error
/// when the bound is exceeded.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()>;

    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Replace the content of an input with `text`
    async fn fill(&self, selector: &str, text: &str, timeout_ms: u64) -> Result<()>;

    async fn hover(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Select a dropdown option by value or visible text
    async fn select_option(&self, selector: &str, option: &str, timeout_ms: u64) -> Result<()>;

    /// Press a key on the focused element (Enter, Tab, Escape, ...)
    async fn press_key(&self, key: &str, timeout_ms: u64) -> Result<()>;

    /// Scroll the window vertically; negative values scroll up
    async fn scroll_by(&self, delta_y: i64, timeout_ms: u64) -> Result<()>;

    async fn scroll_into_view(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Evaluate a script expression and return its JSON value
    async fn evaluate(&self, script: &str, timeout_ms: u64) -> Result<Value>;

    /// Base64-encoded PNG of the viewport
    async fn screenshot(&self, timeout_ms: u64) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    async fn get_text(&self, selector: &str, timeout_ms: u64) -> Result<String>;

    async fn get_attribute(&self, selector: &str, name: &str, timeout_ms: u64) -> Result<Option<String>>;

    async fn cookies(&self) -> Result<Vec<Cookie>>;

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()>;
}
