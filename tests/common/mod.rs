//! Scripted stand-ins for the browser, the model and the session pool.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use browser_autopilot::browser::dom::index_script;
use browser_autopilot::browser::{Cookie, LaunchOptions, PageDriver, SessionProvider};
use browser_autopilot::config::AgentConfig;
use browser_autopilot::llm::prompts::PLANNER_SYSTEM_PROMPT;
use browser_autopilot::llm::{ChatModel, PromptMessage};

pub const FAKE_PNG: &str = "iVBORw0KGgo=";

/// Element as the index script would report it
pub fn element(kind: &str, selector: &str, text: Option<&str>, placeholder: Option<&str>) -> Value {
    json!({
        "index": 0,
        "type": kind,
        "text": text,
        "placeholder": placeholder,
        "selector": selector,
        "boundingBox": {"x": 10.0, "y": 20.0, "width": 80.0, "height": 24.0}
    })
}

/// `n` buttons with selectors `#b0`..`#b{n-1}`
pub fn buttons(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| element("button", &format!("#b{}", i), Some(&format!("Button {}", i)), None))
        .collect()
}

/// Anchor with visible text and an `href` attribute
pub fn link(selector: &str, text: &str, href: &str) -> Value {
    let mut el = element("a", selector, Some(text), None);
    el["href"] = json!(href);
    el
}

/// Three buttons and an email input at index 3
pub fn form_page() -> Vec<Value> {
    let mut elements = buttons(3);
    elements.push(element("input", "#email", None, Some("Email Address")));
    elements
}

/// Loop settings that keep tests fast
pub fn fast_config() -> AgentConfig {
    AgentConfig {
        delay_min_ms: 0,
        delay_max_ms: 0,
        use_vision: false,
        action_timeout_ms: 1_000,
        ..AgentConfig::default()
    }
}

/// Page whose index script answers come from a queue. The last snapshot
/// repeats once the queue is drained.
pub struct MockPage {
    snapshots: Mutex<VecDeque<Vec<Value>>>,
    last_snapshot: Mutex<Vec<Value>>,
    url: Mutex<String>,
    calls: Mutex<Vec<String>>,
    failing_selectors: HashSet<String>,
    pub index_calls: AtomicUsize,
    pub fail_index: AtomicBool,
    pub fail_navigate: AtomicBool,
    pub panic_on_click: AtomicBool,
}

impl MockPage {
    pub fn new(snapshot: Vec<Value>) -> Self {
        Self::with_snapshots(vec![snapshot])
    }

    pub fn with_snapshots(snapshots: Vec<Vec<Value>>) -> Self {
        let last = snapshots.last().cloned().unwrap_or_default();
        Self {
            snapshots: Mutex::new(snapshots.into_iter().collect()),
            last_snapshot: Mutex::new(last),
            url: Mutex::new("about:blank".to_string()),
            calls: Mutex::new(Vec::new()),
            failing_selectors: HashSet::new(),
            index_calls: AtomicUsize::new(0),
            fail_index: AtomicBool::new(false),
            fail_navigate: AtomicBool::new(false),
            panic_on_click: AtomicBool::new(false),
        }
    }

    pub fn failing(mut self, selectors: &[&str]) -> Self {
        self.failing_selectors = selectors.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Every driver call that touched the page, e.g. `click #b0`
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn act(&self, call: String, selector: &str) -> Result<()> {
        if self.failing_selectors.contains(selector) {
            return Err(anyhow!("Element not interactable: {}", selector));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }

    /// Element with `selector` in the most recently served snapshot
    fn live_element(&self, selector: &str) -> Option<Value> {
        self.last_snapshot
            .lock()
            .unwrap()
            .iter()
            .find(|el| el["selector"] == selector)
            .cloned()
    }

    fn next_snapshot(&self) -> Vec<Value> {
        let next = self.snapshots.lock().unwrap().pop_front();
        match next {
            Some(snapshot) => {
                *self.last_snapshot.lock().unwrap() = snapshot.clone();
                snapshot
            }
            None => self.last_snapshot.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl PageDriver for MockPage {
    async fn navigate(&self, url: &str, _timeout_ms: u64) -> Result<()> {
        if self.fail_navigate.load(Ordering::SeqCst) {
            return Err(anyhow!("net::ERR_NAME_NOT_RESOLVED"));
        }
        *self.url.lock().unwrap() = url.to_string();
        self.calls.lock().unwrap().push(format!("navigate {}", url));
        Ok(())
    }

    async fn click(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        if self.panic_on_click.load(Ordering::SeqCst) {
            panic!("driver crashed while clicking {}", selector);
        }
        self.act(format!("click {}", selector), selector)
    }

    async fn fill(&self, selector: &str, text: &str, _timeout_ms: u64) -> Result<()> {
        self.act(format!("fill {}={}", selector, text), selector)
    }

    async fn hover(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        self.act(format!("hover {}", selector), selector)
    }

    async fn select_option(&self, selector: &str, option: &str, _timeout_ms: u64) -> Result<()> {
        self.act(format!("select {}={}", selector, option), selector)
    }

    async fn press_key(&self, key: &str, _timeout_ms: u64) -> Result<()> {
        self.calls.lock().unwrap().push(format!("press {}", key));
        Ok(())
    }

    async fn scroll_by(&self, delta_y: i64, _timeout_ms: u64) -> Result<()> {
        self.calls.lock().unwrap().push(format!("scroll {}", delta_y));
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str, _timeout_ms: u64) -> Result<()> {
        self.act(format!("scroll_into_view {}", selector), selector)
    }

    async fn evaluate(&self, script: &str, _timeout_ms: u64) -> Result<Value> {
        if script == index_script() {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_index.load(Ordering::SeqCst) {
                return Err(anyhow!("Execution context was destroyed"));
            }
            return Ok(Value::Array(self.next_snapshot()));
        }
        Ok(Value::Bool(true))
    }

    async fn screenshot(&self, _timeout_ms: u64) -> Result<String> {
        Ok(FAKE_PNG.to_string())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.url.lock().unwrap().clone())
    }

    async fn title(&self) -> Result<String> {
        Ok("Mock Page".to_string())
    }

    async fn get_text(&self, selector: &str, _timeout_ms: u64) -> Result<String> {
        let element = self
            .live_element(selector)
            .ok_or_else(|| anyhow!("No element matches {}", selector))?;
        Ok(element["text"].as_str().unwrap_or_default().to_string())
    }

    async fn get_attribute(&self, selector: &str, name: &str, _timeout_ms: u64) -> Result<Option<String>> {
        let element = self
            .live_element(selector)
            .ok_or_else(|| anyhow!("No element matches {}", selector))?;
        Ok(element[name].as_str().map(str::to_string))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(Vec::new())
    }

    async fn set_cookies(&self, _cookies: &[Cookie]) -> Result<()> {
        Ok(())
    }
}

/// Model that answers planner and navigator prompts from separate scripts.
/// When a script runs dry its default answer is used.
pub struct MockChatModel {
    planner: Mutex<VecDeque<String>>,
    navigator: Mutex<VecDeque<String>>,
    planner_default: String,
    navigator_default: String,
    navigator_prompts: Mutex<Vec<String>>,
    pub planner_calls: AtomicUsize,
    pub navigator_calls: AtomicUsize,
    pub fail_navigator: AtomicBool,
}

impl MockChatModel {
    pub fn new(navigator_default: Value) -> Self {
        Self {
            planner: Mutex::new(VecDeque::new()),
            navigator: Mutex::new(VecDeque::new()),
            planner_default: json!({
                "observation": "Page loaded",
                "done": false,
                "next_steps": "Continue with the form"
            })
            .to_string(),
            navigator_default: navigator_default.to_string(),
            navigator_prompts: Mutex::new(Vec::new()),
            planner_calls: AtomicUsize::new(0),
            navigator_calls: AtomicUsize::new(0),
            fail_navigator: AtomicBool::new(false),
        }
    }

    pub fn with_planner(self, responses: Vec<Value>) -> Self {
        *self.planner.lock().unwrap() = responses.into_iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_navigator(self, responses: Vec<Value>) -> Self {
        *self.navigator.lock().unwrap() = responses.into_iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn planner_calls(&self) -> usize {
        self.planner_calls.load(Ordering::SeqCst)
    }

    pub fn navigator_calls(&self) -> usize {
        self.navigator_calls.load(Ordering::SeqCst)
    }

    /// User messages the navigator received, in call order
    pub fn navigator_prompts(&self) -> Vec<String> {
        self.navigator_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn chat(&self, messages: Vec<PromptMessage>) -> Result<String> {
        let is_planner = messages
            .first()
            .map(|m| m.text == PLANNER_SYSTEM_PROMPT)
            .unwrap_or(false);

        if is_planner {
            self.planner_calls.fetch_add(1, Ordering::SeqCst);
            let next = self.planner.lock().unwrap().pop_front();
            return Ok(next.unwrap_or_else(|| self.planner_default.clone()));
        }

        self.navigator_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_navigator.load(Ordering::SeqCst) {
            return Err(anyhow!("429 Too Many Requests"));
        }
        if let Some(user) = messages.last() {
            self.navigator_prompts.lock().unwrap().push(user.text.clone());
        }
        let next = self.navigator.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.navigator_default.clone()))
    }
}

/// Session provider handing out one shared mock page
pub struct CountingSessions {
    pub page: Arc<MockPage>,
    pub acquires: AtomicUsize,
    pub closes: AtomicUsize,
    pub persisted: Mutex<Vec<bool>>,
    pub fail_acquire: AtomicBool,
}

impl CountingSessions {
    pub fn new(page: MockPage) -> Self {
        Self {
            page: Arc::new(page),
            acquires: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            persisted: Mutex::new(Vec::new()),
            fail_acquire: AtomicBool::new(false),
        }
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for CountingSessions {
    async fn acquire(&self, _session_id: &str, _options: &LaunchOptions) -> Result<Arc<dyn PageDriver>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.fail_acquire.load(Ordering::SeqCst) {
            return Err(anyhow!("Chrome executable not found"));
        }
        Ok(Arc::clone(&self.page) as Arc<dyn PageDriver>)
    }

    async fn close(&self, _session_id: &str, persist_cookies: bool) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.persisted.lock().unwrap().push(persist_cookies);
        Ok(())
    }
}

pub fn click(index: usize) -> Value {
    json!({"click_element": {"index": index}})
}

pub fn done(text: &str, success: bool) -> Value {
    json!({"done": {"text": text, "success": success}})
}

/// Navigator answer carrying `actions`
pub fn batch(actions: Vec<Value>) -> Value {
    json!({
        "current_state": {"evaluation": "ok", "memory": "", "next_goal": "continue"},
        "action": actions
    })
}
