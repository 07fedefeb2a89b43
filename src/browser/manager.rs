use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::{Element, Page};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::page::{Cookie, PageDriver};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Options used when a session launches its browser
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub proxy_url: Option<String>,
    pub viewport: Viewport,
    /// Page opened right after launch
    pub start_url: Option<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            proxy_url: None,
            viewport: Viewport::default(),
            start_url: None,
        }
    }
}

/// Run `fut` with an upper bound, flattening the timeout into the error
async fn bounded<T, F>(timeout_ms: u64, what: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    timeout(Duration::from_millis(timeout_ms), fut)
        .await
        .map_err(|_| anyhow!("{} timed out after {}ms", what, timeout_ms))?
}

/// One Chrome instance with a single controlled page
pub struct ChromeSession {
    browser: Arc<Mutex<Option<Browser>>>,
    page: Arc<Mutex<Option<Page>>>,
}

impl ChromeSession {
    /// Launch Chrome and open the start page (or about:blank)
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let viewport = options.viewport;

        let mut config =
            BrowserConfig::builder().window_size(viewport.width, viewport.height);

        if !options.headless {
            config = config.with_head();
        }

        config = config
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-default-apps")
            .arg("--disable-extensions");

        if let Some(ref proxy) = options.proxy_url {
            config = config.arg(format!("--proxy-server={}", proxy));
        }

        let config = config
            .build()
            .map_err(|e| anyhow!("Failed to build browser config: {}", e))?;

        // Launch can hang forever when Chrome is missing or wedged
        let (browser, mut handler) = timeout(Duration::from_secs(30), Browser::launch(config))
            .await
            .map_err(|_| {
                anyhow!("Browser launch timeout (30s) - Chrome may not be installed or is unresponsive")
            })?
            .map_err(|e| anyhow!("Failed to launch browser: {}", e))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                tracing::trace!("Browser event: {:?}", event);
            }
        });

        let url = options.start_url.as_deref().unwrap_or("about:blank");
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| anyhow!("Failed to create page: {}", e))?;

        let emulation_params = chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(|e| anyhow!("Failed to build viewport params: {}", e))?;

        page.execute(emulation_params)
            .await
            .map_err(|e| anyhow!("Failed to set viewport: {}", e))?;

        tracing::info!(
            "Browser launched (headless={}, proxy={}) at {}",
            options.headless,
            options.proxy_url.is_some(),
            url
        );

        Ok(Self {
            browser: Arc::new(Mutex::new(Some(browser))),
            page: Arc::new(Mutex::new(Some(page))),
        })
    }

    /// Clone the page handle so the lock is not held across CDP calls
    async fn page(&self) -> Result<Page> {
        self.page
            .lock()
            .await
            .clone()
            .ok_or_else(|| anyhow!("No page available"))
    }

    async fn find(page: &Page, selector: &str) -> Result<Element> {
        page.find_element(selector)
            .await
            .map_err(|e| anyhow!("Failed to find element '{}': {}", selector, e))
    }

    /// Close page and browser; safe to call more than once
    pub async fn close(&self) -> Result<()> {
        let mut page_guard = self.page.lock().await;
        let mut browser_guard = self.browser.lock().await;

        if let Some(page) = page_guard.take() {
            let _ = page.close().await;
        }

        if let Some(mut browser) = browser_guard.take() {
            let _ = browser.close().await;
        }

        tracing::info!("Browser closed");
        Ok(())
    }
}

#[async_trait]
impl PageDriver for ChromeSession {
    async fn navigate(&self, url: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page().await?;
        bounded(timeout_ms, "navigate", async {
            page.goto(url)
                .await
                .map_err(|e| anyhow!("Failed to navigate to {}: {}", url, e))?;
            Ok(())
        })
        .await
    }

    async fn click(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page().await?;
        bounded(timeout_ms, "click", async {
            let element = Self::find(&page, selector).await?;
            element
                .click()
                .await
                .map_err(|e| anyhow!("Failed to click element '{}': {}", selector, e))?;
            Ok(())
        })
        .await
    }

    async fn fill(&self, selector: &str, text: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page().await?;
        bounded(timeout_ms, "fill", async {
            let element = Self::find(&page, selector).await?;

            element
                .click()
                .await
                .map_err(|e| anyhow!("Failed to focus element '{}': {}", selector, e))?;

            element
                .call_js_fn(
                    "function() { if ('value' in this) { this.value = ''; } else { this.textContent = ''; } \
                     this.dispatchEvent(new Event('input', { bubbles: true })); }",
                    false,
                )
                .await
                .map_err(|e| anyhow!("Failed to clear element '{}': {}", selector, e))?;

            element
                .type_str(text)
                .await
                .map_err(|e| anyhow!("Failed to type into element '{}': {}", selector, e))?;

            Ok(())
        })
        .await
    }

    async fn hover(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page().await?;
        bounded(timeout_ms, "hover", async {
            let element = Self::find(&page, selector).await?;
            element
                .hover()
                .await
                .map_err(|e| anyhow!("Failed to hover over element '{}': {}", selector, e))?;
            Ok(())
        })
        .await
    }

    async fn select_option(&self, selector: &str, option: &str, timeout_ms: u64) -> Result<()> {
        let script = format!(
            r#"
            (() => {{
                const select = document.querySelector({selector});
                if (!select || !select.options) return false;
                const wanted = {option};
                const match = Array.from(select.options).find(
                    o => o.value === wanted || o.text.trim() === wanted
                );
                if (!match) return false;
                select.value = match.value;
                select.dispatchEvent(new Event('input', {{ bubbles: true }}));
                select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            selector = serde_json::to_string(selector)?,
            option = serde_json::to_string(option)?,
        );

        let selected = self.evaluate(&script, timeout_ms).await?;
        if selected.as_bool() == Some(true) {
            Ok(())
        } else {
            Err(anyhow!(
                "Option '{}' not found in dropdown '{}'",
                option,
                selector
            ))
        }
    }

    async fn press_key(&self, key: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page().await?;
        bounded(timeout_ms, "press_key", async {
            let element = match page.find_element(":focus").await {
                Ok(el) => el,
                Err(_) => Self::find(&page, "body").await?,
            };
            element
                .press_key(key)
                .await
                .map_err(|e| anyhow!("Failed to press key '{}': {}", key, e))?;
            Ok(())
        })
        .await
    }

    async fn scroll_by(&self, delta_y: i64, timeout_ms: u64) -> Result<()> {
        self.evaluate(&format!("window.scrollBy(0, {}); true", delta_y), timeout_ms)
            .await
            .map_err(|e| anyhow!("Failed to scroll: {}", e))?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let page = self.page().await?;
        bounded(timeout_ms, "scroll_into_view", async {
            let element = Self::find(&page, selector).await?;
            element
                .scroll_into_view()
                .await
                .map_err(|e| anyhow!("Failed to scroll to element '{}': {}", selector, e))?;
            Ok(())
        })
        .await
    }

    async fn evaluate(&self, script: &str, timeout_ms: u64) -> Result<Value> {
        let page = self.page().await?;
        bounded(timeout_ms, "evaluate", async {
            let result = page
                .evaluate(script)
                .await
                .map_err(|e| anyhow!("Failed to evaluate script: {}", e))?;
            // Scripts returning undefined have no value
            Ok(result.into_value::<Value>().unwrap_or(Value::Null))
        })
        .await
    }

    async fn screenshot(&self, timeout_ms: u64) -> Result<String> {
        let page = self.page().await?;
        bounded(timeout_ms, "screenshot", async {
            let screenshot = page
                .screenshot(
                    chromiumoxide::page::ScreenshotParams::builder()
                        .format(CaptureScreenshotFormat::Png)
                        .build(),
                )
                .await
                .map_err(|e| anyhow!("Failed to take screenshot: {}", e))?;

            Ok(base64::engine::general_purpose::STANDARD.encode(screenshot))
        })
        .await
    }

    async fn current_url(&self) -> Result<String> {
        let page = self.page().await?;
        page.url()
            .await
            .map_err(|e| anyhow!("Failed to get URL: {}", e))?
            .ok_or_else(|| anyhow!("URL is None"))
    }

    async fn title(&self) -> Result<String> {
        let page = self.page().await?;
        Ok(page
            .get_title()
            .await
            .map_err(|e| anyhow!("Failed to get title: {}", e))?
            .unwrap_or_default())
    }

    async fn get_text(&self, selector: &str, timeout_ms: u64) -> Result<String> {
        let page = self.page().await?;
        bounded(timeout_ms, "get_text", async {
            let element = Self::find(&page, selector).await?;
            Ok(element
                .inner_text()
                .await
                .map_err(|e| anyhow!("Failed to read text of '{}': {}", selector, e))?
                .unwrap_or_default())
        })
        .await
    }

    async fn get_attribute(&self, selector: &str, name: &str, timeout_ms: u64) -> Result<Option<String>> {
        let page = self.page().await?;
        bounded(timeout_ms, "get_attribute", async {
            let element = Self::find(&page, selector).await?;
            element
                .attribute(name)
                .await
                .map_err(|e| anyhow!("Failed to read '{}' of '{}': {}", name, selector, e))
        })
        .await
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        let page = self.page().await?;
        let cookies = page
            .get_cookies()
            .await
            .map_err(|e| anyhow!("Failed to read cookies: {}", e))?;

        Ok(cookies
            .into_iter()
            .map(|c| Cookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
            })
            .collect())
    }

    async fn set_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        if cookies.is_empty() {
            return Ok(());
        }
        let page = self.page().await?;

        let params = cookies
            .iter()
            .map(|c| {
                CookieParam::builder()
                    .name(c.name.clone())
                    .value(c.value.clone())
                    .domain(c.domain.clone())
                    .path(c.path.clone())
                    .secure(c.secure)
                    .http_only(c.http_only)
                    .build()
                    .map_err(|e| anyhow!("Invalid cookie '{}': {}", c.name, e))
            })
            .collect::<Result<Vec<_>>>()?;

        page.set_cookies(params)
            .await
            .map_err(|e| anyhow!("Failed to set cookies: {}", e))?;
        Ok(())
    }
}
