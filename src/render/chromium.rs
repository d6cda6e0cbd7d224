//! Chromium-backed render session using chromiumoxide
//!
//! The session either launches its own headless Chromium or attaches to an
//! already-running one through its remote debugging endpoint. A lost
//! browser process is replaced in place; the operation that noticed the
//! loss still fails with [`RenderError::SessionLost`] so callers skip that
//! unit of work and carry on with a healthy session.

use crate::config::RenderConfig;
use crate::render::{ElementHandle, RenderError, RenderResult, RenderSession};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::handler::Handler;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// How often the navigation wait re-checks for the awaited element
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Chromium render session
pub struct ChromiumSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: Option<Page>,
    config: RenderConfig,
}

impl ChromiumSession {
    /// Creates a session from the render configuration
    ///
    /// With `endpoint` set the session attaches to a running browser via
    /// its debugging endpoint; otherwise it launches a headless Chromium
    /// of its own.
    ///
    /// # Arguments
    ///
    /// * `config` - The `[render]` section of the configuration
    ///
    /// # Returns
    ///
    /// * `Ok(ChromiumSession)` - Connected and ready to navigate
    /// * `Err(RenderError)` - Launch or attach failed
    pub async fn from_config(config: &RenderConfig) -> RenderResult<Self> {
        let (browser, handler) = open_browser(config).await?;
        let handler_task = spawn_handler(handler);

        Ok(Self {
            browser,
            handler_task,
            page: None,
            config: config.clone(),
        })
    }

    /// Returns the current page, creating one on first use
    async fn page(&mut self) -> RenderResult<Page> {
        // Page is a cheap handle around a shared channel
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }

        let page = match self.browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => return Err(self.classify(e.to_string()).await),
        };
        self.page = Some(page.clone());
        Ok(page)
    }

    /// Evaluates a script in the current page, mapping failures
    async fn eval<T>(&mut self, script: String) -> RenderResult<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let page = self.page().await?;
        let result = match page.evaluate(script).await {
            Ok(result) => result,
            Err(e) => return Err(self.classify(e.to_string()).await),
        };

        result
            .into_value()
            .map_err(|e| RenderError::Browser(format!("unexpected script result: {e}")))
    }

    /// Maps a raw browser failure to a render error
    ///
    /// A dead browser process is replaced before returning, so the caller
    /// sees [`RenderError::SessionLost`] exactly once and its next
    /// navigation runs against a fresh session.
    async fn classify(&mut self, message: String) -> RenderError {
        if is_dead_session_error(&message) {
            tracing::warn!("Browser session lost, replacing it: {}", message);
            if let Err(e) = self.replace_browser().await {
                tracing::error!("Could not replace browser session: {}", e);
            }
            RenderError::SessionLost(message)
        } else {
            RenderError::Browser(message)
        }
    }

    /// Swaps the dead browser for a fresh one
    async fn replace_browser(&mut self) -> RenderResult<()> {
        self.handler_task.abort();
        self.page = None;

        let (browser, handler) = open_browser(&self.config).await?;
        self.browser = browser;
        self.handler_task = spawn_handler(handler);

        tracing::info!("Browser session replaced");
        Ok(())
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, wait_for: &str, timeout: Duration) -> RenderResult<()> {
        let deadline = Instant::now() + timeout;
        let page = self.page().await?;

        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => return Err(self.classify(e.to_string()).await),
            Err(_) => {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    waited: timeout,
                })
            }
        }

        // Wait until the awaited element exists and has a layout box
        let probe = format!(
            "(() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return rect.width > 0 || rect.height > 0;
            }})()",
            sel = js_string(wait_for)
        );

        loop {
            if self.eval::<bool>(probe.clone()).await? {
                break;
            }
            if Instant::now() >= deadline {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    waited: timeout,
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        // Let late-arriving script finish filling the page in
        tokio::time::sleep(Duration::from_millis(self.config.settle_millis)).await;
        Ok(())
    }

    async fn find_all(&mut self, selector: &str) -> RenderResult<Vec<ElementHandle>> {
        let script = format!(
            "document.querySelectorAll({sel}).length",
            sel = js_string(selector)
        );
        let count: usize = self.eval(script).await?;

        Ok((0..count)
            .map(|index| ElementHandle::new(selector, index))
            .collect())
    }

    async fn attribute(
        &mut self,
        element: &ElementHandle,
        name: &str,
    ) -> RenderResult<Option<String>> {
        let script = format!(
            "(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                return el ? el.getAttribute({name}) : null;
            }})()",
            sel = js_string(&element.selector),
            idx = element.index,
            name = js_string(name)
        );
        self.eval(script).await
    }

    async fn text(&mut self, element: &ElementHandle) -> RenderResult<Option<String>> {
        let script = format!(
            "(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                return el ? el.textContent : null;
            }})()",
            sel = js_string(&element.selector),
            idx = element.index
        );
        self.eval(script).await
    }

    async fn computed_style(
        &mut self,
        element: &ElementHandle,
        property: &str,
    ) -> RenderResult<String> {
        let script = format!(
            "(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                return el ? getComputedStyle(el).getPropertyValue({prop}) : '';
            }})()",
            sel = js_string(&element.selector),
            idx = element.index,
            prop = js_string(property)
        );
        self.eval(script).await
    }

    async fn click(&mut self, element: &ElementHandle) -> RenderResult<()> {
        // Synthetic click, deliberately skipping hit testing: paged-in
        // controls sit under sticky footers often enough that a real
        // pointer click would be swallowed
        let script = format!(
            "(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                if (el) el.click();
                return el != null;
            }})()",
            sel = js_string(&element.selector),
            idx = element.index
        );
        let clicked: bool = self.eval(script).await?;
        if !clicked {
            tracing::debug!(
                "Click target {}[{}] vanished before dispatch",
                element.selector,
                element.index
            );
        }
        tokio::time::sleep(Duration::from_millis(self.config.settle_millis)).await;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> RenderResult<()> {
        self.eval::<bool>(
            "(() => { window.scrollTo(0, document.body.scrollHeight); return true; })()"
                .to_string(),
        )
        .await?;
        tokio::time::sleep(Duration::from_millis(self.config.settle_millis)).await;
        Ok(())
    }

    async fn is_in_viewport(&mut self, element: &ElementHandle) -> RenderResult<bool> {
        let script = format!(
            "(() => {{
                const el = document.querySelectorAll({sel})[{idx}];
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                return rect.top >= 0 && rect.left >= 0 &&
                    rect.bottom <= (window.innerHeight || document.documentElement.clientHeight) &&
                    rect.right <= (window.innerWidth || document.documentElement.clientWidth);
            }})()",
            sel = js_string(&element.selector),
            idx = element.index
        );
        self.eval(script).await
    }
}

/// Opens a browser per the configuration: attach when an endpoint is
/// given, launch otherwise
async fn open_browser(config: &RenderConfig) -> RenderResult<(Browser, Handler)> {
    match &config.endpoint {
        Some(endpoint) => {
            let ws_url = discover_websocket_url(endpoint).await?;
            Browser::connect(ws_url)
                .await
                .map_err(|e| RenderError::Endpoint(format!("connect failed: {e}")))
        }
        None => {
            let browser_config = BrowserConfig::builder()
                .arg("--headless=new")
                .arg("--disable-gpu")
                .arg("--no-sandbox")
                .arg("--disable-dev-shm-usage")
                .arg("--disable-extensions")
                .arg("--disable-background-networking")
                .window_size(1280, 1024)
                .build()
                .map_err(|e| RenderError::Browser(format!("invalid browser config: {e}")))?;

            Browser::launch(browser_config)
                .await
                .map_err(|e| RenderError::Browser(format!("launch failed: {e}")))
        }
    }
}

/// Drains CDP events for the lifetime of the browser connection
fn spawn_handler(mut handler: Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            let _ = event;
        }
    })
}

/// Resolves a `host:port` debugging endpoint to its WebSocket URL
///
/// Chromium publishes the URL in `GET /json/version` as
/// `webSocketDebuggerUrl`.
pub(crate) async fn discover_websocket_url(endpoint: &str) -> RenderResult<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .map_err(|e| RenderError::Endpoint(format!("client build failed: {e}")))?;

    let version_url = format!("http://{endpoint}/json/version");
    let body = client
        .get(&version_url)
        .send()
        .await
        .map_err(|e| RenderError::Endpoint(format!("{version_url}: {e}")))?
        .text()
        .await
        .map_err(|e| RenderError::Endpoint(format!("{version_url}: {e}")))?;

    let version: serde_json::Value = serde_json::from_str(&body)
        .map_err(|e| RenderError::Endpoint(format!("{version_url}: invalid JSON: {e}")))?;

    version
        .get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| {
            RenderError::Endpoint(format!("{version_url}: no webSocketDebuggerUrl in response"))
        })
}

/// Whether an error message means the browser process itself is gone
fn is_dead_session_error(message: &str) -> bool {
    message.contains("connection is closed")
        || message.contains("No such process")
        || message.contains("Browser closed")
}

/// Escapes a string for embedding in a script source
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
