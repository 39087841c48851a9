use crate::browser::adapter::{NavigateWait, PageAdapter};
use crate::config::{ScrollConfig, ScrollContainer};
use crate::error::{AdapterError, AdapterResult};
use async_trait::async_trait;
use chromiumoxide::{Browser as ChromeBrowser, BrowserConfig, Page};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const NAV_TIMEOUT_MS: u64 = 60_000;
const OP_TIMEOUT_MS: u64 = 30_000;
const NAV_RETRIES: u32 = 3;

/// Chromium implementation of [`PageAdapter`] built on chromiumoxide.
///
/// All DOM queries run as injected JavaScript; scroll state is read from the
/// page rather than tracked locally so virtualized lists cannot drift.
pub struct ChromiumAdapter {
    viewport_width: u32,
    viewport_height: u32,
    headless: bool,
    user_agent: Option<String>,
    inner: Mutex<Option<Session>>,
    closed: AtomicBool,
}

struct Session {
    browser: ChromeBrowser,
    page: Page,
    handler_task: JoinHandle<()>,
}

impl ChromiumAdapter {
    pub fn new(config: &ScrollConfig) -> Self {
        Self {
            viewport_width: config.viewport.width,
            viewport_height: config.viewport.height,
            headless: config.headless,
            user_agent: config.user_agent.clone(),
            inner: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    fn browser_config(&self) -> AdapterResult<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(self.viewport_width, self.viewport_height)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-background-timer-throttling")
            .arg("--disable-backgrounding-occluded-windows")
            .arg("--disable-renderer-backgrounding")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-blink-features=AutomationControlled");
        if self.headless {
            builder = builder.arg("--headless=new");
        } else {
            builder = builder.with_head();
        }
        if let Some(ua) = &self.user_agent {
            builder = builder.arg(format!("--user-agent={}", ua));
        }
        builder
            .build()
            .map_err(AdapterError::Launch)
    }

    fn ensure_open(&self) -> AdapterResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed);
        }
        Ok(())
    }

    async fn page(&self) -> AdapterResult<Page> {
        self.ensure_open()?;
        let guard = self.inner.lock().await;
        guard
            .as_ref()
            .map(|s| s.page.clone())
            .ok_or_else(|| AdapterError::Protocol("adapter not initialized".to_string()))
    }

    /// Evaluate a script with the standard per-operation timeout.
    async fn eval(&self, script: &str) -> AdapterResult<serde_json::Value> {
        let page = self.page().await?;
        let result = tokio::time::timeout(
            Duration::from_millis(OP_TIMEOUT_MS),
            page.evaluate(script),
        )
        .await
        .map_err(|_| AdapterError::Timeout(OP_TIMEOUT_MS))?
        .map_err(|e| AdapterError::Script(e.to_string()))?;
        result
            .into_value()
            .map_err(|e| AdapterError::Script(e.to_string()))
    }

    async fn eval_bool(&self, script: &str) -> AdapterResult<bool> {
        Ok(self.eval(script).await?.as_bool().unwrap_or(false))
    }

    async fn eval_i64(&self, script: &str) -> AdapterResult<i64> {
        let value = self.eval(script).await?;
        Ok(value.as_i64().or_else(|| value.as_f64().map(|f| f as i64)).unwrap_or(0))
    }
}

/// JS expression resolving to the scrollable target, or null when a selected
/// container is absent.
fn container_expr(container: &ScrollContainer) -> String {
    match container {
        ScrollContainer::Window => "window".to_string(),
        ScrollContainer::Selector(sel) => {
            format!("document.querySelector({})", js_str(sel))
        }
    }
}

fn js_str(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

#[async_trait]
impl PageAdapter for ChromiumAdapter {
    async fn init(&self) -> AdapterResult<()> {
        self.ensure_open()?;
        let mut guard = self.inner.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        info!(
            headless = self.headless,
            width = self.viewport_width,
            height = self.viewport_height,
            "launching Chromium"
        );
        let config = self.browser_config()?;
        let (browser, mut handler) = ChromeBrowser::launch(config)
            .await
            .map_err(|e| AdapterError::Launch(e.to_string()))?;

        // Drain CDP events for the life of the browser. Connection resets are
        // routine during teardown and must not kill the task early.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    let msg = e.to_string();
                    if msg.contains("Browser closed") || msg.contains("Process exited") {
                        break;
                    }
                    if msg.contains("reset") || msg.contains("Reset") {
                        debug!("CDP connection reset: {}", msg);
                    } else {
                        warn!("browser handler error: {}", msg);
                    }
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| AdapterError::Launch(e.to_string()))?;

        *guard = Some(Session {
            browser,
            page,
            handler_task,
        });
        Ok(())
    }

    async fn navigate_to(&self, url: &str, wait: NavigateWait) -> AdapterResult<()> {
        let page = self.page().await?;
        let url = normalize_url(url);
        info!("navigating to {}", url);

        let mut last_error = AdapterError::Navigation("no attempt made".to_string());
        for attempt in 1..=NAV_RETRIES {
            match tokio::time::timeout(Duration::from_millis(NAV_TIMEOUT_MS), page.goto(&url)).await
            {
                Ok(Ok(_)) => {
                    match tokio::time::timeout(
                        Duration::from_millis(NAV_TIMEOUT_MS / 4),
                        page.wait_for_navigation(),
                    )
                    .await
                    {
                        Ok(Ok(_)) => {}
                        Ok(Err(e)) => {
                            warn!("navigation settle failed (attempt {}): {}", attempt, e);
                        }
                        Err(_) => {
                            warn!("navigation settle timed out (attempt {})", attempt);
                        }
                    }
                    // chromiumoxide has no network-idle waiter; a short settle
                    // window approximates it.
                    let settle_ms = match wait {
                        NavigateWait::Load => 250,
                        NavigateWait::NetworkIdle => 1000,
                    };
                    tokio::time::sleep(Duration::from_millis(settle_ms)).await;
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!("navigation failed (attempt {}): {}", attempt, e);
                    last_error = AdapterError::Navigation(e.to_string());
                }
                Err(_) => {
                    warn!("navigation timed out (attempt {})", attempt);
                    last_error = AdapterError::Timeout(NAV_TIMEOUT_MS);
                }
            }
            if attempt < NAV_RETRIES {
                tokio::time::sleep(Duration::from_millis(1000)).await;
            }
        }
        Err(last_error)
    }

    async fn scroll_by(&self, px: i64, container: &ScrollContainer) -> AdapterResult<()> {
        let script = format!(
            r#"(function() {{
                const target = {};
                if (!target) return false;
                if (target === window) {{
                    window.scrollBy(0, {px});
                }} else {{
                    target.scrollTop += {px};
                }}
                return true;
            }})()"#,
            container_expr(container),
            px = px
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn scroll_to_top(&self, container: &ScrollContainer) -> AdapterResult<()> {
        let script = format!(
            r#"(function() {{
                const target = {};
                if (!target) return false;
                if (target === window) {{
                    window.scrollTo(0, 0);
                }} else {{
                    target.scrollTop = 0;
                }}
                return true;
            }})()"#,
            container_expr(container)
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn scroll_to_bottom(&self, container: &ScrollContainer) -> AdapterResult<()> {
        let script = format!(
            r#"(function() {{
                const target = {};
                if (!target) return false;
                if (target === window) {{
                    window.scrollTo(0, Math.max(
                        document.body.scrollHeight,
                        document.documentElement.scrollHeight));
                }} else {{
                    target.scrollTop = target.scrollHeight;
                }}
                return true;
            }})()"#,
            container_expr(container)
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn evaluate_script(&self, script: &str) -> AdapterResult<serde_json::Value> {
        self.eval(script).await
    }

    async fn click(&self, selector: &str) -> AdapterResult<bool> {
        let page = self.page().await?;
        let element = match page.find_element(selector).await {
            Ok(el) => el,
            Err(_) => {
                debug!("click target not found: {}", selector);
                return Ok(false);
            }
        };
        match element.click().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let msg = e.to_string();
                // A node recycled by its own click handler still received the
                // click; only report failure when nothing was delivered.
                if msg.contains("node") || msg.contains("Node") {
                    debug!("click target went stale after dispatch: {}", selector);
                    Ok(true)
                } else {
                    warn!("click failed on {}: {}", selector, msg);
                    Ok(false)
                }
            }
        }
    }

    async fn wait_for(&self, ms: u64) -> AdapterResult<()> {
        self.ensure_open()?;
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> AdapterResult<bool> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        let probe = format!("!!document.querySelector({})", js_str(selector));
        loop {
            if self.eval_bool(&probe).await? {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    async fn get_scroll_height(&self, container: &ScrollContainer) -> AdapterResult<i64> {
        let script = match container {
            ScrollContainer::Window => r#"Math.max(
                document.body ? document.body.scrollHeight : 0,
                document.documentElement ? document.documentElement.scrollHeight : 0)"#
                .to_string(),
            ScrollContainer::Selector(sel) => format!(
                r#"(function() {{
                    const el = document.querySelector({});
                    return el ? el.scrollHeight : 0;
                }})()"#,
                js_str(sel)
            ),
        };
        self.eval_i64(&script).await
    }

    async fn get_scroll_position(&self, container: &ScrollContainer) -> AdapterResult<i64> {
        let script = match container {
            ScrollContainer::Window => {
                "(window.scrollY || document.documentElement.scrollTop || 0)".to_string()
            }
            ScrollContainer::Selector(sel) => format!(
                r#"(function() {{
                    const el = document.querySelector({});
                    return el ? el.scrollTop : 0;
                }})()"#,
                js_str(sel)
            ),
        };
        self.eval_i64(&script).await
    }

    async fn get_item_count(&self, selector: &str) -> AdapterResult<u64> {
        let script = format!("document.querySelectorAll({}).length", js_str(selector));
        Ok(self.eval_i64(&script).await?.max(0) as u64)
    }

    async fn element_exists(&self, selector: &str) -> AdapterResult<bool> {
        let script = format!("!!document.querySelector({})", js_str(selector));
        self.eval_bool(&script).await
    }

    async fn is_element_visible(&self, selector: &str) -> AdapterResult<bool> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({});
                if (!el) return false;
                const rect = el.getBoundingClientRect();
                const style = window.getComputedStyle(el);
                return rect.width > 0 && rect.height > 0 &&
                    style.visibility !== 'hidden' &&
                    style.display !== 'none' &&
                    style.opacity !== '0';
            }})()"#,
            js_str(selector)
        );
        self.eval_bool(&script).await
    }

    async fn scroll_into_view(&self, selector: &str) -> AdapterResult<()> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({});
                if (el) el.scrollIntoView({{ block: 'center', behavior: 'auto' }});
                return !!el;
            }})()"#,
            js_str(selector)
        );
        self.eval(&script).await?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> AdapterResult<()> {
        let page = self.page().await?;
        let body = page
            .find_element("body")
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        body.press_key(key)
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn get_page_content(&self) -> AdapterResult<String> {
        let page = self.page().await?;
        tokio::time::timeout(Duration::from_millis(OP_TIMEOUT_MS), page.content())
            .await
            .map_err(|_| AdapterError::Timeout(OP_TIMEOUT_MS))?
            .map_err(|e| AdapterError::Protocol(e.to_string()))
    }

    async fn get_current_url(&self) -> AdapterResult<String> {
        let page = self.page().await?;
        let url = page
            .url()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn close(&self) -> AdapterResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mut guard = self.inner.lock().await;
        if let Some(mut session) = guard.take() {
            if let Err(e) = session.browser.close().await {
                warn!("browser close failed: {}", e);
            }
            let _ = session.browser.wait().await;
            session.handler_task.abort();
            info!("browser closed");
        }
        Ok(())
    }
}

fn normalize_url(url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        format!("https://{}", url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_bare_hosts() {
        assert_eq!(normalize_url("example.com"), "https://example.com");
        assert_eq!(normalize_url("//cdn.example.com"), "https://cdn.example.com");
        assert_eq!(normalize_url("http://a.b"), "http://a.b");
    }

    #[test]
    fn container_expr_quotes_selectors() {
        let expr = container_expr(&ScrollContainer::Selector(".feed".to_string()));
        assert_eq!(expr, "document.querySelector(\".feed\")");
        assert_eq!(container_expr(&ScrollContainer::Window), "window");
    }
}
