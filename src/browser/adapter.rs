use crate::config::ScrollContainer;
use crate::error::AdapterResult;
use async_trait::async_trait;

/// Readiness to wait for after navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigateWait {
    /// The load event fired.
    Load,
    /// Network quiescent for a short window after load.
    NetworkIdle,
}

impl Default for NavigateWait {
    fn default() -> Self {
        NavigateWait::NetworkIdle
    }
}

/// Capability set over a live browser page.
///
/// Connectivity and protocol failures surface as [`AdapterError`]; "element
/// not found" and "not visible" are normal falsy returns. Implementations must
/// make `close` idempotent, and every other operation must fail with
/// [`AdapterError::Closed`] once `close` has run.
///
/// [`AdapterError`]: crate::error::AdapterError
/// [`AdapterError::Closed`]: crate::error::AdapterError::Closed
#[async_trait]
pub trait PageAdapter: Send + Sync {
    /// Launch the browser and open the page. Idempotent.
    async fn init(&self) -> AdapterResult<()>;

    async fn navigate_to(&self, url: &str, wait: NavigateWait) -> AdapterResult<()>;

    /// Scroll the target by a signed pixel delta.
    async fn scroll_by(&self, px: i64, container: &ScrollContainer) -> AdapterResult<()>;

    async fn scroll_to_top(&self, container: &ScrollContainer) -> AdapterResult<()>;

    async fn scroll_to_bottom(&self, container: &ScrollContainer) -> AdapterResult<()>;

    async fn evaluate_script(&self, script: &str) -> AdapterResult<serde_json::Value>;

    /// Click the first match. Returns `false` when nothing matched or the
    /// element could not receive the click; never errors for "not found".
    async fn click(&self, selector: &str) -> AdapterResult<bool>;

    /// Sleep for at least `ms` milliseconds.
    async fn wait_for(&self, ms: u64) -> AdapterResult<()> {
        tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
        Ok(())
    }

    /// Poll until the selector matches. `true` if it appeared in time.
    async fn wait_for_element(&self, selector: &str, timeout_ms: u64) -> AdapterResult<bool>;

    /// Total scroll height of the container, 0 if it is missing.
    async fn get_scroll_height(&self, container: &ScrollContainer) -> AdapterResult<i64>;

    /// Current scroll offset of the container, 0 if it is missing.
    async fn get_scroll_position(&self, container: &ScrollContainer) -> AdapterResult<i64>;

    async fn get_item_count(&self, selector: &str) -> AdapterResult<u64>;

    async fn element_exists(&self, selector: &str) -> AdapterResult<bool>;

    /// Visible means: width > 0, height > 0, visibility not hidden, display
    /// not none, opacity not 0.
    async fn is_element_visible(&self, selector: &str) -> AdapterResult<bool>;

    /// Best-effort scroll to bring the element into the viewport.
    async fn scroll_into_view(&self, selector: &str) -> AdapterResult<()>;

    /// Dispatch a keyboard key (e.g. "End", "PageDown") to the page.
    async fn press_key(&self, key: &str) -> AdapterResult<()>;

    /// Full current HTML of the page.
    async fn get_page_content(&self) -> AdapterResult<String>;

    async fn get_current_url(&self) -> AdapterResult<String>;

    /// Release the browser and page. Idempotent.
    async fn close(&self) -> AdapterResult<()>;
}
