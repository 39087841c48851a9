//! Scripted in-memory page for driving the engine without a browser.

use async_trait::async_trait;
use deepscroll::config::ScrollContainer;
use deepscroll::error::{AdapterError, AdapterResult};
use deepscroll::events::{EventSink, ScrollEvent};
use deepscroll::PageAdapter;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// A load-more button on the scripted page.
#[derive(Debug, Clone)]
pub struct FakeButton {
    pub selector: String,
    /// How many clicks the page will accept before the button stops working.
    pub clicks_available: u32,
    /// Items added per successful click.
    pub adds_items: u64,
    pub adds_height: i64,
}

#[derive(Debug)]
struct PageState {
    item_count: u64,
    scroll_height: i64,
    scroll_position: i64,
    /// Items added per scroll trigger while growth rounds remain.
    grows_by: u64,
    grows_height_by: i64,
    growth_rounds: u32,
    scrolls_done: u32,
    button: Option<FakeButton>,
    /// Sentinel selector becomes visible once this many scrolls happened.
    sentinel: Option<(String, u32)>,
    item_selector: Option<String>,
    disabled_selectors: HashSet<String>,
    discovered_selector: Option<String>,
    url: String,
    calls: Vec<String>,
}

/// Scripted [`PageAdapter`]: content growth, buttons, and sentinels follow a
/// schedule instead of a real DOM. Waits are instant unless `honor_waits` is
/// set, so engine tests run at full speed.
pub struct FakePage {
    state: Mutex<PageState>,
    closed: AtomicBool,
    close_calls: AtomicU32,
    honor_waits: bool,
    on_scroll: Mutex<Option<Box<dyn Fn(u32) + Send + Sync>>>,
}

impl FakePage {
    pub fn new(initial_items: u64) -> Self {
        Self {
            state: Mutex::new(PageState {
                item_count: initial_items,
                scroll_height: 2000,
                scroll_position: 0,
                grows_by: 0,
                grows_height_by: 0,
                growth_rounds: 0,
                scrolls_done: 0,
                button: None,
                sentinel: None,
                item_selector: None,
                disabled_selectors: HashSet::new(),
                discovered_selector: None,
                url: String::new(),
                calls: Vec::new(),
            }),
            closed: AtomicBool::new(false),
            close_calls: AtomicU32::new(0),
            honor_waits: false,
            on_scroll: Mutex::new(None),
        }
    }

    /// Grow by `items` per scroll for `rounds` scrolls, then flatline.
    pub fn grows(self, items: u64, rounds: u32) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.grows_by = items;
            s.grows_height_by = 400;
            s.growth_rounds = rounds;
        }
        self
    }

    pub fn with_item_selector(self, selector: &str) -> Self {
        self.state.lock().unwrap().item_selector = Some(selector.to_string());
        self
    }

    pub fn with_button(self, button: FakeButton) -> Self {
        self.state.lock().unwrap().button = Some(button);
        self
    }

    pub fn with_sentinel(self, selector: &str, visible_after_scrolls: u32) -> Self {
        self.state.lock().unwrap().sentinel =
            Some((selector.to_string(), visible_after_scrolls));
        self
    }

    pub fn with_disabled(self, selector: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .disabled_selectors
            .insert(selector.to_string());
        self
    }

    pub fn with_discovered_button(self, css_path: &str, button: FakeButton) -> Self {
        {
            let mut s = self.state.lock().unwrap();
            s.discovered_selector = Some(css_path.to_string());
            s.button = Some(button);
        }
        self
    }

    /// Actually sleep on `wait_for`, for wall-clock guard tests.
    pub fn honoring_waits(mut self) -> Self {
        self.honor_waits = true;
        self
    }

    /// Callback fired after each scroll trigger with the scroll count so far.
    pub fn on_scroll(&self, f: impl Fn(u32) + Send + Sync + 'static) {
        *self.on_scroll.lock().unwrap() = Some(Box::new(f));
    }

    /// Simulate the browser dying mid-run: every later call errors.
    pub fn kill(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn close_calls(&self) -> u32 {
        self.close_calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn scroll_by_deltas(&self) -> Vec<i64> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter_map(|c| c.strip_prefix("scroll_by:").and_then(|v| v.parse().ok()))
            .collect()
    }

    fn guard(&self) -> AdapterResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AdapterError::Closed);
        }
        Ok(())
    }

    fn record(&self, call: impl Into<String>) {
        self.state.lock().unwrap().calls.push(call.into());
    }

    /// A downward movement that reached for new content.
    fn scroll_trigger(&self) {
        let count = {
            let mut s = self.state.lock().unwrap();
            s.scrolls_done += 1;
            if s.scrolls_done <= s.growth_rounds {
                s.item_count += s.grows_by;
                s.scroll_height += s.grows_height_by;
            }
            s.scrolls_done
        };
        if let Some(f) = self.on_scroll.lock().unwrap().as_ref() {
            f(count);
        }
    }

    fn quoted(selector: &str) -> String {
        serde_json::to_string(selector).unwrap()
    }
}

#[async_trait]
impl PageAdapter for FakePage {
    async fn init(&self) -> AdapterResult<()> {
        self.guard()?;
        self.record("init");
        Ok(())
    }

    async fn navigate_to(
        &self,
        url: &str,
        _wait: deepscroll::NavigateWait,
    ) -> AdapterResult<()> {
        self.guard()?;
        self.record(format!("navigate:{}", url));
        self.state.lock().unwrap().url = url.to_string();
        Ok(())
    }

    async fn scroll_by(&self, px: i64, _container: &ScrollContainer) -> AdapterResult<()> {
        self.guard()?;
        self.record(format!("scroll_by:{}", px));
        {
            let mut s = self.state.lock().unwrap();
            s.scroll_position = (s.scroll_position + px).clamp(0, s.scroll_height);
        }
        if px > 0 {
            self.scroll_trigger();
        }
        Ok(())
    }

    async fn scroll_to_top(&self, _container: &ScrollContainer) -> AdapterResult<()> {
        self.guard()?;
        self.record("scroll_to_top");
        self.state.lock().unwrap().scroll_position = 0;
        Ok(())
    }

    async fn scroll_to_bottom(&self, _container: &ScrollContainer) -> AdapterResult<()> {
        self.guard()?;
        self.record("scroll_to_bottom");
        {
            let mut s = self.state.lock().unwrap();
            s.scroll_position = s.scroll_height;
        }
        self.scroll_trigger();
        Ok(())
    }

    async fn evaluate_script(&self, script: &str) -> AdapterResult<serde_json::Value> {
        self.guard()?;
        let s = self.state.lock().unwrap();
        // The disabled probe embeds the quoted selector.
        if script.contains("aria-disabled") {
            let hit = s
                .disabled_selectors
                .iter()
                .any(|sel| script.contains(&Self::quoted(sel)));
            return Ok(serde_json::Value::Bool(hit));
        }
        // The discovery probe carries the text vocabulary.
        if script.contains("VOCAB") {
            return Ok(match &s.discovered_selector {
                Some(sel) => serde_json::Value::String(sel.clone()),
                None => serde_json::Value::Null,
            });
        }
        Ok(serde_json::Value::Null)
    }

    async fn click(&self, selector: &str) -> AdapterResult<bool> {
        self.guard()?;
        self.record(format!("click:{}", selector));
        let mut s = self.state.lock().unwrap();
        if s.disabled_selectors.contains(selector) {
            return Ok(false);
        }
        if let Some(button) = &mut s.button {
            if button.selector == selector && button.clicks_available > 0 {
                button.clicks_available -= 1;
                let adds_items = button.adds_items;
                let adds_height = button.adds_height;
                s.item_count += adds_items;
                s.scroll_height += adds_height;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn wait_for(&self, ms: u64) -> AdapterResult<()> {
        self.guard()?;
        if self.honor_waits {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        Ok(())
    }

    async fn wait_for_element(&self, selector: &str, _timeout_ms: u64) -> AdapterResult<bool> {
        self.guard()?;
        self.record(format!("wait_for_element:{}", selector));
        let s = self.state.lock().unwrap();
        Ok(s.item_selector.as_deref() == Some(selector) && s.item_count > 0)
    }

    async fn get_scroll_height(&self, _container: &ScrollContainer) -> AdapterResult<i64> {
        self.guard()?;
        Ok(self.state.lock().unwrap().scroll_height)
    }

    async fn get_scroll_position(&self, _container: &ScrollContainer) -> AdapterResult<i64> {
        self.guard()?;
        Ok(self.state.lock().unwrap().scroll_position)
    }

    async fn get_item_count(&self, selector: &str) -> AdapterResult<u64> {
        self.guard()?;
        let s = self.state.lock().unwrap();
        if s.item_selector.as_deref() == Some(selector) {
            Ok(s.item_count)
        } else {
            Ok(0)
        }
    }

    async fn element_exists(&self, selector: &str) -> AdapterResult<bool> {
        self.guard()?;
        let s = self.state.lock().unwrap();
        if let Some(button) = &s.button {
            if button.selector == selector {
                return Ok(button.clicks_available > 0);
            }
        }
        if let Some((sentinel, after)) = &s.sentinel {
            if sentinel == selector {
                return Ok(s.scrolls_done >= *after);
            }
        }
        Ok(s.disabled_selectors.contains(selector))
    }

    async fn is_element_visible(&self, selector: &str) -> AdapterResult<bool> {
        self.element_exists(selector).await
    }

    async fn scroll_into_view(&self, selector: &str) -> AdapterResult<()> {
        self.guard()?;
        self.record(format!("scroll_into_view:{}", selector));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> AdapterResult<()> {
        self.guard()?;
        self.record(format!("press_key:{}", key));
        Ok(())
    }

    async fn get_page_content(&self) -> AdapterResult<String> {
        self.guard()?;
        let s = self.state.lock().unwrap();
        Ok(format!(
            "<html><body data-items=\"{}\"></body></html>",
            s.item_count
        ))
    }

    async fn get_current_url(&self) -> AdapterResult<String> {
        self.guard()?;
        Ok(self.state.lock().unwrap().url.clone())
    }

    async fn close(&self) -> AdapterResult<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that keeps every event for assertions.
#[derive(Default)]
pub struct CollectingSink {
    events: Mutex<Vec<ScrollEvent>>,
}

impl CollectingSink {
    pub fn events(&self) -> Vec<ScrollEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for CollectingSink {
    fn on_event(&self, event: &ScrollEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
