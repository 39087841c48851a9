use crate::behavior::{Behavior, WaitKind};
use crate::browser::PageAdapter;
use crate::config::ScrollConfig;
use crate::error::AdapterResult;
use serde::Serialize;
use tracing::{debug, info};

/// Result of one load-more pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClickOutcome {
    Clicked { selector: String },
    NoCandidate,
    BudgetExhausted,
    ClickFailed { selector: String, reason: String },
}

impl ClickOutcome {
    pub fn clicked(&self) -> bool {
        matches!(self, ClickOutcome::Clicked { .. })
    }
}

/// Probe run inside the page when no explicit selectors are configured.
///
/// Strategies run in order; the first visible and enabled hit wins:
/// text vocabulary, ARIA label, class patterns, data attributes, then any
/// short button/link text containing "more" as a whole word.
const DISCOVER_BUTTON_JS: &str = r#"
(function() {
    const VOCAB = ["load more", "show more", "view more", "see more",
        "more results", "load additional", "show additional",
        "next page", "see all", "view all"];

    function visible(el) {
        const rect = el.getBoundingClientRect();
        const style = window.getComputedStyle(el);
        return rect.width > 0 && rect.height > 0 &&
            style.visibility !== 'hidden' &&
            style.display !== 'none' &&
            style.opacity !== '0';
    }

    function enabled(el) {
        if (el.disabled) return false;
        if (el.getAttribute('aria-disabled') === 'true') return false;
        const cls = (typeof el.className === 'string' ? el.className : '').toLowerCase();
        return !cls.includes('disabled');
    }

    function usable(el) {
        return el && visible(el) && enabled(el);
    }

    function cssPath(el) {
        const parts = [];
        while (el && el.nodeType === Node.ELEMENT_NODE && el !== document.body) {
            let part = el.tagName.toLowerCase();
            if (el.id) {
                parts.unshift(part + '#' + CSS.escape(el.id));
                return parts.join(' > ');
            }
            let index = 1;
            let sibling = el.previousElementSibling;
            while (sibling) {
                if (sibling.tagName === el.tagName) index++;
                sibling = sibling.previousElementSibling;
            }
            parts.unshift(part + ':nth-of-type(' + index + ')');
            el = el.parentElement;
        }
        parts.unshift('body');
        return parts.join(' > ');
    }

    const clickables = Array.from(document.querySelectorAll(
        'button, a, [role="button"], input[type="button"], input[type="submit"]'));

    function firstMatch(pred) {
        for (const el of clickables) {
            if (usable(el) && pred(el)) return el;
        }
        return null;
    }

    function text(el) {
        return ((el.innerText || el.value || '') + '').trim();
    }

    let hit = firstMatch(el => {
        const t = text(el).toLowerCase();
        return VOCAB.some(v => t.includes(v));
    });

    if (!hit) {
        hit = firstMatch(el => {
            const label = (el.getAttribute('aria-label') || '').toLowerCase();
            return label.includes('load') || label.includes('more');
        });
    }

    if (!hit) {
        const classSelectors = ['.load-more', '.show-more', '.loadmore',
            '[class*="loadmore"]', '[class*="load-more"]', '[class*="show-more"]'];
        for (const sel of classSelectors) {
            const el = document.querySelector(sel);
            if (usable(el)) { hit = el; break; }
        }
    }

    if (!hit) {
        const dataSelectors = ['[data-load-more]', '[data-action*="load"]',
            '[data-testid*="load-more"]'];
        for (const sel of dataSelectors) {
            const el = document.querySelector(sel);
            if (usable(el)) { hit = el; break; }
        }
    }

    if (!hit) {
        hit = firstMatch(el => {
            const t = text(el);
            if (t.length >= 50 || t.includes('@')) return false;
            return /\bmore\b/i.test(t);
        });
    }

    return hit ? cssPath(hit) : null;
})()
"#;

/// Detects and clicks "load more"-style controls, tracking the click budget.
///
/// Explicit selectors are a priority list; the first viable match wins. When
/// the list is empty the in-page discovery probe supplies a candidate.
pub struct LoadMoreHandler {
    selectors: Vec<String>,
    max_clicks: u32,
    wait_for_content: u64,
    click_count: u32,
    last_clicked_selector: Option<String>,
}

impl LoadMoreHandler {
    pub fn new(config: &ScrollConfig) -> Self {
        Self {
            selectors: config.load_more_selectors.clone(),
            max_clicks: config.max_load_more_clicks,
            wait_for_content: config.wait_for_content,
            click_count: 0,
            last_clicked_selector: None,
        }
    }

    pub fn reset(&mut self) {
        self.click_count = 0;
        self.last_clicked_selector = None;
    }

    pub fn click_count(&self) -> u32 {
        self.click_count
    }

    pub fn last_clicked_selector(&self) -> Option<&str> {
        self.last_clicked_selector.as_deref()
    }

    /// One load-more pass: find a candidate, hesitate like a human, click,
    /// then wait for the new content to render.
    pub async fn check_and_click(
        &mut self,
        adapter: &dyn PageAdapter,
        config: &ScrollConfig,
        behavior: &mut Behavior,
    ) -> AdapterResult<ClickOutcome> {
        if self.click_count >= self.max_clicks {
            debug!(clicks = self.click_count, "load-more budget exhausted");
            return Ok(ClickOutcome::BudgetExhausted);
        }

        let candidate = if self.selectors.is_empty() {
            self.discover_candidate(adapter).await?
        } else {
            self.scan_explicit(adapter).await?
        };

        let selector = match candidate {
            Some(sel) => sel,
            None => return Ok(ClickOutcome::NoCandidate),
        };

        adapter.scroll_into_view(&selector).await?;
        adapter
            .wait_for(behavior.random_in_range(200, 500))
            .await?;
        adapter
            .wait_for(behavior.wait_time(config, WaitKind::LoadMore))
            .await?;

        if !adapter.click(&selector).await? {
            return Ok(ClickOutcome::ClickFailed {
                selector,
                reason: "click failed".to_string(),
            });
        }

        adapter.wait_for(self.wait_for_content).await?;

        self.click_count += 1;
        self.last_clicked_selector = Some(selector.clone());
        info!(
            selector = %selector,
            clicks = self.click_count,
            "clicked load-more control"
        );
        Ok(ClickOutcome::Clicked { selector })
    }

    /// Walk the configured priority list: exists, visible, not disabled.
    async fn scan_explicit(&self, adapter: &dyn PageAdapter) -> AdapterResult<Option<String>> {
        for selector in &self.selectors {
            if !adapter.element_exists(selector).await? {
                continue;
            }
            if !adapter.is_element_visible(selector).await? {
                continue;
            }
            if self.is_disabled(adapter, selector).await? {
                continue;
            }
            return Ok(Some(selector.clone()));
        }
        Ok(None)
    }

    async fn is_disabled(
        &self,
        adapter: &dyn PageAdapter,
        selector: &str,
    ) -> AdapterResult<bool> {
        let script = format!(
            r#"(function() {{
                const el = document.querySelector({});
                if (!el) return true;
                if (el.disabled) return true;
                if (el.getAttribute('aria-disabled') === 'true') return true;
                const cls = (typeof el.className === 'string' ? el.className : '').toLowerCase();
                return cls.includes('disabled');
            }})()"#,
            serde_json::to_string(selector).unwrap_or_else(|_| "\"\"".to_string())
        );
        Ok(adapter
            .evaluate_script(&script)
            .await?
            .as_bool()
            .unwrap_or(true))
    }

    async fn discover_candidate(
        &self,
        adapter: &dyn PageAdapter,
    ) -> AdapterResult<Option<String>> {
        let value = adapter.evaluate_script(DISCOVER_BUTTON_JS).await?;
        Ok(value.as_str().map(String::from))
    }
}
