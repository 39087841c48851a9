use crate::browser::PageAdapter;
use crate::config::{DetectionMethod, ScrollConfig, ScrollContainer};
use crate::error::AdapterResult;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of one per-iteration progress check.
#[derive(Debug, Clone)]
pub struct ProgressCheck {
    pub has_progress: bool,
    pub should_stop: bool,
    pub reason: Option<String>,
    pub item_count: u64,
    pub scroll_height: i64,
    pub no_progress_count: u32,
}

/// Stateful observer deciding whether the last scroll iteration produced
/// progress and whether the loop should stop.
///
/// Termination comes only from the no-progress counter and the max-duration
/// guard; elapsed time since the last progress is tracked for diagnostics but
/// never stops the run on its own.
pub struct ProgressDetector {
    method: DetectionMethod,
    item_selector: Option<String>,
    sentinel_selector: Option<String>,
    container: ScrollContainer,
    progress_timeout: u32,
    max_duration: Duration,

    last_item_count: u64,
    last_scroll_height: i64,
    no_progress_count: u32,
    start_time: Instant,
    last_progress_time: Instant,
    fallback_warned: bool,
}

impl ProgressDetector {
    pub fn new(config: &ScrollConfig) -> Self {
        let now = Instant::now();
        Self {
            method: config.detection_method,
            item_selector: config.item_selector.clone(),
            sentinel_selector: config.sentinel_selector.clone(),
            container: config.scroll_container.clone(),
            progress_timeout: config.progress_timeout,
            max_duration: Duration::from_secs(config.max_duration_seconds),
            last_item_count: 0,
            last_scroll_height: 0,
            no_progress_count: 0,
            start_time: now,
            last_progress_time: now,
            fallback_warned: false,
        }
    }

    /// Clear counters and timestamps. Called at engine-run start.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.last_item_count = 0;
        self.last_scroll_height = 0;
        self.no_progress_count = 0;
        self.start_time = now;
        self.last_progress_time = now;
        self.fallback_warned = false;
    }

    /// Capture baselines once navigation has settled.
    pub async fn initialize(&mut self, adapter: &dyn PageAdapter) -> AdapterResult<()> {
        self.reset();
        self.last_item_count = self.query_item_count(adapter).await?;
        self.last_scroll_height = adapter.get_scroll_height(&self.container).await?;
        debug!(
            items = self.last_item_count,
            height = self.last_scroll_height,
            "progress baselines captured"
        );
        Ok(())
    }

    pub fn last_item_count(&self) -> u64 {
        self.last_item_count
    }

    pub fn last_scroll_height(&self) -> i64 {
        self.last_scroll_height
    }

    pub fn seconds_since_progress(&self) -> u64 {
        self.last_progress_time.elapsed().as_secs()
    }

    /// Run the configured check once, then overlay the max-duration guard.
    pub async fn check_progress(
        &mut self,
        adapter: &dyn PageAdapter,
    ) -> AdapterResult<ProgressCheck> {
        let mut check = match self.method {
            DetectionMethod::ItemCount => self.check_item_count(adapter).await?,
            DetectionMethod::ScrollHeight => self.check_scroll_height(adapter).await?,
            DetectionMethod::Sentinel => self.check_sentinel(adapter).await?,
        };

        if self.start_time.elapsed() >= self.max_duration {
            check.should_stop = true;
            check.reason = Some("Maximum duration reached".to_string());
        }
        Ok(check)
    }

    async fn query_item_count(&self, adapter: &dyn PageAdapter) -> AdapterResult<u64> {
        match &self.item_selector {
            Some(sel) => adapter.get_item_count(sel).await,
            None => Ok(0),
        }
    }

    async fn check_item_count(&mut self, adapter: &dyn PageAdapter) -> AdapterResult<ProgressCheck> {
        let count = self.query_item_count(adapter).await?;
        let height = adapter.get_scroll_height(&self.container).await?;
        // Strict increase only. Virtualized lists shrink the count; that is
        // still no progress.
        let has_progress = count > self.last_item_count;
        if has_progress {
            self.no_progress_count = 0;
            self.last_item_count = count;
            self.last_progress_time = Instant::now();
        } else {
            self.no_progress_count += 1;
            debug!(
                stalled_for = self.seconds_since_progress(),
                count = count,
                "no new items"
            );
        }
        self.last_scroll_height = self.last_scroll_height.max(height);
        Ok(self.build_check(has_progress, count, height))
    }

    async fn check_scroll_height(
        &mut self,
        adapter: &dyn PageAdapter,
    ) -> AdapterResult<ProgressCheck> {
        let height = adapter.get_scroll_height(&self.container).await?;
        let count = self.query_item_count(adapter).await?;
        let has_progress = height > self.last_scroll_height;
        if has_progress {
            self.no_progress_count = 0;
            self.last_scroll_height = height;
            self.last_progress_time = Instant::now();
        } else {
            self.no_progress_count += 1;
            debug!(
                stalled_for = self.seconds_since_progress(),
                height = height,
                "scroll height unchanged"
            );
        }
        self.last_item_count = self.last_item_count.max(count);
        Ok(self.build_check(has_progress, count, height))
    }

    async fn check_sentinel(&mut self, adapter: &dyn PageAdapter) -> AdapterResult<ProgressCheck> {
        let sentinel = match self.sentinel_selector.clone() {
            Some(sel) => sel,
            None => {
                if !self.fallback_warned {
                    warn!("sentinel detection requested without sentinel_selector; falling back to item count");
                    self.fallback_warned = true;
                }
                return self.check_item_count(adapter).await;
            }
        };

        if adapter.is_element_visible(&sentinel).await? {
            let count = self.query_item_count(adapter).await?;
            let height = adapter.get_scroll_height(&self.container).await?;
            self.last_item_count = self.last_item_count.max(count);
            self.last_scroll_height = self.last_scroll_height.max(height);
            let mut check = self.build_check(false, count, height);
            check.should_stop = true;
            check.reason = Some("End of content sentinel detected".to_string());
            return Ok(check);
        }

        // Sentinel not visible yet: run the item-count check so the
        // no-progress counters keep advancing.
        self.check_item_count(adapter).await
    }

    fn build_check(&self, has_progress: bool, count: u64, height: i64) -> ProgressCheck {
        let should_stop = self.no_progress_count >= self.progress_timeout;
        let reason = if should_stop {
            Some(format!(
                "No new content after {} attempts",
                self.no_progress_count
            ))
        } else {
            None
        };
        ProgressCheck {
            has_progress,
            should_stop,
            reason,
            item_count: count,
            scroll_height: height,
            no_progress_count: self.no_progress_count,
        }
    }
}
