use crate::behavior::{Behavior, WaitKind, PAUSE_PROBABILITY};
use crate::browser::PageAdapter;
use crate::config::{DetectionMethod, ScrollConfig, ScrollMode};
use crate::detector::ProgressDetector;
use crate::error::ScrollError;
use crate::events::{EventSink, NoopSink, ScrollEvent};
use crate::load_more::{ClickOutcome, LoadMoreHandler};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pixels above the container bottom where infinite-scroll fetches fire.
const TRIGGER_ZONE_PX: i64 = 500;

/// Minimum distance worth scrolling toward the trigger zone; anything less
/// goes straight to the bottom.
const MIN_TRIGGER_DELTA_PX: i64 = 100;

/// Consecutive stalled iterations before the engine nudges the page with an
/// up-drift cycle and an End key press.
const NUDGE_AFTER_STALLS: u32 = 2;

/// Final statistics for one engine run.
#[derive(Debug, Clone, Serialize)]
pub struct ScrollStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub scroll_attempts: u32,
    pub max_scroll_attempts: u32,
    pub duration_seconds: f64,
    pub max_duration_seconds: u64,
    pub final_item_count: u64,
    pub final_scroll_height: i64,
    pub load_more_clicks: u32,
    pub detection_method: DetectionMethod,
    pub stopped_reason: Option<String>,
    pub timeline: Vec<ScrollEvent>,
}

/// Outcome of [`ScrollEngine::run`].
#[derive(Debug)]
pub struct RunResult {
    pub success: bool,
    pub stats: ScrollStats,
    pub html: Option<String>,
    pub error: Option<ScrollError>,
}

/// Handle for cancelling a running engine from outside the loop.
#[derive(Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

enum Verdict {
    Stopped(String),
    Cancelled,
}

/// The driver loop: scroll, wait, click, observe, decide.
///
/// One engine instance serves one run; the engine holds exclusive ownership of
/// the adapter for its lifetime and runs as a single cooperative task.
pub struct ScrollEngine {
    adapter: Arc<dyn PageAdapter>,
    config: ScrollConfig,
    behavior: Behavior,
    detector: ProgressDetector,
    load_more: LoadMoreHandler,
    sink: Arc<dyn EventSink>,
    cancel: CancellationToken,

    scroll_attempts: u32,
    button_first: bool,
    last_height: i64,
    timeline: Vec<ScrollEvent>,
    start: Instant,
}

impl ScrollEngine {
    pub fn new(adapter: Arc<dyn PageAdapter>, config: ScrollConfig) -> Self {
        let detector = ProgressDetector::new(&config);
        let load_more = LoadMoreHandler::new(&config);
        Self {
            adapter,
            config,
            behavior: Behavior::new(),
            detector,
            load_more,
            sink: Arc::new(NoopSink),
            cancel: CancellationToken::new(),
            scroll_attempts: 0,
            button_first: false,
            last_height: 0,
            timeline: Vec::new(),
            start: Instant::now(),
        }
    }

    /// Replace the timing policy, e.g. with a seeded one for reproducibility.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.cancel.clone(),
        }
    }

    /// Drive the loop to completion. One call per engine instance.
    pub async fn run(&mut self) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        self.start = Instant::now();
        self.scroll_attempts = 0;
        self.button_first = false;
        self.timeline.clear();
        self.load_more.reset();

        info!(
            %run_id,
            method = %self.config.detection_method,
            max_attempts = self.config.max_scroll_attempts,
            "scroll engine starting"
        );

        let outcome = match self.detector.initialize(self.adapter.as_ref()).await {
            Ok(()) => {
                self.last_height = self.detector.last_scroll_height();
                self.run_loop().await
            }
            Err(e) => Err(ScrollError::Adapter(e)),
        };

        match outcome {
            Ok(verdict) => {
                let reason = match verdict {
                    Verdict::Stopped(reason) => reason,
                    Verdict::Cancelled => "External stop requested".to_string(),
                };
                info!(reason = %reason, attempts = self.scroll_attempts, "scroll engine stopping");
                match self.adapter.get_page_content().await {
                    Ok(html) => RunResult {
                        success: true,
                        stats: self.build_stats(run_id, started_at, Some(reason)),
                        html: Some(html),
                        error: None,
                    },
                    Err(e) => {
                        let err = ScrollError::Adapter(e);
                        warn!("failed to capture final HTML: {}", err);
                        RunResult {
                            success: false,
                            stats: self.build_stats(run_id, started_at, Some(reason)),
                            html: None,
                            error: Some(err),
                        }
                    }
                }
            }
            Err(err) => {
                warn!("scroll engine failed: {}", err);
                RunResult {
                    success: false,
                    stats: self.build_stats(run_id, started_at, None),
                    html: None,
                    error: Some(err),
                }
            }
        }
    }

    async fn run_loop(&mut self) -> Result<Verdict, ScrollError> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(Verdict::Cancelled);
            }
            if self.scroll_attempts >= self.config.max_scroll_attempts {
                return Ok(Verdict::Stopped("Maximum scroll attempts reached".to_string()));
            }

            let mut clicked_this_iteration = false;

            // Button-first mode: a site paginating by button does not need
            // more scrolling, so try the button before touching the wheel.
            if self.button_first {
                let outcome = self.attempt_load_more().await?;
                if outcome.clicked() {
                    clicked_this_iteration = true;
                } else {
                    debug!("load-more button gone; resuming scroll-first iteration");
                    self.button_first = false;
                }
            }

            if !clicked_this_iteration {
                self.scroll_step().await?;

                let settle = self.behavior.wait_time(&self.config, WaitKind::Scroll);
                self.adapter.wait_for(settle).await?;

                if self.behavior.should_pause(PAUSE_PROBABILITY) {
                    let pause = self.behavior.pause_duration();
                    debug!(ms = pause, "human pause");
                    self.adapter.wait_for(pause).await?;
                }

                self.adapter.wait_for(self.config.wait_for_content).await?;

                if self.cancel.is_cancelled() {
                    return Ok(Verdict::Cancelled);
                }

                let outcome = self.attempt_load_more().await?;
                if outcome.clicked() {
                    self.adapter.wait_for(self.config.wait_for_content).await?;
                    self.button_first = true;
                    clicked_this_iteration = true;
                }
            }

            let check = self
                .detector
                .check_progress(self.adapter.as_ref())
                .await
                .map_err(ScrollError::Adapter)?;

            if check.scroll_height != self.last_height {
                self.emit(ScrollEvent::HeightChange {
                    scroll_count: self.scroll_attempts,
                    at_ms: self.elapsed_ms(),
                    previous: self.last_height,
                    current: check.scroll_height,
                });
                self.last_height = check.scroll_height;
            }

            if !check.has_progress && !check.should_stop && check.no_progress_count >= NUDGE_AFTER_STALLS
            {
                self.nudge().await?;
            }

            self.scroll_attempts += 1;

            if check.should_stop {
                let reason = check
                    .reason
                    .unwrap_or_else(|| "Detector requested stop".to_string());
                return Ok(Verdict::Stopped(reason));
            }
        }
    }

    /// One scroll movement in the configured mode.
    async fn scroll_step(&mut self) -> Result<(), ScrollError> {
        let container = self.config.scroll_container.clone();
        match self.config.scroll_mode {
            ScrollMode::TriggerZone => {
                let height = self.adapter.get_scroll_height(&container).await?;
                let position = self.adapter.get_scroll_position(&container).await?;
                let target =
                    (height - self.config.viewport.height as i64 - TRIGGER_ZONE_PX).max(0);
                let delta = target - position;
                if delta > MIN_TRIGGER_DELTA_PX {
                    self.adapter.scroll_by(delta, &container).await?;
                    self.emit(ScrollEvent::ScrollBatch {
                        scroll_count: self.scroll_attempts,
                        at_ms: self.elapsed_ms(),
                        position: target,
                        height,
                    });
                } else {
                    self.adapter.scroll_to_bottom(&container).await?;
                    self.emit(ScrollEvent::ScrollBatch {
                        scroll_count: self.scroll_attempts,
                        at_ms: self.elapsed_ms(),
                        position: height,
                        height,
                    });
                }
            }
            ScrollMode::Simple => {
                let amount = self.behavior.scroll_amount(&self.config);
                self.adapter.scroll_by(amount, &container).await?;
                let position = self.adapter.get_scroll_position(&container).await?;
                self.emit(ScrollEvent::ScrollBatch {
                    scroll_count: self.scroll_attempts,
                    at_ms: self.elapsed_ms(),
                    position,
                    height: self.last_height,
                });
            }
        }
        Ok(())
    }

    async fn attempt_load_more(&mut self) -> Result<ClickOutcome, ScrollError> {
        let outcome = self
            .load_more
            .check_and_click(self.adapter.as_ref(), &self.config, &mut self.behavior)
            .await
            .map_err(ScrollError::Adapter)?;
        match &outcome {
            ClickOutcome::Clicked { selector } => {
                self.emit(ScrollEvent::ButtonClick {
                    scroll_count: self.scroll_attempts,
                    at_ms: self.elapsed_ms(),
                    selector: selector.clone(),
                });
            }
            ClickOutcome::ClickFailed { selector, reason } => {
                warn!(selector = %selector, reason = %reason, "load-more click failed");
            }
            _ => {}
        }
        Ok(outcome)
    }

    /// Stall escalation: drift up, jump back down, and press End. Some lazy
    /// loaders only fire after a direction change or a keyboard scroll. The
    /// drift distance samples the configured scroll range, so every scroll_by
    /// the engine issues stays within it.
    async fn nudge(&mut self) -> Result<(), ScrollError> {
        let container = self.config.scroll_container.clone();
        debug!("progress stalled; nudging with up-down cycle and End key");
        let drift = self.behavior.scroll_amount(&self.config);
        self.adapter.scroll_by(-drift, &container).await?;
        self.adapter.wait_for(self.behavior.jitter(300, 0.3)).await?;
        self.adapter.scroll_to_bottom(&container).await?;
        if let Err(e) = self.adapter.press_key("End").await {
            debug!("End key press failed: {}", e);
        }
        Ok(())
    }

    fn emit(&mut self, event: ScrollEvent) {
        self.sink.on_event(&event);
        self.timeline.push(event);
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn build_stats(
        &mut self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        stopped_reason: Option<String>,
    ) -> ScrollStats {
        let duration = self.start.elapsed().as_secs_f64();
        ScrollStats {
            run_id,
            started_at,
            scroll_attempts: self.scroll_attempts,
            max_scroll_attempts: self.config.max_scroll_attempts,
            duration_seconds: (duration * 10.0).round() / 10.0,
            max_duration_seconds: self.config.max_duration_seconds,
            final_item_count: self.detector.last_item_count(),
            final_scroll_height: self.detector.last_scroll_height(),
            load_more_clicks: self.load_more.click_count(),
            detection_method: self.config.detection_method,
            stopped_reason,
            timeline: std::mem::take(&mut self.timeline),
        }
    }
}
