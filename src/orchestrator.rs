use crate::browser::{ChromiumAdapter, NavigateWait, PageAdapter};
use crate::config::ScrollConfig;
use crate::engine::{RunResult, ScrollEngine, ScrollStats};
use crate::error::ScrollError;
use crate::events::EventSink;
use std::sync::Arc;
use tracing::{info, warn};

/// How long to wait for the item selector after navigation before giving up
/// with a warning.
const INITIAL_CONTENT_TIMEOUT_MS: u64 = 10_000;

/// What a page-load run hands back to the caller.
#[derive(Debug)]
pub struct LoadOutcome {
    pub success: bool,
    pub html: Option<String>,
    pub stats: Option<ScrollStats>,
    pub errors: Vec<String>,
}

impl LoadOutcome {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            html: None,
            stats: None,
            errors: vec![message],
        }
    }
}

/// Thin supervisor: build the adapter, navigate, wait for initial content,
/// run the engine, and guarantee teardown on every exit path.
pub struct Orchestrator {
    config: ScrollConfig,
    sink: Option<Arc<dyn EventSink>>,
}

impl Orchestrator {
    pub fn new(config: ScrollConfig) -> Self {
        Self { config, sink: None }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Load one URL end to end with the default Chromium adapter.
    pub async fn load(&self, url: &str) -> LoadOutcome {
        if let Err(e) = self.config.validate() {
            return LoadOutcome::failure(e.to_string());
        }
        let adapter: Arc<dyn PageAdapter> = Arc::new(ChromiumAdapter::new(&self.config));
        self.load_with(url, adapter).await
    }

    /// Load one URL against any [`PageAdapter`]. The adapter is closed exactly
    /// once whatever happens in between.
    pub async fn load_with(&self, url: &str, adapter: Arc<dyn PageAdapter>) -> LoadOutcome {
        let outcome = match self.config.validate() {
            Ok(()) => self.drive(url, adapter.clone()).await,
            Err(e) => LoadOutcome::failure(e.to_string()),
        };
        if let Err(e) = adapter.close().await {
            warn!("adapter close failed: {}", e);
        }
        outcome
    }

    async fn drive(&self, url: &str, adapter: Arc<dyn PageAdapter>) -> LoadOutcome {
        if let Err(e) = adapter.init().await {
            return LoadOutcome::failure(ScrollError::Adapter(e).to_string());
        }

        if let Err(e) = adapter.navigate_to(url, NavigateWait::NetworkIdle).await {
            return LoadOutcome::failure(ScrollError::Navigation(e).to_string());
        }

        if let Some(selector) = &self.config.item_selector {
            match adapter
                .wait_for_element(selector, INITIAL_CONTENT_TIMEOUT_MS)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    // Missing initial content is a warning, not an error: the
                    // page may reveal items only once scrolling starts.
                    warn!(
                        selector = %selector,
                        "item selector did not appear within {} ms",
                        INITIAL_CONTENT_TIMEOUT_MS
                    );
                }
                Err(e) => {
                    return LoadOutcome::failure(ScrollError::Adapter(e).to_string());
                }
            }
        }

        let mut engine = ScrollEngine::new(adapter, self.config.clone());
        if let Some(sink) = &self.sink {
            engine = engine.with_event_sink(sink.clone());
        }

        crate::register_active_run(engine.stop_handle());
        let result = engine.run().await;
        crate::clear_active_run();

        info!(
            success = result.success,
            attempts = result.stats.scroll_attempts,
            items = result.stats.final_item_count,
            "page load finished"
        );
        outcome_from_run(result)
    }
}

fn outcome_from_run(result: RunResult) -> LoadOutcome {
    let errors = result
        .error
        .as_ref()
        .map(|e| vec![e.to_string()])
        .unwrap_or_default();
    LoadOutcome {
        success: result.success,
        html: result.html,
        stats: Some(result.stats),
        errors,
    }
}
