pub mod behavior;
pub mod browser;
pub mod config;
pub mod detector;
pub mod engine;
pub mod error;
pub mod events;
pub mod load_more;
pub mod orchestrator;

// Re-export commonly used types
pub use behavior::{Behavior, WaitKind};
pub use browser::{ChromiumAdapter, NavigateWait, PageAdapter};
pub use config::{DetectionMethod, ScrollConfig, ScrollContainer, ScrollMode, ScrollOptions};
pub use engine::{RunResult, ScrollEngine, ScrollStats, StopHandle};
pub use error::{AdapterError, ScrollError};
pub use events::{EventSink, NoopSink, ScrollEvent};
pub use load_more::{ClickOutcome, LoadMoreHandler};
pub use orchestrator::{LoadOutcome, Orchestrator};

use std::path::Path;
use std::sync::{Mutex, OnceLock};

/// Handle of the run currently in flight, if any. One URL per invocation, so
/// at most one run is active per process.
fn active_run() -> &'static Mutex<Option<StopHandle>> {
    static ACTIVE: OnceLock<Mutex<Option<StopHandle>>> = OnceLock::new();
    ACTIVE.get_or_init(|| Mutex::new(None))
}

pub(crate) fn register_active_run(handle: StopHandle) {
    if let Ok(mut guard) = active_run().lock() {
        *guard = Some(handle);
    }
}

pub(crate) fn clear_active_run() {
    if let Ok(mut guard) = active_run().lock() {
        *guard = None;
    }
}

/// Load a URL with an explicit configuration, scrolling until the page stops
/// revealing content, and return the materialized HTML plus run statistics.
pub async fn load_page(url: &str, config: &ScrollConfig) -> LoadOutcome {
    Orchestrator::new(config.clone()).load(url).await
}

/// Like [`load_page`], reading the configuration from a JSON or YAML file.
pub async fn load_page_with_config_file(url: &str, path: impl AsRef<Path>) -> LoadOutcome {
    match ScrollConfig::from_file(path) {
        Ok(config) => load_page(url, &config).await,
        Err(e) => LoadOutcome {
            success: false,
            html: None,
            stats: None,
            errors: vec![e.to_string()],
        },
    }
}

/// Load a URL from a partial option set, filling library defaults for
/// everything left unset.
pub async fn load_with_options(url: &str, options: ScrollOptions) -> LoadOutcome {
    load_page(url, &options.into_config()).await
}

/// Cancel the currently running engine, if any. The run winds down
/// cooperatively and still reports success with an external-stop reason.
pub fn stop() {
    if let Ok(guard) = active_run().lock() {
        if let Some(handle) = guard.as_ref() {
            handle.stop();
        }
    }
}
