use thiserror::Error;

/// Failures surfaced by a [`PageAdapter`](crate::browser::PageAdapter)
/// implementation.
///
/// These cover connectivity and protocol problems only. "Element not found"
/// and "element not visible" are normal falsy returns on the adapter methods
/// themselves, never errors.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("adapter already closed")]
    Closed,

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Fatal errors for a whole page-load run.
///
/// Only these three kinds terminate a run with `success = false`. Everything
/// else (missing initial content, a failed load-more click, a detection
/// fallback) is logged and the run continues.
#[derive(Debug, Error)]
pub enum ScrollError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("navigation failure: {0}")]
    Navigation(#[source] AdapterError),

    #[error("adapter failure: {0}")]
    Adapter(#[from] AdapterError),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
