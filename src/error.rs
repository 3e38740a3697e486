use std::time::Duration;
use thiserror::Error;

/// Failures raised by a [`Driver`](crate::driver::Driver) implementation.
///
/// Only `ClickIntercepted` and `Stale` are recoverable in place; everything
/// else is reported upward and contained at row scope.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("click intercepted by another element")]
    ClickIntercepted,

    #[error("stale element reference")]
    Stale,

    #[error("element not found")]
    NotFound,

    #[error("wait timed out after {0:?}")]
    Timeout(Duration),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("browser protocol error: {0}")]
    Protocol(String),
}

/// Row-scope extraction failures. None of these are fatal to the crawl;
/// they decide how much of a row survives (see `row` and `session`).
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("row yielded fewer cells than expected")]
    RowExtractionFailed,

    #[error("no detail trigger found in row")]
    TriggerNotFound,

    #[error("detail overlay did not appear")]
    OverlayNotFound,

    #[error("panel {0:?} unavailable")]
    PanelUnavailable(String),

    #[error("overlay failed to close")]
    OverlayCloseFailed,

    #[error(transparent)]
    Driver(#[from] DriverError),
}
