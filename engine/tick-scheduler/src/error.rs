//! Error types for TickScheduler

use crate::notifier::EventKind;
use thiserror::Error;

/// Error type returned by event handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur in the TickScheduler
#[derive(Error, Debug)]
pub enum TimerError {
    #[error("Handler for '{event}' failed: {source}")]
    Handler {
        event: EventKind,
        #[source]
        source: HandlerError,
    },

    #[error("No tokio runtime available to schedule work")]
    NoRuntime,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML write error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why a running scheduler stopped arming wake-ups without an explicit stop
///
/// The scheduler stays `Running` and emits no notification; the next `start` clears the halt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    #[error("session has no reference mark to measure drift against")]
    MissingReferenceMark,

    #[error("monotonic clock reading unavailable")]
    ClockUnavailable,

    #[error("no tokio runtime available to host the next wake-up")]
    NoRuntime,
}
