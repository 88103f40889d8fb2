//! # Error types
//!
//! One `thiserror` enum covering every error kind the engine recognises (§7). `Interrupt` is a
//! variant here rather than a separate exception type because Rust has no distinct "uncatchable"
//! throw channel — the engine relies on never handing application code a route to construct or
//! match this variant except through `?`, and on the mount being the only caller that matches on
//! it explicitly (§4.5, §9).

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type TaskerResult<T> = Result<T, TaskerError>;

/// Unified error type for the engine and its collaborators.
#[derive(Debug, Error)]
pub enum TaskerError {
    /// `process` received a payload whose event did not pass schema validation.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Internal control-flow sentinel. See module docs and §4.5/§4.3.
    ///
    /// Never construct this outside `tasker-core::engine`; a handler that matches on it has an
    /// illegal `try`/`catch` wrapping `execute`.
    #[error("interrupt: {reason}")]
    Interrupt {
        /// Human-readable reason, for tracing only (never matched on).
        reason: &'static str,
    },

    /// An underlying `Store` operation failed.
    #[error("store error: {0}")]
    Store(String),

    /// `Dispatcher::dispatch` failed at a continuation boundary.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// A step callback returned an application error.
    #[error("handler error at {task_path}: {source}")]
    Handler {
        task_path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Two functions were registered with the same id in one mount.
    #[error("duplicate function id: {0}")]
    DuplicateFunctionId(String),

    /// JSON (de)serialization failure at the envelope or store boundary.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration failed to load.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TaskerError {
    /// Construct a `HandlerError` from any boxed std error, tagging it with the task path that
    /// was executing when it occurred.
    pub fn handler(task_path: impl Into<String>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Handler {
            task_path: task_path.into(),
            source: Box::new(source),
        }
    }

    /// True for `Interrupt`. Used at the two catch points named in §4.5 instead of matching the
    /// variant by name, so call sites read as intent rather than pattern-matching trivia.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt { .. })
    }

    /// Best-effort classification of whether retrying the *same* delivery is likely to help.
    /// Mirrors the recovery column of §7: store/dispatch failures are worth retrying (the
    /// transport's redelivery will retry the continuation); handler errors, invalid events, and
    /// duplicate ids are not.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Store(_) | Self::Dispatch(_) => true,
            Self::Interrupt { .. } => false,
            Self::InvalidEvent(_) => false,
            Self::Handler { .. } => false,
            Self::DuplicateFunctionId(_) => false,
            Self::Serialization(_) => false,
            Self::Config(_) => false,
        }
    }
}
