//! # tasker-shared
//!
//! Data model, error types, wire envelope, and configuration shared by `tasker-core` and
//! `tasker-worker`. Nothing in this crate talks to a store, a dispatcher, or a handler — it only
//! defines the vocabulary the rest of the workspace uses to talk to each other.

pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod event;

pub use context::{ExecutionContext, TaskPath};
pub use envelope::Envelope;
pub use error::{TaskerError, TaskerResult};
pub use event::{Event, EventFilter};

/// Reserved value for a step callback's absent return value, distinguished in the committed-value
/// domain from "not yet committed" (§3, §6).
pub const EMPTY_EXECUTION_RESULT: &str = "<empty_execution_result>";
