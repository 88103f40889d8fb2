//! # Store
//!
//! The persistence interface described in §4.1. Nothing in this crate depends on a concrete
//! store — `tasker-worker` ships an in-memory and a filesystem implementation, and applications
//! can bring their own (a key-value service, a database) as long as it upholds §3's invariants:
//! every `(executionId, taskPath)` transitions at most once `absent -> in-progress -> committed`,
//! and a committed value is immutable and round-trips byte-identically.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tasker_shared::{TaskPath, TaskerResult};

/// The three states a `(executionId, taskPath)` pair can be in (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// No record exists yet.
    Absent,
    /// A transaction marker is set; no value.
    InProgress,
    /// An opaque, JSON-serializable value has been committed.
    Committed(Value),
}

/// Persists per-execution task state (§4.1). All methods fail with a store-level I/O error on
/// transport failure; a logical lookup miss (e.g. no committed value yet) is `Ok(None)`, not an
/// error.
#[async_trait]
pub trait Store: Send + Sync {
    /// Record that an execution exists.
    async fn begin_execution(&self, execution_id: &str) -> TaskerResult<()>;

    /// True iff `begin_execution` has been called and `dispose_execution` has not.
    async fn is_execution_in_progress(&self, execution_id: &str) -> TaskerResult<bool>;

    /// Idempotently mark a task as in-progress.
    async fn begin_execution_task(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<()>;

    /// True iff the task has been begun but not yet committed.
    async fn is_execution_task_in_progress(
        &self,
        execution_id: &str,
        task_path: &TaskPath,
    ) -> TaskerResult<bool>;

    /// The committed value for a task, or `None` if it has not been committed.
    async fn get_execution_task_result(
        &self,
        execution_id: &str,
        task_path: &TaskPath,
    ) -> TaskerResult<Option<Value>>;

    /// Atomically clear the in-progress marker and write the committed value. Must appear atomic
    /// with respect to any concurrent `is_execution_task_in_progress` / `get_execution_task_result`
    /// observer (§4.3 "atomic commit+clear"): such an observer must never see "neither in-progress
    /// nor committed" for a task this call has committed.
    async fn commit_execution_task_result(
        &self,
        execution_id: &str,
        task_path: &TaskPath,
        value: Value,
    ) -> TaskerResult<()>;

    /// Delete all state for the execution, atomically from the caller's perspective.
    async fn dispose_execution(&self, execution_id: &str) -> TaskerResult<()>;

    /// Optional bulk prefetch of every committed result for an execution, used by the mount as a
    /// one-shot read-through cache per top-level `process` call (§4.1). Stores that cannot offer
    /// this cheaply should leave the default, which disables the optimization.
    async fn get_execution_task_results(
        &self,
        execution_id: &str,
    ) -> TaskerResult<Option<HashMap<TaskPath, Value>>> {
        let _ = execution_id;
        Ok(None)
    }
}
