//! # ExecutionContext and TaskPath
//!
//! `TaskPath` is the colon-separated step identity described in §3: the first segment is a
//! function id, every subsequent segment is a `taskKey` argument passed to a nested `execute`
//! call, in source order. `ExecutionContext` is the per-invocation tuple threaded through
//! dispatches (§3, §6).

use serde::{Deserialize, Serialize};

/// A step's full path within an execution, e.g. `func1:outer:inner`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPath(String);

impl TaskPath {
    /// A root path consisting of a single segment (typically a function id).
    pub fn root(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Parse a colon-separated path from its wire representation.
    pub fn parse(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Append a child segment, returning the composed path (§4.3 path composition).
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        Self(format!("{}:{}", self.0, segment))
    }

    /// The path with its last segment stripped, or `None` if this is a root (single-segment)
    /// path (§4.3: "computes the parent path by stripping the last segment (or undefined if
    /// none)").
    pub fn parent(&self) -> Option<Self> {
        self.0.rsplit_once(':').map(|(prefix, _)| Self(prefix.to_string()))
    }

    /// This path's segments, in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(':')
    }

    /// True iff `self` names the same step as `other`, or a step that is an ancestor of `other`
    /// on the path from the root function id — i.e. `other`'s segments begin with all of
    /// `self`'s segments (§4.3 targeting: "taskId starts with fullPath").
    ///
    /// This is segment-aware, not a raw string prefix: `func1:step1` is not a prefix of
    /// `func1:step10` even though the strings are.
    pub fn is_ancestor_of_or_eq(&self, other: &Self) -> bool {
        let mut self_segments = self.segments();
        let mut other_segments = other.segments();
        loop {
            match (self_segments.next(), other_segments.next()) {
                (Some(a), Some(b)) if a == b => continue,
                (None, _) => return true,
                _ => return false,
            }
        }
    }

    /// Borrow the wire representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<TaskPath> for String {
    fn from(path: TaskPath) -> Self {
        path.0
    }
}

/// The per-invocation tuple carried across dispatches (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    /// Identifies a single workflow instance.
    #[serde(rename = "executionId")]
    pub execution_id: String,
    /// Milliseconds since epoch, assigned when the execution is created or the step is enqueued.
    pub timestamp: i64,
    /// The leaf task this invocation is responsible for advancing, if any. Absence means
    /// "top-level re-entry: continue from wherever the handler now stands".
    #[serde(rename = "taskId", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskPath>,
}

/// Milliseconds since epoch, suitable for `ExecutionContext::timestamp` (§6).
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A fresh, globally-unique execution id (§3: "UUIDv4 is sufficient").
pub fn generate_execution_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl ExecutionContext {
    /// A fresh top-level context for a newly created execution.
    pub fn top_level(execution_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            execution_id: execution_id.into(),
            timestamp,
            task_id: None,
        }
    }

    /// A continuation context targeting a specific task path.
    pub fn continuation(execution_id: impl Into<String>, timestamp: i64, task_id: TaskPath) -> Self {
        Self {
            execution_id: execution_id.into(),
            timestamp,
            task_id: Some(task_id),
        }
    }

    /// True if this context carries no `taskId` (top-level re-entry).
    pub fn is_top_level(&self) -> bool {
        self.task_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_appends_segment() {
        let root = TaskPath::root("func1");
        let child = root.child("step1");
        assert_eq!(child.as_str(), "func1:step1");
    }

    #[test]
    fn nested_children_compose_in_order() {
        let path = TaskPath::root("func1").child("outer").child("inner");
        assert_eq!(path.as_str(), "func1:outer:inner");
    }

    #[test]
    fn parent_strips_last_segment() {
        let path = TaskPath::parse("func1:outer:inner");
        assert_eq!(path.parent().unwrap().as_str(), "func1:outer");
    }

    #[test]
    fn root_path_has_no_parent() {
        let path = TaskPath::root("func1");
        assert!(path.parent().is_none());
    }

    #[test]
    fn self_is_ancestor_of_self() {
        let path = TaskPath::parse("func1:step1");
        assert!(path.is_ancestor_of_or_eq(&path));
    }

    #[test]
    fn ancestor_matches_descendant() {
        let ancestor = TaskPath::parse("func1");
        let descendant = TaskPath::parse("func1:step1:inner");
        assert!(ancestor.is_ancestor_of_or_eq(&descendant));
    }

    #[test]
    fn sibling_segment_is_not_an_ancestor() {
        // Regression guard: string prefix "func1:step1" is a textual prefix of "func1:step10"
        // but must not be treated as an ancestor relationship.
        let a = TaskPath::parse("func1:step1");
        let b = TaskPath::parse("func1:step10");
        assert!(!a.is_ancestor_of_or_eq(&b));
    }

    #[test]
    fn descendant_is_not_ancestor_of_ancestor() {
        let ancestor = TaskPath::parse("func1");
        let descendant = TaskPath::parse("func1:step1");
        assert!(!descendant.is_ancestor_of_or_eq(&ancestor));
    }

    #[test]
    fn unrelated_paths_do_not_match() {
        let a = TaskPath::parse("func1:step1");
        let b = TaskPath::parse("func2:step1");
        assert!(!a.is_ancestor_of_or_eq(&b));
    }

    #[test]
    fn top_level_context_has_no_task_id() {
        let ctx = ExecutionContext::top_level("e1", 1);
        assert!(ctx.is_top_level());
    }

    #[test]
    fn continuation_context_carries_task_id() {
        let ctx = ExecutionContext::continuation("e1", 1, TaskPath::root("func1"));
        assert!(!ctx.is_top_level());
        assert_eq!(ctx.task_id.unwrap().as_str(), "func1");
    }

    #[test]
    fn context_serializes_without_task_id_when_absent() {
        let ctx = ExecutionContext::top_level("e1", 1);
        let value = serde_json::to_value(&ctx).unwrap();
        assert!(value.get("taskId").is_none());
    }

    #[test]
    fn generated_execution_ids_are_unique() {
        let a = generate_execution_id();
        let b = generate_execution_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn now_ms_is_plausibly_recent() {
        // Sanity bound, not a precise clock test: anything after 2020-01-01 in ms.
        assert!(now_ms() > 1_577_836_800_000);
    }
}
