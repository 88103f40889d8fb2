//! # Function registry & router
//!
//! `Function` is the value-level `{ id, filter, handler }` triple from §3/§4.4. `FunctionRegistry`
//! owns a mount's functions for its lifetime and answers "which functions want this event",
//! preserving registration order as §4.4 requires.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tasker_shared::{Event, EventFilter, ExecutionContext, TaskerError, TaskerResult};

/// A handler's return type, boxed so `Function` can hold handlers of differing concrete future
/// types behind one field.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered handler. Handlers are pure with respect to the step engine: all side-effecting
/// work must go through [`crate::engine::execute`] (§3).
pub type HandlerFn = Arc<dyn Fn(Event, ExecutionContext) -> BoxFuture<'static, TaskerResult<Value>> + Send + Sync>;

/// `{ id, filter, handler }` (§3).
#[derive(Clone)]
pub struct Function {
    /// Unique within a mount; mount construction fails otherwise.
    pub id: String,
    /// Selects which events this function sees.
    pub filter: EventFilter,
    /// The handler itself.
    pub handler: HandlerFn,
}

impl std::fmt::Debug for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

/// Register a handler under `id`, normalizing `filter` into an [`EventFilter`] at registration
/// time (§4.4: "filter argument admits three forms ... normalized into a predicate").
pub fn create_function(id: impl Into<String>, filter: impl Into<EventFilter>, handler: HandlerFn) -> Function {
    Function {
        id: id.into(),
        filter: filter.into(),
        handler,
    }
}

/// Owns a mount's functions and answers routing queries (§4.4).
#[derive(Clone, Debug)]
pub struct FunctionRegistry {
    functions: Vec<Function>,
}

impl FunctionRegistry {
    /// Build a registry, failing if two functions share an id (§3 "Function ids within a single
    /// mount are unique; mount construction fails otherwise").
    pub fn new(functions: Vec<Function>) -> TaskerResult<Self> {
        let mut seen = std::collections::HashSet::with_capacity(functions.len());
        for function in &functions {
            if !seen.insert(function.id.clone()) {
                tracing::error!(function_id = %function.id, "duplicate function id registered");
                return Err(TaskerError::DuplicateFunctionId(function.id.clone()));
            }
        }
        tracing::debug!(function_count = functions.len(), "function registry built");
        Ok(Self { functions })
    }

    /// All functions whose filter accepts `event`, preserving registration order.
    pub fn filter_for_event(&self, event: &Event) -> Vec<&Function> {
        self.functions.iter().filter(|f| f.filter.matches(event)).collect()
    }

    /// Look up a function by id.
    pub fn get(&self, id: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.id == id)
    }

    /// Iterate over every registered function.
    pub fn iter(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter()
    }

    /// Number of registered functions.
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// True if no functions are registered.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_handler() -> HandlerFn {
        Arc::new(|_event, _ctx| Box::pin(async { Ok(Value::Null) }))
    }

    #[test]
    fn registry_rejects_duplicate_ids() {
        let f1 = create_function("func1", "a", noop_handler());
        let f2 = create_function("func1", "b", noop_handler());
        let err = FunctionRegistry::new(vec![f1, f2]).unwrap_err();
        assert!(matches!(err, TaskerError::DuplicateFunctionId(id) if id == "func1"));
    }

    #[test]
    fn filter_for_event_preserves_registration_order() {
        let f1 = create_function("func1", "a", noop_handler());
        let f2 = create_function("func2", vec!["a".to_string(), "b".to_string()], noop_handler());
        let f3 = create_function("func3", "b", noop_handler());
        let registry = FunctionRegistry::new(vec![f1, f2, f3]).unwrap();

        let event = Event::new(json!({"type": "a"})).unwrap();
        let matched: Vec<&str> = registry.filter_for_event(&event).iter().map(|f| f.id.as_str()).collect();
        assert_eq!(matched, vec!["func1", "func2"]);
    }

    #[test]
    fn get_looks_up_by_id() {
        let f1 = create_function("func1", "a", noop_handler());
        let registry = FunctionRegistry::new(vec![f1]).unwrap();
        assert!(registry.get("func1").is_some());
        assert!(registry.get("missing").is_none());
    }
}
