//! # Step engine
//!
//! The protocol in §4.3: one function, [`execute`], that is the entire contract between
//! application code and durability. A handler calls it once per unit of durable work; the engine
//! decides whether to replay a cached result, enter the step and run its callback, or stage the
//! step and interrupt the handler so the mount can schedule its continuation.
//!
//! Two pieces of ambient state make the handler read like ordinary sequential code instead of
//! threading a context object through every call: the current path (`tokio::task_local!` in
//! [`crate::path_scope`]) and the engine context defined here ([`EngineShared`], carried in its
//! own task-local for the lifetime of one function invocation). Only the path re-scopes on each
//! nested `execute` call; the engine context is set once, by [`invoke_function`], before the
//! handler starts.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tasker_shared::{
    Envelope, Event, ExecutionContext, TaskPath, TaskerError, TaskerResult, EMPTY_EXECUTION_RESULT,
};
use tokio::sync::Mutex;
use tokio::task_local;
use tracing::{debug, instrument, warn};

use crate::dispatcher::Dispatcher;
use crate::function::Function;
use crate::interrupt;
use crate::path_scope;
use crate::store::Store;

/// How a completed or newly-staged step's continuation is enqueued (§4.3 "continuation
/// semantics", §4.7).
#[derive(Clone)]
pub(crate) enum EngineMode {
    /// Publish a fresh envelope via the dispatcher; may be picked up by a different worker.
    Isolated { dispatcher: Arc<dyn Dispatcher> },
    /// Push onto an in-process queue the mount drains within the same call.
    RunUntilError {
        queue: Arc<Mutex<std::collections::VecDeque<ExecutionContext>>>,
    },
}

/// Ambient engine context for one handler invocation. Set once by [`invoke_function`]; read by
/// every [`execute`] call made during that invocation, nested or not.
pub(crate) struct EngineShared {
    pub execution_id: String,
    pub timestamp: i64,
    pub inbound_task_id: Option<TaskPath>,
    pub store: Arc<dyn Store>,
    pub mode: EngineMode,
    pub prefetch: Option<HashMap<TaskPath, Value>>,
    pub event_value: Value,
}

impl EngineShared {
    async fn lookup_cached(&self, path: &TaskPath) -> TaskerResult<Option<Value>> {
        if let Some(prefetched) = &self.prefetch {
            return Ok(prefetched.get(path).cloned());
        }
        self.store
            .get_execution_task_result(&self.execution_id, path)
            .await
    }

    async fn enqueue_continuation(&self, task_id: Option<TaskPath>) -> TaskerResult<()> {
        let ctx = match task_id {
            Some(path) => ExecutionContext::continuation(self.execution_id.clone(), self.timestamp, path),
            None => ExecutionContext::top_level(self.execution_id.clone(), self.timestamp),
        };
        match &self.mode {
            EngineMode::Isolated { dispatcher } => {
                let envelope = Envelope::continuation(self.event_value.clone(), ctx);
                let bytes = envelope.to_bytes()?;
                dispatcher.dispatch(bytes).await
            }
            EngineMode::RunUntilError { queue } => {
                queue.lock().await.push_back(ctx);
                Ok(())
            }
        }
    }
}

task_local! {
    static ENGINE: Arc<EngineShared>;
}

fn current_engine() -> Arc<EngineShared> {
    ENGINE.with(Arc::clone)
}

/// Run `function`'s handler once, with the path scope rooted at its id and the engine context
/// set to `shared` (§4.3 "top-level execute call inside a handler has path prefix
/// `<functionId>`"). This is the one place a handler is ever invoked; every re-entry calls it
/// again from scratch, relying on `execute`'s cache to skip completed work.
#[instrument(
    skip(function, event, ctx, shared),
    fields(function_id = %function.id, execution_id = %ctx.execution_id, task_id = ?ctx.task_id)
)]
pub(crate) async fn invoke_function(
    function: &Function,
    event: Event,
    ctx: ExecutionContext,
    shared: Arc<EngineShared>,
) -> TaskerResult<Value> {
    debug!("invoking function handler");
    let root = TaskPath::root(function.id.clone());
    let handler = function.handler.clone();
    let fut = (handler)(event, ctx);
    ENGINE.scope(shared, path_scope::scoped(root, fut)).await
}

fn encode_value<T: Serialize>(value: T) -> TaskerResult<Value> {
    let encoded = serde_json::to_value(value)?;
    Ok(if encoded.is_null() {
        Value::String(EMPTY_EXECUTION_RESULT.to_string())
    } else {
        encoded
    })
}

fn decode_value<T: DeserializeOwned>(value: Value) -> TaskerResult<T> {
    let is_sentinel = matches!(&value, Value::String(s) if s == EMPTY_EXECUTION_RESULT);
    let value = if is_sentinel { Value::Null } else { value };
    Ok(serde_json::from_value(value)?)
}

/// The entire contract between application code and durability (§4.3).
///
/// Computes this step's full path by appending `task_key` to the ambient current path, then:
/// - if a committed value already exists (bulk prefetch or store lookup), returns it without
///   calling `callback` at all;
/// - if the inbound context targets this step or a descendant of it, enters the step: runs
///   `callback` under a path scope rooted at the full path, commits its result on success,
///   enqueues a continuation for the parent path, and raises an interrupt;
/// - otherwise stages the step (`begin_execution_task`, enqueue a continuation targeting this
///   step, interrupt) unless another delivery already owns it, in which case it interrupts
///   without staging anything.
///
/// The interrupt this function raises on every path except the cache hit is not an error the
/// caller is meant to handle: it must propagate out of `callback`'s caller via `?` all the way to
/// the mount's dispatch loop, which is the only thing that may match on it (§4.5).
pub async fn execute<T, F, Fut, Err>(task_key: impl AsRef<str>, callback: F) -> TaskerResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Err>>,
    Err: StdError + Send + Sync + 'static,
{
    let shared = current_engine();
    let current_path = path_scope::current();
    let full_path = current_path.child(task_key.as_ref());

    if let Some(cached) = shared.lookup_cached(&full_path).await? {
        debug!(task_path = %full_path, "step cache hit, skipping callback");
        return decode_value(cached);
    }

    let targeted = shared
        .inbound_task_id
        .as_ref()
        .is_some_and(|inbound| full_path.is_ancestor_of_or_eq(inbound));

    if targeted {
        enter_step(&shared, full_path, callback).await
    } else {
        stage_step(&shared, full_path).await
    }
}

async fn enter_step<T, F, Fut, Err>(shared: &Arc<EngineShared>, full_path: TaskPath, callback: F) -> TaskerResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, Err>>,
    Err: StdError + Send + Sync + 'static,
{
    match path_scope::scoped(full_path.clone(), callback()).await {
        Ok(value) => {
            let encoded = encode_value(&value)?;
            shared
                .store
                .commit_execution_task_result(&shared.execution_id, &full_path, encoded)
                .await?;
            debug!(task_path = %full_path, "step committed, enqueuing parent continuation");
            shared.enqueue_continuation(full_path.parent()).await?;
            Err(interrupt::raise(interrupt::STEP_COMMITTED))
        }
        Err(err) => {
            let err = reject_callback_error(&full_path, err);
            if !err.is_interrupt() {
                warn!(task_path = %full_path, error = %err, "step callback failed");
            }
            Err(err)
        }
    }
}

async fn stage_step<T>(shared: &Arc<EngineShared>, full_path: TaskPath) -> TaskerResult<T> {
    if shared
        .store
        .is_execution_task_in_progress(&shared.execution_id, &full_path)
        .await?
    {
        debug!(task_path = %full_path, "step already in progress, skipping");
        return Err(interrupt::raise(interrupt::IN_PROGRESS));
    }
    shared.store.begin_execution_task(&shared.execution_id, &full_path).await?;
    debug!(task_path = %full_path, "step staged, enqueuing continuation");
    shared.enqueue_continuation(Some(full_path)).await?;
    Err(interrupt::raise(interrupt::TRIGGERED))
}

/// Distinguish a descendant-step interrupt (which must unwind unconditionally, §4.5) from a
/// genuine application error (which the engine wraps as `HandlerError` and hands back to the
/// callback's caller, catchable by the handler's own `match`/`?`).
fn reject_callback_error<Err>(full_path: &TaskPath, err: Err) -> TaskerError
where
    Err: StdError + Send + Sync + 'static,
{
    let boxed: Box<dyn StdError + Send + Sync> = Box::new(err);
    match boxed.downcast::<TaskerError>() {
        Ok(tasker_err) if tasker_err.is_interrupt() => *tasker_err,
        Ok(tasker_err) => TaskerError::handler(full_path.to_string(), *tasker_err),
        Err(other) => TaskerError::Handler {
            task_path: full_path.to_string(),
            source: other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as TokioMutex;

    #[derive(Default)]
    struct MemoryStore {
        in_progress: TokioMutex<std::collections::HashSet<(String, TaskPath)>>,
        committed: TokioMutex<HashMap<(String, TaskPath), Value>>,
    }

    #[async_trait]
    impl Store for MemoryStore {
        async fn begin_execution(&self, _execution_id: &str) -> TaskerResult<()> {
            Ok(())
        }

        async fn is_execution_in_progress(&self, _execution_id: &str) -> TaskerResult<bool> {
            Ok(true)
        }

        async fn begin_execution_task(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<()> {
            self.in_progress
                .lock()
                .await
                .insert((execution_id.to_string(), task_path.clone()));
            Ok(())
        }

        async fn is_execution_task_in_progress(
            &self,
            execution_id: &str,
            task_path: &TaskPath,
        ) -> TaskerResult<bool> {
            Ok(self
                .in_progress
                .lock()
                .await
                .contains(&(execution_id.to_string(), task_path.clone())))
        }

        async fn get_execution_task_result(
            &self,
            execution_id: &str,
            task_path: &TaskPath,
        ) -> TaskerResult<Option<Value>> {
            Ok(self
                .committed
                .lock()
                .await
                .get(&(execution_id.to_string(), task_path.clone()))
                .cloned())
        }

        async fn commit_execution_task_result(
            &self,
            execution_id: &str,
            task_path: &TaskPath,
            value: Value,
        ) -> TaskerResult<()> {
            self.in_progress
                .lock()
                .await
                .remove(&(execution_id.to_string(), task_path.clone()));
            self.committed
                .lock()
                .await
                .insert((execution_id.to_string(), task_path.clone()), value);
            Ok(())
        }

        async fn dispose_execution(&self, execution_id: &str) -> TaskerResult<()> {
            self.in_progress.lock().await.retain(|(e, _)| e != execution_id);
            self.committed.lock().await.retain(|(e, _), _| e != execution_id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDispatcher {
        publishes: TokioMutex<Vec<Vec<u8>>>,
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn dispatch(&self, raw_payload: Vec<u8>) -> TaskerResult<()> {
            self.publishes.lock().await.push(raw_payload);
            Ok(())
        }
    }

    fn shared_isolated(store: Arc<dyn Store>, dispatcher: Arc<dyn Dispatcher>, inbound: Option<&str>) -> Arc<EngineShared> {
        Arc::new(EngineShared {
            execution_id: "e1".to_string(),
            timestamp: 1,
            inbound_task_id: inbound.map(TaskPath::parse),
            store,
            mode: EngineMode::Isolated { dispatcher },
            prefetch: None,
            event_value: json!({"type": "foo"}),
        })
    }

    async fn run_with<T>(shared: Arc<EngineShared>, root: &str, fut: impl Future<Output = T>) -> T {
        let root = TaskPath::root(root);
        ENGINE.scope(shared, path_scope::scoped(root, fut)).await
    }

    #[tokio::test]
    async fn fresh_step_stages_and_interrupts_without_running_callback() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let shared = shared_isolated(store.clone(), dispatcher.clone(), None);

        let invocations = Arc::new(AtomicUsize::new(0));
        let invocations_clone = invocations.clone();
        let result: TaskerResult<String> = run_with(shared, "func1", async move {
            execute("step1", move || {
                let invocations = invocations_clone.clone();
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>("r1".to_string())
                }
            })
            .await
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_interrupt());
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        assert!(store.is_execution_task_in_progress("e1", &TaskPath::parse("func1:step1")).await.unwrap());
        assert_eq!(dispatcher.publishes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn cached_step_short_circuits_without_running_callback() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        store
            .commit_execution_task_result("e1", &TaskPath::parse("func1:step1"), json!("r1"))
            .await
            .unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let shared = shared_isolated(store, dispatcher.clone(), Some("func1"));

        let invocations = Arc::new(AtomicUsize::new(0));
        let invocations_clone = invocations.clone();
        let result: TaskerResult<String> = run_with(shared, "func1", async move {
            execute("step1", move || {
                let invocations = invocations_clone.clone();
                async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>("ignored".to_string())
                }
            })
            .await
        })
        .await;

        assert_eq!(result.unwrap(), "r1");
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
        assert!(dispatcher.publishes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn targeted_step_runs_callback_commits_and_enqueues_parent() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let shared = shared_isolated(store.clone(), dispatcher.clone(), Some("func1:step1"));

        let result: TaskerResult<String> = run_with(shared, "func1", async move {
            execute("step1", || async { Ok::<_, std::io::Error>("r1".to_string()) }).await
        })
        .await;

        let err = result.unwrap_err();
        assert!(err.is_interrupt());
        let committed = store
            .get_execution_task_result("e1", &TaskPath::parse("func1:step1"))
            .await
            .unwrap();
        assert_eq!(committed, Some(json!("r1")));
        assert_eq!(dispatcher.publishes.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn no_value_step_round_trips_through_the_empty_sentinel() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let shared = shared_isolated(store.clone(), dispatcher, Some("func1:step1"));

        let result: TaskerResult<()> = run_with(shared.clone(), "func1", async move {
            execute("step1", || async { Ok::<(), std::io::Error>(()) }).await
        })
        .await;
        assert!(result.unwrap_err().is_interrupt());

        let raw = store
            .get_execution_task_result("e1", &TaskPath::parse("func1:step1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(raw, json!(tasker_shared::EMPTY_EXECUTION_RESULT));

        let dispatcher2 = Arc::new(RecordingDispatcher::default());
        let shared2 = shared_isolated(store, dispatcher2, Some("func1"));
        let replayed: TaskerResult<()> = run_with(shared2, "func1", async move {
            execute("step1", || async { panic!("must not run: cached") }).await
        })
        .await;
        assert_eq!(replayed.unwrap(), ());
    }

    #[tokio::test]
    async fn concurrent_in_progress_step_interrupts_without_restaging() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        store
            .begin_execution_task("e1", &TaskPath::parse("func1:step1"))
            .await
            .unwrap();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let shared = shared_isolated(store, dispatcher.clone(), None);

        let result: TaskerResult<String> = run_with(shared, "func1", async move {
            execute("step1", || async { Ok::<_, std::io::Error>("r1".to_string()) }).await
        })
        .await;

        assert!(result.unwrap_err().is_interrupt());
        assert!(dispatcher.publishes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn handler_error_is_catchable_and_does_not_commit() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let shared = shared_isolated(store.clone(), dispatcher, Some("func1:step1"));

        let result: TaskerResult<String> = run_with(shared, "func1", async move {
            execute("step1", || async {
                Err::<String, _>(std::io::Error::other("boom"))
            })
            .await
        })
        .await;

        let err = result.unwrap_err();
        assert!(!err.is_interrupt());
        assert!(matches!(err, TaskerError::Handler { .. }));
        assert!(store
            .get_execution_task_result("e1", &TaskPath::parse("func1:step1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn run_until_error_mode_pushes_to_internal_queue_not_dispatcher() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::default());
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let queue = Arc::new(TokioMutex::new(VecDeque::new()));
        let shared = Arc::new(EngineShared {
            execution_id: "e1".to_string(),
            timestamp: 1,
            inbound_task_id: None,
            store,
            mode: EngineMode::RunUntilError { queue: queue.clone() },
            prefetch: None,
            event_value: json!({"type": "foo"}),
        });

        let result: TaskerResult<String> = run_with(shared, "func1", async move {
            execute("step1", || async { Ok::<_, std::io::Error>("r1".to_string()) }).await
        })
        .await;

        assert!(result.unwrap_err().is_interrupt());
        assert!(dispatcher.publishes.lock().await.is_empty());
        assert_eq!(queue.lock().await.len(), 1);
    }
}
