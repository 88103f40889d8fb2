//! # Mount
//!
//! The orchestration layer described in §4.6/§4.7: turns inbound envelopes into handler
//! invocations, drives the continuation loop for [`tasker_shared::config::ExecutionMode::RunUntilError`],
//! and disposes execution state once nothing is left to resume.
//!
//! `Mount` itself never calls application code directly except through
//! [`crate::engine::invoke_function`] — everything it does is bookkeeping around that one call:
//! deciding which function(s) a delivery targets, fanning concurrent invocations out with a
//! concurrency cap (§5 "bounded-concurrency race"), and reacting to what each invocation returns.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde_json::Value;
use tasker_shared::config::ExecutionMode;
use tasker_shared::context::{generate_execution_id, now_ms};
use tasker_shared::{Envelope, Event, ExecutionContext, TaskPath, TaskerError, TaskerResult};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::dispatcher::Dispatcher;
use crate::engine::{self, EngineMode, EngineShared};
use crate::event_schema::EventSchema;
use crate::function::{Function, FunctionRegistry};
use crate::store::Store;

/// Best-effort error observer, invoked after a non-interrupt error aborts a `Mount::execute` call
/// (§9 "onError hook"). Never called for interrupts, and its own failures are not propagated —
/// it exists for logging/metrics, not for control flow.
pub type OnErrorHook = Arc<dyn Fn(&TaskerError) + Send + Sync>;

/// Binds a set of functions to their collaborators and runs the dispatch loop (§4.6).
pub struct Mount {
    registry: FunctionRegistry,
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    event_schema: Arc<dyn EventSchema>,
    mode: ExecutionMode,
    max_concurrent_functions: usize,
    on_error: Option<OnErrorHook>,
}

impl Mount {
    /// Build a mount, failing on duplicate function ids (§3).
    pub fn new(
        functions: Vec<Function>,
        store: Arc<dyn Store>,
        dispatcher: Arc<dyn Dispatcher>,
        event_schema: Arc<dyn EventSchema>,
        mode: ExecutionMode,
        max_concurrent_functions: usize,
    ) -> TaskerResult<Self> {
        Ok(Self {
            registry: FunctionRegistry::new(functions)?,
            store,
            dispatcher,
            event_schema,
            mode,
            max_concurrent_functions,
            on_error: None,
        })
    }

    /// Attach an error observer (§9).
    #[must_use]
    pub fn with_on_error(mut self, hook: OnErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }

    /// Entry point for a raw inbound payload (§4.6, §6): parse the envelope, validate the event,
    /// and delegate to [`Mount::execute`].
    ///
    /// An envelope with no `context` is a fresh top-level trigger: a new execution id and
    /// timestamp are minted and `begin_execution` is called. An envelope carrying a context is
    /// always an internally generated continuation and is never re-bootstrapped.
    #[instrument(skip(self, raw_payload), fields(payload_len = raw_payload.len()))]
    pub async fn process(&self, raw_payload: &[u8]) -> TaskerResult<()> {
        let envelope = Envelope::from_bytes(raw_payload)?;
        let event = self.event_schema.validate(envelope.event).await?;
        let ctx = match envelope.context {
            Some(ctx) => ctx,
            None => {
                let execution_id = generate_execution_id();
                let timestamp = now_ms();
                self.store.begin_execution(&execution_id).await?;
                ExecutionContext::top_level(execution_id, timestamp)
            }
        };
        self.execute(event, ctx).await
    }

    /// Drive one already-validated `(event, context)` pair to completion or interruption (§4.6).
    ///
    /// A `context` carrying a `taskId` always targets exactly one function — the one named by the
    /// path's first segment — because every continuation the engine itself enqueues carries a
    /// path of at least two segments (§4.3: a path is only ever produced by appending a task key
    /// to the ambient current path, which starts at the function id). A `context` with no
    /// `taskId` is either the initial bootstrap or an internal "continue from the top" re-entry,
    /// and runs every function matching the event concurrently.
    #[instrument(skip(self, event, ctx), fields(execution_id = %ctx.execution_id, task_id = ?ctx.task_id))]
    pub async fn execute(&self, event: Event, ctx: ExecutionContext) -> TaskerResult<()> {
        if ctx.task_id.is_some() && !self.store.is_execution_in_progress(&ctx.execution_id).await? {
            // A redelivered continuation for an execution that has already been disposed; a
            // no-op rather than an error, since disposal only happens after success (§4.7).
            debug!(
                execution_id = %ctx.execution_id,
                task_id = ?ctx.task_id,
                "redelivered continuation for a disposed execution, skipping"
            );
            return Ok(());
        }

        let matching = self.registry.filter_for_event(&event);
        if matching.is_empty() {
            return Ok(());
        }

        let targets: Vec<&Function> = match &ctx.task_id {
            Some(path) => {
                let function_id = path.segments().next().unwrap_or_default();
                match self.registry.get(function_id) {
                    Some(function) => vec![function],
                    None => return Ok(()),
                }
            }
            None => matching.clone(),
        };

        match self.mode {
            ExecutionMode::Isolated => self.run_isolated(targets, matching.len(), &event, ctx).await,
            ExecutionMode::RunUntilError => self.run_until_error(targets, &event, ctx).await,
        }
    }

    async fn run_isolated(
        &self,
        targets: Vec<&Function>,
        matching_count: usize,
        event: &Event,
        ctx: ExecutionContext,
    ) -> TaskerResult<()> {
        let prefetch = self.store.get_execution_task_results(&ctx.execution_id).await?;
        let mode = EngineMode::Isolated {
            dispatcher: self.dispatcher.clone(),
        };
        let results = self.invoke_many(targets, event, &ctx, mode, prefetch).await;

        let mut all_resolved = true;
        for (_function_id, result) in results {
            match result {
                Ok(_) => {}
                Err(err) if err.is_interrupt() => all_resolved = false,
                Err(err) => {
                    self.notify_error(&err);
                    return Err(err);
                }
            }
        }

        // A single matching function is the common case; its completion unambiguously means the
        // whole execution is done. With more than one matching function, an individual
        // continuation only ever reports on its own function, so this call can't tell whether the
        // others have finished too — disposal is left to the store's TTL in that case (§9).
        if all_resolved && matching_count == 1 {
            self.store.dispose_execution(&ctx.execution_id).await?;
            debug!(execution_id = %ctx.execution_id, "execution disposed");
        }
        Ok(())
    }

    async fn run_until_error(&self, targets: Vec<&Function>, event: &Event, ctx: ExecutionContext) -> TaskerResult<()> {
        let queue = Arc::new(Mutex::new(VecDeque::new()));
        let mode = EngineMode::RunUntilError { queue: queue.clone() };
        let prefetch = self.store.get_execution_task_results(&ctx.execution_id).await?;

        let total = targets.len();
        let mut completed: HashSet<String> = HashSet::with_capacity(total);

        let mut batch = self.invoke_many(targets, event, &ctx, mode.clone(), prefetch).await;
        loop {
            for (function_id, result) in batch.drain(..) {
                match result {
                    Ok(_) => {
                        completed.insert(function_id);
                    }
                    Err(err) if err.is_interrupt() => {}
                    Err(err) => {
                        self.notify_error(&err);
                        return Err(err);
                    }
                }
            }

            let next_ctx = queue.lock().await.pop_front();
            let next_ctx = match next_ctx {
                Some(next) => next,
                None => break,
            };
            let function_id = next_function_id(&next_ctx);
            let Some(function) = function_id.as_deref().and_then(|id| self.registry.get(id)) else {
                continue;
            };
            batch = self.invoke_many(vec![function], event, &next_ctx, mode.clone(), None).await;
        }

        if completed.len() == total {
            self.store.dispose_execution(&ctx.execution_id).await?;
            debug!(execution_id = %ctx.execution_id, "execution disposed");
        }
        Ok(())
    }

    async fn invoke_many(
        &self,
        targets: Vec<&Function>,
        event: &Event,
        ctx: &ExecutionContext,
        mode: EngineMode,
        prefetch: Option<HashMap<TaskPath, Value>>,
    ) -> Vec<(String, TaskerResult<Value>)> {
        let event_value = event.as_value().clone();
        stream::iter(targets.into_iter().map(|function| {
            let shared = Arc::new(EngineShared {
                execution_id: ctx.execution_id.clone(),
                timestamp: ctx.timestamp,
                inbound_task_id: ctx.task_id.clone(),
                store: self.store.clone(),
                mode: mode.clone(),
                prefetch: prefetch.clone(),
                event_value: event_value.clone(),
            });
            let function_id = function.id.clone();
            let event = event.clone();
            let ctx = ctx.clone();
            async move {
                let result = engine::invoke_function(function, event, ctx, shared).await;
                (function_id, result)
            }
        }))
        .buffer_unordered(self.max_concurrent_functions)
        .collect()
        .await
    }

    fn notify_error(&self, err: &TaskerError) {
        warn!(error = %err, "handler error observed by mount");
        if let Some(hook) = &self.on_error {
            hook(err);
        }
    }
}

fn next_function_id(ctx: &ExecutionContext) -> Option<String> {
    ctx.task_id.as_ref().and_then(|path| path.segments().next().map(str::to_string))
}
