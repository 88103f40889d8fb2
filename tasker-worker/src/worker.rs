//! # Worker facade
//!
//! `Worker` is the thin holder of [`WorkerOptions`] described in §4.8: applications construct one
//! `Worker` per process (or per test), register functions against it, and ask it for a [`Mount`]
//! once their function set is final. `configure` exists because tests commonly swap a store or
//! dispatcher in after construction — late binding an application would otherwise have to thread
//! through every call site.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tasker_core::function::HandlerFn;
use tasker_core::mount::OnErrorHook;
use tasker_core::{create_function, Dispatcher, EventSchema, Function, Mount, Store};
use tasker_shared::config::ExecutionMode;
use tasker_shared::{Envelope, EventFilter, TaskerResult};
use tracing::{debug, info};

use crate::schema::json_schema::JsonSchemaEventSchema;
use crate::stores::memory::MemoryStore;

/// Options a [`Worker`] owns and hands to every [`Mount`] it builds (§4.8).
#[derive(Clone)]
pub struct WorkerOptions {
    /// Persists per-execution task state (§4.1). Defaults to an unbounded in-memory store,
    /// suitable for a single test process only.
    pub store: Arc<dyn Store>,
    /// Transports continuation envelopes (§4.2). Defaults to an in-process dispatcher, which
    /// requires attaching a mount before first use (see [`crate::dispatch::in_process`]).
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Validates inbound payloads into typed events (§4.4, §6). Defaults to a baseline
    /// `type`-only schema with no per-type documents registered.
    pub event_schema: Arc<dyn EventSchema>,
    /// Continuation strategy for mounts built from these options (§4.7).
    pub execution_mode: ExecutionMode,
    /// Bound on concurrently running matching functions for one inbound context (§5).
    pub max_concurrent_functions: usize,
    /// Best-effort diagnostic hook for observed `HandlerError`s (§9).
    pub on_error: Option<OnErrorHook>,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            store: Arc::new(MemoryStore::default()),
            dispatcher: Arc::new(crate::dispatch::in_process::InProcessDispatcher::new()),
            event_schema: Arc::new(JsonSchemaEventSchema::default()),
            execution_mode: ExecutionMode::default(),
            max_concurrent_functions: 16,
            on_error: None,
        }
    }
}

impl WorkerOptions {
    /// Start from the defaults, supplying the two collaborators nearly every real deployment
    /// needs to override (a durable store and a transport that actually crosses a process
    /// boundary).
    pub fn new(store: Arc<dyn Store>, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            store,
            dispatcher,
            ..Self::default()
        }
    }

    /// Override the event schema validator.
    #[must_use]
    pub fn with_event_schema(mut self, event_schema: Arc<dyn EventSchema>) -> Self {
        self.event_schema = event_schema;
        self
    }

    /// Override the execution mode (§4.7).
    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Override the concurrency cap on matching functions (§5).
    #[must_use]
    pub fn with_max_concurrent_functions(mut self, max: usize) -> Self {
        self.max_concurrent_functions = max;
        self
    }

    /// Attach an error observer (§9).
    #[must_use]
    pub fn with_on_error(mut self, hook: OnErrorHook) -> Self {
        self.on_error = Some(hook);
        self
    }
}

/// The per-process entry point applications construct (§4.8). Owns [`WorkerOptions`] behind a
/// lock so `configure` can swap collaborators mid-flight without requiring every call site to
/// re-read a snapshot explicitly; `mount` and `publish` each read one consistent snapshot per
/// call (§9 "Global mutable state").
pub struct Worker {
    options: RwLock<WorkerOptions>,
}

impl Worker {
    /// Build a worker from a fixed set of options.
    pub fn new(options: WorkerOptions) -> Self {
        Self {
            options: RwLock::new(options),
        }
    }

    /// Read the current options. Returns an owned clone since `Arc`-backed fields are cheap to
    /// share and callers should not hold the lock across an `await`.
    pub fn get_options(&self) -> WorkerOptions {
        self.options.read().expect("worker options lock poisoned").clone()
    }

    /// Merge-replace options in place (§4.8 "late binding; a common pattern in tests swaps
    /// store/dispatcher after construction").
    pub fn configure(&self, update: impl FnOnce(&mut WorkerOptions)) {
        let mut options = self.options.write().expect("worker options lock poisoned");
        update(&mut options);
        debug!("worker options reconfigured");
    }

    /// Register a handler under `id` (§4.4). A thin pass-through to
    /// [`tasker_core::create_function`]; kept on `Worker` because that is where application code
    /// already holds a reference when wiring up a mount.
    pub fn create_function(&self, id: impl Into<String>, filter: impl Into<EventFilter>, handler: HandlerFn) -> Function {
        create_function(id, filter, handler)
    }

    /// Build a [`Mount`] from the current options and the given functions (§4.6). Fails if two
    /// functions share an id (§3).
    pub fn mount(&self, functions: Vec<Function>) -> TaskerResult<Mount> {
        let options = self.get_options();
        info!(function_count = functions.len(), "building mount");
        let mount = Mount::new(
            functions,
            options.store,
            options.dispatcher,
            options.event_schema,
            options.execution_mode,
            options.max_concurrent_functions,
        )?;
        Ok(match options.on_error {
            Some(hook) => mount.with_on_error(hook),
            None => mount,
        })
    }

    /// Publish a fresh top-level event (§4.8): serialize `{event}` with no context, hand it to
    /// the dispatcher, and record the publish metric. Every workflow execution begins here or at
    /// an equivalent direct call to `Mount::execute`/`Mount::process`.
    pub async fn publish(&self, event: Value) -> TaskerResult<()> {
        let dispatcher = self.get_options().dispatcher;
        let envelope = Envelope::top_level(event);
        let bytes = envelope.to_bytes()?;
        dispatcher.dispatch(bytes).await?;
        metrics::counter!("tasker_worker_publish_total").increment(1);
        debug!("published top-level event");
        Ok(())
    }
}
