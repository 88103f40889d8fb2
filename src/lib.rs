//! # tasker-core
//!
//! The resumable execution engine described in the project's design documents: a handler is
//! authored as a straight-line async function that calls [`engine::execute`] for each unit of
//! durable work; the engine replays the handler from the top on every re-entry, short-circuiting
//! on cached results until it reaches work that still needs doing.
//!
//! This crate defines the protocol only — the [`Store`], [`Dispatcher`], and [`EventSchema`]
//! traits are narrow interfaces that external collaborators implement. `tasker-worker` ships the
//! reference collaborators (in-memory and filesystem stores, an in-process dispatcher, a
//! `jsonschema`-backed validator) and the `Worker` facade applications actually construct.

pub mod dispatcher;
pub mod engine;
pub mod event_schema;
pub mod function;
pub mod interrupt;
pub mod mount;
pub mod path_scope;
pub mod store;

pub use dispatcher::Dispatcher;
pub use engine::execute;
pub use event_schema::EventSchema;
pub use function::{create_function, Function, FunctionRegistry};
pub use mount::Mount;
pub use store::{Store, TaskState};

pub use tasker_shared::{
    config::ExecutionMode, Envelope, Event, EventFilter, ExecutionContext, TaskPath, TaskerError,
    TaskerResult, EMPTY_EXECUTION_RESULT,
};
