//! # tasker-worker
//!
//! The application-facing half of the workspace: [`Worker`] is the thin options holder described
//! in §4.8, and the `stores`, `dispatch`, and `schema` modules are the reference collaborators
//! named in §2's "Built-in collaborators" row (plus the filesystem store and JSON Schema
//! validator this crate's spec adds as supplemental, local-development-friendly alternatives).
//!
//! Nothing here is required to use `tasker-core` — every type in this crate is built entirely
//! against `tasker_core::{Store, Dispatcher, EventSchema}`, the same narrow interfaces an
//! application's own collaborators would implement.

pub mod dispatch;
pub mod schema;
pub mod stores;
pub mod worker;

#[cfg(feature = "web-api")]
pub mod http;

pub use dispatch::in_process::InProcessDispatcher;
pub use schema::json_schema::JsonSchemaEventSchema;
pub use stores::filesystem::FilesystemStore;
pub use stores::memory::MemoryStore;
pub use worker::{Worker, WorkerOptions};
