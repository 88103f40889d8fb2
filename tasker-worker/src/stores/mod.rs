//! # Built-in store collaborators
//!
//! Two reference [`tasker_core::Store`] implementations (§4.1): an in-memory store for tests and
//! single-process runs, and a filesystem store (one directory per execution) for local
//! development across process restarts. Neither is a distributed store — both rely on the
//! process's own memory or local disk being the single source of truth, which is fine for a
//! single worker but does not give the conditional-write guarantee §9's open question calls out
//! as the thing a production store should add.

pub mod filesystem;
pub mod memory;
