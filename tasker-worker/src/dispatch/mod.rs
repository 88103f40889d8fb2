//! # Built-in dispatcher collaborators
//!
//! `tasker-core` needs only a `Dispatcher` trait object; this module ships the one reference
//! implementation named in §2: an in-process dispatcher for single-worker runs and tests, where
//! crossing an actual transport would add latency without adding coverage.

pub mod in_process;
