//! # In-memory store
//!
//! The reference `Store` used by the crate's own tests and by any application that hasn't yet
//! reached for a durable backend (§2 "Built-in collaborators"). Built on `dashmap` the same way
//! the wider corpus reaches for it for a concurrent map guarded by nothing more than per-shard
//! locks (see `other_examples`'s `ExecutionContext` usage of `dashmap::DashMap`).
//!
//! Supports the optional TTL described in §4.1's reference-store sketch and §5's "Cancellation
//! and timeouts": a TTL only ages out a stuck *in-progress* marker, never a committed value —
//! committed values are immutable for the life of the execution (§3).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tasker_core::Store;
use tasker_shared::{TaskPath, TaskerResult};
use tracing::debug;

#[derive(Debug, Clone)]
enum Record {
    InProgress { since: Instant },
    Committed { value: Value },
}

/// Unbounded in-memory `Store` (§4.1). Lives only as long as the process; two `MemoryStore`
/// instances never share state.
#[derive(Debug)]
pub struct MemoryStore {
    executions: DashSet<String>,
    tasks: DashMap<(String, TaskPath), Record>,
    ttl: Option<Duration>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemoryStore {
    /// Build a store, optionally aging out in-progress markers older than `ttl`.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            executions: DashSet::new(),
            tasks: DashMap::new(),
            ttl,
        }
    }

    fn expired(&self, since: Instant) -> bool {
        self.ttl.is_some_and(|ttl| since.elapsed() > ttl)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin_execution(&self, execution_id: &str) -> TaskerResult<()> {
        self.executions.insert(execution_id.to_string());
        Ok(())
    }

    async fn is_execution_in_progress(&self, execution_id: &str) -> TaskerResult<bool> {
        Ok(self.executions.contains(execution_id))
    }

    async fn begin_execution_task(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<()> {
        let ttl = self.ttl;
        self.tasks
            .entry((execution_id.to_string(), task_path.clone()))
            .and_modify(|record| {
                if let Record::InProgress { since } = record {
                    if ttl.is_some_and(|t| since.elapsed() > t) {
                        *since = Instant::now();
                    }
                }
            })
            .or_insert_with(|| Record::InProgress { since: Instant::now() });
        Ok(())
    }

    async fn is_execution_task_in_progress(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<bool> {
        let key = (execution_id.to_string(), task_path.clone());
        Ok(match self.tasks.get(&key).as_deref() {
            Some(Record::InProgress { since }) => {
                let expired = self.expired(*since);
                if expired {
                    debug!(execution_id, task_path = %task_path, "in-progress marker aged out by ttl");
                }
                !expired
            }
            _ => false,
        })
    }

    async fn get_execution_task_result(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<Option<Value>> {
        let key = (execution_id.to_string(), task_path.clone());
        Ok(match self.tasks.get(&key).as_deref() {
            Some(Record::Committed { value }) => Some(value.clone()),
            _ => None,
        })
    }

    async fn commit_execution_task_result(&self, execution_id: &str, task_path: &TaskPath, value: Value) -> TaskerResult<()> {
        self.tasks
            .insert((execution_id.to_string(), task_path.clone()), Record::Committed { value });
        Ok(())
    }

    async fn dispose_execution(&self, execution_id: &str) -> TaskerResult<()> {
        self.executions.remove(execution_id);
        self.tasks.retain(|(exec, _), _| exec != execution_id);
        debug!(execution_id, "execution disposed from memory store");
        Ok(())
    }

    async fn get_execution_task_results(&self, execution_id: &str) -> TaskerResult<Option<HashMap<TaskPath, Value>>> {
        let results = self
            .tasks
            .iter()
            .filter_map(|entry| {
                let (exec, path) = entry.key();
                match (exec == execution_id, entry.value()) {
                    (true, Record::Committed { value }) => Some((path.clone(), value.clone())),
                    _ => None,
                }
            })
            .collect();
        Ok(Some(results))
    }
}
