//! # Configuration
//!
//! Layered TOML + environment configuration for a worker (§1.1 ambient stack). Loaded through the
//! `config` crate: an optional `tasker.toml` in the current directory, overridden by `TASKER_*`
//! environment variables.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{TaskerError, TaskerResult};

/// Which continuation strategy a `Mount` uses (§4.7). Canonical definition lives here so both
/// `tasker-core` (which enforces the semantics) and configuration loading (which selects a
/// default) share one type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Every continuation crosses the dispatcher. Default.
    #[default]
    Isolated,
    /// Continuations are drained from an in-process queue; no dispatcher publishes happen.
    RunUntilError,
}

/// Configuration for the built-in reference stores (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    /// Optional TTL applied to every write, letting stuck in-progress markers age out (§5
    /// "Cancellation and timeouts").
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

/// Top-level worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Default execution mode for mounts created without an explicit override.
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Upper bound on how many matching functions the mount runs concurrently for one inbound
    /// context (§5 "bounded-concurrency race").
    #[serde(default = "default_max_concurrent_functions")]
    pub max_concurrent_functions: usize,
    /// Built-in store configuration.
    #[serde(default)]
    pub store: StoreConfig,
}

fn default_max_concurrent_functions() -> usize {
    16
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::default(),
            max_concurrent_functions: default_max_concurrent_functions(),
            store: StoreConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from an optional `tasker.toml` in the current directory, overlaid with
    /// `TASKER_*` environment variables (e.g. `TASKER_EXECUTION_MODE=run_until_error`), falling
    /// back to defaults when neither is present.
    pub fn load() -> TaskerResult<Self> {
        let built = config::Config::builder()
            .add_source(config::File::with_name("tasker").required(false))
            .add_source(config::Environment::with_prefix("TASKER").separator("_"))
            .build()
            .map_err(|e| TaskerError::Config(e.to_string()))?;

        // `config` errors on a totally empty source set with no defaults merged in, so fall back
        // explicitly rather than surfacing that as a hard error.
        match built.try_deserialize::<Self>() {
            Ok(cfg) => {
                debug!(execution_mode = ?cfg.execution_mode, max_concurrent_functions = cfg.max_concurrent_functions, "worker config loaded");
                Ok(cfg)
            }
            Err(err) => {
                warn!(error = %err, "no tasker.toml or TASKER_* env found, falling back to default config");
                Ok(Self::default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_execution_mode_is_isolated() {
        assert_eq!(ExecutionMode::default(), ExecutionMode::Isolated);
    }

    #[test]
    fn default_worker_config_has_sane_concurrency() {
        let cfg = WorkerConfig::default();
        assert_eq!(cfg.max_concurrent_functions, 16);
        assert!(cfg.store.ttl_seconds.is_none());
    }

    #[test]
    fn execution_mode_serializes_snake_case() {
        let value = serde_json::to_value(ExecutionMode::RunUntilError).unwrap();
        assert_eq!(value, serde_json::json!("run_until_error"));
    }

    #[test]
    fn load_without_file_or_env_falls_back_to_defaults() {
        let cfg = WorkerConfig::load().unwrap();
        assert_eq!(cfg.execution_mode, ExecutionMode::Isolated);
    }
}
