//! # Filesystem store
//!
//! A second reference `Store` (§4.1's sketch: "one directory per execution; `.transaction` and
//! `.result` files per task"), durable across process restarts without requiring any external
//! service — useful for local development and for debugging a stuck execution by simply looking
//! at a directory tree.
//!
//! Layout under `base_dir`:
//!
//! ```text
//! base_dir/
//!   <execution_id>/
//!     .begun                     # presence marks the execution as in progress
//!     <task_path>.transaction    # presence marks the task as in progress
//!     <task_path>.result         # JSON-encoded committed value
//! ```
//!
//! `task_path`'s `:` separators are replaced with `__` in file names so the same layout works
//! unmodified on filesystems that reserve `:` (§4.3's paths are otherwise opaque strings to the
//! store).
//!
//! Commit order matters for §4.3's atomic-commit-+-clear requirement: the result file is written
//! to a temp path and renamed into place (atomic on POSIX) *before* the transaction marker is
//! removed, so a concurrent observer calling `is_execution_task_in_progress` and
//! `get_execution_task_result` never sees "neither in progress nor committed" for a task this
//! call is committing.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tasker_core::Store;
use tasker_shared::{TaskPath, TaskerError, TaskerResult};
use tokio::fs;
use tracing::{debug, warn};

/// Filesystem-backed `Store` rooted at `base_dir` (§4.1).
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    base_dir: PathBuf,
}

impl FilesystemStore {
    /// Root every execution's directory under `base_dir`. The directory is created lazily, on
    /// first write.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn execution_dir(&self, execution_id: &str) -> PathBuf {
        self.base_dir.join(execution_id)
    }

    fn begun_marker(&self, execution_id: &str) -> PathBuf {
        self.execution_dir(execution_id).join(".begun")
    }

    fn transaction_path(&self, execution_id: &str, task_path: &TaskPath) -> PathBuf {
        self.execution_dir(execution_id).join(format!("{}.transaction", sanitize(task_path)))
    }

    fn result_path(&self, execution_id: &str, task_path: &TaskPath) -> PathBuf {
        self.execution_dir(execution_id).join(format!("{}.result", sanitize(task_path)))
    }
}

fn sanitize(task_path: &TaskPath) -> String {
    task_path.as_str().replace(':', "__")
}

fn io_err(err: std::io::Error) -> TaskerError {
    warn!(error = %err, "filesystem store io error");
    TaskerError::Store(err.to_string())
}

async fn path_exists(path: &Path) -> TaskerResult<bool> {
    match fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(err)),
    }
}

#[async_trait]
impl Store for FilesystemStore {
    async fn begin_execution(&self, execution_id: &str) -> TaskerResult<()> {
        let dir = self.execution_dir(execution_id);
        fs::create_dir_all(&dir).await.map_err(io_err)?;
        fs::write(self.begun_marker(execution_id), []).await.map_err(io_err)
    }

    async fn is_execution_in_progress(&self, execution_id: &str) -> TaskerResult<bool> {
        path_exists(&self.begun_marker(execution_id)).await
    }

    async fn begin_execution_task(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<()> {
        let dir = self.execution_dir(execution_id);
        fs::create_dir_all(&dir).await.map_err(io_err)?;
        let transaction_path = self.transaction_path(execution_id, task_path);
        // Idempotent: a marker already on disk (this step, or a concurrent redelivery of it) is
        // not an error (§4.1 "idempotent mark of in-progress").
        match fs::OpenOptions::new().create_new(true).write(true).open(&transaction_path).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
            Err(err) => Err(io_err(err)),
        }
    }

    async fn is_execution_task_in_progress(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<bool> {
        path_exists(&self.transaction_path(execution_id, task_path)).await
    }

    async fn get_execution_task_result(&self, execution_id: &str, task_path: &TaskPath) -> TaskerResult<Option<Value>> {
        match fs::read(self.result_path(execution_id, task_path)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_err(err)),
        }
    }

    async fn commit_execution_task_result(&self, execution_id: &str, task_path: &TaskPath, value: Value) -> TaskerResult<()> {
        let dir = self.execution_dir(execution_id);
        fs::create_dir_all(&dir).await.map_err(io_err)?;

        let result_path = self.result_path(execution_id, task_path);
        let tmp_path = result_path.with_extension("result.tmp");
        let bytes = serde_json::to_vec(&value)?;
        fs::write(&tmp_path, &bytes).await.map_err(io_err)?;
        fs::rename(&tmp_path, &result_path).await.map_err(io_err)?;

        match fs::remove_file(self.transaction_path(execution_id, task_path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(err)),
        }
    }

    async fn dispose_execution(&self, execution_id: &str) -> TaskerResult<()> {
        match fs::remove_dir_all(self.execution_dir(execution_id)).await {
            Ok(()) => {
                debug!(execution_id, "execution directory removed");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(io_err(err)),
        }
    }
}
