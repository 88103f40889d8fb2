//! # In-process dispatcher
//!
//! The reference `Dispatcher` for tests and single-process deployments (§2, §4.2): instead of
//! crossing a queue or an HTTP boundary, `dispatch` calls straight back into the `Mount` it is
//! attached to.
//!
//! Construction is necessarily two-phase: `Mount::new` takes `Arc<dyn Dispatcher>` as an
//! argument, so the dispatcher has to exist before the mount does, but the dispatcher can't know
//! which mount to call back into until that mount exists. `attach` closes the cycle once, after
//! the mount is built — the same "configure after construction" shape §4.8 calls out for swapping
//! collaborators in tests.

use async_trait::async_trait;
use tasker_core::{Dispatcher, Mount};
use tasker_shared::{TaskerError, TaskerResult};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Delivers an envelope by calling `Mount::process` directly, in the same task (§4.2).
///
/// Every continuation this dispatcher carries recurses synchronously through `Mount::process` ->
/// `execute` -> `dispatch`, so its call depth is bounded by a handler's step count — fine for the
/// reference collaborator's purpose (tests, local runs), not a general-purpose transport.
pub struct InProcessDispatcher {
    mount: OnceCell<std::sync::Arc<Mount>>,
}

impl InProcessDispatcher {
    /// Build an unattached dispatcher. `dispatch` fails until [`InProcessDispatcher::attach`] is
    /// called.
    pub fn new() -> Self {
        Self { mount: OnceCell::new() }
    }

    /// Bind the mount this dispatcher delivers to. Must be called exactly once, after the mount
    /// that was constructed with this dispatcher's `Arc` exists.
    pub fn attach(&self, mount: std::sync::Arc<Mount>) -> TaskerResult<()> {
        self.mount
            .set(mount)
            .map_err(|_| TaskerError::Dispatch("InProcessDispatcher already attached to a mount".to_string()))
    }
}

impl Default for InProcessDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dispatcher for InProcessDispatcher {
    async fn dispatch(&self, raw_payload: Vec<u8>) -> TaskerResult<()> {
        let mount = self.mount.get().ok_or_else(|| {
            warn!("in-process dispatch attempted before a mount was attached");
            TaskerError::Dispatch("InProcessDispatcher has no mount attached".to_string())
        })?;
        debug!(payload_len = raw_payload.len(), "dispatching envelope in-process");
        mount.process(&raw_payload).await
    }
}
