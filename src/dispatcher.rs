//! # Dispatcher
//!
//! The transport interface described in §4.2. The core assumes at-least-once eventual delivery
//! to a sink that will eventually call [`crate::mount::Mount::process`] with the same bytes; a
//! dispatcher that cannot make that promise (fire-and-forget HTTP, say) forfeits durability on
//! that boundary — a tradeoff for the caller to make, not one the core enforces.

use async_trait::async_trait;
use tasker_shared::TaskerResult;

/// Transports an opaque serialized envelope (§6) to whatever will eventually invoke
/// `Mount::process` with it.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Hand `raw_payload` to the transport. Resolves once the transport has *accepted* the
    /// payload, not once it has been processed.
    async fn dispatch(&self, raw_payload: Vec<u8>) -> TaskerResult<()>;
}
