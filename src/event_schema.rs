//! # EventSchema
//!
//! The validation interface described in §4.4/§6: turns an untyped payload into a typed
//! [`Event`], or reports why it couldn't. `Mount::process` calls this once per inbound payload,
//! before any handler runs; `Mount::execute` (called directly, e.g. from tests) bypasses it
//! entirely since its caller already has a validated `Event` in hand.

use async_trait::async_trait;
use serde_json::Value;
use tasker_shared::{Event, TaskerResult};

/// Validates an untyped JSON payload into an [`Event`] (§3, §4.4).
#[async_trait]
pub trait EventSchema: Send + Sync {
    /// Validate and parse `raw`. Returns `Err(TaskerError::InvalidEvent(..))` on any schema
    /// violation, including the baseline §3 requirement that `type` be present and a string.
    async fn validate(&self, raw: Value) -> TaskerResult<Event>;
}

/// A permissive schema that only enforces §3's baseline invariant (a string `type` field). Useful
/// as a `Mount` default when an application has no schema of its own to plug in yet.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughSchema;

#[async_trait]
impl EventSchema for PassthroughSchema {
    async fn validate(&self, raw: Value) -> TaskerResult<Event> {
        Event::new(raw)
    }
}
