//! # Envelope
//!
//! The only wire/file format defined by the core (§6): `{ event, context? }`, serialized as JSON
//! bytes by a `Dispatcher` and handed back to `Mount::process`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::context::ExecutionContext;
use crate::error::{TaskerError, TaskerResult};

/// The envelope a `Dispatcher` transports and `Mount::process` parses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The untyped event payload; validated against the mount's `EventSchema` after parsing.
    pub event: Value,
    /// Absent on top-level publishes, present on continuations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ExecutionContext>,
}

impl Envelope {
    /// Build a top-level envelope (no context) from a raw event value.
    pub fn top_level(event: Value) -> Self {
        Self {
            event,
            context: None,
        }
    }

    /// Build a continuation envelope carrying the given context.
    pub fn continuation(event: Value, context: ExecutionContext) -> Self {
        Self {
            event,
            context: Some(context),
        }
    }

    /// Serialize to the JSON bytes a `Dispatcher` transports.
    pub fn to_bytes(&self) -> TaskerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(TaskerError::from)
    }

    /// Parse an envelope from raw payload bytes, as `Mount::process` must (§4.6, §6).
    pub fn from_bytes(bytes: &[u8]) -> TaskerResult<Self> {
        serde_json::from_slice(bytes).map_err(|err| {
            warn!(error = %err, "failed to parse envelope payload");
            TaskerError::from(err)
        })
    }
}
