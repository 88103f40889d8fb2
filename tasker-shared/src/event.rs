//! # Event and EventFilter
//!
//! An `Event` is an application-supplied record with a mandatory string `type` attribute (§3).
//! The schema validator (`tasker-core::event_schema::EventSchema`) is what actually enforces that
//! invariant against an untyped payload; by the time an `Event` exists, `type` is guaranteed
//! present.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{TaskerError, TaskerResult};

/// A validated application event. Wraps an arbitrary JSON object that is guaranteed to carry a
/// string `type` field.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Event(Value);

impl Event {
    /// Build an `Event` from a JSON value, checking the `type` invariant.
    ///
    /// This is the one place outside `EventSchema` implementations that enforces §3's mandatory
    /// `type` attribute; reference `EventSchema` impls should still run their own validation
    /// first; this is the last-resort guard for hand-built events in tests.
    pub fn new(value: Value) -> TaskerResult<Self> {
        match value.get("type").and_then(Value::as_str) {
            Some(_) => Ok(Self(value)),
            None => {
                warn!("event is missing a string `type` attribute");
                Err(TaskerError::InvalidEvent(
                    "event is missing a string `type` attribute".to_string(),
                ))
            }
        }
    }

    /// The event's `type` discriminator.
    pub fn event_type(&self) -> &str {
        // Invariant enforced at construction; unwrap is safe.
        self.0.get("type").and_then(Value::as_str).unwrap_or_default()
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the event, returning the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

/// Predicate selecting which `Function`s see a given `Event` (§3, §4.4).
#[derive(Clone)]
pub enum EventFilter {
    /// Matches a single event type exactly.
    Type(String),
    /// Matches any of a set of event types.
    AnyOf(HashSet<String>),
    /// Arbitrary predicate over the event.
    Predicate(Arc<dyn Fn(&Event) -> bool + Send + Sync>),
}

impl std::fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Type(t) => f.debug_tuple("Type").field(t).finish(),
            Self::AnyOf(types) => f.debug_tuple("AnyOf").field(types).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl EventFilter {
    /// Does this filter accept the given event?
    pub fn matches(&self, event: &Event) -> bool {
        match self {
            Self::Type(t) => event.event_type() == t,
            Self::AnyOf(types) => types.contains(event.event_type()),
            Self::Predicate(f) => f(event),
        }
    }
}

impl From<&str> for EventFilter {
    fn from(value: &str) -> Self {
        Self::Type(value.to_string())
    }
}

impl From<String> for EventFilter {
    fn from(value: String) -> Self {
        Self::Type(value)
    }
}

impl From<Vec<String>> for EventFilter {
    fn from(values: Vec<String>) -> Self {
        Self::AnyOf(values.into_iter().collect())
    }
}

impl From<&[&str]> for EventFilter {
    fn from(values: &[&str]) -> Self {
        Self::AnyOf(values.iter().map(|s| s.to_string()).collect())
    }
}
