//! # JSON Schema event validator
//!
//! A reference `EventSchema` (§4.4, §6 supplemental) backed by the `jsonschema` crate: the
//! baseline `type`-is-a-string requirement always applies (delegated to
//! `tasker_shared::Event::new`), and an application can additionally register a JSON Schema
//! document per event type, validated against the whole event body once `type` has been checked.

use std::collections::HashMap;

use async_trait::async_trait;
use jsonschema::Validator;
use serde_json::Value;
use tasker_core::EventSchema;
use tasker_shared::{Event, TaskerError, TaskerResult};
use tracing::warn;

/// Validates `type` presence unconditionally and, for event types with a registered schema, the
/// full event body against that schema (§4.4).
#[derive(Default)]
pub struct JsonSchemaEventSchema {
    schemas: HashMap<String, Validator>,
}

impl JsonSchemaEventSchema {
    /// An instance with no per-type schemas registered; only the baseline `type` check applies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `schema` to additionally validate every event of `event_type`. Compiling `schema`
    /// is the only fallible step; a bad schema document fails at registration rather than at
    /// validation time.
    pub fn with_schema(mut self, event_type: impl Into<String>, schema: &Value) -> TaskerResult<Self> {
        let compiled = jsonschema::validator_for(schema).map_err(|err| TaskerError::Config(err.to_string()))?;
        self.schemas.insert(event_type.into(), compiled);
        Ok(self)
    }
}

impl std::fmt::Debug for JsonSchemaEventSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonSchemaEventSchema")
            .field("registered_types", &self.schemas.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl EventSchema for JsonSchemaEventSchema {
    async fn validate(&self, raw: Value) -> TaskerResult<Event> {
        let event = Event::new(raw)?;
        if let Some(validator) = self.schemas.get(event.event_type()) {
            if let Err(err) = validator.validate(event.as_value()) {
                warn!(event_type = event.event_type(), error = %err, "event failed schema validation");
                return Err(TaskerError::InvalidEvent(format!(
                    "event type {:?} failed schema validation: {err}",
                    event.event_type()
                )));
            }
        }
        Ok(event)
    }
}
