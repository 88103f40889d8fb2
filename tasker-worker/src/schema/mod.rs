//! # Built-in event schema collaborators
//!
//! The reference `EventSchema` named in §2's supplemental component list: a `jsonschema`-backed
//! validator that enforces the baseline §3 `type` requirement plus, optionally, a per-event-type
//! JSON Schema document an application registers.

pub mod json_schema;
