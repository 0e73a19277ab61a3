//! Dynamic by-name view over one event.
//!
//! This adapter provides ergonomic lookups of payload members without a bespoke
//! typed struct. It is intended for exploration, tooling and diagnostics. For hot
//! paths, prefer a typed [`EventAdapter`] whose extraction plan reads members by
//! index.

use crate::Result;
use crate::adapters::{AdapterValidation, EventAdapter};
use crate::object::Ref;
use crate::types::{Event, EventClass, Field, FieldData};

/// A self-contained copy of one event's payload supporting by-name lookups.
#[derive(Debug, Clone)]
pub struct DynamicEvent {
    class: Ref<EventClass>,
    stream_id: u64,
    payload: Option<Field>,
}

impl DynamicEvent {
    /// Event class name.
    pub fn name(&self) -> &str {
        self.class.name()
    }

    pub fn class(&self) -> &Ref<EventClass> {
        &self.class
    }

    /// Id of the stream the event belonged to.
    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub fn member_count(&self) -> usize {
        self.payload.as_ref().map_or(0, Field::member_count)
    }

    /// Raw payload member.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.payload.as_ref()?.member_by_name(name)
    }

    /// Generic typed lookup by member name.
    /// Returns None if the member is missing or type conversion fails.
    pub fn get<T: FieldData>(&self, name: &str) -> Option<T> {
        self.field(name)?.get().ok()
    }

    /// Convenience typed helpers
    pub fn u64(&self, name: &str) -> Option<u64> {
        self.get(name)
    }
    pub fn i64(&self, name: &str) -> Option<i64> {
        self.get(name)
    }
    pub fn str(&self, name: &str) -> Option<&str> {
        self.field(name)?.as_str().ok()
    }
}

impl EventAdapter for DynamicEvent {
    fn validate_class(_class: &EventClass) -> Result<AdapterValidation> {
        // No pre-validation or extraction plan needed for dynamic lookups
        Ok(AdapterValidation::new(Vec::new()))
    }

    fn adapt(event: &Event, _validation: &AdapterValidation) -> Self {
        Self { class: event.class().acquire(), stream_id: event.stream().id(), payload: event.payload().cloned() }
    }
}
