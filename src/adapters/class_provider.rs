//! Class provider trait for payload layout discovery

use crate::types::{Event, EventClass, FieldClass};

/// Access to a payload layout, whether from an event class or an event.
///
/// Lets validation code work with anything that knows its payload class.
pub trait ClassProvider {
    /// Payload structure class, if the event class has one.
    fn payload_class(&self) -> Option<&FieldClass>;

    /// Check if a payload member exists.
    fn has_member(&self, name: &str) -> bool {
        self.member_class(name).is_some()
    }

    /// Class of a payload member.
    fn member_class(&self, name: &str) -> Option<&FieldClass> {
        self.payload_class()?.member_by_name(name).map(|member| &*member.class)
    }

    /// Index of a payload member.
    fn member_index(&self, name: &str) -> Option<usize> {
        self.payload_class()?.member_index(name)
    }

    /// All payload member names, in declaration order.
    fn member_names(&self) -> Vec<String> {
        self.payload_class()
            .map(|payload| payload.members().iter().map(|member| member.name.clone()).collect())
            .unwrap_or_default()
    }
}

impl ClassProvider for EventClass {
    fn payload_class(&self) -> Option<&FieldClass> {
        EventClass::payload_class(self).map(|class| &**class)
    }
}

impl ClassProvider for Event {
    fn payload_class(&self) -> Option<&FieldClass> {
        self.class().payload_class().map(|class| &**class)
    }
}
