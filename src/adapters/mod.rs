//! Type-safe event adapters for converting events to strongly-typed structures.
//!
//! This module provides a dual-phase adapter system:
//! - **Class-time validation**: checks member names and types once per event class
//!   and builds an extraction plan
//! - **Per-event extraction**: reads members by index using the pre-validated plan
//!
//! Adapters are what [`ChannelSink`](crate::components::ChannelSink) uses to turn
//! events into values for async consumers.
//!
//! # Example Usage
//!
//! ```rust
//! use tracegraph::adapters::*;
//! use tracegraph::types::{Event, EventClass};
//! use tracegraph::Result;
//!
//! struct Switch {
//!     prev_pid: i64,
//!     next_comm: String,
//!     cpu: Option<u32>,
//! }
//!
//! impl EventAdapter for Switch {
//!     fn validate_class(class: &EventClass) -> Result<AdapterValidation> {
//!         Ok(AdapterValidation::new(vec![
//!             FieldExtraction::required::<i64>(class, "prev_pid")?,
//!             FieldExtraction::required::<String>(class, "next_comm")?,
//!             FieldExtraction::optional(class, "cpu"),
//!         ]))
//!     }
//!
//!     fn adapt(event: &Event, validation: &AdapterValidation) -> Self {
//!         Self {
//!             prev_pid: validation.fetch_or_default(event, "prev_pid"),
//!             next_comm: validation.fetch_or_default(event, "next_comm"),
//!             cpu: validation.fetch_optional(event, "cpu"),
//!         }
//!     }
//! }
//! ```

mod class_provider;
mod event_adapter;
mod validation;

// Re-export all public types
pub use class_provider::ClassProvider;
pub use event_adapter::EventAdapter;
pub use validation::{AdapterValidation, FieldExtraction};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestTrace;
    use crate::types::{Event, EventClass, FieldClass, FieldClassKind};
    use crate::{GraphError, Result};

    fn sched_payload() -> FieldClass {
        let mut payload = FieldClass::structure();
        payload.append_member_of::<i64>("prev_pid").unwrap();
        payload.append_member_of::<String>("next_comm").unwrap();
        payload.append_member_of::<u32>("cpu").unwrap();
        payload
    }

    #[derive(Debug, PartialEq)]
    struct Switch {
        prev_pid: i64,
        next_comm: String,
        prio: Option<i32>,
    }

    impl EventAdapter for Switch {
        fn validate_class(class: &EventClass) -> Result<AdapterValidation> {
            Ok(AdapterValidation::new(vec![
                FieldExtraction::required::<i64>(class, "prev_pid")?,
                FieldExtraction::required::<String>(class, "next_comm")?,
                FieldExtraction::optional(class, "prio"),
            ]))
        }

        fn adapt(event: &Event, validation: &AdapterValidation) -> Self {
            Self {
                prev_pid: validation.fetch_or_default(event, "prev_pid"),
                next_comm: validation.fetch_or_default(event, "next_comm"),
                prio: validation.fetch_optional(event, "prio"),
            }
        }
    }

    #[test]
    fn adapter_validation_creation() {
        let fixture = TestTrace::with_payload("sched_switch", sched_payload());
        let validation = Switch::validate_class(&fixture.event_class).unwrap();

        assert_eq!(validation.field_count(), 3);
        assert!(validation.has_required_fields());
        assert_eq!(validation.index_of("next_comm"), Some(1));
        assert_eq!(validation.member_index("next_comm"), Some(1));
        assert_eq!(validation.member_index("prio"), None);
        assert_eq!(validation.index_of("cpu"), None);
    }

    #[test]
    fn adapt_reads_through_plan() {
        let fixture = TestTrace::with_payload("sched_switch", sched_payload());
        let validation = Switch::validate_class(&fixture.event_class).unwrap();

        let mut event = Event::new(&fixture.event_class, &fixture.stream).unwrap();
        event.set_payload_value("prev_pid", -4i64).unwrap();
        event.set_payload_value("next_comm", String::from("kworker")).unwrap();

        let switch = Switch::adapt(&event, &validation);
        assert_eq!(switch, Switch { prev_pid: -4, next_comm: "kworker".into(), prio: None });
        assert_eq!(validation.fetch::<u32>(&event, "cpu").unwrap(), 0);
        assert!(validation.fetch::<u32>(&event, "missing").is_err());
    }

    #[test]
    fn validation_rejects_missing_and_mistyped_members() {
        let fixture = TestTrace::new();
        assert!(matches!(
            Switch::validate_class(&fixture.event_class),
            Err(GraphError::FieldNotFound { .. })
        ));

        let mut payload = FieldClass::structure();
        payload.append_member_of::<String>("prev_pid").unwrap();
        payload.append_member_of::<String>("next_comm").unwrap();
        let mistyped = TestTrace::with_payload("sched_switch", payload);
        assert!(matches!(
            Switch::validate_class(&mistyped.event_class),
            Err(GraphError::TypeConversion { .. })
        ));
    }

    #[test]
    fn integer_width_is_not_part_of_compatibility() {
        let fixture = TestTrace::with_payload("sched_switch", sched_payload());
        // cpu is u32; reading it as u64 is compatible, as i64 is not.
        assert!(FieldExtraction::required::<u64>(&*fixture.event_class, "cpu").is_ok());
        assert!(FieldExtraction::required::<i64>(&*fixture.event_class, "cpu").is_err());
    }

    #[test]
    fn field_extraction_properties() {
        let required = FieldExtraction::Required { name: "pid".into(), index: 2, kind: FieldClassKind::SignedInteger };
        assert_eq!(required.field_name(), Some("pid"));
        assert!(required.is_required());
        assert_eq!(required.member_index(), Some(2));

        let skipped = FieldExtraction::Skipped;
        assert_eq!(skipped.field_name(), None);
        assert!(!skipped.is_required());
        assert!(skipped.member_index().is_none());
    }

    #[test]
    fn class_provider_basic_usage() {
        let fixture = TestTrace::with_payload("sched_switch", sched_payload());
        let class: &EventClass = &fixture.event_class;

        assert!(class.has_member("cpu"));
        assert!(!class.has_member("InvalidField"));
        assert_eq!(class.member_class("next_comm").map(FieldClass::kind), Some(FieldClassKind::String));
        assert_eq!(class.member_names(), ["prev_pid", "next_comm", "cpu"]);

        let event = fixture.event(1);
        assert_eq!(ClassProvider::member_index(&event, "cpu"), Some(2));
    }
}
