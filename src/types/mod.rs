//! Trace IR: the classes and instances carried by messages.
//!
//! This module provides the data model shared by every component of a graph,
//! from clock and field classes up to events.
//!
//! ## Architecture
//!
//! Classes describe, instances carry values:
//! - [`TraceClass`] owns [`StreamClass`]es, which own [`EventClass`]es
//! - [`Trace`] instantiates a trace class; [`Stream`]s and [`Packet`]s belong to a trace
//! - [`Event`] instantiates an event class inside a stream (and packet, if enabled)
//! - [`FieldClass`] describes payload layout; [`Field`] holds the values
//! - [`FieldData`] converts fields to and from native types with class checks
//! - [`ClockClass`] and [`ClockSnapshot`] timestamp messages
//!
//! Classes and shared instances live behind [`Ref`](crate::object::Ref) handles so
//! messages can refer to them without copying.
//!
//! ## Usage Example
//!
//! ```rust
//! use tracegraph::object::Ref;
//! use tracegraph::types::{Event, EventClass, FieldClass, Stream, StreamClass, Trace, TraceClass};
//!
//! let mut payload = FieldClass::structure();
//! payload.append_member_of::<u64>("pid").unwrap();
//!
//! let mut stream_class = StreamClass::new();
//! let sched = stream_class
//!     .add_event_class(EventClass::new("sched_switch").with_payload(payload).unwrap())
//!     .unwrap();
//!
//! let mut trace_class = TraceClass::new();
//! let stream_class = trace_class.add_stream_class(stream_class).unwrap();
//! let trace = Ref::new(Trace::new(Ref::new(trace_class)));
//! let stream = Ref::new(Stream::new(&trace, &stream_class).unwrap());
//!
//! let mut event = Event::new(&sched, &stream).unwrap();
//! event.set_payload_value("pid", 42u64).unwrap();
//! assert_eq!(event.payload_value::<u64>("pid").unwrap(), 42);
//! ```

mod class;
mod clock;
mod event;
mod field;
mod field_class;
mod trace;
mod value;

pub use class::{EventClass, StreamClass, TraceClass};
pub use clock::{ClockClass, ClockSnapshot};
pub use event::Event;
pub use field::{Field, FieldData};
pub use field_class::{EnumerationMapping, FieldClass, FieldClassKind, StructureMember};
pub use trace::{Packet, Stream, Trace};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Ref;

    use proptest::prelude::*;

    prop_compose! {
        fn arb_member_names()(names in prop::collection::btree_set("[a-z][a-z0-9_]{0,12}", 1..16)) -> Vec<String> {
            names.into_iter().collect()
        }
    }

    proptest! {
        #[test]
        fn prop_member_lookup_by_name_matches_index(names in arb_member_names()) {
            let mut class = FieldClass::structure();
            for name in &names {
                class.append_member_of::<u64>(name.clone()).unwrap();
            }

            let mut field = Field::new(Ref::new(class));
            for (index, name) in names.iter().enumerate() {
                field.member_mut(name).unwrap().set(index as u64).unwrap();
            }

            for (index, name) in names.iter().enumerate() {
                let by_name = field.member(name).unwrap().get::<u64>().unwrap();
                let by_index = field.member_by_index(index).unwrap().get::<u64>().unwrap();
                prop_assert_eq!(by_name, index as u64);
                prop_assert_eq!(by_name, by_index);
            }
            prop_assert_eq!(field.member_count(), names.len());
        }

        #[test]
        fn prop_event_class_ids_unique(count in 1usize..32) {
            let mut stream_class = StreamClass::new();
            let ids: Vec<u64> = (0..count)
                .map(|i| stream_class.add_event_class(EventClass::new(format!("e{}", i))).unwrap().id())
                .collect();

            let mut sorted = ids.clone();
            sorted.dedup();
            prop_assert_eq!(sorted.len(), count);
            for id in ids {
                prop_assert!(stream_class.event_class_by_id(id).is_some());
            }
        }
    }
}
