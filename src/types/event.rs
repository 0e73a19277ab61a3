//! Event instances

use super::{EventClass, Field, FieldClass, FieldData, Packet, Stream};
use crate::object::Ref;
use crate::{GraphError, Result};

/// One event: an instance of an [`EventClass`] in a stream.
///
/// Payload and context fields are created zeroed from their classes and filled by
/// the producer before the event is wrapped into a message.
#[derive(Debug, Clone)]
pub struct Event {
    class: Ref<EventClass>,
    stream: Ref<Stream>,
    packet: Option<Ref<Packet>>,
    common_context: Option<Field>,
    specific_context: Option<Field>,
    payload: Option<Field>,
}

fn instantiate(class: Option<&Ref<FieldClass>>) -> Option<Field> {
    class.map(|class| Field::new(class.acquire()))
}

impl Event {
    /// Event of a stream whose class does not support packets.
    pub fn new(class: &Ref<EventClass>, stream: &Ref<Stream>) -> Result<Self> {
        if stream.class().supports_packets() {
            return Err(GraphError::config(format!(
                "stream class {} requires events to belong to a packet",
                stream.class().id()
            )));
        }
        Self::build(class, stream, None)
    }

    /// Event inside a packet.
    pub fn in_packet(class: &Ref<EventClass>, packet: &Ref<Packet>) -> Result<Self> {
        Self::build(class, packet.stream(), Some(packet.acquire()))
    }

    fn build(class: &Ref<EventClass>, stream: &Ref<Stream>, packet: Option<Ref<Packet>>) -> Result<Self> {
        let owned = stream
            .class()
            .event_class_by_id(class.id())
            .is_some_and(|candidate| Ref::ptr_eq(candidate, class));
        if !owned {
            return Err(GraphError::config(format!(
                "event class '{}' does not belong to stream class {}",
                class.name(),
                stream.class().id()
            )));
        }
        Ok(Self {
            common_context: instantiate(stream.class().event_common_context_class()),
            specific_context: instantiate(class.specific_context_class()),
            payload: instantiate(class.payload_class()),
            class: class.acquire(),
            stream: stream.acquire(),
            packet,
        })
    }

    pub fn class(&self) -> &Ref<EventClass> {
        &self.class
    }

    /// Name of the event's class.
    pub fn name(&self) -> &str {
        self.class.name()
    }

    pub fn stream(&self) -> &Ref<Stream> {
        &self.stream
    }

    pub fn packet(&self) -> Option<&Ref<Packet>> {
        self.packet.as_ref()
    }

    pub fn payload(&self) -> Option<&Field> {
        self.payload.as_ref()
    }

    pub fn payload_mut(&mut self) -> Option<&mut Field> {
        self.payload.as_mut()
    }

    pub fn common_context(&self) -> Option<&Field> {
        self.common_context.as_ref()
    }

    pub fn common_context_mut(&mut self) -> Option<&mut Field> {
        self.common_context.as_mut()
    }

    pub fn specific_context(&self) -> Option<&Field> {
        self.specific_context.as_ref()
    }

    pub fn specific_context_mut(&mut self) -> Option<&mut Field> {
        self.specific_context.as_mut()
    }

    /// Number of payload members; zero without a payload.
    pub fn payload_member_count(&self) -> usize {
        self.payload.as_ref().map_or(0, Field::member_count)
    }

    /// Payload member by name.
    pub fn payload_field(&self, name: &str) -> Result<&Field> {
        self.payload
            .as_ref()
            .ok_or_else(|| GraphError::FieldNotFound { field: name.to_string() })?
            .member(name)
    }

    /// Convert a payload member to a native type.
    pub fn payload_value<T: FieldData>(&self, name: &str) -> Result<T> {
        self.payload_field(name)?.get()
    }

    /// Store a native value into a payload member.
    pub fn set_payload_value<T: FieldData>(&mut self, name: &str, value: T) -> Result<()> {
        self.payload
            .as_mut()
            .ok_or_else(|| GraphError::FieldNotFound { field: name.to_string() })?
            .member_mut(name)?
            .set(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestTrace;
    use crate::types::{StreamClass, Trace, TraceClass};

    #[test]
    fn payload_is_created_from_class() {
        let fixture = TestTrace::new();
        let mut event = Event::new(&fixture.event_class, &fixture.stream).unwrap();

        assert_eq!(event.name(), "test_event");
        assert_eq!(event.payload_member_count(), 1);
        assert_eq!(event.payload_value::<u64>("index").unwrap(), 0);

        event.set_payload_value("index", 9u64).unwrap();
        assert_eq!(event.payload_value::<u64>("index").unwrap(), 9);
        assert!(matches!(event.payload_value::<u64>("missing"), Err(GraphError::FieldNotFound { .. })));
        assert!(matches!(event.payload_value::<String>("index"), Err(GraphError::TypeConversion { .. })));
    }

    #[test]
    fn event_class_must_belong_to_stream_class() {
        let fixture = TestTrace::new();
        let other = TestTrace::new();
        assert!(Event::new(&other.event_class, &fixture.stream).is_err());
    }

    #[test]
    fn packet_streams_require_packets() {
        let mut stream_class = StreamClass::new().with_packets(None).unwrap();
        let class = stream_class
            .add_event_class(EventClass::new("tick").with_payload(FieldClass::structure()).unwrap())
            .unwrap();
        let mut trace_class = TraceClass::new();
        let stream_class = trace_class.add_stream_class(stream_class).unwrap();
        let trace = Ref::new(Trace::new(Ref::new(trace_class)));
        let stream = Ref::new(Stream::new(&trace, &stream_class).unwrap());

        assert!(Event::new(&class, &stream).is_err());

        let packet = Ref::new(Packet::new(&stream).unwrap());
        let event = Event::in_packet(&class, &packet).unwrap();
        assert!(Ref::ptr_eq(event.packet().unwrap(), &packet));
        assert!(Ref::ptr_eq(event.stream(), &stream));
        assert_eq!(event.payload_member_count(), 0);
    }
}
