//! Messages flowing through the graph and their typed views.
//!
//! A [`Message`] is move-only: whoever holds it owns exactly one reference and
//! hands it on (pushing it downstream) or releases it. The concrete kind is read
//! through a typed view obtained from the message itself:
//!
//! ```rust
//! use tracegraph::message::{EventMessage, Message, MessageType};
//! use tracegraph::object::Ref;
//! use tracegraph::types::{Event, EventClass, FieldClass, Stream, StreamClass, Trace, TraceClass};
//!
//! let mut stream_class = StreamClass::new();
//! let tick = stream_class
//!     .add_event_class(EventClass::new("tick").with_payload(FieldClass::structure()).unwrap())
//!     .unwrap();
//! let mut trace_class = TraceClass::new();
//! let stream_class = trace_class.add_stream_class(stream_class).unwrap();
//! let trace = Ref::new(Trace::new(Ref::new(trace_class)));
//! let stream = Ref::new(Stream::new(&trace, &stream_class).unwrap());
//!
//! let message = Message::event(Event::new(&tick, &stream).unwrap());
//! assert_eq!(message.message_type(), MessageType::Event);
//! let view: &EventMessage = message.as_event().unwrap();
//! assert_eq!(view.event().name(), "tick");
//! assert!(message.as_stream_beginning().is_none());
//! ```
//!
//! Views cannot be constructed directly, so every view is backed by a message of
//! the matching kind.

use std::fmt;

use crate::object::Ref;
use crate::types::{ClockSnapshot, Event, Packet, Stream, StreamClass};
use crate::{GraphError, Result};

/// Kind of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    StreamBeginning,
    StreamEnd,
    PacketBeginning,
    PacketEnd,
    Event,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageType::StreamBeginning => "stream-beginning",
            MessageType::StreamEnd => "stream-end",
            MessageType::PacketBeginning => "packet-beginning",
            MessageType::PacketEnd => "packet-end",
            MessageType::Event => "event",
        })
    }
}

fn snapshot_for(class: &StreamClass, value: u64) -> Result<ClockSnapshot> {
    let clock = class
        .default_clock_class()
        .ok_or(GraphError::ClockClassMissing { stream_class: class.id() })?;
    Ok(ClockSnapshot::new(clock.acquire(), value))
}

/// Marks the start of a stream.
#[derive(Debug)]
pub struct StreamBeginningMessage {
    stream: Ref<Stream>,
    clock: Option<ClockSnapshot>,
}

impl StreamBeginningMessage {
    pub fn stream(&self) -> &Ref<Stream> {
        &self.stream
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        self.clock.as_ref()
    }

    /// Timestamp the message with the stream class's default clock.
    pub fn set_default_clock_snapshot(&mut self, value: u64) -> Result<()> {
        self.clock = Some(snapshot_for(self.stream.class(), value)?);
        Ok(())
    }
}

/// Marks the end of a stream.
#[derive(Debug)]
pub struct StreamEndMessage {
    stream: Ref<Stream>,
    clock: Option<ClockSnapshot>,
}

impl StreamEndMessage {
    pub fn stream(&self) -> &Ref<Stream> {
        &self.stream
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        self.clock.as_ref()
    }

    pub fn set_default_clock_snapshot(&mut self, value: u64) -> Result<()> {
        self.clock = Some(snapshot_for(self.stream.class(), value)?);
        Ok(())
    }
}

/// Marks the start of a packet.
#[derive(Debug)]
pub struct PacketBeginningMessage {
    packet: Ref<Packet>,
    clock: Option<ClockSnapshot>,
}

impl PacketBeginningMessage {
    pub fn packet(&self) -> &Ref<Packet> {
        &self.packet
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        self.clock.as_ref()
    }
}

/// Marks the end of a packet.
#[derive(Debug)]
pub struct PacketEndMessage {
    packet: Ref<Packet>,
    clock: Option<ClockSnapshot>,
}

impl PacketEndMessage {
    pub fn packet(&self) -> &Ref<Packet> {
        &self.packet
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        self.clock.as_ref()
    }
}

/// Carries one event.
#[derive(Debug)]
pub struct EventMessage {
    event: Event,
    clock: Option<ClockSnapshot>,
}

impl EventMessage {
    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn event_mut(&mut self) -> &mut Event {
        &mut self.event
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        self.clock.as_ref()
    }

    /// Take the event out of the message.
    pub fn into_event(self) -> Event {
        self.event
    }
}

#[derive(Debug)]
enum Body {
    StreamBeginning(StreamBeginningMessage),
    StreamEnd(StreamEndMessage),
    PacketBeginning(PacketBeginningMessage),
    PacketEnd(PacketEndMessage),
    Event(EventMessage),
}

mod sealed {
    pub trait Sealed {}
}

/// A typed view of one message kind.
pub trait MessageView: sealed::Sealed + Sized {
    const TYPE: MessageType;

    fn view(message: &Message) -> Option<&Self>;
    fn view_mut(message: &mut Message) -> Option<&mut Self>;
    fn into_view(message: Message) -> std::result::Result<Self, Message>;
}

macro_rules! message_view {
    ($view:ident, $variant:ident) => {
        impl sealed::Sealed for $view {}

        impl MessageView for $view {
            const TYPE: MessageType = MessageType::$variant;

            fn view(message: &Message) -> Option<&Self> {
                match &message.body {
                    Body::$variant(view) => Some(view),
                    _ => None,
                }
            }

            fn view_mut(message: &mut Message) -> Option<&mut Self> {
                match &mut message.body {
                    Body::$variant(view) => Some(view),
                    _ => None,
                }
            }

            fn into_view(message: Message) -> std::result::Result<Self, Message> {
                match message.body {
                    Body::$variant(view) => Ok(view),
                    body => Err(Message { body }),
                }
            }
        }
    };
}

message_view!(StreamBeginningMessage, StreamBeginning);
message_view!(StreamEndMessage, StreamEnd);
message_view!(PacketBeginningMessage, PacketBeginning);
message_view!(PacketEndMessage, PacketEnd);
message_view!(EventMessage, Event);

/// A message exchanged between components.
#[derive(Debug)]
pub struct Message {
    body: Body,
}

impl Message {
    pub fn stream_beginning(stream: &Ref<Stream>) -> Self {
        Self { body: Body::StreamBeginning(StreamBeginningMessage { stream: stream.acquire(), clock: None }) }
    }

    /// Stream beginning with a default clock snapshot.
    pub fn stream_beginning_at(stream: &Ref<Stream>, clock_value: u64) -> Result<Self> {
        let clock = Some(snapshot_for(stream.class(), clock_value)?);
        Ok(Self { body: Body::StreamBeginning(StreamBeginningMessage { stream: stream.acquire(), clock }) })
    }

    pub fn stream_end(stream: &Ref<Stream>) -> Self {
        Self { body: Body::StreamEnd(StreamEndMessage { stream: stream.acquire(), clock: None }) }
    }

    pub fn stream_end_at(stream: &Ref<Stream>, clock_value: u64) -> Result<Self> {
        let clock = Some(snapshot_for(stream.class(), clock_value)?);
        Ok(Self { body: Body::StreamEnd(StreamEndMessage { stream: stream.acquire(), clock }) })
    }

    pub fn packet_beginning(packet: &Ref<Packet>) -> Self {
        Self { body: Body::PacketBeginning(PacketBeginningMessage { packet: packet.acquire(), clock: None }) }
    }

    pub fn packet_beginning_at(packet: &Ref<Packet>, clock_value: u64) -> Result<Self> {
        let clock = Some(snapshot_for(packet.stream().class(), clock_value)?);
        Ok(Self { body: Body::PacketBeginning(PacketBeginningMessage { packet: packet.acquire(), clock }) })
    }

    pub fn packet_end(packet: &Ref<Packet>) -> Self {
        Self { body: Body::PacketEnd(PacketEndMessage { packet: packet.acquire(), clock: None }) }
    }

    pub fn packet_end_at(packet: &Ref<Packet>, clock_value: u64) -> Result<Self> {
        let clock = Some(snapshot_for(packet.stream().class(), clock_value)?);
        Ok(Self { body: Body::PacketEnd(PacketEndMessage { packet: packet.acquire(), clock }) })
    }

    pub fn event(event: Event) -> Self {
        Self { body: Body::Event(EventMessage { event, clock: None }) }
    }

    /// Event message with a default clock snapshot.
    ///
    /// Fails with [`GraphError::ClockClassMissing`] when the event's stream class
    /// has no default clock class.
    pub fn event_at(event: Event, clock_value: u64) -> Result<Self> {
        let clock = Some(snapshot_for(event.stream().class(), clock_value)?);
        Ok(Self { body: Body::Event(EventMessage { event, clock }) })
    }

    pub fn message_type(&self) -> MessageType {
        match &self.body {
            Body::StreamBeginning(_) => MessageType::StreamBeginning,
            Body::StreamEnd(_) => MessageType::StreamEnd,
            Body::PacketBeginning(_) => MessageType::PacketBeginning,
            Body::PacketEnd(_) => MessageType::PacketEnd,
            Body::Event(_) => MessageType::Event,
        }
    }

    /// Borrow the message as view `V`, if it has that kind.
    pub fn view<V: MessageView>(&self) -> Option<&V> {
        V::view(self)
    }

    pub fn view_mut<V: MessageView>(&mut self) -> Option<&mut V> {
        V::view_mut(self)
    }

    /// Convert into view `V`, handing the message back on a kind mismatch.
    pub fn into_view<V: MessageView>(self) -> std::result::Result<V, Message> {
        V::into_view(self)
    }

    pub fn as_event(&self) -> Option<&EventMessage> {
        self.view()
    }

    pub fn as_event_mut(&mut self) -> Option<&mut EventMessage> {
        self.view_mut()
    }

    pub fn as_stream_beginning(&self) -> Option<&StreamBeginningMessage> {
        self.view()
    }

    pub fn as_stream_end(&self) -> Option<&StreamEndMessage> {
        self.view()
    }

    pub fn as_packet_beginning(&self) -> Option<&PacketBeginningMessage> {
        self.view()
    }

    pub fn as_packet_end(&self) -> Option<&PacketEndMessage> {
        self.view()
    }

    /// Take the event out of an event message.
    pub fn into_event(self) -> std::result::Result<Event, Message> {
        self.into_view::<EventMessage>().map(EventMessage::into_event)
    }

    /// Stream this message belongs to.
    pub fn stream(&self) -> &Ref<Stream> {
        match &self.body {
            Body::StreamBeginning(view) => view.stream(),
            Body::StreamEnd(view) => view.stream(),
            Body::PacketBeginning(view) => view.packet().stream(),
            Body::PacketEnd(view) => view.packet().stream(),
            Body::Event(view) => view.event().stream(),
        }
    }

    pub fn default_clock_snapshot(&self) -> Option<&ClockSnapshot> {
        match &self.body {
            Body::StreamBeginning(view) => view.default_clock_snapshot(),
            Body::StreamEnd(view) => view.default_clock_snapshot(),
            Body::PacketBeginning(view) => view.default_clock_snapshot(),
            Body::PacketEnd(view) => view.default_clock_snapshot(),
            Body::Event(view) => view.default_clock_snapshot(),
        }
    }

    /// Give the message back; the shared objects it refers to lose one reference.
    pub fn release(self) {
        drop(self);
    }
}
