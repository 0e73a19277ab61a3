//! Test utilities shared by unit tests and benchmarks.
//!
//! [`TestTrace`] builds a complete trace IR (clock, classes, trace, stream) so a
//! test can create events and messages in one line.

#![cfg(any(test, feature = "benchmark"))]

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::Result;
use crate::message::Message;
use crate::object::Ref;
use crate::types::{ClockClass, Event, EventClass, FieldClass, Stream, StreamClass, Trace, TraceClass};

/// A trace with one stream and one event class.
///
/// The default clock runs at 1 GHz, so clock values equal nanoseconds from origin.
/// Only `stream` holds a reference to the stream; tests rely on that when they
/// count references.
pub struct TestTrace {
    pub clock_class: Ref<ClockClass>,
    pub stream_class: Ref<StreamClass>,
    pub event_class: Ref<EventClass>,
    pub trace: Ref<Trace>,
    pub stream: Ref<Stream>,
}

impl TestTrace {
    /// Event class `test_event` with payload `{ index: u64 }`.
    pub fn new() -> Self {
        let mut payload = FieldClass::structure();
        payload.append_member_of::<u64>("index").expect("index member");
        Self::with_payload("test_event", payload)
    }

    /// Event class `name` with a custom payload structure.
    pub fn with_payload(name: &str, payload: FieldClass) -> Self {
        let clock_class = Ref::new(ClockClass::default().with_name("monotonic"));
        let mut stream_class = StreamClass::new().with_name("test_stream").with_default_clock_class(clock_class.acquire());
        let event_class = stream_class
            .add_event_class(EventClass::new(name).with_payload(payload).expect("structure payload"))
            .expect("event class");

        let mut trace_class = TraceClass::new();
        let stream_class = trace_class.add_stream_class(stream_class).expect("stream class");
        let trace = Ref::new(Trace::new(Ref::new(trace_class)).with_name("test_trace"));
        let stream = Ref::new(Stream::new(&trace, &stream_class).expect("stream"));

        Self { clock_class, stream_class, event_class, trace, stream }
    }

    /// Event whose `index` member (when present) is set to `index`.
    pub fn event(&self, index: u64) -> Event {
        let mut event = Event::new(&self.event_class, &self.stream).expect("event");
        if self.event_class.payload_class().is_some_and(|payload| payload.member_index("index").is_some()) {
            event.set_payload_value("index", index).expect("index value");
        }
        event
    }

    pub fn event_message(&self, index: u64) -> Message {
        Message::event(self.event(index))
    }

    /// Event message with a default clock snapshot of `clock_value` cycles.
    pub fn event_message_at(&self, index: u64, clock_value: u64) -> Result<Message> {
        Message::event_at(self.event(index), clock_value)
    }
}

impl Default for TestTrace {
    fn default() -> Self {
        Self::new()
    }
}

/// Cloneable in-memory writer for inspecting sink output.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded.
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|bytes| bytes.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.0.lock().map_err(|_| io::Error::other("buffer lock poisoned"))?;
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
