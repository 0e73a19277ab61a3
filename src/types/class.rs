//! Trace, stream and event classes
//!
//! Classes are assembled bottom-up while they are still owned: event classes are
//! added to a stream class, then the stream class is added to the trace class.
//! Adding a class shares it behind a [`Ref`] and freezes it.

use super::{ClockClass, FieldClass, FieldClassKind};
use crate::object::Ref;
use crate::{GraphError, Result};

fn require_structure(what: &str, class: &FieldClass) -> Result<()> {
    if class.kind() == FieldClassKind::Structure {
        Ok(())
    } else {
        Err(GraphError::config(format!("{} field class must be a structure, got {}", what, class.kind())))
    }
}

/// Root class shared by every stream of a trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceClass {
    stream_classes: Vec<Ref<StreamClass>>,
    assigns_automatic_stream_class_id: bool,
}

impl Default for TraceClass {
    fn default() -> Self {
        Self::new()
    }
}

impl TraceClass {
    pub fn new() -> Self {
        Self { stream_classes: Vec::new(), assigns_automatic_stream_class_id: true }
    }

    /// Require explicit stream class ids instead of assigning them.
    pub fn with_explicit_stream_class_ids(mut self) -> Self {
        self.assigns_automatic_stream_class_id = false;
        self
    }

    pub fn assigns_automatic_stream_class_id(&self) -> bool {
        self.assigns_automatic_stream_class_id
    }

    /// Add a stream class, assigning its id if needed.
    pub fn add_stream_class(&mut self, mut class: StreamClass) -> Result<Ref<StreamClass>> {
        match (class.automatic_id, self.assigns_automatic_stream_class_id) {
            (true, true) => class.id = self.stream_classes.len() as u64,
            (false, false) => {}
            (true, false) => {
                return Err(GraphError::config("trace class requires explicit stream class ids"));
            }
            (false, true) => {
                return Err(GraphError::config(
                    "trace class assigns stream class ids automatically",
                ));
            }
        }
        if self.stream_class_by_id(class.id).is_some() {
            return Err(GraphError::config(format!("stream class id {} already exists", class.id)));
        }
        self.stream_classes.try_reserve(1)?;
        let class = Ref::new(class);
        self.stream_classes.push(class.acquire());
        Ok(class)
    }

    pub fn stream_class_count(&self) -> usize {
        self.stream_classes.len()
    }

    pub fn stream_class_by_index(&self, index: usize) -> Option<&Ref<StreamClass>> {
        self.stream_classes.get(index)
    }

    pub fn stream_class_by_id(&self, id: u64) -> Option<&Ref<StreamClass>> {
        self.stream_classes.iter().find(|class| class.id == id)
    }
}

/// Class of a stream: its clock, packet support and event classes.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamClass {
    id: u64,
    automatic_id: bool,
    name: Option<String>,
    default_clock_class: Option<Ref<ClockClass>>,
    supports_packets: bool,
    packet_context_class: Option<Ref<FieldClass>>,
    event_common_context_class: Option<Ref<FieldClass>>,
    assigns_automatic_event_class_id: bool,
    event_classes: Vec<Ref<EventClass>>,
}

impl Default for StreamClass {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamClass {
    /// Stream class whose id is assigned when added to a trace class.
    pub fn new() -> Self {
        Self {
            id: 0,
            automatic_id: true,
            name: None,
            default_clock_class: None,
            supports_packets: false,
            packet_context_class: None,
            event_common_context_class: None,
            assigns_automatic_event_class_id: true,
            event_classes: Vec::new(),
        }
    }

    /// Stream class with an explicit id.
    pub fn with_id(id: u64) -> Self {
        Self { id, automatic_id: false, ..Self::new() }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Clock used by default clock snapshots of this class's messages.
    pub fn with_default_clock_class(mut self, clock: Ref<ClockClass>) -> Self {
        self.default_clock_class = Some(clock);
        self
    }

    /// Enable packets, optionally with a packet context structure.
    pub fn with_packets(mut self, context: Option<FieldClass>) -> Result<Self> {
        if let Some(context) = &context {
            require_structure("packet context", context)?;
        }
        self.supports_packets = true;
        self.packet_context_class = context.map(Ref::new);
        Ok(self)
    }

    pub fn with_event_common_context(mut self, context: FieldClass) -> Result<Self> {
        require_structure("event common context", &context)?;
        self.event_common_context_class = Some(Ref::new(context));
        Ok(self)
    }

    /// Require explicit event class ids instead of assigning them.
    pub fn with_explicit_event_class_ids(mut self) -> Self {
        self.assigns_automatic_event_class_id = false;
        self
    }

    /// Add an event class, assigning its id if needed.
    pub fn add_event_class(&mut self, mut class: EventClass) -> Result<Ref<EventClass>> {
        match (class.automatic_id, self.assigns_automatic_event_class_id) {
            (true, true) => class.id = self.event_classes.len() as u64,
            (false, false) => {}
            (true, false) => {
                return Err(GraphError::config("stream class requires explicit event class ids"));
            }
            (false, true) => {
                return Err(GraphError::config("stream class assigns event class ids automatically"));
            }
        }
        if self.event_class_by_id(class.id).is_some() {
            return Err(GraphError::config(format!("event class id {} already exists", class.id)));
        }
        self.event_classes.try_reserve(1)?;
        let class = Ref::new(class);
        self.event_classes.push(class.acquire());
        Ok(class)
    }

    /// Assigned id; zero until an automatically numbered class is added.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn default_clock_class(&self) -> Option<&Ref<ClockClass>> {
        self.default_clock_class.as_ref()
    }

    pub fn supports_packets(&self) -> bool {
        self.supports_packets
    }

    pub fn packet_context_class(&self) -> Option<&Ref<FieldClass>> {
        self.packet_context_class.as_ref()
    }

    pub fn event_common_context_class(&self) -> Option<&Ref<FieldClass>> {
        self.event_common_context_class.as_ref()
    }

    pub fn assigns_automatic_event_class_id(&self) -> bool {
        self.assigns_automatic_event_class_id
    }

    pub fn event_class_count(&self) -> usize {
        self.event_classes.len()
    }

    pub fn event_class_by_index(&self, index: usize) -> Option<&Ref<EventClass>> {
        self.event_classes.get(index)
    }

    pub fn event_class_by_id(&self, id: u64) -> Option<&Ref<EventClass>> {
        self.event_classes.iter().find(|class| class.id == id)
    }
}

/// Class of an event: its name and payload layout.
#[derive(Debug, Clone, PartialEq)]
pub struct EventClass {
    id: u64,
    automatic_id: bool,
    name: String,
    payload_class: Option<Ref<FieldClass>>,
    specific_context_class: Option<Ref<FieldClass>>,
}

impl EventClass {
    /// Event class whose id is assigned when added to a stream class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            automatic_id: true,
            name: name.into(),
            payload_class: None,
            specific_context_class: None,
        }
    }

    /// Event class with an explicit id.
    pub fn with_id(id: u64, name: impl Into<String>) -> Self {
        Self { id, automatic_id: false, ..Self::new(name) }
    }

    /// Set the payload layout; must be a structure.
    pub fn with_payload(mut self, payload: FieldClass) -> Result<Self> {
        require_structure("payload", &payload)?;
        self.payload_class = Some(Ref::new(payload));
        Ok(self)
    }

    pub fn with_specific_context(mut self, context: FieldClass) -> Result<Self> {
        require_structure("specific context", &context)?;
        self.specific_context_class = Some(Ref::new(context));
        Ok(self)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload_class(&self) -> Option<&Ref<FieldClass>> {
        self.payload_class.as_ref()
    }

    pub fn specific_context_class(&self) -> Option<&Ref<FieldClass>> {
        self.specific_context_class.as_ref()
    }

    /// Number of payload members; zero without a payload.
    pub fn payload_member_count(&self) -> usize {
        self.payload_class.as_ref().map_or(0, |payload| payload.member_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> FieldClass {
        let mut payload = FieldClass::structure();
        payload.append_member_of::<u64>("index").unwrap();
        payload
    }

    #[test]
    fn automatic_ids_follow_insertion_order() {
        let mut stream_class = StreamClass::new();
        let open = stream_class.add_event_class(EventClass::new("open")).unwrap();
        let close = stream_class.add_event_class(EventClass::new("close")).unwrap();
        assert_eq!((open.id(), close.id()), (0, 1));

        let mut trace_class = TraceClass::new();
        let first = trace_class.add_stream_class(stream_class).unwrap();
        let second = trace_class.add_stream_class(StreamClass::new()).unwrap();
        assert_eq!((first.id(), second.id()), (0, 1));

        let found = trace_class.stream_class_by_id(0).unwrap();
        assert!(Ref::ptr_eq(found, &first));
        assert_eq!(found.event_class_by_id(1).unwrap().name(), "close");
    }

    #[test]
    fn explicit_ids_require_matching_mode() {
        let mut automatic = StreamClass::new();
        assert!(automatic.add_event_class(EventClass::with_id(7, "x")).is_err());

        let mut explicit = StreamClass::new().with_explicit_event_class_ids();
        assert!(explicit.add_event_class(EventClass::new("x")).is_err());
        assert_eq!(explicit.add_event_class(EventClass::with_id(7, "x")).unwrap().id(), 7);
        assert!(explicit.add_event_class(EventClass::with_id(7, "y")).is_err());

        let mut trace_class = TraceClass::new().with_explicit_stream_class_ids();
        assert_eq!(trace_class.add_stream_class(StreamClass::with_id(3)).unwrap().id(), 3);
        assert!(trace_class.add_stream_class(StreamClass::new()).is_err());
    }

    #[test]
    fn payload_must_be_a_structure() {
        assert!(EventClass::new("bad").with_payload(FieldClass::String).is_err());

        let class = EventClass::new("sched_switch").with_payload(payload()).unwrap();
        assert_eq!(class.payload_member_count(), 1);
        assert_eq!(EventClass::new("empty").payload_member_count(), 0);
    }

    #[test]
    fn packets_and_clock() {
        let clock = Ref::new(ClockClass::default());
        let class = StreamClass::new()
            .with_default_clock_class(clock.acquire())
            .with_packets(Some(payload()))
            .unwrap();

        assert!(class.supports_packets());
        assert!(class.packet_context_class().is_some());
        assert!(Ref::ptr_eq(class.default_clock_class().unwrap(), &clock));
        assert!(StreamClass::new().with_packets(Some(FieldClass::String)).is_err());
    }
}
