//! Trace, stream and packet instances

use std::sync::atomic::{AtomicU64, Ordering};

use super::{Field, StreamClass, TraceClass, Value};
use crate::object::Ref;
use crate::{GraphError, Result};

/// A trace: an instance of a [`TraceClass`] with its environment.
#[derive(Debug)]
pub struct Trace {
    class: Ref<TraceClass>,
    name: Option<String>,
    environment: Value,
    next_stream_id: AtomicU64,
}

impl Trace {
    pub fn new(class: Ref<TraceClass>) -> Self {
        Self { class, name: None, environment: Value::map(), next_stream_id: AtomicU64::new(0) }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set an environment entry (hostname, tracer version, ...).
    pub fn set_environment_entry(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.environment.insert_map_entry(name, value)
    }

    pub fn environment_entry(&self, name: &str) -> Option<&Value> {
        self.environment.map_entry(name)
    }

    /// Environment as a map value.
    pub fn environment(&self) -> &Value {
        &self.environment
    }

    pub fn class(&self) -> &Ref<TraceClass> {
        &self.class
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A stream of a trace.
#[derive(Debug)]
pub struct Stream {
    id: u64,
    class: Ref<StreamClass>,
    trace: Ref<Trace>,
    name: Option<String>,
    user_attributes: Value,
}

impl Stream {
    /// Create a stream of `class` in `trace`, numbering it automatically.
    ///
    /// The stream class must belong to the trace's class.
    pub fn new(trace: &Ref<Trace>, class: &Ref<StreamClass>) -> Result<Self> {
        let owned = trace
            .class()
            .stream_class_by_id(class.id())
            .is_some_and(|candidate| Ref::ptr_eq(candidate, class));
        if !owned {
            return Err(GraphError::config(format!(
                "stream class {} does not belong to the trace class",
                class.id()
            )));
        }
        let id = trace.next_stream_id.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            id,
            class: class.acquire(),
            trace: trace.acquire(),
            name: None,
            user_attributes: Value::map(),
        })
    }

    /// Override the automatically assigned id.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_user_attribute(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Result<()> {
        self.user_attributes.insert_map_entry(name, value)
    }

    pub fn user_attributes(&self) -> &Value {
        &self.user_attributes
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn class(&self) -> &Ref<StreamClass> {
        &self.class
    }

    pub fn trace(&self) -> &Ref<Trace> {
        &self.trace
    }
}

/// A packet of a stream whose class supports packets.
#[derive(Debug)]
pub struct Packet {
    stream: Ref<Stream>,
    context: Option<Field>,
}

impl Packet {
    pub fn new(stream: &Ref<Stream>) -> Result<Self> {
        let class = stream.class();
        if !class.supports_packets() {
            return Err(GraphError::config(format!("stream class {} does not support packets", class.id())));
        }
        let context = class.packet_context_class().map(|context| Field::new(context.acquire()));
        Ok(Self { stream: stream.acquire(), context })
    }

    pub fn stream(&self) -> &Ref<Stream> {
        &self.stream
    }

    pub fn context(&self) -> Option<&Field> {
        self.context.as_ref()
    }

    pub fn context_mut(&mut self) -> Option<&mut Field> {
        self.context.as_mut()
    }
}
