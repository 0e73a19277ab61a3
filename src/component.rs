//! Component traits and the lifecycle contexts handed to them.
//!
//! A graph hosts three component roles:
//! - [`Source`]: output ports only; creates a [`Producer`] per connected output
//! - [`Filter`]: input and output ports; its producers pull from upstream iterators
//! - [`Sink`]: input ports only; driven by the graph through [`Sink::consume`]
//!
//! Lifecycle: `initialize` (add ports) → connections → `graph_is_configured`
//! (sinks create their upstream iterators) → repeated `consume` → `finalize`.
//! `finalize` runs exactly once, also after failures.

use std::fmt;

use crate::graph::GraphCore;
use crate::iterator::{MessageIterator, Next, Producer};
use crate::message::Message;
use crate::port::{Port, PortDirection, UserData};
use crate::status::ConsumeStatus;
use crate::{GraphError, Result};

/// Identifier of a component inside one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(usize);

impl ComponentId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Role of a component in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentRole {
    Source,
    Filter,
    Sink,
}

impl ComponentRole {
    /// Whether components of this role may own ports of `direction`.
    pub fn allows(self, direction: PortDirection) -> bool {
        !matches!(
            (self, direction),
            (ComponentRole::Source, PortDirection::Input) | (ComponentRole::Sink, PortDirection::Output)
        )
    }
}

impl fmt::Display for ComponentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentRole::Source => "source",
            ComponentRole::Filter => "filter",
            ComponentRole::Sink => "sink",
        })
    }
}

/// A component that produces messages from nothing upstream.
pub trait Source: Send {
    /// Add output ports.
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()>;

    /// Create the producer backing an iterator on `port`.
    fn create_producer(&mut self, port: &Port) -> Result<Box<dyn Producer>>;

    fn finalize(&mut self) {}
}

/// A component that transforms the messages of its inputs.
pub trait Filter: Send {
    /// Add input and output ports.
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()>;

    /// Create the producer backing an iterator on `port`.
    ///
    /// The producer creates its upstream iterators in [`Producer::initialize`].
    fn create_producer(&mut self, port: &Port) -> Result<Box<dyn Producer>>;

    fn finalize(&mut self) {}
}

/// A component that consumes messages.
pub trait Sink: Send {
    /// Add input ports.
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()>;

    /// All connections are made; create upstream iterators.
    fn graph_is_configured(&mut self, context: &mut ComponentContext<'_>) -> Result<()>;

    /// Make one unit of progress.
    ///
    /// Return `End` once the sink released its iterators. Errors abort the run and
    /// their causes reach the user.
    fn consume(&mut self) -> Result<ConsumeStatus>;

    /// Release iterators and owned data.
    fn finalize(&mut self) {}
}

/// Component behavior stored in the graph.
pub(crate) enum ComponentKind {
    Source(Box<dyn Source>),
    Filter(Box<dyn Filter>),
    Sink(Box<dyn Sink>),
}

impl ComponentKind {
    pub(crate) fn role(&self) -> ComponentRole {
        match self {
            ComponentKind::Source(_) => ComponentRole::Source,
            ComponentKind::Filter(_) => ComponentRole::Filter,
            ComponentKind::Sink(_) => ComponentRole::Sink,
        }
    }

    pub(crate) fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        match self {
            ComponentKind::Source(source) => source.initialize(context),
            ComponentKind::Filter(filter) => filter.initialize(context),
            ComponentKind::Sink(sink) => sink.initialize(context),
        }
    }

    pub(crate) fn create_producer(&mut self, port: &Port) -> Result<Box<dyn Producer>> {
        match self {
            ComponentKind::Source(source) => source.create_producer(port),
            ComponentKind::Filter(filter) => filter.create_producer(port),
            ComponentKind::Sink(_) => {
                Err(GraphError::PortDirection { role: ComponentRole::Sink, direction: PortDirection::Output })
            }
        }
    }

    pub(crate) fn finalize(&mut self) {
        match self {
            ComponentKind::Source(source) => source.finalize(),
            ComponentKind::Filter(filter) => filter.finalize(),
            ComponentKind::Sink(sink) => sink.finalize(),
        }
    }
}

/// Lifecycle phase a [`ComponentContext`] was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Initializing,
    Configuring,
}

/// Access to the graph during a component lifecycle call.
pub struct ComponentContext<'g> {
    pub(crate) core: &'g mut GraphCore,
    pub(crate) component: ComponentId,
    pub(crate) role: ComponentRole,
    pub(crate) phase: Phase,
}

impl ComponentContext<'_> {
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn component_name(&self) -> &str {
        &self.core.slot(self.component).name
    }

    pub fn role(&self) -> ComponentRole {
        self.role
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn add_port(&mut self, direction: PortDirection, name: &str, user_data: Option<UserData>) -> Result<usize> {
        if self.phase != Phase::Initializing {
            return Err(GraphError::invalid_state("add port", self.phase));
        }
        if !self.role.allows(direction) {
            return Err(GraphError::PortDirection { role: self.role, direction });
        }
        self.core.slot_mut(self.component).ports.add(direction, name, user_data)
    }

    /// Add an input port; returns its index.
    pub fn add_input_port(&mut self, name: &str, user_data: Option<UserData>) -> Result<usize> {
        self.add_port(PortDirection::Input, name, user_data)
    }

    /// Add an output port; returns its index.
    pub fn add_output_port(&mut self, name: &str, user_data: Option<UserData>) -> Result<usize> {
        self.add_port(PortDirection::Output, name, user_data)
    }

    pub fn input_port_count(&self) -> usize {
        self.core.slot(self.component).ports.count(PortDirection::Input)
    }

    pub fn output_port_count(&self) -> usize {
        self.core.slot(self.component).ports.count(PortDirection::Output)
    }

    /// Input port by index; an out-of-range index is an error.
    pub fn input_port(&self, index: usize) -> Result<&Port> {
        self.core.slot(self.component).ports.by_index(PortDirection::Input, index)
    }

    pub fn output_port(&self, index: usize) -> Result<&Port> {
        self.core.slot(self.component).ports.by_index(PortDirection::Output, index)
    }

    pub fn input_port_by_name(&self, name: &str) -> Result<&Port> {
        self.core.slot(self.component).ports.by_name(PortDirection::Input, name)
    }

    pub fn output_port_by_name(&self, name: &str) -> Result<&Port> {
        self.core.slot(self.component).ports.by_name(PortDirection::Output, name)
    }

    /// Create the message iterator of an input port.
    ///
    /// Only sinks may call this, once per port, from `graph_is_configured`.
    pub fn create_iterator(&mut self, input: usize) -> Result<MessageIterator> {
        if self.role != ComponentRole::Sink || self.phase != Phase::Configuring {
            return Err(GraphError::invalid_state(
                "create iterator",
                format!("{} component while {:?}", self.role, self.phase),
            ));
        }
        self.core.create_iterator(self.component, input)
    }
}

/// Single upstream iterator owned by a sink.
///
/// Holds the iterator between `graph_is_configured` and `finalize` and releases it
/// exactly once: on `END`, or on [`UpstreamIterator::release`], whichever comes first.
#[derive(Debug, Default)]
pub struct UpstreamIterator {
    iterator: Option<MessageIterator>,
}

impl UpstreamIterator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the iterator of input port `input`.
    pub fn create(&mut self, context: &mut ComponentContext<'_>, input: usize) -> Result<()> {
        if self.iterator.is_some() {
            let port = context.input_port(input)?.name().to_string();
            return Err(GraphError::IteratorExists { port });
        }
        self.iterator = Some(context.create_iterator(input)?);
        Ok(())
    }

    /// Pull one batch and hand each message to `handle`.
    ///
    /// Maps the pull outcome to a consume status; releases the iterator on `END`.
    /// Upstream failures come back as [`GraphError::Failed`] with the cause chain.
    pub fn consume_with<F>(&mut self, mut handle: F) -> Result<ConsumeStatus>
    where
        F: FnMut(Message) -> Result<()>,
    {
        let Some(iterator) = self.iterator.as_mut() else {
            return Err(GraphError::invalid_state("consume", "upstream iterator already released"));
        };
        let status = match iterator.next() {
            Next::Ok(batch) => {
                for message in batch {
                    handle(message)?;
                }
                ConsumeStatus::Ok
            }
            Next::Again => ConsumeStatus::Again,
            Next::End => ConsumeStatus::End,
            failure => {
                return Err(failure
                    .into_error()
                    .unwrap_or_else(|| GraphError::component("upstream iterator failed")));
            }
        };
        if status == ConsumeStatus::End {
            self.release();
        }
        Ok(status)
    }

    /// Release the iterator; returns whether one was held.
    pub fn release(&mut self) -> bool {
        match self.iterator.take() {
            Some(iterator) => {
                iterator.release();
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.iterator.is_some()
    }

    pub fn get(&self) -> Option<&MessageIterator> {
        self.iterator.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut MessageIterator> {
        self.iterator.as_mut()
    }
}
