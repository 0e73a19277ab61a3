//! The processing graph: component ownership, connections and the run loop.
//!
//! ```rust
//! use tracegraph::components::{EventPrinter, SyntheticConfig, SyntheticSource};
//! use tracegraph::{Graph, RetryPolicy};
//!
//! # fn main() -> tracegraph::Result<()> {
//! let mut graph = Graph::new();
//! let source = graph.add_source("source", SyntheticSource::new(SyntheticConfig::default())?)?;
//! let sink = graph.add_sink("printer", EventPrinter::new(Vec::new()))?;
//! graph.connect(source, "out", sink, "in")?;
//!
//! let summary = graph.run(&RetryPolicy::default())?;
//! assert!(summary.consume_calls > 0);
//! # Ok(())
//! # }
//! ```

use std::fmt;

use tracing::{debug, error, info};

use crate::component::{ComponentContext, ComponentId, ComponentKind, ComponentRole, Filter, Phase, Sink, Source};
use crate::config::RetryPolicy;
use crate::error::ErrorCause;
use crate::iterator::{IteratorContext, MessageIterator};
use crate::port::{Port, PortDirection, PortSet};
use crate::status::ConsumeStatus;
use crate::{GraphError, Result};

pub(crate) struct ComponentSlot {
    pub(crate) name: String,
    pub(crate) role: ComponentRole,
    pub(crate) ports: PortSet,
    /// Taken out while one of the component's lifecycle methods runs.
    pub(crate) kind: Option<ComponentKind>,
}

/// Component storage shared by the graph and the lifecycle contexts.
#[derive(Default)]
pub(crate) struct GraphCore {
    slots: Vec<ComponentSlot>,
}

impl GraphCore {
    /// Slot of an id minted by this graph.
    pub(crate) fn slot(&self, id: ComponentId) -> &ComponentSlot {
        &self.slots[id.index()]
    }

    pub(crate) fn slot_mut(&mut self, id: ComponentId) -> &mut ComponentSlot {
        &mut self.slots[id.index()]
    }

    fn get(&self, id: ComponentId) -> Result<&ComponentSlot> {
        self.slots.get(id.index()).ok_or_else(|| GraphError::config(format!("unknown component {}", id)))
    }

    fn get_mut(&mut self, id: ComponentId) -> Result<&mut ComponentSlot> {
        self.slots.get_mut(id.index()).ok_or_else(|| GraphError::config(format!("unknown component {}", id)))
    }

    /// Create an iterator on input port `input` of `downstream`.
    ///
    /// Resolves the connected upstream output port, asks the upstream component for
    /// a producer and initializes it, which may recursively create further iterators.
    /// The port is claimed once the producer initialized.
    pub(crate) fn create_iterator(&mut self, downstream: ComponentId, input: usize) -> Result<MessageIterator> {
        let port = self.get(downstream)?.ports.by_index(PortDirection::Input, input)?;
        let peer = port.peer().ok_or_else(|| GraphError::NotConnected { port: port.name().to_string() })?;
        port.ensure_no_iterator()?;

        let upstream = peer.component;
        let slot = self.get_mut(upstream)?;
        let Some(mut kind) = slot.kind.take() else {
            return Err(GraphError::invalid_state(
                "create iterator",
                format!("component '{}' is already running a lifecycle method", slot.name),
            ));
        };
        let produced = match slot.ports.by_index(PortDirection::Output, peer.index) {
            Ok(port) => kind.create_producer(port),
            Err(error) => Err(error),
        };
        slot.kind = Some(kind);
        let name = slot.name.clone();

        let mut producer = produced.map_err(|error| error.attributed(&name))?;
        let mut context = IteratorContext { core: self, component: upstream, output: peer.index };
        if let Err(error) = producer.initialize(&mut context) {
            producer.finalize();
            return Err(error.attributed(&name));
        }
        // Dropping the iterator finalizes the producer if the claim fails.
        let iterator = MessageIterator::new(producer, name, peer);
        self.get_mut(downstream)?.ports.by_index_mut(PortDirection::Input, input)?.claim_iterator()?;
        Ok(iterator)
    }
}

/// Lifecycle state of a [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Components and connections may be added
    Building,
    /// Sinks created their iterators
    Configured,
    /// At least one consume round ran
    Running,
    /// Every sink reported END
    Ended,
    /// A sink reported a failure
    Failed,
    /// Components were finalized
    Finalized,
}

/// Outcome of one [`Graph::run_once`] round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// At least one sink made progress
    Ok,
    /// Every active sink asked to retry later
    Again,
    /// Every sink is done
    End,
}

/// Counters of a graph run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub rounds: u64,
    pub consume_calls: u64,
    /// Rounds in which no sink made progress
    pub again_rounds: u64,
    pub cancelled: bool,
}

struct SinkRecord {
    id: ComponentId,
    ended: bool,
}

/// A graph of connected components.
pub struct Graph {
    core: GraphCore,
    sinks: Vec<SinkRecord>,
    state: GraphState,
    summary: RunSummary,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self { core: GraphCore::default(), sinks: Vec::new(), state: GraphState::Building, summary: RunSummary::default() }
    }

    /// Add a source and run its `initialize`.
    pub fn add_source(&mut self, name: &str, source: impl Source + 'static) -> Result<ComponentId> {
        self.add_component(name, ComponentKind::Source(Box::new(source)))
    }

    /// Add a filter and run its `initialize`.
    pub fn add_filter(&mut self, name: &str, filter: impl Filter + 'static) -> Result<ComponentId> {
        self.add_component(name, ComponentKind::Filter(Box::new(filter)))
    }

    /// Add a sink and run its `initialize`.
    pub fn add_sink(&mut self, name: &str, sink: impl Sink + 'static) -> Result<ComponentId> {
        self.add_component(name, ComponentKind::Sink(Box::new(sink)))
    }

    fn add_component(&mut self, name: &str, kind: ComponentKind) -> Result<ComponentId> {
        if self.state != GraphState::Building {
            return Err(GraphError::invalid_state("add component", self.state));
        }
        if self.find_component(name).is_some() {
            return Err(GraphError::config(format!("component name '{}' already in use", name)));
        }

        let role = kind.role();
        let id = ComponentId::new(self.core.slots.len());
        self.core.slots.try_reserve(1)?;
        self.core.slots.push(ComponentSlot { name: name.to_string(), role, ports: PortSet::new(id), kind: Some(kind) });

        if let Err(error) = self.lifecycle(id, Phase::Initializing, ComponentKind::initialize) {
            self.core.slots.pop();
            error!("Failed to initialize {} '{}': {}", role, name, error);
            return Err(error.attributed(name));
        }
        if role == ComponentRole::Sink {
            self.sinks.push(SinkRecord { id, ended: false });
        }
        info!("Added {} component '{}'", role, name);
        Ok(id)
    }

    /// Run one lifecycle method with the component taken out of its slot.
    fn lifecycle<F>(&mut self, id: ComponentId, phase: Phase, call: F) -> Result<()>
    where
        F: FnOnce(&mut ComponentKind, &mut ComponentContext<'_>) -> Result<()>,
    {
        let slot = self.core.slot_mut(id);
        let role = slot.role;
        let Some(mut kind) = slot.kind.take() else {
            return Err(GraphError::invalid_state("lifecycle call", format!("component '{}' is busy", slot.name)));
        };
        let mut context = ComponentContext { core: &mut self.core, component: id, role, phase };
        let result = call(&mut kind, &mut context);
        self.core.slot_mut(id).kind = Some(kind);
        result
    }

    /// Connect an output port of `upstream` to an input port of `downstream`.
    pub fn connect(&mut self, upstream: ComponentId, output: &str, downstream: ComponentId, input: &str) -> Result<()> {
        if self.state != GraphState::Building {
            return Err(GraphError::invalid_state("connect", self.state));
        }
        let out = self.core.get(upstream)?.ports.by_name(PortDirection::Output, output)?;
        if out.is_connected() {
            return Err(GraphError::AlreadyConnected { port: output.to_string() });
        }
        let out = out.address();
        let inp = self.core.get(downstream)?.ports.by_name(PortDirection::Input, input)?;
        if inp.is_connected() {
            return Err(GraphError::AlreadyConnected { port: input.to_string() });
        }
        let inp = inp.address();

        self.core.slot_mut(upstream).ports.by_index_mut(PortDirection::Output, out.index)?.connect(inp)?;
        self.core.slot_mut(downstream).ports.by_index_mut(PortDirection::Input, inp.index)?.connect(out)?;
        debug!(
            "Connected '{}'.{} -> '{}'.{}",
            self.core.slot(upstream).name,
            output,
            self.core.slot(downstream).name,
            input
        );
        Ok(())
    }

    /// Notify sinks that the topology is complete; they create their iterators.
    ///
    /// Called implicitly by the first [`Graph::run_once`].
    pub fn configure(&mut self) -> Result<()> {
        match self.state {
            GraphState::Building => {}
            GraphState::Configured => return Ok(()),
            state => return Err(GraphError::invalid_state("configure", state)),
        }
        if self.sinks.is_empty() {
            return Err(GraphError::config("graph has no sink component"));
        }

        let sinks: Vec<ComponentId> = self.sinks.iter().map(|sink| sink.id).collect();
        for id in sinks {
            let result = self.lifecycle(id, Phase::Configuring, |kind, context| match kind {
                ComponentKind::Sink(sink) => sink.graph_is_configured(context),
                _ => Ok(()),
            });
            if let Err(error) = result {
                let error = error.attributed(&self.core.slot(id).name);
                return Err(self.fail(error));
            }
        }
        self.state = GraphState::Configured;
        info!("Graph configured with {} components", self.core.slots.len());
        Ok(())
    }

    fn fail(&mut self, error: GraphError) -> GraphError {
        self.state = GraphState::Failed;
        error!("Graph run aborted: {}", error);
        error
    }

    /// Give every active sink one `consume` call.
    pub fn run_once(&mut self) -> Result<RunStatus> {
        match self.state {
            GraphState::Building => self.configure()?,
            GraphState::Configured | GraphState::Running => {}
            GraphState::Ended => return Ok(RunStatus::End),
            state => return Err(GraphError::invalid_state("run", state)),
        }
        self.state = GraphState::Running;
        self.summary.rounds += 1;

        let mut progressed = false;
        for index in 0..self.sinks.len() {
            if self.sinks[index].ended {
                continue;
            }
            let id = self.sinks[index].id;
            self.summary.consume_calls += 1;

            let slot = self.core.slot_mut(id);
            let outcome = match slot.kind.as_mut() {
                Some(ComponentKind::Sink(sink)) => sink.consume(),
                _ => Err(GraphError::invalid_state("consume", format!("sink '{}' unavailable", slot.name))),
            };
            match outcome {
                Ok(ConsumeStatus::Ok) => progressed = true,
                Ok(ConsumeStatus::Again) => {}
                Ok(ConsumeStatus::End) => {
                    debug!("Sink '{}' ended", self.core.slot(id).name);
                    self.sinks[index].ended = true;
                    progressed = true;
                }
                Ok(status) => {
                    let cause = ErrorCause::new(format!("sink reported {}", status))
                        .with_component(self.core.slot(id).name.as_str());
                    return Err(self.fail(GraphError::Failed { status, causes: vec![cause] }));
                }
                Err(error) => {
                    let error = error.attributed(&self.core.slot(id).name);
                    return Err(self.fail(error));
                }
            }
        }

        if self.sinks.iter().all(|sink| sink.ended) {
            self.state = GraphState::Ended;
            info!("Graph ended after {} rounds", self.summary.rounds);
            return Ok(RunStatus::End);
        }
        if progressed {
            Ok(RunStatus::Ok)
        } else {
            self.summary.again_rounds += 1;
            Ok(RunStatus::Again)
        }
    }

    /// Run until every sink ends, sleeping between rounds without progress.
    pub fn run(&mut self, policy: &RetryPolicy) -> Result<RunSummary> {
        let mut consecutive_again = 0u32;
        loop {
            match self.run_once()? {
                RunStatus::End => return Ok(self.summary.clone()),
                RunStatus::Ok => consecutive_again = 0,
                RunStatus::Again => {
                    consecutive_again += 1;
                    if policy.is_exhausted(consecutive_again) {
                        return Err(GraphError::Stalled { attempts: consecutive_again });
                    }
                    std::thread::sleep(policy.backoff(consecutive_again));
                }
            }
        }
    }

    /// Finalize every component once. Also runs on drop.
    pub fn finalize(&mut self) {
        if self.state == GraphState::Finalized {
            return;
        }
        for slot in self.core.slots.iter_mut().rev() {
            if let Some(kind) = slot.kind.as_mut() {
                kind.finalize();
                debug!("Finalized {} '{}'", slot.role, slot.name);
            }
        }
        self.state = GraphState::Finalized;
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.summary.cancelled = true;
    }

    pub fn component_count(&self) -> usize {
        self.core.slots.len()
    }

    pub fn component_name(&self, id: ComponentId) -> Option<&str> {
        self.core.get(id).ok().map(|slot| slot.name.as_str())
    }

    pub fn component_role(&self, id: ComponentId) -> Option<ComponentRole> {
        self.core.get(id).ok().map(|slot| slot.role)
    }

    pub fn find_component(&self, name: &str) -> Option<ComponentId> {
        self.core.slots.iter().position(|slot| slot.name == name).map(ComponentId::new)
    }

    pub fn input_port(&self, id: ComponentId, index: usize) -> Result<&Port> {
        self.core.get(id)?.ports.by_index(PortDirection::Input, index)
    }

    pub fn output_port(&self, id: ComponentId, index: usize) -> Result<&Port> {
        self.core.get(id)?.ports.by_index(PortDirection::Output, index)
    }
}

impl Drop for Graph {
    fn drop(&mut self) {
        self.finalize();
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.core.slots.iter().map(|slot| (slot.role, slot.name.as_str())).collect();
        f.debug_struct("Graph")
            .field("state", &self.state)
            .field("components", &names)
            .field("summary", &self.summary)
            .finish()
    }
}
