//! Component ports and the connections between them.
//!
//! Ports are added while a component initializes. Output ports of sources and
//! filters are connected to input ports of filters and sinks before the graph is
//! configured; a message iterator is then created on an input port and pulls from
//! the connected upstream output port.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::component::ComponentId;
use crate::{GraphError, Result};

/// Opaque data attached to a port when it is added.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Direction of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PortDirection::Input => "input",
            PortDirection::Output => "output",
        })
    }
}

/// Address of a port inside a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortAddress {
    pub component: ComponentId,
    pub direction: PortDirection,
    pub index: usize,
}

/// A named input or output port of a component.
pub struct Port {
    name: String,
    address: PortAddress,
    user_data: Option<UserData>,
    peer: Option<PortAddress>,
    iterator_created: bool,
}

impl Port {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> PortDirection {
        self.address.direction
    }

    /// Position among the owning component's ports of the same direction.
    pub fn index(&self) -> usize {
        self.address.index
    }

    /// Component owning this port.
    pub fn component(&self) -> ComponentId {
        self.address.component
    }

    pub fn address(&self) -> PortAddress {
        self.address
    }

    /// User data attached at creation, if it has type `T`.
    pub fn user_data<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.user_data.as_deref().and_then(|data| data.downcast_ref::<T>())
    }

    pub fn is_connected(&self) -> bool {
        self.peer.is_some()
    }

    /// Port at the other end of the connection.
    pub fn peer(&self) -> Option<PortAddress> {
        self.peer
    }

    pub(crate) fn connect(&mut self, peer: PortAddress) -> Result<()> {
        if self.peer.is_some() {
            return Err(GraphError::AlreadyConnected { port: self.name.clone() });
        }
        self.peer = Some(peer);
        Ok(())
    }

    /// Fails if an iterator was already created on this input port.
    pub(crate) fn ensure_no_iterator(&self) -> Result<()> {
        if self.iterator_created {
            return Err(GraphError::IteratorExists { port: self.name.clone() });
        }
        Ok(())
    }

    /// Record iterator creation on this input port; fails on the second call.
    pub(crate) fn claim_iterator(&mut self) -> Result<()> {
        self.ensure_no_iterator()?;
        self.iterator_created = true;
        Ok(())
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("peer", &self.peer)
            .field("has_user_data", &self.user_data.is_some())
            .finish()
    }
}

/// Ports of one component, split by direction.
#[derive(Debug)]
pub(crate) struct PortSet {
    component: ComponentId,
    inputs: Vec<Port>,
    outputs: Vec<Port>,
}

impl PortSet {
    pub(crate) fn new(component: ComponentId) -> Self {
        Self { component, inputs: Vec::new(), outputs: Vec::new() }
    }

    fn ports(&self, direction: PortDirection) -> &Vec<Port> {
        match direction {
            PortDirection::Input => &self.inputs,
            PortDirection::Output => &self.outputs,
        }
    }

    fn ports_mut(&mut self, direction: PortDirection) -> &mut Vec<Port> {
        match direction {
            PortDirection::Input => &mut self.inputs,
            PortDirection::Output => &mut self.outputs,
        }
    }

    /// Add a port; names are unique per direction.
    pub(crate) fn add(
        &mut self,
        direction: PortDirection,
        name: impl Into<String>,
        user_data: Option<UserData>,
    ) -> Result<usize> {
        let name = name.into();
        let component = self.component;
        let ports = self.ports_mut(direction);
        if ports.iter().any(|port| port.name == name) {
            return Err(GraphError::DuplicatePort { name });
        }
        ports.try_reserve(1)?;
        let index = ports.len();
        ports.push(Port {
            name,
            address: PortAddress { component, direction, index },
            user_data,
            peer: None,
            iterator_created: false,
        });
        Ok(index)
    }

    pub(crate) fn count(&self, direction: PortDirection) -> usize {
        self.ports(direction).len()
    }

    pub(crate) fn by_index(&self, direction: PortDirection, index: usize) -> Result<&Port> {
        let ports = self.ports(direction);
        ports.get(index).ok_or(GraphError::PortIndex { index, count: ports.len(), direction })
    }

    pub(crate) fn by_index_mut(&mut self, direction: PortDirection, index: usize) -> Result<&mut Port> {
        let ports = self.ports_mut(direction);
        let count = ports.len();
        ports.get_mut(index).ok_or(GraphError::PortIndex { index, count, direction })
    }

    pub(crate) fn by_name(&self, direction: PortDirection, name: &str) -> Result<&Port> {
        self.ports(direction)
            .iter()
            .find(|port| port.name == name)
            .ok_or_else(|| GraphError::PortNotFound { name: name.to_string(), direction })
    }
}
