//! Error types for trace graph processing.
//!
//! This module provides the error handling used across the tracegraph library.
//! All errors implement the `std::error::Error` trait and carry enough context for
//! the graph driver to surface a readable cause chain to the user.
//!
//! ## Error Categories
//!
//! - **Resource errors**: allocation failures while adding ports or producing batches
//! - **Component errors**: generic failures raised by sources, filters and sinks
//! - **Topology errors**: bad port indices, unknown port names, invalid connections
//! - **Protocol errors**: pulling a finished iterator, creating an iterator twice
//! - **Type conversion errors**: reading a field through the wrong typed view
//! - **Configuration errors**: invalid or unreadable run configuration
//!
//! ## Status Mapping
//!
//! Failures never cross the pull-loop boundary as panics. Inside a component they
//! travel as [`GraphError`] values; at the boundary they become a status code
//! (`MEMORY_ERROR` for [`GraphError::Memory`], `ERROR` for everything else) plus an
//! [`ErrorCause`] holding the message and the source location that raised it:
//!
//! ```rust
//! use tracegraph::{GraphError, NextStatus};
//!
//! let error = GraphError::memory("cannot grow batch storage");
//! assert_eq!(error.next_status(), NextStatus::MemoryError);
//!
//! let cause = error.cause();
//! assert!(cause.location.file.ends_with(".rs"));
//! ```
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use tracegraph::GraphError;
//!
//! let error = GraphError::Stalled { attempts: 100 };
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::fmt;
use std::panic::Location;
use std::path::PathBuf;
use thiserror::Error;

use crate::component::ComponentRole;
use crate::port::PortDirection;
use crate::status::{ConsumeStatus, NextStatus};

/// Result type alias for graph operations.
pub type Result<T, E = GraphError> = std::result::Result<T, E>;

/// File and line that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    /// Source file path as reported by the compiler
    pub file: &'static str,
    /// One-based line number
    pub line: u32,
}

impl SourceLocation {
    /// Location of the caller of the function this is invoked from.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self { file: location.file(), line: location.line() }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// One entry of the error-cause chain handed to the user when a run aborts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCause {
    /// Name of the component that appended this cause, if known
    pub component: Option<String>,
    /// Human-readable description
    pub message: String,
    /// Where the failure was raised
    pub location: SourceLocation,
}

impl ErrorCause {
    /// Create a cause located at the caller.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        Self { component: None, message: message.into(), location: SourceLocation::caller() }
    }

    /// Create a cause with an explicit location.
    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self { component: None, message: message.into(), location }
    }

    /// Attribute this cause to a component, unless it already names one.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        if self.component.is_none() {
            self.component = Some(component.into());
        }
        self
    }
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.component {
            Some(component) => {
                write!(f, "[{}] {} ({})", component, self.message, self.location)
            }
            None => write!(f, "{} ({})", self.message, self.location),
        }
    }
}

fn join_causes(causes: &[ErrorCause]) -> String {
    causes.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Main error type for graph operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GraphError {
    #[error("Memory exhausted: {context}")]
    Memory {
        context: String,
        location: SourceLocation,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Component error: {context}")]
    Component {
        context: String,
        location: SourceLocation,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Port index {index} out of range ({count} {direction} ports)")]
    PortIndex { index: usize, count: usize, direction: PortDirection },

    #[error("No {direction} port named '{name}'")]
    PortNotFound { name: String, direction: PortDirection },

    #[error("Port '{name}' already exists")]
    DuplicatePort { name: String },

    #[error("{role} components cannot have {direction} ports")]
    PortDirection { role: ComponentRole, direction: PortDirection },

    #[error("Port '{port}' is not connected")]
    NotConnected { port: String },

    #[error("Port '{port}' is already connected")]
    AlreadyConnected { port: String },

    #[error("A message iterator already exists for port '{port}'")]
    IteratorExists { port: String },

    #[error("Message iterator was pulled after reaching a terminal state")]
    IteratorEnded,

    #[error("Invalid state for {operation}: {state}")]
    InvalidState { operation: String, state: String },

    #[error("Type conversion error: {details}")]
    TypeConversion { details: String },

    #[error("Field '{field}' not found")]
    FieldNotFound { field: String },

    #[error("Stream class {stream_class} has no default clock class")]
    ClockClassMissing { stream_class: u64 },

    #[error("Configuration error: {details}")]
    Config { details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Graph stalled after {attempts} consecutive AGAIN replies")]
    Stalled { attempts: u32 },

    #[error("Graph run aborted ({status}): {}", join_causes(.causes))]
    Failed { status: ConsumeStatus, causes: Vec<ErrorCause> },
}

impl GraphError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            GraphError::Memory { .. } => true,
            GraphError::Stalled { .. } => true,
            GraphError::Component { .. } => false,
            GraphError::PortIndex { .. } => false,
            GraphError::PortNotFound { .. } => false,
            GraphError::DuplicatePort { .. } => false,
            GraphError::PortDirection { .. } => false,
            GraphError::NotConnected { .. } => false,
            GraphError::AlreadyConnected { .. } => false,
            GraphError::IteratorExists { .. } => false,
            GraphError::IteratorEnded => false,
            GraphError::InvalidState { .. } => false,
            GraphError::TypeConversion { .. } => false,
            GraphError::FieldNotFound { .. } => false,
            GraphError::ClockClassMissing { .. } => false,
            GraphError::Config { .. } => false,
            GraphError::File { .. } => false,
            GraphError::Failed { status, .. } => *status == ConsumeStatus::MemoryError,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            GraphError::Memory { .. } => vec![
                "Reduce the producer batch size",
                "Release messages as soon as they are processed",
                "Check for iterators that are never released",
            ],
            GraphError::Component { .. } | GraphError::Failed { .. } => vec![
                "Inspect the error cause chain for the failing component",
                "Check the component's input data",
            ],
            GraphError::PortIndex { .. } | GraphError::PortNotFound { .. } => vec![
                "Check that the port was added during initialization",
                "Verify the port name or index",
            ],
            GraphError::DuplicatePort { .. } => vec!["Give every port of a component a unique name"],
            GraphError::PortDirection { .. } => vec![
                "Sources only have output ports",
                "Sinks only have input ports",
            ],
            GraphError::NotConnected { .. } | GraphError::AlreadyConnected { .. } => vec![
                "Connect every input port exactly once before configuring the graph",
            ],
            GraphError::IteratorExists { .. } => vec![
                "Create the upstream iterator once, in graph_is_configured",
            ],
            GraphError::IteratorEnded => vec![
                "Release the iterator when next() reports END",
                "Stop pulling after END or an error",
            ],
            GraphError::InvalidState { .. } => vec!["Follow the component lifecycle order"],
            GraphError::TypeConversion { .. } => vec![
                "Check the field class before converting",
                "Use the matching FieldData type for the field",
            ],
            GraphError::FieldNotFound { .. } => vec![
                "Check the member name spelling",
                "Verify the event class payload layout",
            ],
            GraphError::ClockClassMissing { .. } => vec![
                "Set a default clock class on the stream class",
                "Create messages without a clock snapshot",
            ],
            GraphError::Config { .. } => vec!["Check the configuration file syntax and values"],
            GraphError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            GraphError::Stalled { .. } => vec![
                "Increase the AGAIN retry budget",
                "Check that the producer eventually makes progress",
            ],
        }
    }

    /// Helper constructor for allocation failures.
    #[track_caller]
    pub fn memory(context: impl Into<String>) -> Self {
        GraphError::Memory { context: context.into(), location: SourceLocation::caller(), source: None }
    }

    /// Helper constructor for generic component failures.
    #[track_caller]
    pub fn component(context: impl Into<String>) -> Self {
        GraphError::Component {
            context: context.into(),
            location: SourceLocation::caller(),
            source: None,
        }
    }

    /// Helper constructor for component failures with an underlying source.
    #[track_caller]
    pub fn component_with_source(
        context: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        GraphError::Component {
            context: context.into(),
            location: SourceLocation::caller(),
            source: Some(source),
        }
    }

    /// Helper constructor for type conversion errors.
    pub fn type_conversion(details: impl Into<String>) -> Self {
        GraphError::TypeConversion { details: details.into() }
    }

    /// Helper constructor for lifecycle violations.
    pub fn invalid_state(operation: impl Into<String>, state: impl fmt::Debug) -> Self {
        GraphError::InvalidState { operation: operation.into(), state: format!("{:?}", state) }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        GraphError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        GraphError::File { path, source }
    }

    /// Whether this error maps to the `MEMORY_ERROR` status.
    pub fn is_memory_error(&self) -> bool {
        match self {
            GraphError::Memory { .. } => true,
            GraphError::Failed { status, .. } => *status == ConsumeStatus::MemoryError,
            _ => false,
        }
    }

    /// Status reported to the consumer of an iterator that failed with this error.
    pub fn next_status(&self) -> NextStatus {
        if self.is_memory_error() { NextStatus::MemoryError } else { NextStatus::Error }
    }

    /// Location recorded when the error was raised, if any.
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            GraphError::Memory { location, .. } | GraphError::Component { location, .. } => {
                Some(*location)
            }
            GraphError::Failed { causes, .. } => causes.first().map(|cause| cause.location),
            _ => None,
        }
    }

    /// Convert this error into a cause record.
    ///
    /// Errors that did not record a location are attributed to the caller.
    #[track_caller]
    pub fn cause(&self) -> ErrorCause {
        let location = self.location().unwrap_or_else(SourceLocation::caller);
        ErrorCause::at(self.to_string(), location)
    }

    /// Full cause chain: the recorded chain for aborted runs, otherwise a single cause.
    #[track_caller]
    pub fn causes(&self) -> Vec<ErrorCause> {
        match self {
            GraphError::Failed { causes, .. } => causes.clone(),
            _ => vec![self.cause()],
        }
    }

    /// Convert into a [`GraphError::Failed`] whose causes name `component`.
    ///
    /// Causes already attributed to another component keep their attribution.
    #[track_caller]
    pub fn attributed(self, component: &str) -> Self {
        let status = self.next_status().into();
        let causes = self.causes().into_iter().map(|cause| cause.with_component(component)).collect();
        GraphError::Failed { status, causes }
    }
}

impl From<std::io::Error> for GraphError {
    fn from(err: std::io::Error) -> Self {
        GraphError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<std::collections::TryReserveError> for GraphError {
    #[track_caller]
    fn from(err: std::collections::TryReserveError) -> Self {
        GraphError::Memory {
            context: "storage reservation failed".to_string(),
            location: SourceLocation::caller(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_yaml_ng::Error> for GraphError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        GraphError::Config { details: err.to_string() }
    }
}
