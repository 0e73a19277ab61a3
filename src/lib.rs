//! Pull-based trace processing graphs in Rust.
//!
//! tracegraph connects sources, filters and sinks through ports and moves trace
//! messages between them with message iterators: a sink pulls a batch, the
//! upstream producer answers `OK` with messages, `AGAIN` to retry later, `END`
//! when exhausted, or a failure carrying the cause chain.
//!
//! # Features
//!
//! - **Trace IR**: ref-counted trace, stream, packet, event and clock classes
//! - **Typed views**: messages are read through views of the matching kind
//! - **Component lifecycle**: initialize, configure, consume, finalize exactly once
//! - **Async edge**: a tokio [`Driver`] and [`ChannelSink`](components::ChannelSink)
//!   feeding a `futures::Stream` of adapted events
//!
//! # Quick Start
//!
//! ```rust
//! use tracegraph::components::{EventPrinter, SyntheticConfig, SyntheticSource};
//! use tracegraph::{Graph, RetryPolicy};
//!
//! # fn main() -> tracegraph::Result<()> {
//! let mut graph = Graph::new();
//! let source = graph.add_source("source", SyntheticSource::new(SyntheticConfig::default())?)?;
//! let printer = graph.add_sink("printer", EventPrinter::new(std::io::stdout()))?;
//! graph.connect(source, "out", printer, "in")?;
//! graph.run(&RetryPolicy::default())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Example (async consumer)
//!
//! ```rust
//! use futures::StreamExt;
//! use tracegraph::components::{ChannelSink, SyntheticConfig, SyntheticSource};
//! use tracegraph::{Driver, DynamicEvent, Graph, RetryPolicy};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> tracegraph::Result<()> {
//!     let (sink, mut events) = ChannelSink::<DynamicEvent>::channel(8)?;
//!     let mut graph = Graph::new();
//!     let source = graph.add_source("source", SyntheticSource::new(SyntheticConfig::default())?)?;
//!     let sink = graph.add_sink("channel", sink)?;
//!     graph.connect(source, "out", sink, "in")?;
//!
//!     let handle = Driver::spawn(graph, RetryPolicy::default());
//!     while let Some(event) = events.next().await {
//!         println!("{} #{:?}", event.name(), event.u64("index"));
//!     }
//!     handle.join().await?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod adapters;
mod dynamic_event;
mod error;
pub mod object;
pub mod status;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Graph plumbing
pub mod component;
pub mod graph;
pub mod iterator;
pub mod message;
pub mod port;

// Ready-made components and async consumption
pub mod components;
pub mod driver;
pub mod stream;

// Ambient stack
pub mod config;
pub mod logging;

// Core exports
pub use dynamic_event::DynamicEvent;
pub use error::*;
pub use status::{ConsumeStatus, NextStatus};

// Main API exports
pub use component::{ComponentContext, ComponentId, ComponentRole, Filter, Sink, Source, UpstreamIterator};
pub use config::{RetryPolicy, RunConfig};
pub use driver::{Driver, DriverHandle, RunState};
pub use graph::{Graph, GraphState, RunStatus, RunSummary};
pub use iterator::{Batch, MessageIterator, Next, Producer, Pull};
pub use message::{Message, MessageType};
pub use port::{Port, PortDirection};
