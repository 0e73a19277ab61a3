//! Ready-made components.
//!
//! - [`SyntheticSource`]: numbered events on one stream, for tests and demos
//! - [`MessageFilter`]: forwards messages matching a predicate
//! - [`EventPrinter`]: writes one line per event
//! - [`ChannelSink`]: hands adapted events to an async [`EventStream`](crate::stream::EventStream)

mod channel;
mod filter;
mod printer;
mod synthetic;

pub use channel::ChannelSink;
pub use filter::{FilterStats, MessageFilter};
pub use printer::EventPrinter;
pub use synthetic::{SyntheticConfig, SyntheticFailure, SyntheticSource};
