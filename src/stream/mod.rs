//! Async consumption of graph output

mod event_stream;

pub use event_stream::EventStream;
