//! Sink writing one line per event

use std::io::Write;

use tracing::debug;

use crate::component::{ComponentContext, Sink, UpstreamIterator};
use crate::status::ConsumeStatus;
use crate::{GraphError, Result};

/// Sink with one input port `in` that prints each event as
/// `<index>: <event class name> (<n> payload member[s])`.
///
/// The index counts printed events from 1. Other message kinds are released
/// without output.
pub struct EventPrinter<W: Write + Send> {
    out: W,
    upstream: UpstreamIterator,
    printed: u64,
}

impl<W: Write + Send> EventPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out, upstream: UpstreamIterator::new(), printed: 0 }
    }

    /// Number of events printed so far.
    pub fn printed(&self) -> u64 {
        self.printed
    }
}

impl<W: Write + Send> Sink for EventPrinter<W> {
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        context.add_input_port("in", None)?;
        Ok(())
    }

    fn graph_is_configured(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        self.upstream.create(context, 0)
    }

    fn consume(&mut self) -> Result<ConsumeStatus> {
        let out = &mut self.out;
        let printed = &mut self.printed;
        self.upstream.consume_with(|message| {
            let Some(view) = message.as_event() else {
                return Ok(());
            };
            let event = view.event();
            let members = event.payload_member_count();
            *printed += 1;
            writeln!(out, "{}: {} ({} payload member{})", printed, event.name(), members, if members == 1 { "" } else { "s" })
                .map_err(|e| GraphError::component_with_source("failed to write event", Box::new(e)))
        })
    }

    fn finalize(&mut self) {
        if self.upstream.release() {
            debug!("Event printer released its iterator before END");
        }
        if let Err(e) = self.out.flush() {
            debug!("Event printer flush failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Graph;
    use crate::components::{SyntheticConfig, SyntheticSource};
    use crate::test_utils::SharedBuffer;

    #[test]
    fn prints_numbered_events() {
        let buffer = SharedBuffer::new();
        let mut graph = Graph::new();
        let source = graph.add_source("source", SyntheticSource::new(SyntheticConfig::default()).unwrap()).unwrap();
        let sink = graph.add_sink("printer", EventPrinter::new(buffer.clone())).unwrap();
        graph.connect(source, "out", sink, "in").unwrap();

        graph.run(&crate::RetryPolicy::busy()).unwrap();
        assert_eq!(
            buffer.contents(),
            "1: synthetic_event (1 payload member)\n\
             2: synthetic_event (1 payload member)\n\
             3: synthetic_event (1 payload member)\n"
        );
    }
}
