//! End-to-end pull protocol tests over real graphs.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use tracegraph::component::ComponentContext;
use tracegraph::components::{EventPrinter, MessageFilter, SyntheticConfig, SyntheticFailure, SyntheticSource};
use tracegraph::{
    ConsumeStatus, Graph, GraphError, GraphState, Message, MessageType, RetryPolicy, RunStatus, Sink,
    UpstreamIterator,
};

/// Writer shared between a sink and the test.
#[derive(Clone, Default)]
struct Output(Arc<Mutex<Vec<u8>>>);

impl Output {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    kind: MessageType,
    index: Option<u64>,
    clock: Option<u64>,
}

/// Records every message it pulls.
#[derive(Default)]
struct Recorder {
    upstream: UpstreamIterator,
    seen: Arc<Mutex<Vec<Seen>>>,
    input: usize,
}

impl Sink for Recorder {
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> tracegraph::Result<()> {
        context.add_input_port("in", None)?;
        Ok(())
    }

    fn graph_is_configured(&mut self, context: &mut ComponentContext<'_>) -> tracegraph::Result<()> {
        self.upstream.create(context, self.input)
    }

    fn consume(&mut self) -> tracegraph::Result<ConsumeStatus> {
        let seen = &self.seen;
        self.upstream.consume_with(|message: Message| {
            let index = message.as_event().map(|view| view.event().payload_value::<u64>("index")).transpose()?;
            let clock = message.default_clock_snapshot().map(|snapshot| snapshot.value());
            seen.lock().unwrap().push(Seen { kind: message.message_type(), index, clock });
            message.release();
            Ok(())
        })
    }

    fn finalize(&mut self) {
        self.upstream.release();
    }
}

fn record(config: SyntheticConfig) -> (tracegraph::Result<tracegraph::RunSummary>, Vec<Seen>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut graph = Graph::new();
    let source = graph.add_source("source", SyntheticSource::new(config).unwrap()).unwrap();
    let sink = graph.add_sink("recorder", Recorder { seen: Arc::clone(&seen), ..Default::default() }).unwrap();
    graph.connect(source, "out", sink, "in").unwrap();

    let result = graph.run(&RetryPolicy::busy().with_max_again(10));
    drop(graph);
    let seen = seen.lock().unwrap().clone();
    (result, seen)
}

fn expected(events: u64) -> Vec<Seen> {
    let mut expected = vec![Seen { kind: MessageType::StreamBeginning, index: None, clock: Some(0) }];
    expected.extend((1..=events).map(|i| Seen { kind: MessageType::Event, index: Some(i), clock: Some(i) }));
    expected.push(Seen { kind: MessageType::StreamEnd, index: None, clock: Some(events + 1) });
    expected
}

#[test]
fn batch_size_does_not_change_order() {
    for batch_size in [1, 3, 5] {
        let (result, seen) = record(SyntheticConfig { events: 3, batch_size, ..Default::default() });
        result.unwrap();
        assert_eq!(seen, expected(3), "batch size {batch_size}");
    }
}

#[test]
fn again_then_ok_delivers_everything() {
    let (result, seen) = record(SyntheticConfig { again_replies: 2, ..Default::default() });
    let summary = result.unwrap();
    assert_eq!(summary.again_rounds, 2);
    assert_eq!(seen, expected(3));
}

#[test]
fn printer_output() {
    let out = Output::default();
    let mut graph = Graph::new();
    let config = SyntheticConfig { events: 2, event_name: "sched_switch".into(), ..Default::default() };
    let source = graph.add_source("source", SyntheticSource::new(config).unwrap()).unwrap();
    let sink = graph.add_sink("printer", EventPrinter::new(out.clone())).unwrap();
    graph.connect(source, "out", sink, "in").unwrap();

    graph.run(&RetryPolicy::default()).unwrap();
    assert_eq!(graph.state(), GraphState::Ended);
    assert_eq!(out.text(), "1: sched_switch (1 payload member)\n2: sched_switch (1 payload member)\n");
}

#[test]
fn out_of_range_input_port_is_reported() {
    let mut graph = Graph::new();
    let source = graph.add_source("source", SyntheticSource::new(SyntheticConfig::default()).unwrap()).unwrap();
    let sink = graph.add_sink("recorder", Recorder { input: 3, ..Default::default() }).unwrap();
    graph.connect(source, "out", sink, "in").unwrap();

    let error = graph.run_once().unwrap_err();
    assert!(error.to_string().contains("Port index 3 out of range"));
    assert_eq!(graph.state(), GraphState::Failed);
}

#[test]
fn memory_failure_reaches_the_caller() {
    let failure = SyntheticFailure { after_events: 2, memory: true };
    let (result, seen) = record(SyntheticConfig { failure: Some(failure), ..Default::default() });

    let error = result.unwrap_err();
    assert!(error.is_memory_error());
    let GraphError::Failed { status, causes } = error else {
        panic!("expected an aborted run");
    };
    assert_eq!(status, ConsumeStatus::MemoryError);
    assert_eq!(causes[0].component.as_deref(), Some("source"));
    assert!(causes[0].message.contains("synthetic failure after 2 events"));
    // Everything before the failure was delivered.
    assert_eq!(seen, expected(3)[..3]);
}

#[test]
fn filter_between_source_and_sink() {
    let out = Output::default();
    let filter = MessageFilter::new(|message| message.message_type() == MessageType::Event);
    let stats = filter.stats();

    let mut graph = Graph::new();
    let source = graph.add_source("source", SyntheticSource::new(SyntheticConfig::default()).unwrap()).unwrap();
    let filter = graph.add_filter("filter", filter).unwrap();
    let sink = graph.add_sink("printer", EventPrinter::new(out.clone())).unwrap();
    graph.connect(source, "out", filter, "in").unwrap();
    graph.connect(filter, "out", sink, "in").unwrap();

    let mut rounds = 0;
    while graph.run_once().unwrap() != RunStatus::End {
        rounds += 1;
    }
    assert_eq!(rounds, 3);
    assert_eq!(out.text().lines().count(), 3);
    assert_eq!(stats.dropped(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_batching_preserves_order(events in 0u64..40, batch_size in 1usize..12, again in 0u32..4) {
        let (result, seen) = record(SyntheticConfig { events, batch_size, again_replies: again, ..Default::default() });
        prop_assert!(result.is_ok());
        prop_assert_eq!(seen, expected(events));
    }
}
