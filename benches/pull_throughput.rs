//! Benchmarks for the pull loop
//!
//! Measures messages per second through:
//! - Source to sink with varying producer batch sizes
//! - Source, filter and sink (cascading iterator creation)
//! - Message creation and release on a bare trace fixture
//!
//! Platform: Cross-platform, no fixtures

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use tracegraph::components::{EventPrinter, MessageFilter, SyntheticConfig, SyntheticSource};
use tracegraph::test_utils::TestTrace;
use tracegraph::{Graph, MessageType, RetryPolicy};

const EVENTS: u64 = 10_000;

fn source(batch_size: usize) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig { events: EVENTS, batch_size, ..Default::default() })
        .expect("synthetic source")
}

fn bench_batch_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("source_to_sink");
    group.throughput(Throughput::Elements(EVENTS));

    for batch_size in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(batch_size), &batch_size, |b, &batch_size| {
            b.iter(|| {
                let mut graph = Graph::new();
                let source = graph.add_source("source", source(batch_size)).unwrap();
                let sink = graph.add_sink("printer", EventPrinter::new(std::io::sink())).unwrap();
                graph.connect(source, "out", sink, "in").unwrap();
                black_box(graph.run(&RetryPolicy::busy()).unwrap())
            })
        });
    }

    group.finish();
}

fn bench_filter_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_chain");
    group.throughput(Throughput::Elements(EVENTS));

    group.bench_function("events_only", |b| {
        b.iter(|| {
            let mut graph = Graph::new();
            let source = graph.add_source("source", source(64)).unwrap();
            let filter = graph
                .add_filter("filter", MessageFilter::new(|message| message.message_type() == MessageType::Event))
                .unwrap();
            let sink = graph.add_sink("printer", EventPrinter::new(std::io::sink())).unwrap();
            graph.connect(source, "out", filter, "in").unwrap();
            graph.connect(filter, "out", sink, "in").unwrap();
            black_box(graph.run(&RetryPolicy::busy()).unwrap())
        })
    });

    group.finish();
}

fn bench_message_lifecycle(c: &mut Criterion) {
    let fixture = TestTrace::new();
    let mut group = c.benchmark_group("message_lifecycle");

    group.bench_function("event_message_create_release", |b| {
        b.iter(|| {
            let message = fixture.event_message(black_box(7));
            message.release();
        })
    });

    group.bench_function("event_message_with_clock", |b| {
        b.iter(|| black_box(fixture.event_message_at(7, black_box(1_000)).unwrap()))
    });

    group.finish();
}

criterion_group!(benches, bench_batch_sizes, bench_filter_chain, bench_message_lifecycle);
criterion_main!(benches);
