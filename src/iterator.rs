//! Message iterators: the pull side of the graph.
//!
//! A [`MessageIterator`] is created on a connected input port and pulls batches
//! from the [`Producer`] the upstream component created for its output port. Every
//! call to [`MessageIterator::next`] reports exactly one outcome:
//!
//! - [`Next::Ok`]: a non-empty [`Batch`] of owned messages
//! - [`Next::Again`]: nothing right now, retry later
//! - [`Next::End`]: the upstream stream is exhausted
//! - [`Next::MemoryError`] / [`Next::Error`]: failure, with the cause chain
//!
//! After `End` or an error the iterator is terminal; pulling it again is a
//! protocol violation reported as an error.
//!
//! A batch borrows the iterator, so the previous batch is gone before the next
//! pull. Messages not moved out of a batch are released when it is dropped.

use std::fmt;
use std::vec::Drain;

use tracing::{debug, trace, warn};

use crate::component::ComponentId;
use crate::error::ErrorCause;
use crate::graph::GraphCore;
use crate::message::Message;
use crate::port::{Port, PortAddress, PortDirection};
use crate::status::{ConsumeStatus, NextStatus};
use crate::{GraphError, Result};

/// Outcome of one [`Producer::next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// Messages were pushed into the batch
    Ready,
    /// Nothing available right now
    Again,
    /// No more messages will ever be produced
    End,
}

/// Upstream half of an iterator, created by a source or filter for one output port.
///
/// `next` appends owned messages to `batch` (which is empty on entry) and reports
/// [`Pull::Ready`] only when it pushed at least one. Returning an error makes the
/// iterator terminal; [`GraphError::Memory`] maps to `MEMORY_ERROR`.
pub trait Producer: Send {
    /// Called once, right after creation. Filters create their upstream iterators here.
    fn initialize(&mut self, context: &mut IteratorContext<'_>) -> Result<()> {
        let _ = context;
        Ok(())
    }

    /// Produce the next batch.
    fn next(&mut self, batch: &mut Vec<Message>) -> Result<Pull>;

    /// Called once when the iterator is released.
    fn finalize(&mut self) {}
}

/// Access to the graph while a producer initializes.
pub struct IteratorContext<'g> {
    pub(crate) core: &'g mut GraphCore,
    pub(crate) component: ComponentId,
    pub(crate) output: usize,
}

impl IteratorContext<'_> {
    /// Component that created the producer.
    pub fn component(&self) -> ComponentId {
        self.component
    }

    pub fn component_name(&self) -> &str {
        &self.core.slot(self.component).name
    }

    /// Output port the iterator pulls from.
    pub fn output_port(&self) -> Result<&Port> {
        self.core.slot(self.component).ports.by_index(PortDirection::Output, self.output)
    }

    pub fn input_port_count(&self) -> usize {
        self.core.slot(self.component).ports.count(PortDirection::Input)
    }

    pub fn input_port(&self, index: usize) -> Result<&Port> {
        self.core.slot(self.component).ports.by_index(PortDirection::Input, index)
    }

    /// Create an iterator on one of this component's input ports.
    pub fn create_upstream(&mut self, input: usize) -> Result<MessageIterator> {
        self.core.create_iterator(self.component, input)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    /// Never pulled
    Created,
    /// Pulled at least once, not terminal
    Active,
    /// Reported `END`
    Ended,
    /// Reported `MEMORY_ERROR` or `ERROR`
    Errored,
}

impl IteratorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, IteratorState::Ended | IteratorState::Errored)
    }
}

/// Messages delivered by one successful pull.
pub struct Batch<'it> {
    messages: Drain<'it, Message>,
}

impl Iterator for Batch<'_> {
    type Item = Message;

    fn next(&mut self) -> Option<Message> {
        self.messages.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.messages.size_hint()
    }
}

impl ExactSizeIterator for Batch<'_> {}

impl fmt::Debug for Batch<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch").field("remaining", &self.messages.len()).finish()
    }
}

/// Outcome of [`MessageIterator::next`].
#[derive(Debug)]
pub enum Next<'it> {
    Ok(Batch<'it>),
    Again,
    End,
    MemoryError(Vec<ErrorCause>),
    Error(Vec<ErrorCause>),
}

impl Next<'_> {
    pub fn status(&self) -> NextStatus {
        match self {
            Next::Ok(_) => NextStatus::Ok,
            Next::Again => NextStatus::Again,
            Next::End => NextStatus::End,
            Next::MemoryError(_) => NextStatus::MemoryError,
            Next::Error(_) => NextStatus::Error,
        }
    }

    /// The failure carried by `MemoryError` or `Error`, for propagation with `?`.
    pub fn into_error(self) -> Option<GraphError> {
        match self {
            Next::MemoryError(causes) => Some(GraphError::Failed { status: ConsumeStatus::MemoryError, causes }),
            Next::Error(causes) => Some(GraphError::Failed { status: ConsumeStatus::Error, causes }),
            Next::Ok(_) | Next::Again | Next::End => None,
        }
    }
}

/// Pull-side handle on an upstream output port.
///
/// Dropping (or [releasing](MessageIterator::release)) the iterator finalizes its
/// producer exactly once.
pub struct MessageIterator {
    producer: Box<dyn Producer>,
    upstream: String,
    port: PortAddress,
    state: IteratorState,
    batch: Vec<Message>,
    batches: u64,
    messages: u64,
}

impl MessageIterator {
    pub(crate) fn new(producer: Box<dyn Producer>, upstream: String, port: PortAddress) -> Self {
        debug!("Created message iterator on {}:{}", upstream, port.index);
        Self {
            producer,
            upstream,
            port,
            state: IteratorState::Created,
            batch: Vec::new(),
            batches: 0,
            messages: 0,
        }
    }

    /// Pull the next batch.
    pub fn next(&mut self) -> Next<'_> {
        if self.state.is_terminal() {
            warn!("Iterator on '{}' pulled after reaching {:?}", self.upstream, self.state);
            return Next::Error(vec![GraphError::IteratorEnded.cause().with_component(self.upstream.as_str())]);
        }
        self.state = IteratorState::Active;
        self.batch.clear();

        match self.producer.next(&mut self.batch) {
            Ok(Pull::Ready) if self.batch.is_empty() => {
                self.state = IteratorState::Errored;
                let cause = ErrorCause::new("producer reported a ready batch without messages");
                Next::Error(vec![cause.with_component(self.upstream.as_str())])
            }
            Ok(Pull::Ready) => {
                self.batches += 1;
                self.messages += self.batch.len() as u64;
                trace!("Batch {} from '{}': {} messages", self.batches, self.upstream, self.batch.len());
                Next::Ok(Batch { messages: self.batch.drain(..) })
            }
            Ok(Pull::Again) => {
                if !self.batch.is_empty() {
                    warn!("Producer '{}' returned AGAIN with {} messages; dropping them", self.upstream, self.batch.len());
                    self.batch.clear();
                }
                Next::Again
            }
            Ok(Pull::End) => {
                if !self.batch.is_empty() {
                    warn!("Producer '{}' returned END with {} messages; dropping them", self.upstream, self.batch.len());
                    self.batch.clear();
                }
                self.state = IteratorState::Ended;
                debug!("Iterator on '{}' ended after {} messages", self.upstream, self.messages);
                Next::End
            }
            Err(error) => {
                self.state = IteratorState::Errored;
                self.batch.clear();
                debug!("Producer '{}' failed: {}", self.upstream, error);
                let memory = error.is_memory_error();
                let causes = error
                    .causes()
                    .into_iter()
                    .map(|cause| cause.with_component(self.upstream.as_str()))
                    .collect();
                if memory { Next::MemoryError(causes) } else { Next::Error(causes) }
            }
        }
    }

    pub fn state(&self) -> IteratorState {
        self.state
    }

    /// Name of the upstream component.
    pub fn upstream(&self) -> &str {
        &self.upstream
    }

    /// Upstream output port this iterator pulls from.
    pub fn port(&self) -> PortAddress {
        self.port
    }

    /// Number of successful pulls so far.
    pub fn batches(&self) -> u64 {
        self.batches
    }

    /// Number of messages delivered so far.
    pub fn messages(&self) -> u64 {
        self.messages
    }

    /// Give the iterator back, finalizing its producer.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for MessageIterator {
    fn drop(&mut self) {
        self.batch.clear();
        self.producer.finalize();
        debug!("Released message iterator on '{}' ({} batches)", self.upstream, self.batches);
    }
}

impl fmt::Debug for MessageIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageIterator")
            .field("upstream", &self.upstream)
            .field("port", &self.port)
            .field("state", &self.state)
            .field("batches", &self.batches)
            .field("messages", &self.messages)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestTrace;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a script of pull outcomes.
    struct Scripted {
        fixture: TestTrace,
        script: Vec<std::result::Result<usize, Pull>>,
        next_index: u64,
        finalized: Arc<AtomicUsize>,
    }

    impl Producer for Scripted {
        fn next(&mut self, batch: &mut Vec<Message>) -> Result<Pull> {
            if self.script.is_empty() {
                return Ok(Pull::End);
            }
            match self.script.remove(0) {
                Ok(count) => {
                    for _ in 0..count {
                        self.next_index += 1;
                        batch.push(self.fixture.event_message(self.next_index));
                    }
                    Ok(Pull::Ready)
                }
                Err(pull) => Ok(pull),
            }
        }

        fn finalize(&mut self) {
            self.finalized.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn iterator(script: Vec<std::result::Result<usize, Pull>>) -> (MessageIterator, Arc<AtomicUsize>) {
        let finalized = Arc::new(AtomicUsize::new(0));
        let producer =
            Scripted { fixture: TestTrace::new(), script, next_index: 0, finalized: Arc::clone(&finalized) };
        let port = PortAddress { component: ComponentId::new(0), direction: PortDirection::Output, index: 0 };
        (MessageIterator::new(Box::new(producer), "scripted".to_string(), port), finalized)
    }

    fn indices(batch: Batch<'_>) -> Vec<u64> {
        batch
            .map(|message| message.as_event().unwrap().event().payload_value::<u64>("index").unwrap())
            .collect()
    }

    #[test]
    fn batches_preserve_order() {
        let (mut it, _) = iterator(vec![Ok(2), Ok(1)]);
        assert_eq!(it.state(), IteratorState::Created);

        match it.next() {
            Next::Ok(batch) => assert_eq!(indices(batch), [1, 2]),
            other => panic!("expected batch, got {other:?}"),
        }
        match it.next() {
            Next::Ok(batch) => assert_eq!(indices(batch), [3]),
            other => panic!("expected batch, got {other:?}"),
        }
        assert!(matches!(it.next(), Next::End));
        assert_eq!(it.messages(), 3);
        assert_eq!(it.batches(), 2);
    }

    #[test]
    fn again_then_ok() {
        let (mut it, _) = iterator(vec![Err(Pull::Again), Err(Pull::Again), Ok(1)]);
        assert_eq!(it.next().status(), NextStatus::Again);
        assert_eq!(it.next().status(), NextStatus::Again);
        assert_eq!(it.state(), IteratorState::Active);
        assert_eq!(it.next().status(), NextStatus::Ok);
    }

    #[test]
    fn pulling_after_end_is_an_error() {
        let (mut it, _) = iterator(vec![]);
        assert!(matches!(it.next(), Next::End));
        assert_eq!(it.state(), IteratorState::Ended);

        match it.next() {
            Next::Error(causes) => {
                assert_eq!(causes.len(), 1);
                assert_eq!(causes[0].component.as_deref(), Some("scripted"));
            }
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn empty_ready_batch_is_an_error() {
        let (mut it, _) = iterator(vec![Ok(0)]);
        assert_eq!(it.next().status(), NextStatus::Error);
        assert_eq!(it.state(), IteratorState::Errored);
    }

    #[test]
    fn dropped_batch_releases_messages() {
        let (mut it, _) = iterator(vec![Ok(3)]);
        let fixture_stream = match it.next() {
            Next::Ok(mut batch) => {
                let first = batch.next().unwrap();
                let stream = first.stream().acquire();
                first.release();
                stream
            }
            other => panic!("expected batch, got {other:?}"),
        };
        // Only the fixture and our handle remain once the batch is gone.
        assert_eq!(fixture_stream.ref_count(), 2);
    }

    #[test]
    fn release_finalizes_once() {
        let (mut it, finalized) = iterator(vec![Ok(1)]);
        let _ = it.next();
        it.release();
        assert_eq!(finalized.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn producer_errors_map_to_status() {
        struct Failing(bool);

        impl Producer for Failing {
            fn next(&mut self, _: &mut Vec<Message>) -> Result<Pull> {
                if self.0 { Err(GraphError::memory("no room")) } else { Err(GraphError::component("bad input")) }
            }
        }

        let port = PortAddress { component: ComponentId::new(0), direction: PortDirection::Output, index: 0 };
        let mut memory = MessageIterator::new(Box::new(Failing(true)), "src".into(), port);
        let mut generic = MessageIterator::new(Box::new(Failing(false)), "src".into(), port);

        match memory.next() {
            Next::MemoryError(causes) => assert!(causes[0].message.contains("no room")),
            other => panic!("expected memory error, got {other:?}"),
        }
        let error = generic.next().into_error().unwrap();
        assert!(!error.is_memory_error());
        assert_eq!(error.causes()[0].component.as_deref(), Some("src"));
    }
}
