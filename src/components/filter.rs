//! Filter forwarding the messages that match a predicate

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, trace};

use crate::component::{ComponentContext, Filter};
use crate::error::ErrorCause;
use crate::iterator::{IteratorContext, MessageIterator, Next, Producer, Pull};
use crate::message::Message;
use crate::port::Port;
use crate::{GraphError, Result};

type Predicate = dyn Fn(&Message) -> bool + Send + Sync;

/// Counters shared between a [`MessageFilter`] and its producers.
#[derive(Debug, Default)]
pub struct FilterStats {
    forwarded: AtomicU64,
    dropped: AtomicU64,
}

impl FilterStats {
    pub fn forwarded(&self) -> u64 {
        self.forwarded.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Filter with ports `in` and `out`.
///
/// Its producer creates the iterator of `in` when it is initialized, so a sink
/// creating its own iterator cascades creation up to the source.
#[derive(Clone)]
pub struct MessageFilter {
    predicate: Arc<Predicate>,
    stats: Arc<FilterStats>,
}

impl MessageFilter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Message) -> bool + Send + Sync + 'static,
    {
        Self { predicate: Arc::new(predicate), stats: Arc::default() }
    }

    /// Keep only event messages of the named event class.
    pub fn events_named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(move |message| message.as_event().is_some_and(|view| view.event().name() == name))
    }

    pub fn stats(&self) -> Arc<FilterStats> {
        Arc::clone(&self.stats)
    }
}

impl fmt::Debug for MessageFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFilter").field("stats", &self.stats).finish_non_exhaustive()
    }
}

impl Filter for MessageFilter {
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        context.add_input_port("in", None)?;
        context.add_output_port("out", None)?;
        Ok(())
    }

    fn create_producer(&mut self, _port: &Port) -> Result<Box<dyn Producer>> {
        Ok(Box::new(FilterProducer {
            predicate: Arc::clone(&self.predicate),
            stats: Arc::clone(&self.stats),
            name: String::new(),
            upstream: None,
        }))
    }

    fn finalize(&mut self) {
        debug!("Filter finalized: {} forwarded, {} dropped", self.stats.forwarded(), self.stats.dropped());
    }
}

struct FilterProducer {
    predicate: Arc<Predicate>,
    stats: Arc<FilterStats>,
    name: String,
    upstream: Option<MessageIterator>,
}

impl Producer for FilterProducer {
    fn initialize(&mut self, context: &mut IteratorContext<'_>) -> Result<()> {
        self.name = context.component_name().to_string();
        self.upstream = Some(context.create_upstream(0)?);
        Ok(())
    }

    fn next(&mut self, batch: &mut Vec<Message>) -> Result<Pull> {
        let Some(upstream) = self.upstream.as_mut() else {
            return Err(GraphError::invalid_state("filter pull", "upstream iterator not created"));
        };

        // Pull until something passes; an all-dropped batch is not a reason to report AGAIN.
        loop {
            match upstream.next() {
                Next::Ok(messages) => {
                    for message in messages {
                        if (self.predicate)(&message) {
                            batch.push(message);
                        } else {
                            message.release();
                            self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    if !batch.is_empty() {
                        self.stats.forwarded.fetch_add(batch.len() as u64, Ordering::Relaxed);
                        trace!("Filter '{}' forwarded {} messages", self.name, batch.len());
                        return Ok(Pull::Ready);
                    }
                }
                Next::Again => return Ok(Pull::Again),
                Next::End => return Ok(Pull::End),
                failure => {
                    let status = failure.status();
                    let mut causes = match failure.into_error() {
                        Some(error) => error.causes(),
                        None => Vec::new(),
                    };
                    causes.push(ErrorCause::new(format!("upstream pull failed ({})", status)).with_component(self.name.as_str()));
                    return Err(GraphError::Failed { status: status.into(), causes });
                }
            }
        }
    }

    fn finalize(&mut self) {
        if let Some(upstream) = self.upstream.take() {
            upstream.release();
        }
    }
}
