//! Sink handing adapted events to async consumers through a bounded channel

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, trace, warn};

use crate::adapters::{AdapterValidation, EventAdapter};
use crate::component::{ComponentContext, Sink, UpstreamIterator};
use crate::config::RunConfig;
use crate::status::ConsumeStatus;
use crate::stream::EventStream;
use crate::{GraphError, Result};

/// Stream class id and event class id.
type ClassKey = (u64, u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    Drained,
    Full,
    Closed,
}

/// Sink with one input port `in` that adapts each event to `T` and sends it to an
/// [`EventStream`].
///
/// Events whose class the adapter rejects are skipped. A full channel makes
/// `consume` return `AGAIN`; adapted values wait in order until there is room, so
/// none is lost. A dropped receiver ends the sink.
pub struct ChannelSink<T: EventAdapter + Send + 'static> {
    upstream: UpstreamIterator,
    sender: Option<mpsc::Sender<T>>,
    pending: VecDeque<T>,
    validations: HashMap<ClassKey, Option<AdapterValidation>>,
    upstream_ended: bool,
    sent: u64,
    skipped: u64,
}

impl<T: EventAdapter + Send + 'static> ChannelSink<T> {
    /// Create a sink and the stream receiving its values.
    pub fn channel(capacity: usize) -> Result<(Self, EventStream<T>)> {
        if capacity == 0 {
            return Err(GraphError::config("channel capacity must be at least 1"));
        }
        let (sender, receiver) = mpsc::channel(capacity);
        let sink = Self {
            upstream: UpstreamIterator::new(),
            sender: Some(sender),
            pending: VecDeque::new(),
            validations: HashMap::new(),
            upstream_ended: false,
            sent: 0,
            skipped: 0,
        };
        Ok((sink, EventStream::new(receiver)))
    }

    /// Create a sink sized by [`RunConfig::channel_capacity`].
    pub fn from_config(config: &RunConfig) -> Result<(Self, EventStream<T>)> {
        Self::channel(config.channel_capacity)
    }

    /// Values sent to the stream so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Events skipped because the adapter rejected their class.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Send pending values in order.
    fn flush(&mut self) -> Flush {
        let Some(sender) = self.sender.as_ref() else {
            return Flush::Closed;
        };
        while let Some(value) = self.pending.pop_front() {
            match sender.try_send(value) {
                Ok(()) => self.sent += 1,
                Err(TrySendError::Full(value)) => {
                    self.pending.push_front(value);
                    return Flush::Full;
                }
                Err(TrySendError::Closed(_)) => return Flush::Closed,
            }
        }
        Flush::Drained
    }

    fn close(&mut self) -> ConsumeStatus {
        self.upstream.release();
        self.sender = None;
        debug!("Channel sink closed after {} values ({} events skipped)", self.sent, self.skipped);
        ConsumeStatus::End
    }
}

impl<T: EventAdapter + Send + 'static> Sink for ChannelSink<T> {
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        context.add_input_port("in", None)?;
        Ok(())
    }

    fn graph_is_configured(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        self.upstream.create(context, 0)
    }

    fn consume(&mut self) -> Result<ConsumeStatus> {
        let sent_before = self.sent;
        match self.flush() {
            Flush::Drained => {}
            Flush::Full if self.sent > sent_before => return Ok(ConsumeStatus::Ok),
            Flush::Full => return Ok(ConsumeStatus::Again),
            Flush::Closed => {
                debug!("Event stream receiver dropped");
                return Ok(self.close());
            }
        }
        if self.upstream_ended {
            return Ok(self.close());
        }

        let pending = &mut self.pending;
        let validations = &mut self.validations;
        let skipped = &mut self.skipped;
        let status = self.upstream.consume_with(|message| {
            let Some(view) = message.as_event() else {
                return Ok(());
            };
            let event = view.event();
            let key = (event.stream().class().id(), event.class().id());
            let validation = validations.entry(key).or_insert_with(|| match T::validate_class(event.class()) {
                Ok(validation) => Some(validation),
                Err(e) => {
                    warn!("Skipping events of class '{}': {}", event.name(), e);
                    None
                }
            });
            match validation {
                Some(validation) => {
                    pending.try_reserve(1)?;
                    pending.push_back(T::adapt(event, validation));
                }
                None => *skipped += 1,
            }
            Ok(())
        })?;

        match status {
            ConsumeStatus::End => {
                self.upstream_ended = true;
                if self.pending.is_empty() {
                    return Ok(self.close());
                }
                trace!("Upstream ended with {} values pending", self.pending.len());
                Ok(ConsumeStatus::Ok)
            }
            ConsumeStatus::Ok => {
                // Progress was made even if the channel is now full.
                if self.flush() == Flush::Closed {
                    return Ok(self.close());
                }
                Ok(ConsumeStatus::Ok)
            }
            other => Ok(other),
        }
    }

    fn finalize(&mut self) {
        if !self.pending.is_empty() {
            warn!("Channel sink finalized with {} undelivered values", self.pending.len());
        }
        self.pending.clear();
        self.upstream.release();
        self.sender = None;
    }
}
