//! Source emitting a deterministic stream of numbered events

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::component::{ComponentContext, Source};
use crate::iterator::{Producer, Pull};
use crate::message::Message;
use crate::object::Ref;
use crate::port::Port;
use crate::types::{ClockClass, Event, EventClass, FieldClass, Stream, StreamClass, Trace, TraceClass};
use crate::{GraphError, Result};

/// Injected failure of a [`SyntheticSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticFailure {
    /// Events delivered before the failure
    pub after_events: u64,
    /// Report `MEMORY_ERROR` instead of `ERROR`
    #[serde(default)]
    pub memory: bool,
}

/// Shape of the synthetic stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Number of events between stream beginning and end
    pub events: u64,
    /// Maximum messages per batch
    pub batch_size: usize,
    /// Initial pulls answered with AGAIN
    pub again_replies: u32,
    pub event_name: String,
    pub failure: Option<SyntheticFailure>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self { events: 3, batch_size: 1, again_replies: 0, event_name: "synthetic_event".to_string(), failure: None }
    }
}

/// Source with one output port `out` and one stream.
///
/// Emits stream beginning (clock 0), events `1..=N` with payload `{ index }` and
/// clock snapshot `index`, then stream end (clock `N + 1`).
#[derive(Debug)]
pub struct SyntheticSource {
    config: SyntheticConfig,
    event_class: Ref<EventClass>,
    stream: Ref<Stream>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(GraphError::config("synthetic batch size must be at least 1"));
        }

        let clock_class = Ref::new(ClockClass::default().with_name("synthetic"));
        let mut stream_class = StreamClass::new().with_name("synthetic").with_default_clock_class(clock_class);
        let payload = FieldClass::structure().with_member("index", FieldClass::of::<u64>())?;
        let event_class = stream_class.add_event_class(EventClass::new(config.event_name.as_str()).with_payload(payload)?)?;

        let mut trace_class = TraceClass::new();
        let stream_class = trace_class.add_stream_class(stream_class)?;
        let trace = Ref::new(Trace::new(Ref::new(trace_class)).with_name("synthetic"));
        let stream = Ref::new(Stream::new(&trace, &stream_class)?);

        Ok(Self { config, event_class, stream })
    }

    /// Event class of the emitted events.
    pub fn event_class(&self) -> &Ref<EventClass> {
        &self.event_class
    }

    pub fn stream(&self) -> &Ref<Stream> {
        &self.stream
    }
}

impl Source for SyntheticSource {
    fn initialize(&mut self, context: &mut ComponentContext<'_>) -> Result<()> {
        context.add_output_port("out", None)?;
        Ok(())
    }

    fn create_producer(&mut self, port: &Port) -> Result<Box<dyn Producer>> {
        debug!("Synthetic producer for port '{}': {} events", port.name(), self.config.events);
        Ok(Box::new(SyntheticProducer {
            config: self.config.clone(),
            event_class: self.event_class.acquire(),
            stream: self.stream.acquire(),
            again_remaining: self.config.again_replies,
            position: Position::Beginning,
        }))
    }

    fn finalize(&mut self) {
        info!("Synthetic source finalized");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Beginning,
    Event(u64),
    End,
    Done,
}

struct SyntheticProducer {
    config: SyntheticConfig,
    event_class: Ref<EventClass>,
    stream: Ref<Stream>,
    again_remaining: u32,
    position: Position,
}

impl SyntheticProducer {
    fn failure_due(&self, index: u64) -> Option<GraphError> {
        let failure = self.config.failure?;
        if index <= failure.after_events {
            return None;
        }
        let context = format!("synthetic failure after {} events", failure.after_events);
        Some(if failure.memory { GraphError::memory(context) } else { GraphError::component(context) })
    }

    fn event(&self, index: u64) -> Result<Message> {
        let mut event = Event::new(&self.event_class, &self.stream)?;
        event.set_payload_value("index", index)?;
        Message::event_at(event, index)
    }
}

impl Producer for SyntheticProducer {
    fn next(&mut self, batch: &mut Vec<Message>) -> Result<Pull> {
        if self.again_remaining > 0 {
            self.again_remaining -= 1;
            return Ok(Pull::Again);
        }

        while batch.len() < self.config.batch_size {
            match self.position {
                Position::Beginning => {
                    batch.push(Message::stream_beginning_at(&self.stream, 0)?);
                    self.position = if self.config.events == 0 { Position::End } else { Position::Event(1) };
                }
                Position::Event(index) => {
                    if let Some(error) = self.failure_due(index) {
                        if batch.is_empty() {
                            return Err(error);
                        }
                        // Deliver what is ready; the failure is reported on the next pull.
                        break;
                    }
                    batch.push(self.event(index)?);
                    self.position =
                        if index == self.config.events { Position::End } else { Position::Event(index + 1) };
                }
                Position::End => {
                    batch.push(Message::stream_end_at(&self.stream, self.config.events + 1)?);
                    self.position = Position::Done;
                }
                Position::Done => break,
            }
        }

        Ok(if batch.is_empty() { Pull::End } else { Pull::Ready })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;

    fn drain(producer: &mut dyn Producer) -> (Vec<Vec<Message>>, Pull) {
        let mut batches = Vec::new();
        loop {
            let mut batch = Vec::new();
            match producer.next(&mut batch).unwrap() {
                Pull::Ready => batches.push(batch),
                pull => return (batches, pull),
            }
        }
    }

    fn producer(config: SyntheticConfig) -> Box<dyn Producer> {
        let source = SyntheticSource::new(config).unwrap();
        Box::new(SyntheticProducer {
            config: source.config.clone(),
            event_class: source.event_class.acquire(),
            stream: source.stream.acquire(),
            again_remaining: source.config.again_replies,
            position: Position::Beginning,
        })
    }

    #[test]
    fn emits_framed_numbered_events() {
        let mut producer = producer(SyntheticConfig { events: 3, batch_size: 2, ..Default::default() });
        let (batches, last) = drain(producer.as_mut());
        assert_eq!(last, Pull::End);
        assert_eq!(batches.iter().map(Vec::len).collect::<Vec<_>>(), [2, 2, 1]);

        let messages: Vec<Message> = batches.into_iter().flatten().collect();
        assert_eq!(messages.first().map(Message::message_type), Some(MessageType::StreamBeginning));
        assert_eq!(messages.last().map(Message::message_type), Some(MessageType::StreamEnd));

        let clocks: Vec<u64> =
            messages.iter().filter_map(|message| message.default_clock_snapshot().map(|s| s.value())).collect();
        assert_eq!(clocks, [0, 1, 2, 3, 4]);

        let indices: Vec<u64> = messages
            .iter()
            .filter_map(Message::as_event)
            .map(|view| view.event().payload_value::<u64>("index").unwrap())
            .collect();
        assert_eq!(indices, [1, 2, 3]);
    }

    #[test]
    fn again_replies_come_first() {
        let mut producer = producer(SyntheticConfig { again_replies: 2, ..Default::default() });
        let mut batch = Vec::new();
        assert_eq!(producer.next(&mut batch).unwrap(), Pull::Again);
        assert_eq!(producer.next(&mut batch).unwrap(), Pull::Again);
        assert_eq!(producer.next(&mut batch).unwrap(), Pull::Ready);
        assert!(batch[0].as_stream_beginning().is_some());
    }

    #[test]
    fn failure_after_delivered_events() {
        let failure = SyntheticFailure { after_events: 1, memory: true };
        let mut producer = producer(SyntheticConfig { batch_size: 10, failure: Some(failure), ..Default::default() });

        let mut batch = Vec::new();
        assert_eq!(producer.next(&mut batch).unwrap(), Pull::Ready);
        assert_eq!(batch.len(), 2);

        let error = producer.next(&mut Vec::new()).unwrap_err();
        assert!(error.is_memory_error());
    }

    #[test]
    fn zero_events_still_frame_the_stream() {
        let mut producer = producer(SyntheticConfig { events: 0, batch_size: 4, ..Default::default() });
        let (batches, _) = drain(producer.as_mut());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let config = SyntheticConfig { batch_size: 0, ..Default::default() };
        assert!(matches!(SyntheticSource::new(config), Err(GraphError::Config { .. })));
    }
}
