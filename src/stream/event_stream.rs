//! Async stream of adapted events

use futures::{Stream, ready};
use pin_project_lite::pin_project;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_stream::wrappers::ReceiverStream;

pin_project! {
    /// Receiving end of a [`ChannelSink`](crate::components::ChannelSink).
    ///
    /// Yields adapted events in the order the sink consumed them and ends once the
    /// sink ended or was finalized.
    pub struct EventStream<T> {
        #[pin]
        inner: ReceiverStream<T>,
        received: u64,
    }
}

impl<T> EventStream<T> {
    pub(crate) fn new(receiver: mpsc::Receiver<T>) -> Self {
        Self { inner: ReceiverStream::new(receiver), received: 0 }
    }

    /// Number of values received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Receive without waiting.
    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        let value = self.inner.as_mut().try_recv()?;
        self.received += 1;
        Ok(value)
    }

    /// Stop accepting values; the sink sees a dropped receiver and ends.
    pub fn close(&mut self) {
        self.inner.close();
    }
}

impl<T> Stream for EventStream<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        let this = self.project();
        let item = ready!(this.inner.poll_next(cx));
        if item.is_some() {
            *this.received += 1;
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
