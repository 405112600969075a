//! # AsyncIter: pull values out of a push stream.
//!
//! Subscribes on creation and buffers pushed values in FIFO order until they
//! are pulled. Values queued before completion are still yielded; the
//! completion value comes last with `done = true`. An error is yielded once,
//! after which the iterator reports done.
//!
//! Dropping the iterator cancels the subscription, as does an explicit
//! [`AsyncIter::complete`] or [`AsyncIter::throw`].
//!
//! ```
//! use futures::StreamExt;
//! use streamvisor::{Scheduler, Species, Stream};
//!
//! let scheduler = Scheduler::new();
//! let stream: Stream<u32> = Stream::of(&scheduler, [1, 2, 3]);
//! let values = stream.iter().unwrap();
//!
//! let collected = scheduler.block_on(values.collect::<Vec<_>>()).unwrap();
//! assert_eq!(collected, vec![Ok(1), Ok(2), Ok(3)]);
//! ```

use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use futures::future::poll_fn;
use tracing::debug;

use crate::core::{Cancel, Handlers};
use crate::error::StreamError;
use crate::stream::Stream;

/// One pull result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IterStep<T> {
    /// The pulled value, or the completion value once done.
    pub value: Option<T>,
    /// True once the stream has terminated.
    pub done: bool,
}

impl<T> IterStep<T> {
    fn item(value: T) -> Self {
        Self { value: Some(value), done: false }
    }

    fn end(value: Option<T>) -> Self {
        Self { value, done: true }
    }
}

enum End<T> {
    Open,
    Completed(Option<T>),
    Failed(StreamError),
    Finished,
}

struct Buffer<T> {
    queue: VecDeque<T>,
    end: End<T>,
    waker: Option<Waker>,
}

impl<T> Buffer<T> {
    fn push(cell: &RefCell<Self>, f: impl FnOnce(&mut Self)) {
        let waker = {
            let mut buf = cell.borrow_mut();
            f(&mut buf);
            buf.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Result<IterStep<T>, StreamError>> {
        if let Some(value) = self.queue.pop_front() {
            return Poll::Ready(Ok(IterStep::item(value)));
        }
        match mem::replace(&mut self.end, End::Finished) {
            End::Open => {
                self.end = End::Open;
                self.waker = Some(cx.waker().clone());
                Poll::Pending
            }
            End::Completed(value) => Poll::Ready(Ok(IterStep::end(value))),
            End::Failed(err) => Poll::Ready(Err(err)),
            End::Finished => Poll::Ready(Ok(IterStep::end(None))),
        }
    }
}

/// Pull-based view of a stream, returned by [`Species::iter`](crate::Species::iter).
pub struct AsyncIter<T> {
    buffer: Rc<RefCell<Buffer<T>>>,
    cancel: Cancel,
}

impl<T: 'static> AsyncIter<T> {
    pub(crate) fn start(stream: &Stream<T>) -> Result<Self, StreamError> {
        let buffer = Rc::new(RefCell::new(Buffer {
            queue: VecDeque::new(),
            end: End::Open,
            waker: None,
        }));

        let (on_next, on_throw, on_return) = (buffer.clone(), buffer.clone(), buffer.clone());
        let cancel = stream.listen(
            Handlers::new()
                .on_next(move |value: T| Buffer::push(&on_next, |buf| buf.queue.push_back(value)))
                .on_throw(move |err| Buffer::push(&on_throw, |buf| buf.end = End::Failed(err)))
                .on_return(move |value| {
                    Buffer::push(&on_return, |buf| buf.end = End::Completed(value))
                }),
        )?;

        Ok(Self { buffer, cancel })
    }

    /// Pulls the next value, waiting until one is pushed or the stream ends.
    pub fn next(&mut self) -> impl Future<Output = Result<IterStep<T>, StreamError>> + '_ {
        poll_fn(move |cx| self.buffer.borrow_mut().poll_step(cx))
    }

    /// Stops iterating: cancels the subscription and drops buffered values.
    pub async fn complete(&mut self, value: Option<T>) -> Result<IterStep<T>, StreamError> {
        self.finish()?;
        Ok(IterStep::end(value))
    }

    /// Stops iterating with an error: cancels the subscription and yields `err`.
    pub async fn throw(&mut self, err: StreamError) -> Result<IterStep<T>, StreamError> {
        self.finish()?;
        Err(err)
    }

    /// Number of values pushed but not yet pulled.
    pub fn queued(&self) -> usize {
        self.buffer.borrow().queue.len()
    }

    fn finish(&mut self) -> Result<(), StreamError> {
        self.cancel.cancel()?;
        let mut buf = self.buffer.borrow_mut();
        buf.queue.clear();
        buf.end = End::Finished;
        Ok(())
    }
}

impl<T: 'static> futures::Stream for AsyncIter<T> {
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.buffer.borrow_mut().poll_step(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(err)) => Poll::Ready(Some(Err(err))),
            Poll::Ready(Ok(IterStep { done: true, .. })) => Poll::Ready(None),
            Poll::Ready(Ok(IterStep { value, .. })) => Poll::Ready(value.map(Ok)),
        }
    }
}

impl<T> Drop for AsyncIter<T> {
    fn drop(&mut self) {
        if let Err(err) = self.cancel.cancel() {
            debug!(error = %err, "cancel on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Scheduler, Sink, SubscriptionState};
    use crate::stream::Species;
    use futures::StreamExt;

    fn manual() -> (Stream<u32>, Rc<RefCell<Vec<Sink<u32>>>>) {
        let sinks: Rc<RefCell<Vec<Sink<u32>>>> = Rc::default();
        let s = sinks.clone();
        (Stream::new(move |sink| s.borrow_mut().push(sink)), sinks)
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_values_pushed_early_are_buffered() {
        let (stream, sinks) = manual();
        let mut iter = stream.iter().unwrap();

        let sink = sinks.borrow()[0].clone();
        sink.next(1).unwrap();
        sink.next(2).unwrap();
        sink.complete(Some(9)).unwrap();

        assert_eq!(iter.queued(), 2);
        assert_eq!(iter.next().await, Ok(IterStep::item(1)));
        assert_eq!(iter.next().await, Ok(IterStep::item(2)));
        assert_eq!(iter.next().await, Ok(IterStep::end(Some(9))));
        assert_eq!(iter.next().await, Ok(IterStep::end(None)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_error_is_yielded_once() {
        let (stream, sinks) = manual();
        let mut iter = stream.iter().unwrap();

        let sink = sinks.borrow()[0].clone();
        sink.next(1).unwrap();
        sink.throw(StreamError::failed("x")).unwrap();

        assert_eq!(iter.next().await, Ok(IterStep::item(1)));
        assert_eq!(iter.next().await, Err(StreamError::failed("x")));
        assert_eq!(iter.next().await, Ok(IterStep::end(None)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_complete_cancels_subscription() {
        let (stream, sinks) = manual();
        let mut iter = stream.iter().unwrap();
        let sink = sinks.borrow()[0].clone();
        sink.next(1).unwrap();

        assert_eq!(iter.complete(Some(5)).await, Ok(IterStep::end(Some(5))));
        assert_eq!(sink.state(), SubscriptionState::Closed);
        assert_eq!(iter.next().await, Ok(IterStep::end(None)));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_throw_cancels_and_yields_error() {
        let (stream, sinks) = manual();
        let mut iter = stream.iter().unwrap();

        assert_eq!(iter.throw(StreamError::Detached).await, Err(StreamError::Detached));
        assert!(sinks.borrow()[0].is_done());
    }

    #[test]
    fn test_drop_cancels_subscription() {
        let (stream, sinks) = manual();
        let iter = stream.iter().unwrap();
        drop(iter);
        assert_eq!(sinks.borrow()[0].state(), SubscriptionState::Closed);
    }

    #[test]
    fn test_consumed_as_futures_stream() {
        let scheduler = Scheduler::new();
        let stream: Stream<u32> = Stream::of(&scheduler, 1..=4).filter(|v| v % 2 == 1);
        let iter = stream.iter().unwrap();

        let collected = scheduler.block_on(iter.collect::<Vec<_>>()).unwrap();
        assert_eq!(collected, vec![Ok(1), Ok(3)]);
    }

    #[test]
    fn test_pending_until_pushed() {
        let scheduler = Scheduler::new();
        let (stream, sinks) = manual();
        let mut iter = stream.iter().unwrap();

        assert_eq!(scheduler.block_on(iter.next()), Err(StreamError::Stalled));

        let sink = sinks.borrow()[0].clone();
        scheduler.schedule(move || sink.next(7).map(|_| ()));
        assert_eq!(scheduler.block_on(iter.next()), Ok(Ok(IterStep::item(7))));
    }
}
