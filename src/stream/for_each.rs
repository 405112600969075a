//! # ForEach: consume a stream as a future.
//!
//! The future settles exactly once: with the completion value, with the value
//! of a done step returned by the callback, or with the first error. The
//! settlement slot is shared by all three handlers; whichever fires first takes
//! the sender.
//!
//! If the subscription is dropped without ever terminating (no producer keeps
//! its sink) the future fails with [`StreamError::Detached`] instead of hanging.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;

use crate::core::{Handlers, IntoStep, Step};
use crate::error::StreamError;
use crate::stream::Stream;

type Outcome<T> = Result<Option<T>, StreamError>;
type Slot<T> = Rc<RefCell<Option<oneshot::Sender<Outcome<T>>>>>;

/// Future returned by [`Species::for_each`](crate::Species::for_each).
#[must_use = "futures do nothing unless polled"]
pub struct ForEach<T> {
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T: 'static> ForEach<T> {
    pub(crate) fn start<F, R>(stream: &Stream<T>, mut f: F) -> Self
    where
        F: FnMut(T) -> R + 'static,
        R: IntoStep<T>,
    {
        let (tx, rx) = oneshot::channel();
        let slot: Slot<T> = Rc::new(RefCell::new(Some(tx)));
        let (on_next, on_throw, on_return) = (slot.clone(), slot.clone(), slot);

        let handlers = Handlers::new()
            .on_next(move |value| -> Step<T> {
                match f(value).into_step() {
                    Ok(step) if step.done => {
                        settle(&on_next, Ok(step.value));
                        Step::done()
                    }
                    Ok(_) => Step::more(),
                    Err(err) => {
                        settle(&on_next, Err(err));
                        Step::done()
                    }
                }
            })
            .on_throw(move |err| settle(&on_throw, Err(err)))
            .on_return(move |value| settle(&on_return, Ok(value)));

        match stream.listen(handlers) {
            Ok(_) => Self { rx },
            Err(err) => Self::failed(err),
        }
    }

    fn failed(err: StreamError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(err));
        Self { rx }
    }
}

fn settle<T>(slot: &Slot<T>, outcome: Outcome<T>) {
    let tx = slot.borrow_mut().take();
    if let Some(tx) = tx {
        // Receiver dropped: nobody is waiting for the outcome.
        let _ = tx.send(outcome);
    }
}

impl<T> Future for ForEach<T> {
    type Output = Result<Option<T>, StreamError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(StreamError::Detached)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Scheduler, Sink, Teardown};
    use crate::stream::Species;
    use std::cell::Cell;

    #[test]
    fn test_resolves_with_completion_value() {
        let scheduler = Scheduler::new();
        let sinks: Rc<RefCell<Vec<Sink<u32>>>> = Rc::default();
        let s = sinks.clone();
        let stream = Stream::new(move |sink: Sink<u32>| s.borrow_mut().push(sink));

        let sum = Rc::new(Cell::new(0));
        let acc = sum.clone();
        let fut = stream.for_each(move |v| acc.set(acc.get() + v));

        let sink = sinks.borrow()[0].clone();
        scheduler.schedule(move || {
            sink.next(2)?;
            sink.next(3)?;
            sink.complete(Some(10))?;
            Ok(())
        });

        assert_eq!(scheduler.block_on(fut), Ok(Ok(Some(10))));
        assert_eq!(sum.get(), 5);
    }

    #[test]
    fn test_done_step_resolves_and_cancels_producer() {
        let scheduler = Scheduler::new();
        let cleaned = Rc::new(Cell::new(false));
        let c = cleaned.clone();
        let sched = scheduler.clone();
        let stream = Stream::new(move |sink: Sink<u32>| {
            let c = c.clone();
            let s = sink.clone();
            sched.schedule(move || {
                s.next(1)?;
                s.next(2)?;
                Ok(())
            });
            Teardown::new(move || c.set(true))
        });

        let fut = stream.for_each(|v: u32| if v == 1 { Step::done_with(0) } else { Step::more() });
        assert_eq!(scheduler.block_on(fut), Ok(Ok(Some(0))));
        assert!(cleaned.get());
    }

    #[test]
    fn test_rejects_with_stream_error() {
        let scheduler = Scheduler::new();
        let stream = Stream::<u32>::of(&scheduler, [1, 2])
            .try_map(|v| if v == 2 { Err(StreamError::failed("boom")) } else { Ok(v) });

        let fut = stream.for_each(|_| ());
        assert_eq!(scheduler.block_on(fut), Ok(Err(StreamError::failed("boom"))));
    }

    #[test]
    fn test_callback_error_rejects() {
        let scheduler = Scheduler::new();
        let stream = Stream::<u32>::of(&scheduler, [1, 2, 3]);

        let fut = stream.for_each(|v| {
            if v == 2 { Err(StreamError::failed("callback")) } else { Ok(()) }
        });
        assert_eq!(scheduler.block_on(fut), Ok(Err(StreamError::failed("callback"))));
    }

    #[test]
    fn test_abandoned_subscription_is_detached() {
        let scheduler = Scheduler::new();
        let stream: Stream<u32> = Stream::new(|_sink| ());

        let fut = stream.for_each(|_| ());
        assert_eq!(scheduler.block_on(fut), Ok(Err(StreamError::Detached)));
    }

    #[test]
    fn test_initializer_error_rejects() {
        let scheduler = Scheduler::new();
        let stream: Stream<u32> = Stream::new(|_sink| Err::<(), _>(StreamError::failed("init")));

        let fut = stream.for_each(|_| ());
        assert_eq!(scheduler.block_on(fut), Ok(Err(StreamError::failed("init"))));
    }
}
