//! # Source: broadcasting controller paired with a stream.
//!
//! The paired stream's initializer registers each new listener's sink in the
//! shared [`SinkSet`]; its teardown removes it again. Broadcasting iterates a
//! snapshot and isolates listeners from each other: an error raised by one
//! listener is reported through the scheduler and the remaining listeners are
//! still served.
//!
//! ## Rules
//! - After `throw` or `complete` the source is done: later broadcasts only
//!   reach sinks that are still open (none, normally), and late listeners get a
//!   completion signal on a later scheduler turn.
//! - Registering the same callback listener twice while the first registration
//!   is open yields the first registration's [`Cancel`]: one delivery per
//!   broadcast, one cancel removes it.
//! - Handler-set listeners are never de-duplicated.
//!
//! ## Example
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use streamvisor::{Scheduler, Source};
//!
//! let scheduler = Scheduler::new();
//! let source = Source::new(&scheduler);
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let out = seen.clone();
//! source.stream().listen(move |v: u32| out.borrow_mut().push(v)).unwrap();
//!
//! source.next(1);
//! source.complete(None);
//! source.next(2); // done: dropped
//!
//! assert_eq!(*seen.borrow(), vec![1]);
//! ```

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, trace};

use super::sink_set::SinkSet;
use crate::core::{Cancel, IntoListener, Listener, Scheduler, Sink, Step, Teardown};
use crate::error::StreamError;
use crate::stream::{Listen, Stream};

struct Shared<T> {
    sinks: SinkSet<T>,
    done: Rc<Cell<bool>>,
    scheduler: Scheduler,
}

/// Multicast controller. Cheap to clone; clones control the same listeners.
pub struct Source<T> {
    shared: Rc<Shared<T>>,
    stream: Stream<T>,
}

impl<T: Clone + 'static> Source<T> {
    /// Creates a source whose late-join completions run on `scheduler`.
    pub fn new(scheduler: &Scheduler) -> Self {
        let done = Rc::new(Cell::new(false));
        let shared = Rc::new(Shared {
            sinks: SinkSet::new(),
            done: Rc::clone(&done),
            scheduler: scheduler.clone(),
        });

        // The stream may outlive every controller handle; it keeps the done
        // flag and the scheduler, and reaches the registry weakly.
        let weak = Rc::downgrade(&shared);
        let scheduler = scheduler.clone();
        let stream = Stream::new(move |sink: Sink<T>| register(&weak, &done, &scheduler, sink));

        Self { shared, stream }
    }

    /// The paired stream.
    pub fn stream(&self) -> &Stream<T> {
        &self.stream
    }

    /// Broadcasts a value to every open listener.
    ///
    /// Listener errors are reported, not returned. Always asks the caller to
    /// continue.
    pub fn next(&self, value: T) -> Step<T> {
        self.broadcast(|sink| sink.next(value.clone()));
        Step::more()
    }

    /// Broadcasts an error and marks the source done.
    pub fn throw(&self, err: StreamError) -> Step<T> {
        self.shared.done.set(true);
        self.broadcast(|sink| sink.throw(err.clone()));
        Step::done()
    }

    /// Broadcasts completion and marks the source done.
    pub fn complete(&self, value: Option<T>) -> Step<T> {
        self.shared.done.set(true);
        self.broadcast(|sink| sink.complete(value.clone()));
        Step::done()
    }

    /// Subscribes a listener to the paired stream, de-duplicating callbacks.
    pub fn listen(&self, listener: impl IntoListener<T>) -> Result<Cancel, StreamError> {
        let listener = listener.into_listener();
        if !listener.is_callback() {
            return self.stream.listen(listener);
        }

        let key = listener.id();
        if let Some(cancel) = self.shared.sinks.callback(key) {
            trace!("callback already registered");
            return Ok(cancel);
        }
        let cancel = self.stream.listen(listener)?;
        self.shared.sinks.remember(key, cancel.clone());
        Ok(cancel)
    }

    /// True once `throw` or `complete` has been called.
    pub fn is_done(&self) -> bool {
        self.shared.done.get()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.shared.sinks.len()
    }

    /// True if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn broadcast(&self, mut send: impl FnMut(&Sink<T>) -> Result<Step<T>, StreamError>) {
        for sink in self.shared.sinks.snapshot() {
            if let Err(err) = send(&sink) {
                self.shared.scheduler.report(err);
            }
        }
    }
}

fn register<T: 'static>(
    weak: &Weak<Shared<T>>,
    done: &Cell<bool>,
    scheduler: &Scheduler,
    sink: Sink<T>,
) -> Option<Teardown> {
    // Without a controller nothing will ever be broadcast.
    let Some(shared) = weak.upgrade().filter(|_| !done.get()) else {
        trace!("late listener: completion scheduled");
        scheduler.schedule(move || sink.complete(None).map(|_| ()));
        return None;
    };

    let id = shared.sinks.insert(sink);
    debug!(listeners = shared.sinks.len(), "listener registered");

    let weak = Rc::downgrade(&shared);
    Some(Teardown::new(move || {
        if let Some(shared) = weak.upgrade() {
            shared.sinks.remove(id);
            debug!(listeners = shared.sinks.len(), "listener removed");
        }
    }))
}

impl<T> Clone for Source<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
            stream: self.stream.clone(),
        }
    }
}

impl<T> fmt::Debug for Source<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("done", &self.shared.done.get())
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Listen<T> for Source<T> {
    fn listen_with(&self, listener: Listener<T>) -> Result<Cancel, StreamError> {
        self.listen(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Handlers, SchedulerConfig, SubscriptionState};
    use crate::reporters::Collector;
    use std::cell::{Cell, RefCell};

    fn collected() -> (Scheduler, Collector) {
        let collector = Collector::new();
        let scheduler = Scheduler::builder(SchedulerConfig::default())
            .with_reporter(collector.clone())
            .build();
        (scheduler, collector)
    }

    #[test]
    fn test_broadcast_follows_registrations() {
        let scheduler = Scheduler::new();
        let (source, stream) = Stream::source(&scheduler);
        let a = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::new(RefCell::new(Vec::new()));

        let out = a.clone();
        let cancel_a = stream.listen(move |v: u32| out.borrow_mut().push(v)).unwrap();
        let out = b.clone();
        let cancel_b = stream.listen(move |v: u32| out.borrow_mut().push(v)).unwrap();

        source.next(1);
        cancel_a.cancel().unwrap();
        source.next(2);
        cancel_b.cancel().unwrap();
        source.next(3);

        assert_eq!(*a.borrow(), vec![1]);
        assert_eq!(*b.borrow(), vec![1, 2]);
        assert!(source.is_empty());
    }

    #[test]
    fn test_listener_error_is_isolated() {
        let (scheduler, collector) = collected();
        let source = Source::new(&scheduler);
        let hits = Rc::new(Cell::new(0));

        for k in 0..3u32 {
            let h = hits.clone();
            source
                .stream()
                .listen(move |_: u32| -> Result<(), StreamError> {
                    h.set(h.get() + 1);
                    if k == 1 { Err(StreamError::failed("listener 1")) } else { Ok(()) }
                })
                .unwrap();
        }

        assert_eq!(source.next(5), Step::more());
        assert_eq!(hits.get(), 3);
        assert_eq!(collector.errors(), vec![StreamError::failed("listener 1")]);
    }

    #[test]
    fn test_complete_removes_listeners() {
        let scheduler = Scheduler::new();
        let source: Source<u32> = Source::new(&scheduler);
        let returns = Rc::new(Cell::new(0));

        for _ in 0..2 {
            let r = returns.clone();
            source
                .stream()
                .listen(Handlers::new().on_return(move |_| r.set(r.get() + 1)))
                .unwrap();
        }

        assert_eq!(source.complete(None), Step::done());
        assert!(source.is_done());
        assert!(source.is_empty());
        assert_eq!(returns.get(), 2);
    }

    #[test]
    fn test_throw_without_handler_is_reported() {
        let (scheduler, collector) = collected();
        let source: Source<u32> = Source::new(&scheduler);
        source.stream().listen(|_: u32| ()).unwrap();

        source.throw(StreamError::failed("fatal"));
        assert_eq!(collector.take(), vec![StreamError::failed("fatal")]);
    }

    #[test]
    fn test_late_listener_completes_on_later_turn() {
        let scheduler = Scheduler::new();
        let source: Source<u32> = Source::new(&scheduler);
        source.complete(None);

        let done = Rc::new(Cell::new(false));
        let d = done.clone();
        let cancel = source
            .stream()
            .listen(Handlers::new().on_return(move |_| d.set(true)))
            .unwrap();

        assert!(!done.get());
        scheduler.run_until_idle();
        assert!(done.get());
        assert_eq!(cancel.state(), SubscriptionState::Closed);
        assert!(source.is_empty());
    }

    #[test]
    fn test_late_listener_after_throw_completes() {
        let (scheduler, collector) = collected();
        let source: Source<u32> = Source::new(&scheduler);
        source.throw(StreamError::failed("boom"));
        assert!(source.is_done());

        let done = Rc::new(Cell::new(false));
        let thrown = Rc::new(Cell::new(false));
        let (d, t) = (done.clone(), thrown.clone());
        let cancel = source
            .stream()
            .listen(
                Handlers::new()
                    .on_throw(move |_| t.set(true))
                    .on_return(move |_| d.set(true)),
            )
            .unwrap();

        assert!(!done.get());
        scheduler.run_until_idle();
        assert!(done.get());
        assert!(!thrown.get());
        assert_eq!(cancel.state(), SubscriptionState::Closed);
        assert!(collector.errors().is_empty());
    }

    #[test]
    fn test_late_listener_after_controller_dropped() {
        let scheduler = Scheduler::new();
        let (source, stream) = Stream::<u32>::source(&scheduler);
        source.complete(None);
        drop(source);

        let done = Rc::new(Cell::new(false));
        let d = done.clone();
        let cancel = stream
            .listen(Handlers::new().on_return(move |_| d.set(true)))
            .unwrap();

        assert!(!done.get());
        assert_eq!(cancel.state(), SubscriptionState::Ready);
        scheduler.run_until_idle();
        assert!(done.get());
        assert_eq!(cancel.state(), SubscriptionState::Closed);
    }

    #[test]
    fn test_listener_on_dropped_open_source_completes() {
        let scheduler = Scheduler::new();
        let (source, stream) = Stream::<u32>::source(&scheduler);
        drop(source);

        let done = Rc::new(Cell::new(false));
        let d = done.clone();
        stream
            .listen(Handlers::new().on_return(move |_| d.set(true)))
            .unwrap();

        scheduler.run_until_idle();
        assert!(done.get());
    }

    #[test]
    fn test_same_callback_registers_once() {
        let scheduler = Scheduler::new();
        let source: Source<u32> = Source::new(&scheduler);
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        let callback = Listener::callback(move |_: u32| h.set(h.get() + 1));

        let first = source.listen(callback.clone()).unwrap();
        let second = source.listen(callback.clone()).unwrap();
        assert!(Cancel::ptr_eq(&first, &second));

        source.next(1);
        assert_eq!(hits.get(), 1);

        second.cancel().unwrap();
        source.next(2);
        assert_eq!(hits.get(), 1);
        assert!(source.is_empty());

        // A fresh registration after the first one closed.
        source.listen(callback).unwrap();
        source.next(3);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_handler_sets_are_not_deduplicated() {
        let scheduler = Scheduler::new();
        let source: Source<u32> = Source::new(&scheduler);
        let listener = Listener::new(Handlers::new().on_next(|_: u32| ()));

        source.listen(listener.clone()).unwrap();
        source.listen(listener).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_listener_cancelling_itself_mid_broadcast() {
        let scheduler = Scheduler::new();
        let source: Source<u32> = Source::new(&scheduler);
        let slot: Rc<RefCell<Option<Cancel>>> = Rc::default();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let (s, out) = (slot.clone(), seen.clone());
        let cancel = source
            .stream()
            .listen(move |v: u32| {
                out.borrow_mut().push(v);
                if let Some(cancel) = s.borrow().as_ref() {
                    cancel.cancel().unwrap();
                }
            })
            .unwrap();
        *slot.borrow_mut() = Some(cancel);

        let tail = Rc::new(Cell::new(0));
        let t = tail.clone();
        source.stream().listen(move |_: u32| t.set(t.get() + 1)).unwrap();

        source.next(1);
        source.next(2);

        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(tail.get(), 2);
        assert_eq!(source.len(), 1);
    }
}
