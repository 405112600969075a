//! # Stream: a producer of events.
//!
//! [`Stream`] wraps an initializer `Fn(Sink<T>) -> teardown`. It holds no
//! per-listener state: every [`Stream::listen`] creates a fresh subscription and
//! runs the initializer again. Shared state, if any, is closed over by the
//! initializer itself (as a multicast [`Source`](crate::Source) does).
//!
//! ## Example
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use streamvisor::{Sink, Stream};
//!
//! let sinks: Rc<RefCell<Vec<Sink<u32>>>> = Rc::default();
//! let s = sinks.clone();
//! let stream = Stream::new(move |sink: Sink<u32>| s.borrow_mut().push(sink));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let out = seen.clone();
//! let cancel = stream.listen(move |v: u32| out.borrow_mut().push(v)).unwrap();
//!
//! let sink = sinks.borrow()[0].clone();
//! sink.next(1).unwrap();
//! cancel.cancel().unwrap();
//! sink.next(2).unwrap(); // closed: no-op
//!
//! assert_eq!(*seen.borrow(), vec![1]);
//! ```

use std::any::TypeId;
use std::fmt;
use std::rc::Rc;

use crate::core::{
    Cancel, IntoListener, IntoTeardown, Listener, Scheduler, Sink, Subscription, Teardown,
};
use crate::error::StreamError;
use crate::source::Source;

type InitFn<T> = dyn Fn(Sink<T>) -> Result<Option<Teardown>, StreamError>;

/// A lazily subscribed producer of values, terminated by completion or error.
///
/// Cheap to clone; clones share the initializer.
pub struct Stream<T> {
    init: Rc<InitFn<T>>,
    species: TypeId,
}

impl<T: 'static> Stream<T> {
    /// Creates a stream from an initializer.
    ///
    /// The initializer runs once per `listen`. It may return nothing, a
    /// [`Teardown`], a [`Cancel`], or a `Result` of those; an `Err` fails the
    /// `listen` call.
    pub fn new<F, R>(init: F) -> Self
    where
        F: Fn(Sink<T>) -> R + 'static,
        R: IntoTeardown,
    {
        Self::tagged(TypeId::of::<Stream<T>>(), init)
    }

    /// Creates a stream tagged with the species that constructs it.
    pub(crate) fn tagged<F, R>(species: TypeId, init: F) -> Self
    where
        F: Fn(Sink<T>) -> R + 'static,
        R: IntoTeardown,
    {
        Self {
            init: Rc::new(move |sink| init(sink).into_teardown()),
            species,
        }
    }

    /// Subscribes a listener.
    ///
    /// Accepts a [`Listener`], a [`Handlers`](crate::Handlers) set, a
    /// [`Sink`] of another subscription, or a bare closure. Fails with the
    /// initializer's error, if any.
    pub fn listen(&self, listener: impl IntoListener<T>) -> Result<Cancel, StreamError> {
        let sub = Subscription::open(listener.into_listener(), &*self.init)?;
        Ok(Cancel::new(sub))
    }

    /// Identity of the species that constructed this stream.
    pub fn species(&self) -> TypeId {
        self.species
    }

    /// True if both handles wrap the same initializer.
    pub fn ptr_eq(a: &Stream<T>, b: &Stream<T>) -> bool {
        Rc::ptr_eq(&a.init, &b.init)
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Creates a multicast source and its paired stream.
    ///
    /// Shorthand for `Source::new(scheduler)` followed by `source.stream()`.
    pub fn source(scheduler: &Scheduler) -> (Source<T>, Stream<T>) {
        let source = Source::new(scheduler);
        let stream = source.stream().clone();
        (source, stream)
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            init: Rc::clone(&self.init),
            species: self.species,
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("species", &self.species)
            .finish_non_exhaustive()
    }
}

/// Anything exposing `listen`: the capability conversion adapters wrap directly.
pub trait Listen<T> {
    /// Subscribes a normalized listener.
    fn listen_with(&self, listener: Listener<T>) -> Result<Cancel, StreamError>;
}

impl<T: 'static> Listen<T> for Stream<T> {
    fn listen_with(&self, listener: Listener<T>) -> Result<Cancel, StreamError> {
        self.listen(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Handlers, Step, SubscriptionState};
    use std::cell::{Cell, RefCell};

    /// Stream that keeps every sink it is given.
    fn capturing() -> (Stream<u32>, Rc<RefCell<Vec<Sink<u32>>>>) {
        let sinks: Rc<RefCell<Vec<Sink<u32>>>> = Rc::default();
        let s = sinks.clone();
        (Stream::new(move |sink| s.borrow_mut().push(sink)), sinks)
    }

    #[test]
    fn test_each_listen_is_independent() {
        let (stream, sinks) = capturing();
        let a = Rc::new(RefCell::new(Vec::new()));
        let b = Rc::new(RefCell::new(Vec::new()));

        let out = a.clone();
        stream.listen(move |v: u32| out.borrow_mut().push(v)).unwrap();
        let out = b.clone();
        stream.listen(move |v: u32| out.borrow_mut().push(v)).unwrap();

        let sinks = sinks.borrow().clone();
        assert_eq!(sinks.len(), 2);
        sinks[0].next(1).unwrap();
        sinks[1].next(2).unwrap();

        assert_eq!(*a.borrow(), vec![1]);
        assert_eq!(*b.borrow(), vec![2]);
    }

    #[test]
    fn test_cancel_twice_is_same_as_once() {
        let teardowns = Rc::new(Cell::new(0));
        let returns = Rc::new(Cell::new(0));

        let t = teardowns.clone();
        let stream = Stream::new(move |_sink: Sink<u32>| {
            let t = t.clone();
            Teardown::new(move || t.set(t.get() + 1))
        });
        let r = returns.clone();
        let cancel = stream
            .listen(Handlers::new().on_return(move |_| r.set(r.get() + 1)))
            .unwrap();

        cancel.cancel().unwrap();
        cancel.clone().cancel().unwrap();

        assert_eq!(teardowns.get(), 1);
        assert_eq!(returns.get(), 1);
        assert_eq!(cancel.state(), SubscriptionState::Closed);
    }

    #[test]
    fn test_initializer_error_fails_listen() {
        let stream: Stream<u32> = Stream::new(|_sink| Err::<(), _>(StreamError::failed("init")));
        let err = stream.listen(|_: u32| ()).unwrap_err();
        assert_eq!(err, StreamError::failed("init"));
    }

    #[test]
    fn test_closed_forwarding_is_idempotent() {
        let (stream, sinks) = capturing();
        stream.listen(|_: u32| ()).unwrap();
        let sink = sinks.borrow()[0].clone();

        sink.complete(None).unwrap();
        for _ in 0..3 {
            assert_eq!(sink.next(1), Ok(Step::done()));
            assert_eq!(sink.throw(StreamError::Detached), Ok(Step::done()));
        }
    }

    #[test]
    fn test_sink_as_listener_forwards_into_other_subscription() {
        let (upstream, up_sinks) = capturing();
        let forwarded = Stream::new(move |sink: Sink<u32>| upstream.listen(sink));

        let seen = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(Cell::new(false));
        let (out, d) = (seen.clone(), done.clone());
        forwarded
            .listen(
                Handlers::new()
                    .on_next(move |v| out.borrow_mut().push(v))
                    .on_return(move |_| d.set(true)),
            )
            .unwrap();

        let sink = up_sinks.borrow()[0].clone();
        sink.next(5).unwrap();
        sink.complete(None).unwrap();

        assert_eq!(*seen.borrow(), vec![5]);
        assert!(done.get());
    }

    #[test]
    fn test_clones_share_identity() {
        let (stream, _) = capturing();
        let other = stream.clone();
        let (third, _) = capturing();

        assert!(Stream::ptr_eq(&stream, &other));
        assert!(!Stream::ptr_eq(&stream, &third));
        assert_eq!(stream.species(), TypeId::of::<Stream<u32>>());
    }
}
