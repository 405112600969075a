//! # Species: which type derived streams are built with.
//!
//! Every combinator and factory is a default method on [`Species`], so a
//! wrapper type around [`Stream`] gets all of them by implementing three items:
//! the [`Species::Of`] family, [`Species::construct`], and [`Species::stream`].
//! Results of `map`, `filter`, `of` and `from_source` then come back as the
//! wrapper type instead of the base stream.
//!
//! ```
//! use streamvisor::{Scheduler, Species, Stream};
//!
//! struct Tagged<T>(Stream<T>);
//!
//! impl<T: 'static> Species<T> for Tagged<T> {
//!     type Of<U: 'static> = Tagged<U>;
//!     fn construct(stream: Stream<T>) -> Self { Tagged(stream) }
//!     fn stream(&self) -> &Stream<T> { &self.0 }
//! }
//!
//! let scheduler = Scheduler::new();
//! let numbers: Tagged<u32> = Tagged::of(&scheduler, [1, 2]);
//! let doubled: Tagged<u32> = numbers.map(|v| v * 2);
//! # let _ = doubled;
//! ```

use std::any::TypeId;
use std::rc::Rc;

use crate::core::{Cancel, Handlers, IntoListener, IntoStep, IntoTeardown, Scheduler, Sink, Step};
use crate::error::StreamError;
use crate::stream::convert::{self, Convertible};
use crate::stream::{AsyncIter, ForEach, Stream};

/// Factory capability for streams and stream wrappers.
pub trait Species<T: 'static>: Sized + 'static {
    /// The same species over another item type.
    type Of<U: 'static>: Species<U>;

    /// Wraps a freshly created stream.
    fn construct(stream: Stream<T>) -> Self;

    /// The wrapped stream.
    fn stream(&self) -> &Stream<T>;

    /// Creates a stream of this species from an initializer.
    fn create<F, R>(init: F) -> Self
    where
        F: Fn(Sink<T>) -> R + 'static,
        R: IntoTeardown,
    {
        Self::construct(Stream::tagged(TypeId::of::<Self>(), init))
    }

    /// Subscribes a listener to the wrapped stream.
    fn listen<L: IntoListener<T>>(&self, listener: L) -> Result<Cancel, StreamError> {
        self.stream().listen(listener)
    }

    /// Fallible projection.
    ///
    /// An `Err` from `f` is thrown downstream, which ends the derived
    /// subscription and cancels the upstream one. Upstream errors and
    /// completion are forwarded; the completion value is not projected.
    fn try_map<U, F>(&self, f: F) -> Self::Of<U>
    where
        U: 'static,
        F: Fn(T) -> Result<U, StreamError> + 'static,
    {
        let upstream = self.stream().clone();
        let f = Rc::new(f);
        <Self::Of<U>>::create(move |sink: Sink<U>| {
            let f = Rc::clone(&f);
            let (next, throw, ret) = (sink.clone(), sink.clone(), sink);
            upstream.listen(
                Handlers::new()
                    .on_next(move |value: T| -> Result<Step<T>, StreamError> {
                        let step = match f(value) {
                            Ok(mapped) => next.next(mapped)?,
                            Err(err) => next.throw(err)?,
                        };
                        Ok(step.erase())
                    })
                    .on_throw(move |err| -> Result<Step<T>, StreamError> {
                        Ok(throw.throw(err)?.erase())
                    })
                    .on_return(move |_| -> Result<Step<T>, StreamError> {
                        Ok(ret.complete(None)?.erase())
                    }),
            )
        })
    }

    /// Projects every value through `f`.
    fn map<U, F>(&self, f: F) -> Self::Of<U>
    where
        U: 'static,
        F: Fn(T) -> U + 'static,
    {
        self.try_map(move |value| Ok(f(value)))
    }

    /// Fallible filter.
    ///
    /// Values for which `predicate` returns `Ok(false)` are skipped and the
    /// producer is told to continue. An `Err` is thrown downstream. Errors and
    /// completion, including the completion value, pass through.
    fn try_filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> Result<bool, StreamError> + 'static,
    {
        let upstream = self.stream().clone();
        let predicate = Rc::new(predicate);
        Self::create(move |sink: Sink<T>| {
            let predicate = Rc::clone(&predicate);
            let (next, throw, ret) = (sink.clone(), sink.clone(), sink);
            upstream.listen(
                Handlers::new()
                    .on_next(move |value: T| match predicate(&value) {
                        Ok(true) => next.next(value),
                        Ok(false) => Ok(Step::more()),
                        Err(err) => next.throw(err),
                    })
                    .on_throw(move |err| throw.throw(err))
                    .on_return(move |value| ret.complete(value)),
            )
        })
    }

    /// Keeps values for which `predicate` returns true.
    fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.try_filter(move |value| Ok(predicate(value)))
    }

    /// Runs `f` for every value and resolves on termination.
    ///
    /// Resolves with the completion value, or with the value of a done step
    /// returned by `f` (which also cancels the producer). Rejects with the
    /// stream's error or the first `Err` from `f`.
    fn for_each<F, R>(&self, f: F) -> ForEach<T>
    where
        F: FnMut(T) -> R + 'static,
        R: IntoStep<T>,
    {
        ForEach::start(self.stream(), f)
    }

    /// Subscribes a pull-based async iterator.
    fn iter(&self) -> Result<AsyncIter<T>, StreamError> {
        AsyncIter::start(self.stream())
    }

    /// Emits `items` in order and completes, on a later scheduler turn.
    ///
    /// Each listener receives its own replay. Emission stops early once the
    /// listener is done.
    fn of<I>(scheduler: &Scheduler, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Clone,
    {
        let items: Rc<[T]> = items.into_iter().collect();
        let scheduler = scheduler.clone();
        Self::create(move |sink: Sink<T>| {
            let items = Rc::clone(&items);
            scheduler.schedule(move || convert::drain(&sink, items.iter().cloned()));
        })
    }

    /// Converts `source` into a stream of this species.
    ///
    /// `None` fails with [`StreamError::NotObject`]; an input with no
    /// supported capability fails with [`StreamError::NotConvertible`].
    fn from_source(scheduler: &Scheduler, source: Option<Convertible<T>>) -> Result<Self, StreamError> {
        convert::convert(scheduler, source)
    }
}

impl<T: 'static> Species<T> for Stream<T> {
    type Of<U: 'static> = Stream<U>;

    fn construct(stream: Stream<T>) -> Self {
        stream
    }

    fn stream(&self) -> &Stream<T> {
        self
    }
}
