//! # Conversion of foreign producers into streams.
//!
//! [`Convertible`] lists the capabilities [`Species::from_source`] understands,
//! tried in this order:
//!
//! 1. a [`Stream`]: returned as-is when its species matches, otherwise wrapped;
//! 2. a [`Listen`] implementor: wrapped, listeners are handed through;
//! 3. an async iterator factory: drained by a spawned task, one item per poll;
//! 4. a synchronous iterator factory: drained in one scheduled job.
//!
//! Draining always starts on a later scheduler turn and checks the listener's
//! state before every item, so a cancelled subscription stops pulling.

use std::any::{TypeId, type_name};
use std::fmt;
use std::rc::Rc;

use futures::StreamExt;
use futures::stream::LocalBoxStream;
use tracing::debug;

use crate::core::{IntoListener, Scheduler, Sink};
use crate::error::StreamError;
use crate::source::Source;
use crate::stream::{Listen, Species, Stream};

type IterFactory<T> = dyn Fn() -> Box<dyn Iterator<Item = T>>;
type AsyncIterFactory<T> = dyn Fn() -> LocalBoxStream<'static, T>;

/// Input accepted by [`Species::from_source`].
pub enum Convertible<T> {
    /// An existing stream.
    Stream(Stream<T>),
    /// A foreign object with a `listen` capability.
    Listen(Rc<dyn Listen<T>>),
    /// Produces a fresh async iterator per listener.
    AsyncIter(Rc<AsyncIterFactory<T>>),
    /// Produces a fresh iterator per listener.
    Iter(Rc<IterFactory<T>>),
    /// A value with none of the capabilities above, described by its type name.
    Opaque(String),
}

impl<T: 'static> Convertible<T> {
    /// Replays a cloneable collection once per listener.
    pub fn iter<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T> + Clone + 'static,
    {
        Self::Iter(Rc::new(move || -> Box<dyn Iterator<Item = T>> {
            Box::new(items.clone().into_iter())
        }))
    }

    /// Wraps a factory of async iterators.
    pub fn async_iter<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + 'static,
        S: futures::Stream<Item = T> + 'static,
    {
        Self::AsyncIter(Rc::new(move || factory().boxed_local()))
    }

    /// Wraps anything that can `listen`.
    pub fn listen<L: Listen<T> + 'static>(target: L) -> Self {
        Self::Listen(Rc::new(target))
    }

    /// Describes a value with no stream capability.
    pub fn opaque<V: ?Sized>(_value: &V) -> Self {
        Self::Opaque(type_name::<V>().to_string())
    }

    fn kind(&self) -> &str {
        match self {
            Self::Stream(_) => "stream",
            Self::Listen(_) => "listen",
            Self::AsyncIter(_) => "async_iter",
            Self::Iter(_) => "iter",
            Self::Opaque(kind) => kind.as_str(),
        }
    }
}

impl<T> From<Stream<T>> for Convertible<T> {
    fn from(stream: Stream<T>) -> Self {
        Self::Stream(stream)
    }
}

impl<T: Clone + 'static> From<Source<T>> for Convertible<T> {
    fn from(source: Source<T>) -> Self {
        Self::Listen(Rc::new(source))
    }
}

impl<T: Clone + 'static> From<Vec<T>> for Convertible<T> {
    fn from(items: Vec<T>) -> Self {
        Self::iter(items)
    }
}

impl<T: 'static> fmt::Debug for Convertible<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Convertible").field(&self.kind()).finish()
    }
}

/// Emits every item into `sink`, then completes.
///
/// Stops without completing once the listener is done. A listener error aborts
/// the drain and is returned.
pub(crate) fn drain<T, I>(sink: &Sink<T>, items: I) -> Result<(), StreamError>
where
    T: 'static,
    I: Iterator<Item = T>,
{
    if sink.is_done() {
        return Ok(());
    }
    for item in items {
        sink.next(item)?;
        if sink.is_done() {
            return Ok(());
        }
    }
    sink.complete(None)?;
    Ok(())
}

pub(crate) fn convert<T, S>(scheduler: &Scheduler, source: Option<Convertible<T>>) -> Result<S, StreamError>
where
    T: 'static,
    S: Species<T>,
{
    let Some(source) = source else {
        return Err(StreamError::NotObject);
    };
    debug!(kind = source.kind(), "converting into stream");

    match source {
        Convertible::Stream(stream) if stream.species() == TypeId::of::<S>() => Ok(S::construct(stream)),
        Convertible::Stream(stream) => Ok(S::create(move |sink: Sink<T>| stream.listen(sink))),
        Convertible::Listen(target) => {
            Ok(S::create(move |sink: Sink<T>| target.listen_with(sink.into_listener())))
        }
        Convertible::AsyncIter(factory) => {
            let scheduler = scheduler.clone();
            Ok(S::create(move |sink: Sink<T>| {
                let factory = Rc::clone(&factory);
                scheduler.spawn(async move {
                    if sink.is_done() {
                        return Ok(());
                    }
                    let mut items = factory();
                    while let Some(item) = items.next().await {
                        sink.next(item)?;
                        if sink.is_done() {
                            return Ok(());
                        }
                    }
                    sink.complete(None)?;
                    Ok(())
                });
            }))
        }
        Convertible::Iter(factory) => {
            let scheduler = scheduler.clone();
            Ok(S::create(move |sink: Sink<T>| {
                let factory = Rc::clone(&factory);
                scheduler.schedule(move || drain(&sink, factory()));
            }))
        }
        Convertible::Opaque(kind) => Err(StreamError::NotConvertible { kind }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Handlers, SubscriptionState};
    use std::cell::{Cell, RefCell};

    fn record(stream: &Stream<u32>) -> (Rc<RefCell<Vec<u32>>>, Rc<Cell<bool>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let done = Rc::new(Cell::new(false));
        let (out, d) = (seen.clone(), done.clone());
        stream
            .listen(
                Handlers::new()
                    .on_next(move |v| out.borrow_mut().push(v))
                    .on_return(move |_| d.set(true)),
            )
            .unwrap();
        (seen, done)
    }

    #[test]
    fn test_missing_source_is_not_object() {
        let scheduler = Scheduler::new();
        let err = Stream::<u32>::from_source(&scheduler, None).unwrap_err();
        assert_eq!(err, StreamError::NotObject);
    }

    #[test]
    fn test_opaque_source_is_not_convertible() {
        let scheduler = Scheduler::new();
        let err = Stream::<u32>::from_source(&scheduler, Some(Convertible::opaque(&42u8))).unwrap_err();
        assert_eq!(err, StreamError::NotConvertible { kind: "u8".into() });
    }

    #[test]
    fn test_same_species_stream_is_returned_as_is() {
        let scheduler = Scheduler::new();
        let stream: Stream<u32> = Stream::of(&scheduler, [1]);
        let converted = Stream::from_source(&scheduler, Some(stream.clone().into())).unwrap();
        assert!(Stream::ptr_eq(&stream, &converted));
    }

    #[test]
    fn test_iterable_is_delivered_on_later_turn() {
        let scheduler = Scheduler::new();
        let stream = Stream::from_source(&scheduler, Some(vec![1u32, 2].into())).unwrap();
        let (seen, done) = record(&stream);

        assert!(seen.borrow().is_empty());
        scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), vec![1, 2]);
        assert!(done.get());
    }

    #[test]
    fn test_listen_capability_is_wrapped() {
        let scheduler = Scheduler::new();
        let sinks: Rc<RefCell<Vec<Sink<u32>>>> = Rc::default();
        let s = sinks.clone();
        let foreign = Stream::new(move |sink: Sink<u32>| s.borrow_mut().push(sink));

        let stream = Stream::from_source(&scheduler, Some(Convertible::listen(foreign))).unwrap();
        let (seen, _) = record(&stream);
        sinks.borrow()[0].next(3).unwrap();

        assert_eq!(*seen.borrow(), vec![3]);
    }

    #[test]
    fn test_async_iterable_is_drained_by_task() {
        let scheduler = Scheduler::new();
        let stream = Stream::from_source(
            &scheduler,
            Some(Convertible::async_iter(|| futures::stream::iter([4u32, 5, 6]))),
        )
        .unwrap();
        let (seen, done) = record(&stream);

        assert!(seen.borrow().is_empty());
        scheduler.run_until_idle();
        assert_eq!(*seen.borrow(), vec![4, 5, 6]);
        assert!(done.get());
        assert_eq!(scheduler.live_tasks(), 0);
    }

    #[test]
    fn test_cancelled_drain_pulls_nothing() {
        let scheduler = Scheduler::new();
        let pulled = Rc::new(Cell::new(0));
        let p = pulled.clone();
        let stream = Stream::from_source(
            &scheduler,
            Some(Convertible::async_iter(move || {
                let p = p.clone();
                futures::stream::iter(0..3u32).inspect(move |_| p.set(p.get() + 1))
            })),
        )
        .unwrap();

        let cancel = stream.listen(|_: u32| ()).unwrap();
        cancel.cancel().unwrap();
        scheduler.run_until_idle();

        assert_eq!(pulled.get(), 0);
        assert_eq!(cancel.state(), SubscriptionState::Closed);
    }
}
