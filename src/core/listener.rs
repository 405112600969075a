//! # Listener: the consumer side of a subscription.
//!
//! A listener is a capability set `{next?, throw?, return?}`. It comes in two
//! shapes:
//!
//! - **callback**: built from a bare function, reacts to values only
//!   ([`Listener::callback`], or any closure passed to `listen`);
//! - **handlers**: any subset of the three handlers ([`Handlers`]).
//!
//! Both shapes normalize to the same record, so the subscription dispatches one
//! way. Each handler returns something convertible to a [`Step`]: `()`, a
//! `Step<T>`, or a `Result` of either.
//!
//! ## Missing handlers
//! ```text
//! Next(v)   + no next handler   → ignored
//! Return(v) + no return handler → ignored
//! Throw(e)  + no throw handler  → e is re-raised to the forwarding caller
//! ```
//!
//! ## Example
//! ```
//! use streamvisor::{Handlers, Step, StreamError};
//!
//! let listener = Handlers::<u32>::new()
//!     .on_next(|v| if v > 10 { Step::done() } else { Step::more() })
//!     .on_throw(|err: StreamError| eprintln!("failed: {err}"))
//!     .on_return(|_| ());
//! # let _ = listener;
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::core::SubscriptionState;
use crate::error::StreamError;

/// Result object returned by handlers and by every forwarding call.
///
/// `done = true` asks the subscription to close; `value` carries an optional
/// payload (used by `for_each` as the resolution value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step<T> {
    /// Whether the subscription is (or should be) closed.
    pub done: bool,
    /// Optional payload.
    pub value: Option<T>,
}

impl<T> Step<T> {
    /// A non-final step without payload.
    pub fn more() -> Self {
        Self {
            done: false,
            value: None,
        }
    }

    /// A final step without payload.
    pub fn done() -> Self {
        Self {
            done: true,
            value: None,
        }
    }

    /// A final step carrying `value`.
    pub fn done_with(value: T) -> Self {
        Self {
            done: true,
            value: Some(value),
        }
    }

    /// Returns true if the step is final.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Drops the payload, keeping the `done` flag, so the step can cross a
    /// type-changing boundary (e.g. from a derived stream to its upstream).
    pub fn erase<U>(self) -> Step<U> {
        Step {
            done: self.done,
            value: None,
        }
    }
}

impl<T> Default for Step<T> {
    fn default() -> Self {
        Self::more()
    }
}

/// Conversion of handler return values into a [`Step`].
pub trait IntoStep<T> {
    /// Performs the conversion.
    fn into_step(self) -> Result<Step<T>, StreamError>;
}

impl<T> IntoStep<T> for () {
    fn into_step(self) -> Result<Step<T>, StreamError> {
        Ok(Step::more())
    }
}

impl<T> IntoStep<T> for Step<T> {
    fn into_step(self) -> Result<Step<T>, StreamError> {
        Ok(self)
    }
}

impl<T> IntoStep<T> for Result<(), StreamError> {
    fn into_step(self) -> Result<Step<T>, StreamError> {
        self.map(|()| Step::more())
    }
}

impl<T> IntoStep<T> for Result<Step<T>, StreamError> {
    fn into_step(self) -> Result<Step<T>, StreamError> {
        self
    }
}

/// One event travelling from a producer to a listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal<T> {
    /// A value.
    Next(T),
    /// A stream error; terminal.
    Throw(StreamError),
    /// Completion with an optional value; terminal.
    Return(Option<T>),
}

impl<T> Signal<T> {
    /// Returns the kind of the signal.
    pub fn kind(&self) -> SignalKind {
        match self {
            Signal::Next(_) => SignalKind::Next,
            Signal::Throw(_) => SignalKind::Throw,
            Signal::Return(_) => SignalKind::Return,
        }
    }
}

/// Classification of [`Signal`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// A value.
    Next,
    /// An error.
    Throw,
    /// Completion.
    Return,
}

impl SignalKind {
    /// True for `Throw` and `Return`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        !matches!(self, SignalKind::Next)
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SignalKind::Next => "next",
            SignalKind::Throw => "throw",
            SignalKind::Return => "return",
        })
    }
}

type Handler<A, T> = RefCell<Box<dyn FnMut(A) -> Result<Step<T>, StreamError>>>;

/// Builder for a handlers-shaped [`Listener`].
pub struct Handlers<T> {
    next: Option<Handler<T, T>>,
    throw: Option<Handler<StreamError, T>>,
    ret: Option<Handler<Option<T>, T>>,
}

impl<T: 'static> Handlers<T> {
    /// Empty capability set: values and completion are ignored, errors re-raised.
    pub fn new() -> Self {
        Self {
            next: None,
            throw: None,
            ret: None,
        }
    }

    /// Sets the value handler.
    pub fn on_next<F, R>(mut self, mut f: F) -> Self
    where
        F: FnMut(T) -> R + 'static,
        R: IntoStep<T>,
    {
        self.next = Some(RefCell::new(Box::new(move |v| f(v).into_step())));
        self
    }

    /// Sets the error handler.
    pub fn on_throw<F, R>(mut self, mut f: F) -> Self
    where
        F: FnMut(StreamError) -> R + 'static,
        R: IntoStep<T>,
    {
        self.throw = Some(RefCell::new(Box::new(move |e| f(e).into_step())));
        self
    }

    /// Sets the completion handler.
    pub fn on_return<F, R>(mut self, mut f: F) -> Self
    where
        F: FnMut(Option<T>) -> R + 'static,
        R: IntoStep<T>,
    {
        self.ret = Some(RefCell::new(Box::new(move |v| f(v).into_step())));
        self
    }
}

impl<T: 'static> Default for Handlers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Callback,
    Handlers,
}

/// Outcome of handing a signal to a listener.
pub(crate) enum Delivery<T> {
    /// A handler ran.
    Handled(Result<Step<T>, StreamError>),
    /// No handler; the signal is ignored.
    Ignored,
    /// No throw handler; the error goes back to the caller.
    Unhandled(StreamError),
}

impl<T> Delivery<T> {
    /// Delivery of `signal` to nobody.
    pub(crate) fn nobody(signal: Signal<T>) -> Self {
        match signal {
            Signal::Throw(err) => Delivery::Unhandled(err),
            _ => Delivery::Ignored,
        }
    }
}

/// Normalized consumer capability set.
///
/// Cheap to clone; clones share the handlers and the identity ([`Listener::id`]).
pub struct Listener<T> {
    shape: Shape,
    handlers: Rc<Handlers<T>>,
}

impl<T: 'static> Listener<T> {
    /// Listener built from a bare value callback.
    pub fn callback<F, R>(f: F) -> Self
    where
        F: FnMut(T) -> R + 'static,
        R: IntoStep<T>,
    {
        Self {
            shape: Shape::Callback,
            handlers: Rc::new(Handlers::new().on_next(f)),
        }
    }

    /// Listener built from a handlers set.
    pub fn new(handlers: Handlers<T>) -> Self {
        Self {
            shape: Shape::Handlers,
            handlers: Rc::new(handlers),
        }
    }

    /// True if the listener was built from a bare callback.
    #[inline]
    pub fn is_callback(&self) -> bool {
        self.shape == Shape::Callback
    }

    /// Identity of the listener; equal for clones.
    #[inline]
    pub fn id(&self) -> usize {
        Rc::as_ptr(&self.handlers) as *const () as usize
    }

    /// Hands one signal to the matching handler.
    ///
    /// A handler already borrowed by an outer delivery (one listener shared by
    /// two subscriptions and reentered) yields `InvalidState` instead of a panic.
    pub(crate) fn deliver(&self, signal: Signal<T>) -> Delivery<T> {
        let h = &*self.handlers;
        match signal {
            Signal::Next(value) => match &h.next {
                Some(handler) => Delivery::Handled(call(handler, value)),
                None => Delivery::Ignored,
            },
            Signal::Throw(err) => match &h.throw {
                Some(handler) => Delivery::Handled(call(handler, err)),
                None => Delivery::Unhandled(err),
            },
            Signal::Return(value) => match &h.ret {
                Some(handler) => Delivery::Handled(call(handler, value)),
                None => Delivery::Ignored,
            },
        }
    }
}

fn call<A, T>(handler: &Handler<A, T>, arg: A) -> Result<Step<T>, StreamError> {
    let mut f = handler.try_borrow_mut().map_err(|_| StreamError::InvalidState {
        state: SubscriptionState::Running,
    })?;
    (*f)(arg)
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape,
            handlers: Rc::clone(&self.handlers),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = &*self.handlers;
        f.debug_struct("Listener")
            .field("shape", &self.shape)
            .field("next", &h.next.is_some())
            .field("throw", &h.throw.is_some())
            .field("return", &h.ret.is_some())
            .finish()
    }
}

/// Anything `listen` accepts: a [`Listener`], a [`Handlers`] set, a
/// [`Sink`](crate::Sink), or a bare closure `FnMut(T) -> R`.
pub trait IntoListener<T> {
    /// Normalizes into a [`Listener`].
    fn into_listener(self) -> Listener<T>;
}

impl<T> IntoListener<T> for Listener<T> {
    fn into_listener(self) -> Listener<T> {
        self
    }
}

impl<T: 'static> IntoListener<T> for Handlers<T> {
    fn into_listener(self) -> Listener<T> {
        Listener::new(self)
    }
}

impl<T, F, R> IntoListener<T> for F
where
    T: 'static,
    F: FnMut(T) -> R + 'static,
    R: IntoStep<T>,
{
    fn into_listener(self) -> Listener<T> {
        Listener::callback(self)
    }
}
