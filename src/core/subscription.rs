//! # Subscription: the per-listener state machine.
//!
//! One subscription binds one [`Listener`] to one invocation of a stream's
//! initializer. It owns the listener reference and the producer's [`Teardown`],
//! and serializes every event through a single forwarding path.
//!
//! ## Lifecycle
//! ```text
//! listen(listener)
//!   └─► Initializing ── init(sink) ──┬─ Ok  ─► Ready ◄──────┐
//!                                    │          │ forward   │ handler returned,
//!                                    │          ▼           │ not done
//!                                    │       Running ───────┘
//!                                    │          │ throw / return / done step / cancel
//!                                    │          ▼
//!                                    └─ Err ─► Closed ─► teardown() (exactly once)
//! ```
//!
//! ## Forwarding rules
//! - `Closed` → `Ok(Step::done())`, no side effects (idempotent).
//! - Not `Ready` → `Err(InvalidState)`; no reentrant delivery on one subscription.
//! - `throw` / `return` release the listener *before* the handler runs; the
//!   teardown runs only after the handler returns.
//! - A handler step with `done = true` closes the subscription.
//! - A handler `Err` propagates to the forwarding caller, after the subscription
//!   has settled (closed with teardown, or back to `Ready`).
//!
//! ## Cancellation
//! - `Running` (cancelled from inside a handler) → close directly, no handler call.
//! - `Closed` → no-op.
//! - otherwise → forward `Return(None)`, so the listener observes it.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::core::listener::{Delivery, Handlers, IntoListener, Listener, Signal, Step};
use crate::error::StreamError;

/// State of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionState {
    /// The initializer is running.
    Initializing,
    /// Idle, waiting for the next event.
    Ready,
    /// Delivering one event to the listener.
    Running,
    /// Terminal.
    Closed,
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SubscriptionState::Initializing => "initializing",
            SubscriptionState::Ready => "ready",
            SubscriptionState::Running => "running",
            SubscriptionState::Closed => "closed",
        })
    }
}

/// Cleanup callback returned by an initializer.
///
/// Runs exactly once, when its subscription closes.
pub struct Teardown(Box<dyn FnOnce() -> Result<(), StreamError>>);

impl Teardown {
    /// Teardown from an infallible callback.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self(Box::new(move || {
            f();
            Ok(())
        }))
    }

    /// Teardown whose error propagates to the call that closed the subscription.
    pub fn fallible<F>(f: F) -> Self
    where
        F: FnOnce() -> Result<(), StreamError> + 'static,
    {
        Self(Box::new(f))
    }

    pub(crate) fn run(self) -> Result<(), StreamError> {
        (self.0)()
    }
}

impl From<Cancel> for Teardown {
    fn from(cancel: Cancel) -> Self {
        Teardown::fallible(move || cancel.cancel())
    }
}

impl fmt::Debug for Teardown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Teardown")
    }
}

/// Conversion of initializer return values into an optional [`Teardown`].
pub trait IntoTeardown {
    /// Performs the conversion.
    fn into_teardown(self) -> Result<Option<Teardown>, StreamError>;
}

impl IntoTeardown for () {
    fn into_teardown(self) -> Result<Option<Teardown>, StreamError> {
        Ok(None)
    }
}

impl IntoTeardown for Teardown {
    fn into_teardown(self) -> Result<Option<Teardown>, StreamError> {
        Ok(Some(self))
    }
}

impl IntoTeardown for Cancel {
    fn into_teardown(self) -> Result<Option<Teardown>, StreamError> {
        Ok(Some(self.into()))
    }
}

impl IntoTeardown for Option<Teardown> {
    fn into_teardown(self) -> Result<Option<Teardown>, StreamError> {
        Ok(self)
    }
}

impl<X: IntoTeardown> IntoTeardown for Result<X, StreamError> {
    fn into_teardown(self) -> Result<Option<Teardown>, StreamError> {
        self?.into_teardown()
    }
}

/// Live binding between one listener and one producer invocation.
pub(crate) struct Subscription<T> {
    state: Cell<SubscriptionState>,
    listener: RefCell<Option<Listener<T>>>,
    teardown: RefCell<Option<Teardown>>,
}

impl<T: 'static> Subscription<T> {
    /// Creates the subscription and runs the initializer with its sink.
    ///
    /// An initializer error closes the subscription and is returned as is.
    pub(crate) fn open<I>(listener: Listener<T>, init: &I) -> Result<Rc<Self>, StreamError>
    where
        I: Fn(Sink<T>) -> Result<Option<Teardown>, StreamError> + ?Sized,
    {
        let sub = Rc::new(Self {
            state: Cell::new(SubscriptionState::Initializing),
            listener: RefCell::new(Some(listener)),
            teardown: RefCell::new(None),
        });

        let teardown = match init(Sink {
            sub: Rc::clone(&sub),
        }) {
            Ok(teardown) => teardown,
            Err(err) => {
                sub.close();
                tracing::trace!(error = %err, "subscription initializer failed");
                return Err(err);
            }
        };
        *sub.teardown.borrow_mut() = teardown;

        match sub.state.get() {
            SubscriptionState::Initializing => sub.state.set(SubscriptionState::Ready),
            SubscriptionState::Closed => sub.settle()?,
            _ => {}
        }
        tracing::trace!(state = %sub.state.get(), "subscription opened");
        Ok(sub)
    }

    pub(crate) fn state(&self) -> SubscriptionState {
        self.state.get()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.state.get() == SubscriptionState::Closed
    }

    /// Routes one signal to the listener.
    pub(crate) fn forward(&self, signal: Signal<T>) -> Result<Step<T>, StreamError> {
        match self.state.get() {
            SubscriptionState::Closed => return Ok(Step::done()),
            SubscriptionState::Ready => {}
            state => return Err(StreamError::InvalidState { state }),
        }
        self.state.set(SubscriptionState::Running);

        let listener = self.listener.borrow().clone();
        if signal.kind().is_terminal() {
            self.close();
        }

        let delivery = match &listener {
            Some(listener) => listener.deliver(signal),
            None => Delivery::nobody(signal),
        };
        drop(listener);

        let outcome = match delivery {
            Delivery::Handled(Ok(step)) => {
                if step.done && !self.is_closed() {
                    self.close();
                }
                Ok(step)
            }
            Delivery::Handled(Err(err)) | Delivery::Unhandled(err) => Err(err),
            Delivery::Ignored => Ok(Step {
                done: self.is_closed(),
                value: None,
            }),
        };

        match (outcome, self.settle()) {
            (Err(err), Err(cleanup)) => {
                tracing::warn!(error = %cleanup, "teardown failed while propagating a listener error");
                Err(err)
            }
            (Err(err), Ok(())) | (Ok(_), Err(err)) => Err(err),
            (Ok(step), Ok(())) => Ok(step),
        }
    }

    /// External cancellation.
    pub(crate) fn cancel(&self) -> Result<(), StreamError> {
        match self.state.get() {
            SubscriptionState::Running => {
                self.close();
                Ok(())
            }
            SubscriptionState::Closed => Ok(()),
            _ => self.forward(Signal::Return(None)).map(|_| ()),
        }
    }

    /// Marks the subscription closed and releases the listener.
    fn close(&self) {
        self.state.set(SubscriptionState::Closed);
        let released = self.listener.borrow_mut().take();
        drop(released);
    }

    /// Runs the teardown once closed, otherwise leaves `Running`.
    fn settle(&self) -> Result<(), StreamError> {
        match self.state.get() {
            SubscriptionState::Closed => {
                let teardown = self.teardown.borrow_mut().take();
                match teardown {
                    Some(teardown) => {
                        tracing::trace!("subscription closed, running teardown");
                        teardown.run()
                    }
                    None => Ok(()),
                }
            }
            SubscriptionState::Running => {
                self.state.set(SubscriptionState::Ready);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

/// Type-erased view of a subscription, used by [`Cancel`].
trait Cancellable {
    fn cancel(&self) -> Result<(), StreamError>;
    fn state(&self) -> SubscriptionState;
}

impl<T: 'static> Cancellable for Subscription<T> {
    fn cancel(&self) -> Result<(), StreamError> {
        Subscription::cancel(self)
    }

    fn state(&self) -> SubscriptionState {
        Subscription::state(self)
    }
}

struct CancelInner {
    fired: Cell<bool>,
    target: Rc<dyn Cancellable>,
}

/// Cancellation handle returned by `listen`.
///
/// Cheap to clone; clones share one handle. Only the first `cancel` call has
/// an effect. Dropping the handle does **not** cancel the subscription.
#[derive(Clone)]
pub struct Cancel {
    inner: Rc<CancelInner>,
}

impl Cancel {
    pub(crate) fn new<T: 'static>(sub: Rc<Subscription<T>>) -> Self {
        Self {
            inner: Rc::new(CancelInner {
                fired: Cell::new(false),
                target: sub,
            }),
        }
    }

    /// Cancels the subscription.
    ///
    /// The listener's return handler (if any) is notified unless the cancel
    /// comes from inside one of its own handlers. Errors raised by that handler
    /// or by the teardown propagate here.
    pub fn cancel(&self) -> Result<(), StreamError> {
        if self.inner.fired.replace(true) {
            return Ok(());
        }
        self.inner.target.cancel()
    }

    /// True once the subscription is closed, whatever closed it.
    pub fn is_closed(&self) -> bool {
        self.state() == SubscriptionState::Closed
    }

    /// Current state of the subscription.
    pub fn state(&self) -> SubscriptionState {
        self.inner.target.state()
    }

    /// True if both handles control the same subscription through one handle.
    pub fn ptr_eq(a: &Cancel, b: &Cancel) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }
}

impl fmt::Debug for Cancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cancel")
            .field("fired", &self.inner.fired.get())
            .field("state", &self.state())
            .finish()
    }
}

/// Producer-facing handle of a subscription.
///
/// Passed to the initializer of a stream. Every call goes through the
/// subscription's forwarding rules.
pub struct Sink<T> {
    sub: Rc<Subscription<T>>,
}

impl<T: 'static> Sink<T> {
    /// Forwards a value.
    pub fn next(&self, value: T) -> Result<Step<T>, StreamError> {
        self.sub.forward(Signal::Next(value))
    }

    /// Forwards an error and closes the subscription.
    ///
    /// Without a throw handler the error comes straight back.
    pub fn throw(&self, err: StreamError) -> Result<Step<T>, StreamError> {
        self.sub.forward(Signal::Throw(err))
    }

    /// Forwards completion (the protocol's `return`) and closes the subscription.
    pub fn complete(&self, value: Option<T>) -> Result<Step<T>, StreamError> {
        self.sub.forward(Signal::Return(value))
    }

    /// Forwards any signal.
    pub fn send(&self, signal: Signal<T>) -> Result<Step<T>, StreamError> {
        self.sub.forward(signal)
    }

    /// True once the subscription is closed; producers should stop emitting.
    pub fn is_done(&self) -> bool {
        self.sub.is_closed()
    }

    /// Current state of the subscription.
    pub fn state(&self) -> SubscriptionState {
        self.sub.state()
    }

    /// Cancellation handle for this subscription.
    pub(crate) fn cancel_handle(&self) -> Cancel {
        Cancel::new(Rc::clone(&self.sub))
    }

    /// True if both sinks feed the same subscription.
    pub fn ptr_eq(a: &Sink<T>, b: &Sink<T>) -> bool {
        Rc::ptr_eq(&a.sub, &b.sub)
    }
}

impl<T> Clone for Sink<T> {
    fn clone(&self) -> Self {
        Self {
            sub: Rc::clone(&self.sub),
        }
    }
}

impl<T> fmt::Debug for Sink<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("state", &self.sub.state.get())
            .finish()
    }
}

/// A sink used as a listener forwards every signal into its own subscription.
impl<T: 'static> IntoListener<T> for Sink<T> {
    fn into_listener(self) -> Listener<T> {
        let (next, throw, ret) = (self.clone(), self.clone(), self);
        Listener::new(
            Handlers::new()
                .on_next(move |v| next.next(v))
                .on_throw(move |e| throw.throw(e))
                .on_return(move |v| ret.complete(v)),
        )
    }
}
