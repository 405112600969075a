//! # streamvisor
//!
//! **Streamvisor** is a small push-based event stream library for Rust.
//!
//! A [`Stream`] is a lazily subscribed producer of values that terminates with
//! an error or a completion value. Every `listen` creates an independent
//! subscription governed by a strict state machine; producers talk to it
//! through a [`Sink`], consumers stop it through a [`Cancel`] handle. A
//! [`Source`] turns one producer into many listeners, and an explicit
//! [`Scheduler`] runs everything that must happen "later".
//!
//! The crate is single-threaded by construction (`Rc`, not `Arc`): streams,
//! sinks and schedulers are `!Send`.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  producer code                                   consumer code
//!  ─────────────                                   ─────────────
//!  Sink::next / throw / complete                   Listener (callback or Handlers)
//!         │                                                  ▲
//!         ▼                                                  │
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Subscription (one per listen)                                    │
//! │  - state machine: initializing → ready ⇄ running → closed         │
//! │  - terminal signals close before the handler runs                 │
//! │  - teardown runs exactly once, after the handler                  │
//! └──────┬─────────────────────────────────────────────────┬──────────┘
//!        │ teardown                                        │ Cancel::cancel
//!        ▼                                                 ▼
//!   initializer cleanup                          synthetic return signal
//!
//!  Source ──► SinkSet ──► sink 1, sink 2, … (snapshot fan-out, isolated errors)
//!
//!  Scheduler (FIFO)
//!   ├─ schedule(job)   ─► Species::of, iterable conversion, late-join completion
//!   ├─ spawn(future)   ─► async-iterable conversion
//!   └─ Err from a job  ─► Report (LogReporter by default)
//! ```
//!
//! ### Signal flow
//! ```text
//! Sink::send(signal)
//!   ├─ closed          ─► Ok(done step)           (no handler call)
//!   ├─ not ready       ─► Err(InvalidState)       (reentrant or initializing)
//!   ├─ throw / return  ─► close, handler, teardown
//!   └─ next            ─► running, handler, ready (or close + teardown if done)
//! ```
//!
//! ## Features
//! | Area              | Description                                                     | Key types / traits                         |
//! |-------------------|-----------------------------------------------------------------|--------------------------------------------|
//! | **Streams**       | Create, listen, derive and consume streams.                     | [`Stream`], [`Species`], [`Convertible`]   |
//! | **Protocol**      | Listener capability sets and producer handles.                  | [`Listener`], [`Handlers`], [`Sink`], [`Cancel`] |
//! | **Multicast**     | Broadcast one producer to many listeners.                       | [`Source`]                                 |
//! | **Consumption**   | Await a stream as a future or pull it as an async iterator.     | [`ForEach`], [`AsyncIter`]                 |
//! | **Scheduling**    | Deterministic deferred work and local futures.                  | [`Scheduler`], [`SchedulerConfig`]         |
//! | **Errors**        | One typed error for protocol violations and failures.           | [`StreamError`], [`Report`]                |
//!
//! ## Example
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use streamvisor::{Scheduler, Species, Stream};
//!
//! let scheduler = Scheduler::new();
//! let (source, stream) = Stream::<u32>::source(&scheduler);
//!
//! let evens = stream.filter(|v| v % 2 == 0).map(|v| v * 10);
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let out = seen.clone();
//! let cancel = evens.listen(move |v: u32| out.borrow_mut().push(v)).unwrap();
//!
//! for v in 1..=4 {
//!     source.next(v);
//! }
//! cancel.cancel().unwrap();
//! source.next(6);
//!
//! assert_eq!(*seen.borrow(), vec![20, 40]);
//! assert!(source.is_empty());
//! ```
mod core;
mod error;
mod reporters;
mod source;
mod stream;

// ---- Public re-exports ----

pub use core::{
    Cancel, Handlers, IntoListener, IntoStep, IntoTeardown, Listener, Scheduler, SchedulerBuilder,
    SchedulerConfig, Signal, SignalKind, Sink, Step, SubscriptionState, Teardown, YieldNow,
    yield_now,
};
pub use error::StreamError;
pub use reporters::{Collector, LogReporter, Report};
pub use source::Source;
pub use stream::{AsyncIter, Convertible, ForEach, IterStep, Listen, Species, Stream};
