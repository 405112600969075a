//! Runtime core: subscription protocol and deferred scheduling.
//!
//! This module contains the state machine every stream is built on, plus the
//! scheduler that asynchronous producers use to emit after the current call
//! stack unwinds.
//!
//! Internal modules:
//! - [`listener`]: consumer capability set, normalized from callbacks or handler sets;
//! - [`subscription`]: per-listener state machine, [`Sink`], [`Cancel`], [`Teardown`];
//! - [`scheduler`]: FIFO job queue with a local future executor;
//! - [`config`] / [`builder`]: scheduler configuration and construction.

mod builder;
mod config;
mod listener;
mod scheduler;
mod subscription;

pub use builder::SchedulerBuilder;
pub use config::SchedulerConfig;
pub use listener::{Handlers, IntoListener, IntoStep, Listener, Signal, SignalKind, Step};
pub use scheduler::{Scheduler, YieldNow, yield_now};
pub use subscription::{Cancel, IntoTeardown, Sink, SubscriptionState, Teardown};

pub(crate) use subscription::Subscription;
