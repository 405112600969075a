//! Multicast sources.
//!
//! A [`Source`] is a controller paired with a stream: every listener of the
//! stream joins one shared set of sinks, and `next`/`throw`/`complete` on the
//! source broadcast to all of them.
//!
//! ## Contents
//! - [`Source`] broadcasting controller and its paired stream
//! - `SinkSet` (internal) registry of live sinks with snapshot fan-out
//!
//! ```text
//! source.next(v)
//!     │            (snapshot of live sinks)
//!     ├──► sink 1 ──► listener 1
//!     ├──► sink 2 ──► listener 2 ── Err ──► Scheduler::report
//!     └──► sink N ──► listener N
//! ```

mod multicast;
mod sink_set;

pub use multicast::Source;
