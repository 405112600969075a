//! # Unhandled-error reporters.
//!
//! Errors that cannot be returned to anyone end up here: failures of scheduled
//! jobs and spawned futures, and listener errors isolated by a multicast
//! [`Source`](crate::Source) so that sibling listeners keep receiving values.
//!
//! ## Architecture
//! ```text
//! Scheduler job ──► Err(e) ───────┐
//! spawned future ─► Err(e) ───────┼──► Scheduler::report(e) ──► Report::report(&e)
//! Source::next ──► listener Err ──┘                                 │
//!                                                      ┌────────────┴────────────┐
//!                                                      ▼                         ▼
//!                                                 LogReporter                Collector
//!                                               (tracing::error)       (retains errors)
//! ```
//!
//! ## Implementing a custom reporter
//! ```
//! use streamvisor::{Report, StreamError};
//!
//! struct Panicky;
//!
//! impl Report for Panicky {
//!     fn report(&self, err: &StreamError) {
//!         panic!("unhandled stream error: {err}");
//!     }
//!
//!     fn name(&self) -> &'static str { "panicky" }
//! }
//! ```

mod collect;
mod log;
mod report;

pub use collect::Collector;
pub use log::LogReporter;
pub use report::Report;
