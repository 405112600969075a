//! # Reporter trait.
//!
//! [`Report`] is the extension point for the unhandled-error channel of a
//! [`Scheduler`](crate::Scheduler).
//!
//! ## Rules
//! - Called synchronously, on the scheduler's thread, from the call site that
//!   gave up on the error (a scheduler turn or a multicast broadcast).
//! - Must not call back into the stream that failed; it is mid-delivery.
//! - Reporting never affects delivery to other listeners.

use crate::error::StreamError;

/// Sink for errors nobody else can handle.
pub trait Report: 'static {
    /// Handles one unhandled error.
    fn report(&self, err: &StreamError);

    /// Returns the reporter name used in logs.
    ///
    /// The default uses `type_name::<Self>()`, which can be verbose - override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
