//! # LogReporter: tracing-backed reporter
//!
//! The default reporter of every [`Scheduler`](crate::Scheduler). Each unhandled
//! error becomes one `error!` record carrying the stable label and the message.
//!
//! ## Example output
//! ```text
//! ERROR streamvisor::reporters::log: unhandled stream error label="stream_failed" error="error: boom"
//! ```

use crate::error::StreamError;
use crate::reporters::Report;

/// Reporter that logs unhandled errors through `tracing`.
#[derive(Default, Debug, Clone, Copy)]
pub struct LogReporter;

impl LogReporter {
    /// Construct a new [`LogReporter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Report for LogReporter {
    fn report(&self, err: &StreamError) {
        tracing::error!(
            label = err.as_label(),
            error = %err.as_message(),
            "unhandled stream error"
        );
    }

    fn name(&self) -> &'static str {
        "LogReporter"
    }
}
