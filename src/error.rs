//! Error types used by streams, subscriptions and the scheduler.
//!
//! This module defines a single enum, [`StreamError`], covering every failure the
//! crate can surface:
//!
//! - **Construction errors**: [`StreamError::NotObject`], [`StreamError::NotConvertible`].
//! - **Protocol violations**: [`StreamError::InvalidState`].
//! - **Producer / consumer failures**: [`StreamError::Failed`].
//! - **Driver errors**: [`StreamError::Detached`], [`StreamError::Stalled`].
//!
//! Like the rest of the crate, errors carry owned strings so they can be cloned
//! and fanned out to many listeners by a multicast [`Source`](crate::Source).
//! Helper methods (`as_label`, `as_message`) exist for logging.

use std::fmt::Display;

use thiserror::Error;

use crate::core::SubscriptionState;

/// # Errors produced by streams and the scheduler.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// A forwarding call reached a subscription that cannot accept it
    /// (reentrant delivery, or emission while the initializer is still running).
    #[error("invalid subscription state: listener cannot be notified while subscription is {state}")]
    InvalidState {
        /// State the subscription was in when the call arrived.
        state: SubscriptionState,
    },

    /// Conversion was attempted on a missing source.
    #[error("conversion source is not an object")]
    NotObject,

    /// Conversion source exposes no listen, async-iteration or iteration capability.
    #[error("{kind} cannot be converted to a stream")]
    NotConvertible {
        /// Description of the rejected value.
        kind: String,
    },

    /// A producer or a listener failed.
    #[error("stream failed: {error}")]
    Failed {
        /// The underlying error message.
        error: String,
    },

    /// The subscription backing a future was dropped before it completed.
    #[error("subscription dropped before completion")]
    Detached,

    /// A blocking drive ran out of scheduled work while its future was still pending.
    #[error("scheduler stalled: no pending work can complete the future")]
    Stalled,
}

impl StreamError {
    /// Builds a [`StreamError::Failed`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use streamvisor::StreamError;
    ///
    /// let err = StreamError::failed("boom");
    /// assert_eq!(err.to_string(), "stream failed: boom");
    /// ```
    pub fn failed(error: impl Display) -> Self {
        StreamError::Failed {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use streamvisor::StreamError;
    ///
    /// assert_eq!(StreamError::NotObject.as_label(), "stream_not_object");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamError::InvalidState { .. } => "stream_invalid_state",
            StreamError::NotObject => "stream_not_object",
            StreamError::NotConvertible { .. } => "stream_not_convertible",
            StreamError::Failed { .. } => "stream_failed",
            StreamError::Detached => "stream_detached",
            StreamError::Stalled => "scheduler_stalled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StreamError::InvalidState { state } => format!("invalid state: {state}"),
            StreamError::NotObject => "not an object".to_string(),
            StreamError::NotConvertible { kind } => format!("not convertible: {kind}"),
            StreamError::Failed { error } => format!("error: {error}"),
            StreamError::Detached => "detached".to_string(),
            StreamError::Stalled => "stalled".to_string(),
        }
    }

    /// Indicates whether the error reports a protocol violation by the caller.
    ///
    /// Returns `true` only for [`StreamError::InvalidState`].
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, StreamError::InvalidState { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let err = StreamError::InvalidState {
            state: SubscriptionState::Running,
        };
        assert_eq!(err.as_label(), "stream_invalid_state");
        assert!(err.is_protocol_violation());
        assert_eq!(StreamError::failed("x").as_label(), "stream_failed");
        assert!(!StreamError::Stalled.is_protocol_violation());
    }

    #[test]
    fn test_invalid_state_names_the_state() {
        let err = StreamError::InvalidState {
            state: SubscriptionState::Initializing,
        };
        assert!(err.to_string().contains("initializing"));
        assert_eq!(err.as_message(), "invalid state: initializing");
    }

    #[test]
    fn test_not_convertible_mentions_kind() {
        let err = StreamError::NotConvertible {
            kind: "u32".to_string(),
        };
        assert_eq!(err.to_string(), "u32 cannot be converted to a stream");
    }
}
