//! # Collector: reporter that keeps what it receives
//!
//! Useful in tests and in embedders that surface unhandled errors on their own
//! schedule. Clones share one buffer, so a clone can be handed to the scheduler
//! while the original is kept for inspection.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::StreamError;
use crate::reporters::Report;

/// Reporter that retains unhandled errors in arrival order.
#[derive(Default, Debug, Clone)]
pub struct Collector {
    errors: Rc<RefCell<Vec<StreamError>>>,
}

impl Collector {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the collected errors.
    pub fn errors(&self) -> Vec<StreamError> {
        self.errors.borrow().clone()
    }

    /// Removes and returns the collected errors.
    pub fn take(&self) -> Vec<StreamError> {
        std::mem::take(&mut *self.errors.borrow_mut())
    }

    /// Number of errors collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.borrow().len()
    }

    /// True if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.borrow().is_empty()
    }
}

impl Report for Collector {
    fn report(&self, err: &StreamError) {
        self.errors.borrow_mut().push(err.clone());
    }

    fn name(&self) -> &'static str {
        "Collector"
    }
}
