use std::rc::Rc;

use super::config::SchedulerConfig;
use super::scheduler::Scheduler;
use crate::reporters::{LogReporter, Report};

/// Builder for constructing a [`Scheduler`] with optional features.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    reporter: Option<Rc<dyn Report>>,
}

impl SchedulerBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: SchedulerConfig) -> Self {
        Self {
            cfg,
            reporter: None,
        }
    }

    /// Sets the unhandled-error reporter.
    ///
    /// Without one, the scheduler uses [`LogReporter`].
    pub fn with_reporter(mut self, reporter: impl Report) -> Self {
        self.reporter = Some(Rc::new(reporter));
        self
    }

    /// Sets an already shared reporter.
    pub fn with_shared_reporter(mut self, reporter: Rc<dyn Report>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Builds and returns the scheduler.
    pub fn build(self) -> Scheduler {
        let reporter = self
            .reporter
            .unwrap_or_else(|| Rc::new(LogReporter::new()));
        Scheduler::new_internal(self.cfg, reporter)
    }
}
