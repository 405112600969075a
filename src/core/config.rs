//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`] centralized settings for the deferred scheduler.
//!
//! Config is used once, at build time:
//! `Scheduler::builder(config).with_reporter(..).build()`.
//!
//! ## Sentinel values
//! - `drain_limit = 0` → unlimited (`run_until_idle` runs until the queue is empty)
//! - `queue_capacity = 0` → clamped to 1

/// Configuration for a [`Scheduler`](crate::Scheduler).
///
/// ## Field semantics
/// - `drain_limit`: Maximum jobs executed by one `run_until_idle` call (`0` = unlimited)
/// - `queue_capacity`: Initial capacity of the job queue (min 1)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
///
/// # Example
/// ```
/// use streamvisor::SchedulerConfig;
///
/// let mut cfg = SchedulerConfig::default();
/// cfg.drain_limit = 10_000;
///
/// assert_eq!(cfg.drain_limit(), Some(10_000));
/// assert_eq!(SchedulerConfig::default().drain_limit(), None);
/// ```
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Maximum number of jobs one `run_until_idle` call may execute.
    ///
    /// - `0` = unlimited
    /// - `n > 0` = stop after `n` jobs, leaving the rest queued
    ///
    /// A producer that keeps re-scheduling itself never lets the queue drain;
    /// a limit turns that livelock into a visible `warn!` and a partial drain.
    pub drain_limit: usize,

    /// Initial capacity of the job queue.
    pub queue_capacity: usize,
}

impl SchedulerConfig {
    /// Returns the drain limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` jobs per drain
    #[inline]
    pub fn drain_limit(&self) -> Option<usize> {
        if self.drain_limit == 0 {
            None
        } else {
            Some(self.drain_limit)
        }
    }

    /// Returns the queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `drain_limit = 0` (unlimited)
    /// - `queue_capacity = 64`
    fn default() -> Self {
        Self {
            drain_limit: 0,
            queue_capacity: 64,
        }
    }
}
