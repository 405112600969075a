//! # Deferred scheduler: explicit microtask queue and local executor.
//!
//! [`Scheduler`] runs callbacks *after* the current synchronous call stack, in
//! FIFO order, on an explicit "run pending" step driven by the embedder. It also
//! polls local futures spawned into it, so producers can `await` between
//! emissions without an external runtime.
//!
//! ## Architecture
//! ```text
//! schedule(f) ──► [job queue] ◄── Poll(id) ◄── woken flags ◄── Waker::wake()
//! spawn(fut)  ──►     │                                             ▲
//!                     ▼                                             │
//!              run_until_idle() / run_pending() / block_on()        │
//!                     │                                             │
//!                     ├─► Call(f)   → f()         ─► Err → report   │
//!                     └─► Poll(id)  → fut.poll()  ─► Pending ───────┘
//!                                                  ─► Ready(Err) → report
//! ```
//!
//! ## Rules
//! - **Never synchronous**: `schedule`/`spawn` only enqueue; nothing runs until
//!   the embedder drives the scheduler.
//! - **FIFO**: jobs run in enqueue order; a woken future is re-enqueued at the tail.
//! - **Errors are reported, not returned**: a failing job goes to the
//!   [`Report`] configured at build time.
//! - **No reentrant drains**: driving the scheduler from inside one of its jobs
//!   is a no-op.
//!
//! ## Example
//! ```
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use streamvisor::Scheduler;
//!
//! let scheduler = Scheduler::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! let l = log.clone();
//! scheduler.schedule(move || {
//!     l.borrow_mut().push("deferred");
//!     Ok(())
//! });
//! log.borrow_mut().push("sync");
//!
//! scheduler.run_until_idle();
//! assert_eq!(*log.borrow(), vec!["sync", "deferred"]);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::pin::{Pin, pin};
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::task::{ArcWake, noop_waker, waker};

use super::builder::SchedulerBuilder;
use super::config::SchedulerConfig;
use crate::error::StreamError;
use crate::reporters::Report;

type Callback = Box<dyn FnOnce() -> Result<(), StreamError>>;

/// Unit of queued work.
enum Job {
    Call(Callback),
    Poll(u64),
}

/// Wake flag shared with the `Waker` of one spawned future.
struct WakeFlag {
    woken: AtomicBool,
}

impl ArcWake for WakeFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::Release);
    }
}

/// A spawned future and its wake flag.
///
/// `future` is `None` while the future is being polled.
struct TaskSlot {
    future: Option<LocalBoxFuture<'static, Result<(), StreamError>>>,
    flag: Arc<WakeFlag>,
}

struct Inner {
    cfg: SchedulerConfig,
    reporter: Rc<dyn Report>,
    queue: RefCell<VecDeque<Job>>,
    tasks: RefCell<BTreeMap<u64, TaskSlot>>,
    next_task: Cell<u64>,
    draining: Cell<bool>,
}

/// Resets the draining flag even if a job panics.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Single-threaded deferred scheduler.
///
/// Cheap to clone; clones share one queue. Streams that emit asynchronously
/// (`of`, `from_source`, late joiners of a completed [`Source`](crate::Source))
/// take a scheduler explicitly, so tests can drive them deterministically.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

impl Scheduler {
    /// Creates a scheduler with the default configuration and a [`LogReporter`](crate::LogReporter).
    pub fn new() -> Self {
        Self::builder(SchedulerConfig::default()).build()
    }

    /// Returns a builder for a customized scheduler.
    pub fn builder(cfg: SchedulerConfig) -> SchedulerBuilder {
        SchedulerBuilder::new(cfg)
    }

    pub(crate) fn new_internal(cfg: SchedulerConfig, reporter: Rc<dyn Report>) -> Self {
        let queue = VecDeque::with_capacity(cfg.queue_capacity_clamped());
        Self {
            inner: Rc::new(Inner {
                cfg,
                reporter,
                queue: RefCell::new(queue),
                tasks: RefCell::new(BTreeMap::new()),
                next_task: Cell::new(0),
                draining: Cell::new(false),
            }),
        }
    }

    /// Enqueues `f` to run on a later turn.
    ///
    /// An `Err` returned by `f` is reported, never propagated to the caller.
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() -> Result<(), StreamError> + 'static,
    {
        self.inner.queue.borrow_mut().push_back(Job::Call(Box::new(f)));
    }

    /// Spawns a local future, first polled on a later turn.
    ///
    /// Each wakeup re-enqueues the future at the tail of the queue.
    /// An `Err` output is reported.
    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = Result<(), StreamError>> + 'static,
    {
        let id = self.inner.next_task.get();
        self.inner.next_task.set(id + 1);

        let slot = TaskSlot {
            future: Some(Box::pin(fut)),
            flag: Arc::new(WakeFlag {
                woken: AtomicBool::new(false),
            }),
        };
        self.inner.tasks.borrow_mut().insert(id, slot);
        self.inner.queue.borrow_mut().push_back(Job::Poll(id));
    }

    /// Forwards an error to the unhandled-error channel.
    pub fn report(&self, err: StreamError) {
        self.inner.reporter.report(&err);
    }

    /// Runs queued work until the queue is empty.
    ///
    /// Work enqueued while draining runs in the same call. Stops early once the
    /// configured drain limit is reached. Returns the number of jobs executed,
    /// or `0` when called from inside a job.
    pub fn run_until_idle(&self) -> usize {
        if self.inner.draining.replace(true) {
            return 0;
        }
        let _guard = DrainGuard(&self.inner.draining);

        let limit = self.inner.cfg.drain_limit();
        let mut ran = 0;
        while let Some(job) = self.next_job() {
            self.execute(job);
            ran += 1;

            if limit.is_some_and(|limit| ran >= limit) {
                if !self.is_idle() {
                    tracing::warn!(limit = ran, pending = self.pending(), "drain limit reached");
                }
                break;
            }
        }

        tracing::debug!(jobs = ran, "scheduler drained");
        ran
    }

    /// Runs only the jobs queued when the call starts (one turn).
    ///
    /// Work enqueued by those jobs waits for the next turn.
    pub fn run_pending(&self) -> usize {
        if self.inner.draining.replace(true) {
            return 0;
        }
        let _guard = DrainGuard(&self.inner.draining);

        self.collect_woken();
        let turn = self.inner.queue.borrow().len();
        let mut ran = 0;
        while ran < turn {
            let job = self.inner.queue.borrow_mut().pop_front();
            let Some(job) = job else { break };
            self.execute(job);
            ran += 1;
        }
        ran
    }

    /// Drives `fut` to completion, running one queued job whenever it is pending.
    ///
    /// Fails with [`StreamError::Stalled`] when `fut` is pending and the queue is
    /// empty, since nothing left can make progress on this thread.
    pub fn block_on<F: Future>(&self, fut: F) -> Result<F::Output, StreamError> {
        let mut fut = pin!(fut);
        let waker = noop_waker();
        let mut cx = Context::from_waker(&waker);

        let nested = self.inner.draining.replace(true);
        let _guard = (!nested).then(|| DrainGuard(&self.inner.draining));

        loop {
            if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
                return Ok(out);
            }
            if nested {
                return Err(StreamError::Stalled);
            }
            match self.next_job() {
                Some(job) => self.execute(job),
                None => return Err(StreamError::Stalled),
            }
        }
    }

    /// Number of runnable jobs (queued callbacks and woken futures).
    #[must_use]
    pub fn pending(&self) -> usize {
        let woken = self
            .inner
            .tasks
            .borrow()
            .values()
            .filter(|slot| slot.flag.woken.load(Ordering::Acquire))
            .count();
        self.inner.queue.borrow().len() + woken
    }

    /// True if no job is runnable.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Number of spawned futures that have not completed yet.
    #[must_use]
    pub fn live_tasks(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    fn next_job(&self) -> Option<Job> {
        self.collect_woken();
        self.inner.queue.borrow_mut().pop_front()
    }

    /// Moves woken futures to the tail of the queue, in spawn order.
    fn collect_woken(&self) {
        let tasks = self.inner.tasks.borrow();
        let mut queue = self.inner.queue.borrow_mut();
        for (id, slot) in tasks.iter() {
            if slot.flag.woken.swap(false, Ordering::AcqRel) {
                queue.push_back(Job::Poll(*id));
            }
        }
    }

    fn execute(&self, job: Job) {
        match job {
            Job::Call(f) => {
                if let Err(err) = f() {
                    self.report(err);
                }
            }
            Job::Poll(id) => self.poll_task(id),
        }
    }

    fn poll_task(&self, id: u64) {
        let taken = {
            let mut tasks = self.inner.tasks.borrow_mut();
            tasks
                .get_mut(&id)
                .and_then(|slot| slot.future.take().map(|fut| (fut, Arc::clone(&slot.flag))))
        };
        // Completed, or a stale wakeup.
        let Some((mut fut, flag)) = taken else {
            return;
        };

        let waker = waker(flag);
        let mut cx = Context::from_waker(&waker);
        match fut.as_mut().poll(&mut cx) {
            Poll::Ready(result) => {
                self.inner.tasks.borrow_mut().remove(&id);
                if let Err(err) = result {
                    self.report(err);
                }
            }
            Poll::Pending => {
                if let Some(slot) = self.inner.tasks.borrow_mut().get_mut(&id) {
                    slot.future = Some(fut);
                }
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.pending())
            .field("live_tasks", &self.live_tasks())
            .field("reporter", &self.inner.reporter.name())
            .finish()
    }
}

/// Future that yields once to the scheduler before completing.
///
/// The awaiting task is re-enqueued at the tail, after everything already queued.
#[derive(Debug, Default)]
#[must_use = "futures do nothing unless polled"]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

/// Yields once to the scheduler.
pub fn yield_now() -> YieldNow {
    YieldNow::default()
}
