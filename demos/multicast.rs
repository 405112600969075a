//! # Example: Multicast source
//!
//! Two listeners share one source; one of them fails on every value and is
//! isolated (its errors go to the reporter), the other keeps receiving. A late
//! listener joining after completion is completed on the next scheduler turn.
//!
//! Run with `RUST_LOG=debug` to see registration changes.

use std::cell::RefCell;
use std::rc::Rc;

use streamvisor::{Collector, Handlers, Scheduler, SchedulerConfig, StreamError, Source};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let collector = Collector::new();
    let scheduler = Scheduler::builder(SchedulerConfig::default())
        .with_reporter(collector.clone())
        .build();
    let source: Source<u32> = Source::new(&scheduler);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let out = seen.clone();
    let steady = source.listen(move |v: u32| out.borrow_mut().push(v))?;

    source.listen(|v: u32| -> Result<(), StreamError> {
        Err(StreamError::failed(format!("flaky listener rejected {v}")))
    })?;

    for v in 1..=3 {
        source.next(v);
    }
    println!("[steady] received {:?}", seen.borrow());
    println!("[reporter] {} isolated errors", collector.len());

    steady.cancel()?;
    source.complete(None);
    println!("[source] done={} listeners={}", source.is_done(), source.len());

    source.stream().listen(
        Handlers::new().on_return(|_| println!("[late] completed on a later turn")),
    )?;
    println!("[late] registered");
    scheduler.run_until_idle();

    Ok(())
}
