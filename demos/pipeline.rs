//! # Example: Conversion pipeline
//!
//! Converts an async iterator into a stream, derives a pipeline from it and
//! consumes it twice: once with `for_each`, once as a `futures::Stream`.

use futures::StreamExt;
use streamvisor::{Convertible, Scheduler, Species, Step, Stream, yield_now};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let scheduler = Scheduler::new();
    let readings = Convertible::async_iter(|| {
        futures::stream::iter(1..=10u32).then(|v| async move {
            yield_now().await;
            v
        })
    });

    let stream = Stream::from_source(&scheduler, Some(readings))?
        .filter(|v| v % 3 != 0)
        .map(|v| v * v);

    // Stops the producer at the first square above 40.
    let first_large = stream.for_each(|v| {
        println!("[for_each] {v}");
        if v > 40 { Step::done_with(v) } else { Step::more() }
    });
    println!("[for_each] resolved {:?}", scheduler.block_on(first_large)?);

    let all: Vec<_> = scheduler.block_on(stream.iter()?.collect::<Vec<_>>())?;
    println!("[iter] {all:?}");

    Ok(())
}
