//! Streams: the public producer type and everything derived from it.
//!
//! ## Contents
//! - [`Stream`] immutable wrapper around an initializer; one subscription per `listen`
//! - [`Species`] factory capability deciding which type derived streams are built with
//! - [`Convertible`] inputs accepted by [`Species::from_source`]
//! - [`ForEach`] future returned by [`Species::for_each`]
//! - [`AsyncIter`] pull-based adapter returned by [`Species::iter`]
//!
//! ## Quick wiring
//! ```text
//! Stream::new(init) ──► listen(listener) ──► Subscription ──► init(Sink)
//!        │
//!        ├─► map / try_map / filter / try_filter ──► derived stream (listens upstream)
//!        ├─► for_each(f) ─────────────────────────► ForEach future
//!        └─► iter() ──────────────────────────────► AsyncIter (futures::Stream)
//!
//! Species::of(scheduler, items)          ─► emits on a later scheduler turn
//! Species::from_source(scheduler, input) ─► wraps / drains on a later scheduler turn
//! ```

mod convert;
mod for_each;
mod iter;
mod species;
#[allow(clippy::module_inception)]
mod stream;

pub use convert::Convertible;
pub use for_each::ForEach;
pub use iter::{AsyncIter, IterStep};
pub use species::Species;
pub use stream::{Listen, Stream};
