//! # SinkSet: the registry behind a multicast source.
//!
//! Holds the live sinks in registration order plus the table of callback
//! listeners used for de-duplication. Fan-out always iterates a snapshot, so a
//! listener may cancel itself (or others) while a broadcast is in flight; a
//! sink closed mid-broadcast simply returns a done step.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use crate::core::{Cancel, Sink};

struct Entry<T> {
    id: u64,
    sink: Sink<T>,
}

pub(super) struct SinkSet<T> {
    entries: RefCell<Vec<Entry<T>>>,
    callbacks: RefCell<HashMap<usize, Cancel>>,
    next_id: Cell<u64>,
}

impl<T: 'static> SinkSet<T> {
    pub(super) fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            callbacks: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    /// Adds a sink; returns the key used to remove it.
    pub(super) fn insert(&self, sink: Sink<T>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push(Entry { id, sink });
        id
    }

    /// Removes a sink and forgets callback registrations that have closed.
    pub(super) fn remove(&self, id: u64) {
        self.entries.borrow_mut().retain(|entry| entry.id != id);
        self.prune();
    }

    /// Live sinks, in registration order.
    pub(super) fn snapshot(&self) -> Vec<Sink<T>> {
        self.entries
            .borrow()
            .iter()
            .map(|entry| entry.sink.clone())
            .collect()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Open registration for a callback, if any.
    pub(super) fn callback(&self, key: usize) -> Option<Cancel> {
        self.prune();
        self.callbacks.borrow().get(&key).cloned()
    }

    pub(super) fn remember(&self, key: usize, cancel: Cancel) {
        if !cancel.is_closed() {
            self.callbacks.borrow_mut().insert(key, cancel);
        }
    }

    fn prune(&self) {
        self.callbacks
            .borrow_mut()
            .retain(|_, cancel| !cancel.is_closed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::Stream;
    use std::rc::Rc;

    fn sinks(n: usize) -> Vec<Sink<u32>> {
        let out: Rc<RefCell<Vec<Sink<u32>>>> = Rc::default();
        let o = out.clone();
        let stream = Stream::new(move |sink: Sink<u32>| o.borrow_mut().push(sink));
        for _ in 0..n {
            stream.listen(|_: u32| ()).unwrap();
        }
        out.take()
    }

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let set = SinkSet::new();
        let all = sinks(3);
        let ids: Vec<u64> = all.iter().map(|s| set.insert(s.clone())).collect();

        set.remove(ids[1]);
        let snap = set.snapshot();

        assert_eq!(set.len(), 2);
        assert!(Sink::ptr_eq(&snap[0], &all[0]));
        assert!(Sink::ptr_eq(&snap[1], &all[2]));
    }

    #[test]
    fn test_closed_callbacks_are_pruned() {
        let set: SinkSet<u32> = SinkSet::new();
        let all = sinks(1);
        let cancel = all[0].cancel_handle();

        set.remember(7, cancel.clone());
        assert!(set.callback(7).is_some());

        cancel.cancel().unwrap();
        assert!(set.callback(7).is_none());
    }
}
