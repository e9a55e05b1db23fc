// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn get(self) -> u64 {
        self.0
    }
}

type Slot<T> = Rc<dyn Fn(&T)>;

struct Slots<T> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(ConnectionId, Slot<T>)>>,
}

/// A named notification with subscribe/publish semantics.
///
/// Cloning a signal yields another handle to the same subscriber list, so an
/// owner can hand a clone to a slot that needs to re-emit. Slots run
/// synchronously, in connection order, on the emitting thread.
pub struct Signal<T> {
    slots: Rc<Slots<T>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Rc::new(Slots {
                next_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&T) + 'static,
    {
        let id = ConnectionId(self.slots.next_id.get());
        self.slots.next_id.set(id.0 + 1);
        self.slots.entries.borrow_mut().push((id, Rc::new(slot)));
        id
    }

    pub fn disconnect(&self, id: ConnectionId) -> bool {
        let mut entries = self.slots.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(candidate, _)| *candidate != id);
        entries.len() != before
    }

    pub fn connection_count(&self) -> usize {
        self.slots.entries.borrow().len()
    }

    pub fn emit(&self, args: &T) {
        // Snapshot first: a slot may connect or disconnect while running.
        let slots = self
            .slots
            .entries
            .borrow()
            .iter()
            .map(|(_, slot)| Rc::clone(slot))
            .collect::<Vec<_>>();
        for slot in slots {
            slot(args);
        }
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::Signal;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn slots_run_in_connection_order() {
        let signal = Signal::<i32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = Rc::clone(&seen);
        signal.connect(move |value| first.borrow_mut().push(("first", *value)));
        let second = Rc::clone(&seen);
        signal.connect(move |value| second.borrow_mut().push(("second", *value)));

        signal.emit(&3);
        assert_eq!(*seen.borrow(), vec![("first", 3), ("second", 3)]);
    }

    #[test]
    fn disconnect_removes_only_that_slot() {
        let signal = Signal::<()>::new();
        let count = Rc::new(RefCell::new(0));

        let counter = Rc::clone(&count);
        let id = signal.connect(move |_| *counter.borrow_mut() += 1);
        let counter = Rc::clone(&count);
        signal.connect(move |_| *counter.borrow_mut() += 10);

        assert!(signal.disconnect(id));
        assert!(!signal.disconnect(id));
        signal.emit(&());
        assert_eq!(*count.borrow(), 10);
        assert_eq!(signal.connection_count(), 1);
    }

    #[test]
    fn clones_share_subscribers() {
        let signal = Signal::<&'static str>::new();
        let relay = signal.clone();
        let seen = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&seen);
        signal.connect(move |value| *sink.borrow_mut() = Some(*value));

        relay.emit(&"reset");
        assert_eq!(*seen.borrow(), Some("reset"));
    }

    #[test]
    fn slot_may_connect_during_emit() {
        let signal = Signal::<()>::new();
        let inner = signal.clone();
        signal.connect(move |_| {
            inner.connect(|_| {});
        });
        signal.emit(&());
        assert_eq!(signal.connection_count(), 2);
    }
}
