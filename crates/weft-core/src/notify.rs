#![forbid(unsafe_code)]

//! Subscriber lists and RAII subscription guards.
//!
//! Both the timeline (clock-advance notifications) and individual cell tags
//! (per-cell update notifications) keep an ordered list of callbacks. The
//! engine never schedules work through these callbacks; they exist so an
//! adapter can learn "something may be stale now" and poll the staleness
//! queries on its own cadence.
//!
//! # Invariants
//!
//! 1. Callbacks run in registration order.
//! 2. Dropping a [`Subscription`] removes the callback before the next
//!    notification cycle.
//! 3. Notification snapshots the list first, so a callback may subscribe or
//!    unsubscribe without poisoning the iteration.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

type Entry = (u64, Rc<dyn Fn()>);

/// An ordered list of notification callbacks.
#[derive(Default)]
pub(crate) struct Subscribers {
    entries: Rc<RefCell<Vec<Entry>>>,
    next_id: Cell<u64>,
}

impl Subscribers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a callback; the returned guard removes it on drop.
    pub(crate) fn subscribe(&self, callback: impl Fn() + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            entries: Rc::downgrade(&self.entries),
            id,
        }
    }

    /// Run every callback in registration order.
    pub(crate) fn notify(&self) {
        // Snapshot so callbacks may mutate the list mid-notification.
        let snapshot: Vec<Rc<dyn Fn()>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();
        for callback in snapshot {
            callback();
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

/// RAII guard for a registered notification callback.
///
/// The callback stays registered for as long as the guard is alive. If the
/// subscriber list itself is gone (its owner was dropped), dropping the guard
/// is a no-op.
#[must_use = "dropping a Subscription immediately unsubscribes the callback"]
pub struct Subscription {
    entries: Weak<RefCell<Vec<Entry>>>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.borrow_mut().retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
