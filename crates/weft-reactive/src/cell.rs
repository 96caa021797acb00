#![forbid(unsafe_code)]

//! Mutable leaf reactive values.
//!
//! A [`Cell<T>`] is the only kind of entity whose mutation advances the
//! clock. Reads register the cell as a dependency of the innermost tracked
//! computation; writes stamp the cell with a fresh timestamp, which is what
//! makes every frame that captured it stale from that point on.
//!
//! # Invariants
//!
//! 1. Every successful [`set`](Cell::set) produces a new timestamp strictly
//!    greater than the previous global maximum. There is no equality
//!    short-circuit: writing the same value still counts as a mutation.
//! 2. A frozen cell never changes again: `set` fails, reads are untracked,
//!    and frames holding the cell never revalidate against it.
//!
//! # Failure Modes
//!
//! - `set`/`update` on a frozen cell: returns
//!   [`WeftError::FrozenCell`](weft_core::WeftError) and leaves the value
//!   untouched.

use std::cell::RefCell;
use std::rc::Rc;

use weft_core::{
    CellTag, Dependency, Result, Stability, Subscription, Timeline, Timestamp, WeftError,
};

/// A mutable leaf value on a timeline.
///
/// Cloning a `Cell` creates a new handle to the **same** value.
pub struct Cell<T> {
    timeline: Timeline,
    tag: Rc<CellTag>,
    value: Rc<RefCell<T>>,
}

impl<T> Clone for Cell<T> {
    fn clone(&self) -> Self {
        Self {
            timeline: self.timeline.clone(),
            tag: Rc::clone(&self.tag),
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Cell<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cell")
            .field("description", &self.tag.description())
            .field("value", &*self.value.borrow())
            .field("last_updated", &self.tag.last_updated())
            .field("frozen", &self.tag.is_frozen())
            .finish()
    }
}

impl<T: 'static> Cell<T> {
    pub fn new(timeline: &Timeline, value: T) -> Self {
        Self::named(timeline, value, "anonymous cell")
    }

    /// Create a cell stamped with the timeline's current time (creation does
    /// not bump the clock).
    pub fn named(timeline: &Timeline, value: T, description: impl Into<String>) -> Self {
        Self {
            timeline: timeline.clone(),
            tag: CellTag::new(timeline.next_id(), description, timeline.now()),
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// Access the value by reference, registering this cell as a dependency
    /// of the innermost tracked computation (unless frozen).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.timeline
            .did_consume(Dependency::Cell(Rc::clone(&self.tag)));
        f(&self.value.borrow())
    }

    /// Replace the value and advance the clock.
    pub fn set(&self, value: T) -> Result<()> {
        self.mutate(|slot| *slot = value)
    }

    /// Mutate the value in place and advance the clock.
    pub fn update(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        self.mutate(f)
    }

    fn mutate(&self, f: impl FnOnce(&mut T)) -> Result<()> {
        if self.tag.is_frozen() {
            return Err(WeftError::FrozenCell {
                description: self.tag.description().to_string(),
            });
        }
        f(&mut self.value.borrow_mut());
        self.timeline.bump(&self.tag);
        Ok(())
    }

    /// Make the cell immutable. Irreversible; subsequent reads have no
    /// tracking side effect.
    pub fn freeze(&self) {
        self.tag.freeze();
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.tag.is_frozen()
    }

    #[must_use]
    pub fn last_updated(&self) -> Timestamp {
        self.tag.last_updated()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        self.tag.description()
    }

    /// Frozen cells are constant; everything else is dynamic.
    #[must_use]
    pub fn stability(&self) -> Stability {
        if self.tag.is_frozen() {
            Stability::Constant
        } else {
            Stability::Dynamic
        }
    }

    /// Register a callback for mutations of this cell.
    pub fn on_update(&self, callback: impl Fn() + 'static) -> Subscription {
        self.tag.on_update(callback)
    }

    /// The untyped core shared with frames that captured this cell.
    #[must_use]
    pub fn tag(&self) -> &Rc<CellTag> {
        &self.tag
    }
}

impl<T: Clone + 'static> Cell<T> {
    /// Clone the current value out. See [`with`](Cell::with) for tracking
    /// semantics.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_bumps_clock() {
        let timeline = Timeline::new();
        let cell = Cell::new(&timeline, 1);
        let created = cell.last_updated();

        cell.set(2).unwrap();
        assert_eq!(cell.get(), 2);
        assert!(cell.last_updated() > created);
    }

    #[test]
    fn same_value_still_bumps() {
        let timeline = Timeline::new();
        let cell = Cell::new(&timeline, 7);
        cell.set(7).unwrap();
        let first = cell.last_updated();
        cell.set(7).unwrap();
        assert!(cell.last_updated() > first);
    }

    #[test]
    fn frozen_cell_rejects_set() {
        let timeline = Timeline::new();
        let cell = Cell::named(&timeline, "v1", "config");
        cell.freeze();

        let err = cell.set("v2").unwrap_err();
        assert!(matches!(err, WeftError::FrozenCell { .. }));
        assert_eq!(cell.get(), "v1");
        assert_eq!(cell.stability(), Stability::Constant);
    }

    #[test]
    fn tracked_read_records_dependency() {
        let timeline = Timeline::new();
        let cell = Cell::named(&timeline, 10, "tracked");

        let (value, frame) = timeline.with_frame("reader", || cell.get());
        assert_eq!(value, 10);
        assert_eq!(frame.dep_count(), 1);
        assert!(frame.is_valid());

        cell.set(11).unwrap();
        assert!(!frame.is_valid());
    }

    #[test]
    fn frozen_read_is_untracked() {
        let timeline = Timeline::new();
        let cell = Cell::new(&timeline, 1);
        cell.freeze();

        let (_, frame) = timeline.with_frame("reader", || cell.get());
        assert_eq!(frame.dep_count(), 0);
    }

    #[test]
    fn update_mutates_in_place() {
        let timeline = Timeline::new();
        let cell = Cell::new(&timeline, vec![1, 2]);
        cell.update(|v| v.push(3)).unwrap();
        assert_eq!(cell.get(), vec![1, 2, 3]);
    }

    #[test]
    fn clone_shares_state() {
        let timeline = Timeline::new();
        let a = Cell::new(&timeline, 5);
        let b = a.clone();
        a.set(6).unwrap();
        assert_eq!(b.get(), 6);
        assert!(Rc::ptr_eq(a.tag(), b.tag()));
    }

    #[test]
    fn on_update_fires_per_mutation() {
        let timeline = Timeline::new();
        let cell = Cell::new(&timeline, 0);
        let count = Rc::new(std::cell::Cell::new(0u32));

        let counter = count.clone();
        let sub = cell.on_update(move || counter.set(counter.get() + 1));
        cell.set(1).unwrap();
        cell.set(2).unwrap();
        assert_eq!(count.get(), 2);

        drop(sub);
        cell.set(3).unwrap();
        assert_eq!(count.get(), 2);
    }
}
