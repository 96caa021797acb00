#![forbid(unsafe_code)]

//! Owner-scoped finalizer registries.
//!
//! # Invariants
//!
//! 1. Finalizers run in registration order, each exactly once.
//! 2. [`finalize`](Lifetime::finalize) is idempotent, including when called
//!    re-entrantly from inside a finalizer.
//! 3. A panicking finalizer does not prevent the remaining finalizers from
//!    running; the first captured panic is re-raised after the sweep.
//! 4. Once finalization has begun, registration fails; a finalizer can
//!    never outlive its lifetime's terminal transition.

use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use tracing::{debug, error};
use weft_core::{Result, WeftError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Alive,
    Finalizing,
    Finalized,
}

/// An ordered registry of one-shot cleanup callbacks, exclusively owned by
/// whichever component created it.
///
/// Cloning a `Lifetime` creates a new handle to the **same** registry.
#[derive(Clone)]
pub struct Lifetime {
    inner: Rc<LifetimeInner>,
}

struct LifetimeInner {
    description: String,
    state: Cell<State>,
    finalizers: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Lifetime {
    #[must_use]
    pub fn new() -> Self {
        Self::named("anonymous lifetime")
    }

    #[must_use]
    pub fn named(description: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(LifetimeInner {
                description: description.into(),
                state: Cell::new(State::Alive),
                finalizers: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Append a finalizer. Fails once finalization has begun.
    pub fn on_finalize(&self, finalizer: impl FnOnce() + 'static) -> Result<()> {
        if self.inner.state.get() != State::Alive {
            return Err(WeftError::LifetimeFinalized {
                description: self.inner.description.clone(),
            });
        }
        self.inner.finalizers.borrow_mut().push(Box::new(finalizer));
        Ok(())
    }

    /// Run all registered finalizers in registration order. Idempotent.
    ///
    /// Each finalizer runs behind `catch_unwind` so one failure cannot
    /// starve the rest; after the sweep, the first captured panic is
    /// re-raised.
    pub fn finalize(&self) {
        if self.inner.state.get() != State::Alive {
            return;
        }
        self.inner.state.set(State::Finalizing);

        let finalizers = std::mem::take(&mut *self.inner.finalizers.borrow_mut());
        debug!(
            target: "weft::lifetime",
            lifetime = %self.inner.description,
            count = finalizers.len(),
            "finalizing"
        );

        let mut first_panic = None;
        for finalizer in finalizers {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(finalizer)) {
                error!(
                    target: "weft::lifetime",
                    lifetime = %self.inner.description,
                    "finalizer panicked"
                );
                if first_panic.is_none() {
                    first_panic = Some(payload);
                }
            }
        }

        self.inner.state.set(State::Finalized);
        if let Some(payload) = first_panic {
            resume_unwind(payload);
        }
    }

    /// Whether finalization has begun (registration is closed).
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.inner.state.get() != State::Alive
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.inner.description
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifetime")
            .field("description", &self.inner.description)
            .field("state", &self.inner.state.get())
            .field("finalizers", &self.inner.finalizers.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording(events: &Rc<RefCell<Vec<&'static str>>>, name: &'static str) -> impl FnOnce() + use<> {
        let log = events.clone();
        move || log.borrow_mut().push(name)
    }

    #[test]
    fn finalizers_run_in_registration_order() {
        let lifetime = Lifetime::named("ordered");
        let events = Rc::new(RefCell::new(Vec::new()));

        lifetime.on_finalize(recording(&events, "first")).unwrap();
        lifetime.on_finalize(recording(&events, "second")).unwrap();
        lifetime.on_finalize(recording(&events, "third")).unwrap();

        lifetime.finalize();
        assert_eq!(*events.borrow(), vec!["first", "second", "third"]);
    }

    #[test]
    fn finalize_is_idempotent() {
        let lifetime = Lifetime::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        lifetime.on_finalize(recording(&events, "once")).unwrap();

        lifetime.finalize();
        lifetime.finalize();
        assert_eq!(*events.borrow(), vec!["once"]);
    }

    #[test]
    fn registration_fails_after_finalize() {
        let lifetime = Lifetime::named("closed");
        lifetime.finalize();

        let err = lifetime.on_finalize(|| {}).unwrap_err();
        assert!(matches!(err, WeftError::LifetimeFinalized { .. }));
    }

    #[test]
    fn registration_fails_from_inside_a_finalizer() {
        let lifetime = Lifetime::new();
        let observed = Rc::new(RefCell::new(None));

        let reentrant = lifetime.clone();
        let slot = observed.clone();
        lifetime
            .on_finalize(move || {
                *slot.borrow_mut() = Some(reentrant.on_finalize(|| {}).is_err());
            })
            .unwrap();

        lifetime.finalize();
        assert_eq!(*observed.borrow(), Some(true));
    }

    #[test]
    fn reentrant_finalize_is_a_no_op() {
        let lifetime = Lifetime::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        let reentrant = lifetime.clone();
        let log = events.clone();
        lifetime
            .on_finalize(move || {
                log.borrow_mut().push("outer");
                reentrant.finalize();
            })
            .unwrap();
        lifetime.on_finalize(recording(&events, "second")).unwrap();

        lifetime.finalize();
        assert_eq!(*events.borrow(), vec!["outer", "second"]);
    }

    #[test]
    fn panicking_finalizer_does_not_starve_the_rest() {
        let lifetime = Lifetime::new();
        let events = Rc::new(RefCell::new(Vec::new()));

        lifetime.on_finalize(recording(&events, "before")).unwrap();
        lifetime.on_finalize(|| panic!("bad finalizer")).unwrap();
        lifetime.on_finalize(recording(&events, "after")).unwrap();

        let result = catch_unwind(AssertUnwindSafe(|| lifetime.finalize()));
        assert!(result.is_err());
        assert_eq!(*events.borrow(), vec!["before", "after"]);
        assert!(lifetime.is_finalized());

        // Still idempotent after a panicking sweep.
        lifetime.finalize();
        assert_eq!(*events.borrow(), vec!["before", "after"]);
    }
}
