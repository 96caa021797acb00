#![forbid(unsafe_code)]

//! Lifecycle-bound resources.
//!
//! A resource is a memo with effects. Its setup callback runs inside a
//! tracked frame and may register two kinds of hooks through the [`On`]
//! capability it receives:
//!
//! - `on.sync(handler)`: runs immediately after setup and again whenever
//!   the *handler's own* tracked dependencies change. The handler returns a
//!   [`Cleanup`] that runs before the next re-run and at teardown.
//! - `on.finalize(handler)`: runs exactly once, at owning-lifetime
//!   termination.
//!
//! # State machine
//!
//! `Unset → Active ⇄ (sync re-runs / instance replacement) → Finalized`
//!
//! The outer setup frame and each sync frame validate independently: a stale
//! sync dependency re-runs only that sync cycle (cleanup first), while a
//! stale setup dependency replaces the whole instance (all pending cleanups
//! first). Finalization is one-shot and terminal.
//!
//! # Invariants
//!
//! 1. At most one active instance per owning lifetime: a new setup never
//!    runs before the previous instance's pending cleanups.
//! 2. Cleanup always precedes the sync re-run it belongs to.
//! 3. At teardown: pending cleanups run in registration order, then
//!    `finalize` handlers in registration order, each exactly once.
//! 4. A replaced instance's `finalize` handlers are discarded without
//!    running; they fire only at lifetime termination, for the instance
//!    alive at that moment.
//!
//! # Failure Modes
//!
//! - **Setup or sync handler panics**: the in-progress instance is abandoned
//!   and the resource returns to `Unset`; the next read starts a fresh setup.
//! - **Re-entrant read** (a resource's own callback reading the resource):
//!   deliberate panic with a descriptive message.

use std::cell::{Cell as StdCell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;

use tracing::{debug, trace, warn};
use weft_core::{Dependency, FinalizedFrame, Result, Timeline};

use crate::lifetime::Lifetime;

/// A one-shot cleanup action returned by a sync handler.
#[derive(Default)]
pub struct Cleanup(Option<Box<dyn FnOnce()>>);

impl Cleanup {
    /// This sync cycle needs no cleanup.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// Run `f` before the next sync re-run (or at teardown, whichever comes
    /// first).
    #[must_use]
    pub fn of(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    fn run(self) {
        if let Some(f) = self.0 {
            f();
        }
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Cleanup").field(&self.0.is_some()).finish()
    }
}

/// The capability handed to a resource's setup callback.
///
/// Only meaningful during setup; registrations are collected when the setup
/// callback returns.
pub struct On {
    syncs: RefCell<Vec<Box<dyn FnMut() -> Cleanup>>>,
    finalizers: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl On {
    fn new() -> Self {
        Self {
            syncs: RefCell::new(Vec::new()),
            finalizers: RefCell::new(Vec::new()),
        }
    }

    /// Register a sync handler. It runs immediately after setup and again
    /// whenever its own tracked dependencies change.
    pub fn sync(&self, handler: impl FnMut() -> Cleanup + 'static) {
        self.syncs.borrow_mut().push(Box::new(handler));
    }

    /// Register a teardown hook that runs exactly once, at owning-lifetime
    /// termination.
    pub fn finalize(&self, handler: impl FnOnce() + 'static) {
        self.finalizers.borrow_mut().push(Box::new(handler));
    }

    #[allow(clippy::type_complexity)]
    fn into_parts(self) -> (Vec<Box<dyn FnMut() -> Cleanup>>, Vec<Box<dyn FnOnce()>>) {
        (self.syncs.into_inner(), self.finalizers.into_inner())
    }
}

/// Recipe for a resource: a setup callback plus a description. Reusable;
/// attaching the same blueprint to two lifetimes yields two independent
/// resources.
pub struct ResourceBlueprint<T> {
    description: String,
    setup: Rc<dyn Fn(&On) -> T>,
}

impl<T> Clone for ResourceBlueprint<T> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            setup: Rc::clone(&self.setup),
        }
    }
}

impl<T: 'static> ResourceBlueprint<T> {
    pub fn new(setup: impl Fn(&On) -> T + 'static) -> Self {
        Self::named(setup, "anonymous resource")
    }

    pub fn named(setup: impl Fn(&On) -> T + 'static, description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            setup: Rc::new(setup),
        }
    }

    /// Bind the blueprint to a timeline and an owning lifetime.
    ///
    /// Setup is lazy: it runs on first read, not here. Fails if the lifetime
    /// is already finalized. The resource's teardown is registered as one of
    /// the lifetime's finalizers, so lifetime termination tears the resource
    /// down in registration order with its siblings.
    pub fn attach(&self, timeline: &Timeline, lifetime: &Lifetime) -> Result<Resource<T>> {
        let resource = Resource {
            inner: Rc::new(ResourceInner {
                timeline: timeline.clone(),
                description: self.description.clone(),
                setup: Rc::clone(&self.setup),
                state: RefCell::new(State::Unset),
            }),
        };
        let teardown = resource.clone();
        lifetime.on_finalize(move || teardown.teardown())?;
        Ok(resource)
    }
}

enum State<T> {
    Unset,
    /// A callback of this resource is currently running.
    Busy,
    Active(Instance<T>),
    Finalized {
        last: Option<T>,
    },
}

struct Instance<T> {
    value: T,
    frame: FinalizedFrame,
    syncs: Vec<SyncSlot>,
    finalizers: Vec<Box<dyn FnOnce()>>,
}

struct SyncSlot {
    description: String,
    handler: Box<dyn FnMut() -> Cleanup>,
    frame: FinalizedFrame,
    cleanup: Cleanup,
}

/// A live, lifetime-bound resource handle.
///
/// Cloning a `Resource` creates a new handle to the **same** instance.
pub struct Resource<T> {
    inner: Rc<ResourceInner<T>>,
}

struct ResourceInner<T> {
    timeline: Timeline,
    description: String,
    setup: Rc<dyn Fn(&On) -> T>,
    state: RefCell<State<T>>,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Resource<T> {
    /// Read the current value, running setup and any due sync cycles first.
    ///
    /// Returns `None` only when the owning lifetime finalized before the
    /// resource was ever read; a finalized-but-used resource keeps returning
    /// its last value. The setup frame is consumed into any enclosing
    /// tracked computation.
    pub fn get(&self) -> Option<T> {
        enum Plan {
            Setup,
            Replace,
            Refresh,
        }

        let plan = {
            let state = self.inner.state.borrow();
            match &*state {
                State::Finalized { last } => return last.clone(),
                State::Busy => self.panic_reentrant(),
                State::Unset => Plan::Setup,
                State::Active(instance) => {
                    if instance.frame.is_valid() {
                        Plan::Refresh
                    } else {
                        Plan::Replace
                    }
                }
            }
        };

        match plan {
            Plan::Setup => self.setup_instance(),
            Plan::Replace => self.replace_instance(),
            Plan::Refresh => self.refresh_syncs(),
        }

        let state = self.inner.state.borrow();
        match &*state {
            State::Active(instance) => {
                self.inner
                    .timeline
                    .did_consume(Dependency::Frame(instance.frame.clone()));
                Some(instance.value.clone())
            }
            State::Finalized { last } => last.clone(),
            State::Unset | State::Busy => None,
        }
    }
}

impl<T: 'static> Resource<T> {
    /// Staleness query for adapters: would the next read run any callback?
    /// Never runs callbacks itself. False once finalized.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        match &*self.inner.state.borrow() {
            State::Unset => true,
            State::Active(instance) => {
                !instance.frame.is_valid()
                    || instance.syncs.iter().any(|slot| !slot.frame.is_valid())
            }
            State::Busy | State::Finalized { .. } => false,
        }
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(&*self.inner.state.borrow(), State::Finalized { .. })
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.inner.description
    }

    /// First-time setup: run the setup callback in a tracked frame, collect
    /// registrations, then run every sync handler once.
    fn setup_instance(&self) {
        debug!(target: "weft::resource", resource = %self.inner.description, "setup");
        *self.inner.state.borrow_mut() = State::Busy;
        let reset = ResetOnUnwind {
            state: &self.inner.state,
            armed: StdCell::new(true),
        };

        let on = On::new();
        let setup = Rc::clone(&self.inner.setup);
        let (value, frame) = self
            .inner
            .timeline
            .with_frame(self.inner.description.clone(), || setup(&on));
        let (handlers, finalizers) = on.into_parts();

        let mut syncs = Vec::with_capacity(handlers.len());
        for (index, mut handler) in handlers.into_iter().enumerate() {
            let description = format!("{} sync #{index}", self.inner.description);
            let (cleanup, frame) = self
                .inner
                .timeline
                .with_frame(description.clone(), || handler());
            syncs.push(SyncSlot {
                description,
                handler,
                frame,
                cleanup,
            });
        }

        reset.disarm();
        let mut state = self.inner.state.borrow_mut();
        if matches!(*state, State::Busy) {
            *state = State::Active(Instance {
                value,
                frame,
                syncs,
                finalizers,
            });
        } else {
            // A callback finalized the owning lifetime mid-setup.
            warn!(
                target: "weft::resource",
                resource = %self.inner.description,
                "lifetime finalized during setup; discarding instance"
            );
        }
    }

    /// The outer setup frame went stale: run all pending cleanups, drop the
    /// instance (including its never-fired finalize handlers), set up anew.
    fn replace_instance(&self) {
        debug!(target: "weft::resource", resource = %self.inner.description, "replace");
        let previous = std::mem::replace(&mut *self.inner.state.borrow_mut(), State::Busy);
        let reset = ResetOnUnwind {
            state: &self.inner.state,
            armed: StdCell::new(true),
        };
        if let State::Active(instance) = previous {
            for slot in instance.syncs {
                slot.cleanup.run();
            }
        }
        reset.disarm();
        *self.inner.state.borrow_mut() = State::Unset;
        self.setup_instance();
    }

    /// The outer frame is valid: re-run exactly the sync cycles whose own
    /// frames went stale, cleanup first.
    fn refresh_syncs(&self) {
        let any_stale = match &*self.inner.state.borrow() {
            State::Active(instance) => instance.syncs.iter().any(|slot| !slot.frame.is_valid()),
            _ => false,
        };
        if !any_stale {
            return;
        }

        let previous = std::mem::replace(&mut *self.inner.state.borrow_mut(), State::Busy);
        let mut instance = match previous {
            State::Active(instance) => instance,
            other => {
                *self.inner.state.borrow_mut() = other;
                return;
            }
        };
        let reset = ResetOnUnwind {
            state: &self.inner.state,
            armed: StdCell::new(true),
        };

        for slot in &mut instance.syncs {
            if slot.frame.is_valid() {
                continue;
            }
            trace!(target: "weft::resource", sync = %slot.description, "re-running");
            std::mem::take(&mut slot.cleanup).run();
            let (cleanup, frame) = self
                .inner
                .timeline
                .with_frame(slot.description.clone(), || (slot.handler)());
            slot.frame = frame;
            slot.cleanup = cleanup;
        }

        reset.disarm();
        let mut state = self.inner.state.borrow_mut();
        if matches!(*state, State::Busy) {
            *state = State::Active(instance);
        }
    }

    /// One-shot teardown, invoked by the owning lifetime's finalizer sweep:
    /// pending cleanups in registration order, then finalize handlers in
    /// registration order. Panics are isolated per callback and the first is
    /// re-raised after the sweep.
    fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.inner.state.borrow_mut(), State::Busy);
        match previous {
            State::Active(instance) => {
                debug!(target: "weft::resource", resource = %self.inner.description, "teardown");
                let Instance {
                    value,
                    frame: _,
                    syncs,
                    finalizers,
                } = instance;

                let mut first_panic = None;
                for slot in syncs {
                    let cleanup = slot.cleanup;
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cleanup.run()))
                        && first_panic.is_none()
                    {
                        first_panic = Some(payload);
                    }
                }
                for finalizer in finalizers {
                    if let Err(payload) = catch_unwind(AssertUnwindSafe(finalizer))
                        && first_panic.is_none()
                    {
                        first_panic = Some(payload);
                    }
                }

                *self.inner.state.borrow_mut() = State::Finalized { last: Some(value) };
                if let Some(payload) = first_panic {
                    resume_unwind(payload);
                }
            }
            State::Unset | State::Busy => {
                *self.inner.state.borrow_mut() = State::Finalized { last: None };
            }
            finalized @ State::Finalized { .. } => {
                *self.inner.state.borrow_mut() = finalized;
            }
        }
    }

    fn panic_reentrant(&self) -> ! {
        panic!(
            "resource `{}` read re-entrantly from its own setup or sync callback",
            self.inner.description
        );
    }
}

impl<T> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &*self.inner.state.borrow() {
            State::Unset => "unset",
            State::Busy => "busy",
            State::Active(_) => "active",
            State::Finalized { .. } => "finalized",
        };
        f.debug_struct("Resource")
            .field("description", &self.inner.description)
            .field("state", &state)
            .finish()
    }
}

/// Returns the resource to `Unset` if a callback unwinds, so a panicking
/// setup or sync never wedges the state machine in `Busy`.
struct ResetOnUnwind<'a, T> {
    state: &'a RefCell<State<T>>,
    armed: StdCell<bool>,
}

impl<T> ResetOnUnwind<'_, T> {
    fn disarm(&self) {
        self.armed.set(false);
    }
}

impl<T> Drop for ResetOnUnwind<'_, T> {
    fn drop(&mut self) {
        if self.armed.get() {
            let mut state = self.state.borrow_mut();
            if matches!(*state, State::Busy) {
                *state = State::Unset;
            }
        }
    }
}
