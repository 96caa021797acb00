#![forbid(unsafe_code)]

//! The timeline: logical clock plus capture context.
//!
//! A [`Timeline`] owns the monotonic clock and the stack of in-progress
//! frame recorders for one reactive graph. It is an explicit handle rather
//! than ambient global state so that independent graphs (one per test, one
//! per embedded engine instance) can never interfere.
//!
//! # Design
//!
//! The handle is cheaply cloneable (`Rc` inside) and single-threaded by
//! construction; the recorder stack is strictly nested, re-entrant within one
//! logical thread, and never shared across threads. Timestamp comparison is
//! the only synchronization mechanism in the engine: all mutation is
//! serialized by the single-threaded execution model, so there are no locks.
//!
//! # Invariants
//!
//! 1. [`bump`](Timeline::bump) is called exactly once per leaf mutation and
//!    every bump advances the clock by one step.
//! 2. Reads record into the *innermost* recorder only; an enclosing recorder
//!    sees a nested computation as a single frame dependency, not as the
//!    nested computation's individual reads.
//! 3. A recorder pushed by [`with_frame`](Timeline::with_frame) is popped on
//!    every exit path, including unwinding out of the callback; a panicking
//!    callback caches nothing.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use crate::frame::{Dependency, FinalizedFrame, FrameRecorder};
use crate::notify::{Subscribers, Subscription};
use crate::tag::CellTag;
use crate::timestamp::Timestamp;

/// Handle to one reactive graph's clock and capture context.
///
/// Cloning returns a handle to the **same** timeline.
#[derive(Clone)]
pub struct Timeline {
    inner: Rc<TimelineInner>,
}

struct TimelineInner {
    now: Cell<Timestamp>,
    next_id: Cell<u64>,
    recorders: RefCell<Vec<FrameRecorder>>,
    on_advance: Subscribers,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(TimelineInner {
                now: Cell::new(Timestamp::ZERO),
                next_id: Cell::new(1),
                recorders: RefCell::new(Vec::new()),
                on_advance: Subscribers::new(),
            }),
        }
    }

    /// The clock's current value.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.inner.now.get()
    }

    /// Allocate a diagnostic entity id, unique within this timeline.
    #[must_use]
    pub fn next_id(&self) -> u64 {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        id
    }

    /// Advance the clock and stamp `tag` with the new time.
    ///
    /// Notifies the tag's update subscribers, then the timeline's advance
    /// subscribers, in registration order.
    pub fn bump(&self, tag: &CellTag) -> Timestamp {
        let timestamp = self.inner.now.get().next();
        self.inner.now.set(timestamp);
        tag.stamp(timestamp);
        trace!(target: "weft::timeline", cell = tag.description(), %timestamp, "bump");
        tag.notify_update();
        self.inner.on_advance.notify();
        timestamp
    }

    /// Register a callback to run after every clock bump.
    ///
    /// This is the polling hook for adapters: the callback should flag "check
    /// staleness soon", never recompute inline.
    pub fn on_advance(&self, callback: impl Fn() + 'static) -> Subscription {
        self.inner.on_advance.subscribe(callback)
    }

    /// Record a read into the innermost active recorder, if any.
    ///
    /// Frozen cells and constant frames are skipped: neither can ever
    /// invalidate, so recording them would only grow dependency sets.
    pub fn did_consume(&self, dep: Dependency) {
        match &dep {
            Dependency::Cell(tag) if tag.is_frozen() => return,
            Dependency::Frame(frame) if frame.stability().is_constant() => return,
            _ => {}
        }
        if let Some(recorder) = self.inner.recorders.borrow_mut().last_mut() {
            recorder.record(dep);
        }
    }

    /// Whether a tracked computation is currently executing.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        !self.inner.recorders.borrow().is_empty()
    }

    /// Run `callback` as a tracked computation, returning its result together
    /// with the finalized frame of everything it read.
    ///
    /// Nested invocations are supported; each records into its own frame and
    /// the inner frame becomes a dependency of the enclosing one when it is
    /// consumed (see [`did_consume`](Timeline::did_consume)).
    pub fn with_frame<T>(
        &self,
        description: impl Into<String>,
        callback: impl FnOnce() -> T,
    ) -> (T, FinalizedFrame) {
        let description = description.into();
        trace!(target: "weft::timeline", frame = %description, "capture");
        self.inner
            .recorders
            .borrow_mut()
            .push(FrameRecorder::new(description));

        let guard = PopGuard {
            recorders: &self.inner.recorders,
            done: Cell::new(false),
        };
        let value = callback();
        let frame = guard.complete().finalize();
        trace!(
            target: "weft::timeline",
            frame = frame.description(),
            deps = frame.dep_count(),
            finalized_at = %frame.finalized_at(),
            "finalized"
        );
        (value, frame)
    }

    /// Fallible variant of [`with_frame`](Timeline::with_frame): on `Err` the
    /// recorder is still popped but the frame is discarded, so a failed
    /// computation can never leave a partially captured dependency set
    /// behind.
    pub fn try_with_frame<T, E>(
        &self,
        description: impl Into<String>,
        callback: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, FinalizedFrame), E> {
        let (result, frame) = self.with_frame(description, callback);
        result.map(|value| (value, frame))
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("now", &self.inner.now.get())
            .field("capturing", &self.is_capturing())
            .finish()
    }
}

/// Pops the recorder on unwind; `complete` takes it for finalization on the
/// normal path.
struct PopGuard<'a> {
    recorders: &'a RefCell<Vec<FrameRecorder>>,
    done: Cell<bool>,
}

impl PopGuard<'_> {
    fn complete(self) -> FrameRecorder {
        self.done.set(true);
        self.recorders
            .borrow_mut()
            .pop()
            .expect("recorder stack is non-empty inside with_frame")
    }
}

impl Drop for PopGuard<'_> {
    fn drop(&mut self) {
        if !self.done.get() {
            self.recorders.borrow_mut().pop();
        }
    }
}
