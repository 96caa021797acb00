#![forbid(unsafe_code)]

//! Lazily revalidated derived values.
//!
//! A [`Memo<T>`] wraps a zero-argument callback and at most one cached
//! `(value, frame)` pair. Reads validate the cached frame against the clock:
//! if no captured dependency moved past the frame's finalization time, the
//! cached value is returned without running the callback; otherwise the
//! callback re-runs inside a fresh frame and the cache is replaced wholesale.
//!
//! # Invariants
//!
//! 1. Staleness is *derived* from timestamps, never pushed: there is no
//!    invalidation API on a memo.
//! 2. A memo whose frame captured zero dependencies is permanently stable;
//!    the callback never runs again. This is a correctness guarantee: such a
//!    computation has no inputs that could change its result.
//! 3. Reading a memo registers its frame (not its individual reads) in the
//!    enclosing tracked computation, so staleness propagates transitively
//!    through memo-reads-memo chains.
//!
//! # Failure Modes
//!
//! - **Callback panics**: the recorder is popped during unwind and nothing is
//!   cached; the memo keeps its previous cache (stale but intact) or stays
//!   uninitialized.
//! - **Self-referential callback**: a memo whose callback reads the same memo
//!   recurses until the stack overflows. Don't.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;
use weft_core::{Dependency, FinalizedFrame, Stability, Timeline};

/// A cached derived value, revalidated lazily on read.
///
/// Cloning a `Memo` creates a new handle to the **same** cache.
pub struct Memo<T> {
    inner: Rc<MemoInner<T>>,
}

struct MemoInner<T> {
    timeline: Timeline,
    description: String,
    compute: Box<dyn Fn() -> T>,
    cache: RefCell<Option<Cached<T>>>,
}

struct Cached<T> {
    value: T,
    frame: FinalizedFrame,
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> Memo<T> {
    pub fn new(timeline: &Timeline, compute: impl Fn() -> T + 'static) -> Self {
        Self::named(timeline, compute, "anonymous memo")
    }

    pub fn named(
        timeline: &Timeline,
        compute: impl Fn() -> T + 'static,
        description: impl Into<String>,
    ) -> Self {
        Self {
            inner: Rc::new(MemoInner {
                timeline: timeline.clone(),
                description: description.into(),
                compute: Box::new(compute),
                cache: RefCell::new(None),
            }),
        }
    }

    /// Access the current value by reference, recomputing first if the cached
    /// frame is stale.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        {
            let cache = self.inner.cache.borrow();
            if let Some(cached) = cache.as_ref()
                && cached.frame.is_valid()
            {
                trace!(
                    target: "weft::memo",
                    memo = %self.inner.description,
                    "valid frame, reusing"
                );
                self.inner
                    .timeline
                    .did_consume(Dependency::Frame(cached.frame.clone()));
                return f(&cached.value);
            }
            trace!(
                target: "weft::memo",
                memo = %self.inner.description,
                initializing = cache.is_none(),
                "recomputing"
            );
        }

        let (value, frame) = self
            .inner
            .timeline
            .with_frame(self.inner.description.clone(), || (self.inner.compute)());
        self.inner
            .timeline
            .did_consume(Dependency::Frame(frame.clone()));
        let result = f(&value);
        *self.inner.cache.borrow_mut() = Some(Cached { value, frame });
        result
    }

    /// Staleness query for adapters: true iff a cached frame exists and
    /// validates. Never triggers recomputation.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.inner
            .cache
            .borrow()
            .as_ref()
            .is_some_and(|cached| cached.frame.is_valid())
    }

    /// Dynamic until first computed; afterwards, the cached frame's
    /// classification.
    #[must_use]
    pub fn stability(&self) -> Stability {
        self.inner
            .cache
            .borrow()
            .as_ref()
            .map_or(Stability::Dynamic, |cached| cached.frame.stability())
    }

    /// The cached frame, if the memo has been computed at least once.
    #[must_use]
    pub fn frame(&self) -> Option<FinalizedFrame> {
        self.inner
            .cache
            .borrow()
            .as_ref()
            .map(|cached| cached.frame.clone())
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.inner.description
    }
}

impl<T: Clone + 'static> Memo<T> {
    /// Clone the current value out, recomputing first if stale.
    #[must_use]
    pub fn get(&self) -> T {
        self.with(T::clone)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.inner.cache.borrow();
        f.debug_struct("Memo")
            .field("description", &self.inner.description)
            .field("value", &cache.as_ref().map(|cached| &cached.value))
            .field(
                "valid",
                &cache.as_ref().map(|cached| cached.frame.is_valid()),
            )
            .finish()
    }
}
