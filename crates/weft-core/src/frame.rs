#![forbid(unsafe_code)]

//! Frames: recorded snapshots of one tracked computation.
//!
//! While a tracked computation runs, the innermost [`FrameRecorder`] on the
//! timeline's stack collects every dependency the computation reads. When the
//! computation completes, the recorder is finalized into an immutable
//! [`FinalizedFrame`]: the deduplicated dependency set, the maximum dependency
//! timestamp observed, and a [`Stability`] classification.
//!
//! # Invariants
//!
//! 1. A finalized frame is never mutated; recomputation replaces it
//!    wholesale.
//! 2. A frame is valid iff none of its dependencies has a live timestamp
//!    strictly greater than the frame's own `finalized_at`.
//! 3. A [`Stability::Constant`] frame (zero recorded dependencies) is valid
//!    forever. This is a correctness guarantee, not an optimization: a
//!    computation that read nothing dynamic can never be invalidated.
//! 4. Staleness propagates transitively: a frame recorded as a dependency of
//!    an enclosing frame is checked through its *own* dependencies.

use std::rc::Rc;

use smallvec::SmallVec;

use crate::tag::CellTag;
use crate::timestamp::Timestamp;

/// Classification of a finalized frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Zero dynamic dependencies; the value never needs revalidation.
    Constant,
    /// At least one dependency; validity must be checked against the clock.
    Dynamic,
}

impl Stability {
    #[must_use]
    pub fn is_constant(self) -> bool {
        matches!(self, Self::Constant)
    }
}

/// One edge in the dependency graph: either a leaf tag or a nested frame.
///
/// A closed sum type dispatched by pattern matching; nothing in the engine
/// asks "what kind of reactive is this?" at runtime by any other means.
#[derive(Clone)]
pub enum Dependency {
    Cell(Rc<CellTag>),
    Frame(FinalizedFrame),
}

impl Dependency {
    /// Whether this dependency was mutated after `timestamp`. For a nested
    /// frame the check recurses through the frame's own dependencies, which
    /// is what makes staleness transitive.
    #[must_use]
    pub fn updated_since(&self, timestamp: Timestamp) -> bool {
        match self {
            Self::Cell(tag) => tag.is_updated_since(timestamp),
            Self::Frame(frame) => frame.updated_since(timestamp),
        }
    }

    /// The dependency's stamp as observed right now.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Cell(tag) => tag.last_updated(),
            Self::Frame(frame) => frame.finalized_at(),
        }
    }

    #[must_use]
    pub fn description(&self) -> &str {
        match self {
            Self::Cell(tag) => tag.description(),
            Self::Frame(frame) => frame.description(),
        }
    }

    fn same_identity(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Cell(a), Self::Cell(b)) => Rc::ptr_eq(a, b),
            (Self::Frame(a), Self::Frame(b)) => Rc::ptr_eq(&a.core, &b.core),
            _ => false,
        }
    }
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cell(tag) => f.debug_tuple("Cell").field(&tag.description()).finish(),
            Self::Frame(frame) => f.debug_tuple("Frame").field(&frame.description()).finish(),
        }
    }
}

/// An in-progress frame: the top of the timeline's recorder stack while a
/// tracked computation is executing.
pub(crate) struct FrameRecorder {
    description: String,
    deps: SmallVec<[Dependency; 4]>,
}

impl FrameRecorder {
    pub(crate) fn new(description: String) -> Self {
        Self {
            description,
            deps: SmallVec::new(),
        }
    }

    /// Record a read, deduplicating by identity.
    pub(crate) fn record(&mut self, dep: Dependency) {
        if !self.deps.iter().any(|seen| seen.same_identity(&dep)) {
            self.deps.push(dep);
        }
    }

    /// Seal the recorder into an immutable frame.
    pub(crate) fn finalize(self) -> FinalizedFrame {
        let finalized_at = self
            .deps
            .iter()
            .map(Dependency::timestamp)
            .max()
            .unwrap_or(Timestamp::ZERO);
        let stability = if self.deps.is_empty() {
            Stability::Constant
        } else {
            Stability::Dynamic
        };
        FinalizedFrame {
            core: Rc::new(FrameCore {
                description: self.description,
                finalized_at,
                stability,
                deps: self.deps,
            }),
        }
    }
}

struct FrameCore {
    description: String,
    finalized_at: Timestamp,
    stability: Stability,
    deps: SmallVec<[Dependency; 4]>,
}

/// The immutable record of one completed tracked computation.
///
/// Cloning is cheap (shared `Rc`); frames may be freely held by multiple
/// enclosing computations.
#[derive(Clone)]
pub struct FinalizedFrame {
    core: Rc<FrameCore>,
}

impl FinalizedFrame {
    #[must_use]
    pub fn description(&self) -> &str {
        &self.core.description
    }

    /// The maximum dependency timestamp observed at finalization
    /// ([`Timestamp::ZERO`] for a constant frame).
    #[must_use]
    pub fn finalized_at(&self) -> Timestamp {
        self.core.finalized_at
    }

    #[must_use]
    pub fn stability(&self) -> Stability {
        self.core.stability
    }

    /// Whether the cached value behind this frame is still usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.updated_since(self.core.finalized_at)
    }

    /// Whether any dependency (transitively) was mutated after `timestamp`.
    #[must_use]
    pub fn updated_since(&self, timestamp: Timestamp) -> bool {
        self.core
            .deps
            .iter()
            .any(|dep| dep.updated_since(timestamp))
    }

    /// The recorded dependencies, in first-read order.
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.core.deps.iter()
    }

    #[must_use]
    pub fn dep_count(&self) -> usize {
        self.core.deps.len()
    }
}

impl std::fmt::Debug for FinalizedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizedFrame")
            .field("description", &self.core.description)
            .field("finalized_at", &self.core.finalized_at)
            .field("stability", &self.core.stability)
            .field("deps", &self.core.deps)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(id: u64, at: Timestamp) -> Rc<CellTag> {
        let tag = CellTag::new(id, format!("tag-{id}"), Timestamp::ZERO);
        tag.stamp(at);
        tag
    }

    #[test]
    fn empty_recorder_finalizes_constant() {
        let frame = FrameRecorder::new("empty".into()).finalize();
        assert_eq!(frame.stability(), Stability::Constant);
        assert_eq!(frame.finalized_at(), Timestamp::ZERO);
        assert!(frame.is_valid());
    }

    #[test]
    fn finalized_at_is_max_of_deps() {
        let t1 = Timestamp::ZERO.next();
        let t3 = t1.next().next();

        let mut recorder = FrameRecorder::new("max".into());
        recorder.record(Dependency::Cell(tag(1, t1)));
        recorder.record(Dependency::Cell(tag(2, t3)));
        let frame = recorder.finalize();

        assert_eq!(frame.stability(), Stability::Dynamic);
        assert_eq!(frame.finalized_at(), t3);
        assert!(frame.is_valid());
    }

    #[test]
    fn record_dedups_by_identity() {
        let shared = tag(1, Timestamp::ZERO.next());
        let mut recorder = FrameRecorder::new("dedup".into());
        recorder.record(Dependency::Cell(shared.clone()));
        recorder.record(Dependency::Cell(shared.clone()));
        // A distinct tag with the same description is a distinct dependency.
        recorder.record(Dependency::Cell(tag(1, Timestamp::ZERO.next())));

        let frame = recorder.finalize();
        assert_eq!(frame.dep_count(), 2);
    }

    #[test]
    fn later_stamp_invalidates() {
        let dep = tag(1, Timestamp::ZERO.next());
        let mut recorder = FrameRecorder::new("stale".into());
        recorder.record(Dependency::Cell(dep.clone()));
        let frame = recorder.finalize();
        assert!(frame.is_valid());

        dep.stamp(frame.finalized_at().next());
        assert!(!frame.is_valid());
    }

    #[test]
    fn nested_frame_staleness_is_transitive() {
        let leaf = tag(1, Timestamp::ZERO.next());

        let mut inner = FrameRecorder::new("inner".into());
        inner.record(Dependency::Cell(leaf.clone()));
        let inner = inner.finalize();

        let mut outer = FrameRecorder::new("outer".into());
        outer.record(Dependency::Frame(inner));
        let outer = outer.finalize();
        assert!(outer.is_valid());

        leaf.stamp(outer.finalized_at().next());
        assert!(!outer.is_valid());
    }
}
