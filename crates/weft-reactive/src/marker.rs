#![forbid(unsafe_code)]

//! Value-less invalidation cells.
//!
//! A [`Marker`] is a cell with no payload: [`read`](Marker::read) registers
//! it as a dependency and [`mark`](Marker::mark) invalidates everything that
//! read it. Markers are the explicit escape hatch for computations whose
//! real inputs live outside the graph (a socket, a file watcher): the
//! external event handler calls `mark` and the graph treats it like any
//! other mutation.

use std::rc::Rc;

use weft_core::{CellTag, Dependency, Subscription, Timeline, Timestamp};

/// A dependency that can be invalidated but holds no value.
#[derive(Clone)]
pub struct Marker {
    timeline: Timeline,
    tag: Rc<CellTag>,
}

impl Marker {
    pub fn new(timeline: &Timeline) -> Self {
        Self::named(timeline, "anonymous marker")
    }

    pub fn named(timeline: &Timeline, description: impl Into<String>) -> Self {
        Self {
            timeline: timeline.clone(),
            tag: CellTag::new(timeline.next_id(), description, timeline.now()),
        }
    }

    /// Register this marker as a dependency of the innermost tracked
    /// computation.
    pub fn read(&self) {
        self.timeline
            .did_consume(Dependency::Cell(Rc::clone(&self.tag)));
    }

    /// Invalidate every frame that read this marker. Always succeeds;
    /// markers cannot be frozen.
    pub fn mark(&self) {
        self.timeline.bump(&self.tag);
    }

    #[must_use]
    pub fn last_marked(&self) -> Timestamp {
        self.tag.last_updated()
    }

    #[must_use]
    pub fn description(&self) -> &str {
        self.tag.description()
    }

    /// Register a callback for marks.
    pub fn on_mark(&self, callback: impl Fn() + 'static) -> Subscription {
        self.tag.on_update(callback)
    }
}

impl std::fmt::Debug for Marker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marker")
            .field("description", &self.tag.description())
            .field("last_marked", &self.tag.last_updated())
            .finish()
    }
}
