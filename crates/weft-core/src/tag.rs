#![forbid(unsafe_code)]

//! Untyped cell cores.
//!
//! A [`CellTag`] carries everything the engine needs to know about a leaf
//! reactive value *except* its value: identity, description, the timestamp of
//! its last mutation, the frozen flag, and the per-cell update subscribers.
//! Finalized frames hold `Rc<CellTag>`s, which is what keeps frame validation
//! independent of the value types flowing through the graph.
//!
//! Tags are created by the typed primitives (`Cell<T>`, `Marker`); the only
//! party that stamps them is [`Timeline::bump`](crate::Timeline::bump).

use std::cell::Cell;
use std::rc::Rc;

use crate::notify::{Subscribers, Subscription};
use crate::timestamp::Timestamp;

/// Identity, stamp, and frozen state of one leaf reactive value.
pub struct CellTag {
    id: u64,
    description: String,
    last_update: Cell<Timestamp>,
    frozen: Cell<bool>,
    on_update: Subscribers,
}

impl CellTag {
    /// Create a tag stamped with `created_at`, the timeline's current time.
    /// Creation is not a mutation and does not bump the clock.
    #[must_use]
    pub fn new(id: u64, description: impl Into<String>, created_at: Timestamp) -> Rc<Self> {
        Rc::new(Self {
            id,
            description: description.into(),
            last_update: Cell::new(created_at),
            frozen: Cell::new(false),
            on_update: Subscribers::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Timestamp of the most recent mutation (or of creation).
    #[must_use]
    pub fn last_updated(&self) -> Timestamp {
        self.last_update.get()
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen.get()
    }

    /// Mark the tag immutable. Irreversible; the stamp never changes again,
    /// so frames holding this tag never revalidate against it.
    pub fn freeze(&self) {
        self.frozen.set(true);
    }

    /// Whether the tag was mutated after `timestamp`. Equality counts as
    /// *not* updated; see the validity boundary note on
    /// [`Timestamp`](crate::Timestamp).
    #[must_use]
    pub fn is_updated_since(&self, timestamp: Timestamp) -> bool {
        self.last_update.get() > timestamp
    }

    /// Register a callback for mutations of this tag.
    pub fn on_update(&self, callback: impl Fn() + 'static) -> Subscription {
        self.on_update.subscribe(callback)
    }

    pub(crate) fn stamp(&self, timestamp: Timestamp) {
        self.last_update.set(timestamp);
    }

    pub(crate) fn notify_update(&self) {
        self.on_update.notify();
    }
}

impl std::fmt::Debug for CellTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellTag")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("last_update", &self.last_update.get())
            .field("frozen", &self.frozen.get())
            .finish()
    }
}
