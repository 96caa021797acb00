#![forbid(unsafe_code)]

//! weft public facade crate.
//!
//! This crate provides the stable, ergonomic surface area for users.
//!
//! ```
//! use weft::{Cell, Memo, Timeline};
//!
//! let timeline = Timeline::new();
//! let count = Cell::named(&timeline, 1, "count");
//!
//! let source = count.clone();
//! let doubled = Memo::named(&timeline, move || source.get() * 2, "doubled");
//! assert_eq!(doubled.get(), 2);
//!
//! count.set(21).unwrap();
//! assert!(!doubled.is_valid());
//! assert_eq!(doubled.get(), 42);
//! ```

pub use weft_core::{
    Dependency, FinalizedFrame, Result, Stability, Subscription, Timeline, Timestamp, WeftError,
};
pub use weft_lifecycle::{Cleanup, Lifetime, On, Resource, ResourceBlueprint};
pub use weft_reactive::{Cell, Marker, Memo, Reactive};

pub mod prelude {
    pub use weft_core as core;
    pub use weft_lifecycle as lifecycle;
    pub use weft_reactive as reactive;
}
