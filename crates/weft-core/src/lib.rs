#![forbid(unsafe_code)]

//! Core: logical clock, dependency capture, and frame validation.
//!
//! Everything in this crate is untyped with respect to the values flowing
//! through the reactive graph. A [`CellTag`] is the identity-plus-stamp core
//! of a leaf value; a [`FinalizedFrame`] is the immutable record of what one
//! tracked computation read; the [`Timeline`] owns the clock and the stack of
//! in-progress frame recorders. Typed primitives (`Cell<T>`, `Memo<T>`) are
//! built on top of this crate.

pub mod error;
pub mod frame;
pub mod notify;
pub mod tag;
pub mod timeline;
pub mod timestamp;

pub use error::{Result, WeftError};
pub use frame::{Dependency, FinalizedFrame, Stability};
pub use notify::Subscription;
pub use tag::CellTag;
pub use timeline::Timeline;
pub use timestamp::Timestamp;
