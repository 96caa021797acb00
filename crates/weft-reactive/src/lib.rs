#![forbid(unsafe_code)]

//! Typed reactive primitives: [`Cell`], [`Marker`], [`Memo`], and the
//! [`Reactive`] sum type.
//!
//! All primitives are handles over shared single-threaded state: cloning one
//! returns a second handle to the same underlying entity. Reads inside a
//! tracked computation register dependencies automatically; mutation is only
//! possible through leaf cells and always advances the owning timeline's
//! clock.

pub mod cell;
pub mod marker;
pub mod memo;
pub mod reactive;

pub use cell::Cell;
pub use marker::Marker;
pub use memo::Memo;
pub use reactive::Reactive;
