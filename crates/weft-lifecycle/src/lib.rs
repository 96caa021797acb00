#![forbid(unsafe_code)]

//! Lifecycle: owner-scoped cleanup and lifecycle-bound resources.
//!
//! A [`Lifetime`] is an ordered registry of one-shot finalizers anchored to
//! an owner (a UI component instance, an application root, a test scope). A
//! [`Resource`] combines memo-style recomputation with `sync`/`finalize`
//! hooks registered against a lifetime, so external effects are set up and
//! torn down in lockstep with the dependency graph.

pub mod lifetime;
pub mod resource;

pub use lifetime::Lifetime;
pub use resource::{Cleanup, On, Resource, ResourceBlueprint};
