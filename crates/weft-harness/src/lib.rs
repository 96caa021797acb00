#![forbid(unsafe_code)]

//! Test support for the weft engine.
//!
//! Lifecycle correctness is mostly about *ordering*: cleanup before re-sync,
//! sync before finalize, each exactly once. [`EventLog`] is a shared,
//! ordered recorder that setup/sync/cleanup/finalize callbacks append to, so
//! a test can assert the whole sequence in one line.

pub mod event_log;

pub use event_log::EventLog;
