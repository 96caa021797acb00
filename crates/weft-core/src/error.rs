#![forbid(unsafe_code)]

//! Error types.
//!
//! Every variant is a precondition violation: the caller broke an invariant
//! the engine cannot repair, so the operation fails at the call site without
//! mutating any state. Failures inside user callbacks are not represented
//! here; they unwind (or propagate as the callback's own error type through
//! [`Timeline::try_with_frame`](crate::Timeline::try_with_frame)).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeftError>;

#[derive(Debug, Error)]
pub enum WeftError {
    #[error("cannot update frozen cell `{description}`")]
    FrozenCell { description: String },

    #[error("cannot register finalizer on finalized lifetime `{description}`")]
    LifetimeFinalized { description: String },
}
