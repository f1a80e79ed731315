//! Step Module
//!
//! Operations execute as an explicit sequence of named steps over a scratch [`State`]. The
//! [`StepEngine`] drives the sequence while the caller holds the partition lane:
//!
//! - a step returns the next step to run, completes the operation, or fails;
//! - a step may hand a blocking computation to the blocking pool and name the step to resume
//!   at. The lane stays reserved while the computation runs, so no other operation can touch
//!   the partition in between;
//! - a failure aborts the remaining steps and no backup is generated.
//!
//! Visited steps are recorded in `State::trace` for diagnostics.

pub mod engine;
pub mod types;

pub use engine::{PartitionContext, StepEngine};
pub use types::{OffloadedWork, State, Step, Transition};
