//! Invocation Module
//!
//! The caller side of operation execution. [`InvocationEngine::invoke`] resolves the
//! partition of an operation, sends it to the owner (or runs it in process when this member
//! owns the partition) and returns exactly one result.
//!
//! ## Retries
//! A `StaleTopology` reply, an unreachable owner or a partition without owner re-resolves
//! against the current table and retries with exponential backoff and jitter, up to
//! `invocation.max_attempts`. Every attempt carries the same call id, so an owner that already
//! applied the call answers from its [`CallMemo`] instead of applying it again.
//!
//! The whole invocation runs under `invocation.call_timeout_ms`. Expiry surfaces
//! `OperationTimeout`; an effect already applied at the owner stays applied.

pub mod engine;
pub mod memo;
pub mod protocol;
pub mod retry;

pub use engine::InvocationEngine;
pub use memo::CallMemo;
pub use protocol::{
    InvocationResponse, OperationRequest, OperationResponse, RejectedRequest, ResponseEnvelope,
};
pub use retry::RetryPolicy;
