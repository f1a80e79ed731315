//! Node Module
//!
//! [`engine::NodeEngine`] is what a cluster member runs. It owns the partition service, the
//! lanes and the event service, and it exposes both sides of the protocol:
//!
//! - **Caller side**: `invoke` plus typed proxies (`map`, `queue`, `ringbuffer`).
//! - **Target side**: `handle_operation`, `handle_backup` and `handle_partition_dump`, which the
//!   transports feed with frames from other members.
//!
//! The migration collaborator pushes partition tables through `apply_table`; the node never
//! starts a migration itself. `sync_replicas` runs one anti-entropy round and is driven by the
//! binary's background loop.

pub mod engine;
pub mod executor;
pub mod lifecycle;

pub use engine::NodeEngine;
pub use executor::OperationExecutor;
pub use lifecycle::{LifecycleHook, LoggingLifecycle, RecordingLifecycle};

#[cfg(test)]
mod tests;
