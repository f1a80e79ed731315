//! Container Module
//!
//! Per-partition state of every distributed structure. A [`PartitionContainer`] holds the
//! map record stores, queues and ring buffers whose names hash into that partition.
//!
//! The container is only ever reachable through the partition's lane guard, so none of the
//! types here synchronize internally.
//!
//! ## Snapshots
//! [`snapshot::PartitionSnapshot`] is the full content of one partition plus the replica
//! version of every structure in it. Replicas that detect a gap in the backup stream pull a snapshot from the owner
//! and replace their local copy with it.

pub mod partition;
pub mod queue;
pub mod record_store;
pub mod ringbuffer;
pub mod snapshot;

pub use partition::PartitionContainer;
pub use queue::{QueueContainer, QueueItem};
pub use record_store::RecordStore;
pub use ringbuffer::RingbufferContainer;
pub use snapshot::PartitionSnapshot;

#[cfg(test)]
mod tests;
