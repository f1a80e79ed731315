//! Partition Module
//!
//! Keys are hashed into a fixed number of partitions that never changes for the lifetime of
//! the cluster. Each partition has one owner and an ordered list of backups, recorded in a
//! versioned [`table::PartitionTable`].
//!
//! ## Core Concepts
//! - **Snapshots**: the table is replaced wholesale by the migration collaborator;
//!   `PartitionService` hands out `Arc` snapshots.
//! - **Version checks**: lookups take the version the caller routed with; a different version
//!   is reported as `StaleTopology` so the invocation re-resolves.
//! - **Lanes**: `PartitionLanes` serializes execution per partition (single writer).

pub mod hash;
pub mod lanes;
pub mod service;
pub mod table;

pub use lanes::{LaneGuard, PartitionLanes};
pub use service::{PartitionService, TableChange};
pub use table::{PartitionReplicas, PartitionTable};

#[cfg(test)]
mod tests;
