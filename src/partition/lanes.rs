//! Single-writer execution lanes.
//!
//! Each partition has exactly one lane: a mutex around the partition's container state.
//! Holding the [`LaneGuard`] is the capability to touch that state, and it is the only way
//! to obtain a `&mut PartitionContainer`. Operations queue on the lane in arrival order
//! (tokio's mutex is fair), so operations against one partition run strictly one after
//! another, including across suspended steps, while different partitions proceed in parallel.

use crate::container::PartitionContainer;
use crate::error::{GridError, GridResult};

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct PartitionLanes {
    lanes: Vec<Arc<Mutex<PartitionContainer>>>,
    active: Arc<AtomicUsize>,
}

/// Exclusive reservation of one partition.
pub struct LaneGuard {
    partition_id: u32,
    guard: OwnedMutexGuard<PartitionContainer>,
    active: Arc<AtomicUsize>,
}

impl PartitionLanes {
    pub fn new(partition_count: u32) -> Self {
        Self {
            lanes: (0..partition_count)
                .map(|partition| Arc::new(Mutex::new(PartitionContainer::new(partition))))
                .collect(),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn partition_count(&self) -> u32 {
        self.lanes.len() as u32
    }

    /// Waits for the partition's lane and reserves it until the guard is dropped.
    pub async fn acquire(&self, partition_id: u32) -> GridResult<LaneGuard> {
        let lane = self
            .lanes
            .get(partition_id as usize)
            .ok_or(GridError::PartitionOutOfRange {
                partition: partition_id,
                count: self.partition_count(),
            })?
            .clone();
        let guard = lane.lock_owned().await;
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(LaneGuard {
            partition_id,
            guard,
            active: self.active.clone(),
        })
    }

    /// Number of lanes currently reserved (diagnostics).
    pub fn active_lanes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

impl LaneGuard {
    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }
}

impl Deref for LaneGuard {
    type Target = PartitionContainer;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for LaneGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl Drop for LaneGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
