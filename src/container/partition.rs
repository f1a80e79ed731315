use super::queue::QueueContainer;
use super::record_store::RecordStore;
use super::ringbuffer::RingbufferContainer;
use super::snapshot::PartitionSnapshot;
use crate::operation::types::ContainerKind;

use std::collections::HashMap;

/// `(kind, name)` of one structure inside a partition.
pub type ContainerKey = (ContainerKind, String);

/// Everything stored in one partition on this member, primary or replica.
#[derive(Debug)]
pub struct PartitionContainer {
    partition_id: u32,
    maps: HashMap<String, RecordStore>,
    queues: HashMap<String, QueueContainer>,
    ringbuffers: HashMap<String, RingbufferContainer>,
    /// Backups generated (primary) or applied (replica) so far, per structure. Outlives
    /// `destroy` so a recreated structure keeps counting up.
    replica_versions: HashMap<ContainerKey, u64>,
    /// Set on a replica that missed a backup; cleared by a snapshot sync.
    pub needs_sync: bool,
}

impl PartitionContainer {
    pub fn new(partition_id: u32) -> Self {
        Self {
            partition_id,
            maps: HashMap::new(),
            queues: HashMap::new(),
            ringbuffers: HashMap::new(),
            replica_versions: HashMap::new(),
            needs_sync: false,
        }
    }

    pub fn partition_id(&self) -> u32 {
        self.partition_id
    }

    pub fn map(&self, name: &str) -> Option<&RecordStore> {
        self.maps.get(name)
    }

    pub fn map_mut(&mut self, name: &str) -> &mut RecordStore {
        self.maps.entry(name.to_string()).or_default()
    }

    /// Like `map_mut` but never creates the store.
    pub fn existing_map_mut(&mut self, name: &str) -> Option<&mut RecordStore> {
        self.maps.get_mut(name)
    }

    pub fn queue(&self, name: &str) -> Option<&QueueContainer> {
        self.queues.get(name)
    }

    pub fn queue_mut(&mut self, name: &str) -> &mut QueueContainer {
        self.queues.entry(name.to_string()).or_default()
    }

    pub fn existing_queue_mut(&mut self, name: &str) -> Option<&mut QueueContainer> {
        self.queues.get_mut(name)
    }

    pub fn ringbuffer(&self, name: &str) -> Option<&RingbufferContainer> {
        self.ringbuffers.get(name)
    }

    /// Creates the ring with `capacity` on first use.
    pub fn ringbuffer_mut(&mut self, name: &str, capacity: usize) -> &mut RingbufferContainer {
        self.ringbuffers
            .entry(name.to_string())
            .or_insert_with(|| RingbufferContainer::new(capacity))
    }

    pub fn contains(&self, kind: ContainerKind, name: &str) -> bool {
        match kind {
            ContainerKind::Map => self.maps.contains_key(name),
            ContainerKind::Queue => self.queues.contains_key(name),
            ContainerKind::Ringbuffer => self.ringbuffers.contains_key(name),
        }
    }

    /// Drops a container. Returns whether it existed.
    pub fn destroy(&mut self, kind: ContainerKind, name: &str) -> bool {
        match kind {
            ContainerKind::Map => self.maps.remove(name).is_some(),
            ContainerKind::Queue => self.queues.remove(name).is_some(),
            ContainerKind::Ringbuffer => self.ringbuffers.remove(name).is_some(),
        }
    }

    pub fn replica_version(&self, kind: ContainerKind, name: &str) -> u64 {
        self.replica_versions
            .get(&(kind, name.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Primary side: the version of the next backup generated for this structure.
    pub fn next_replica_version(&mut self, kind: ContainerKind, name: &str) -> u64 {
        let version = self.replica_versions.entry((kind, name.to_string())).or_insert(0);
        *version += 1;
        *version
    }

    pub fn set_replica_version(&mut self, kind: ContainerKind, name: &str, version: u64) {
        self.replica_versions.insert((kind, name.to_string()), version);
    }

    /// True when some structure here has applied backups the snapshot has not seen.
    pub fn is_ahead_of(&self, snapshot: &PartitionSnapshot) -> bool {
        self.replica_versions.iter().any(|((kind, name), &local)| {
            let theirs = snapshot
                .replica_versions
                .iter()
                .find(|(k, n, _)| k == kind && n == name)
                .map(|(_, _, version)| *version)
                .unwrap_or(0);
            local > theirs
        })
    }

    pub fn is_empty(&self) -> bool {
        self.maps.values().all(RecordStore::is_empty)
            && self.queues.values().all(QueueContainer::is_empty)
            && self.ringbuffers.values().all(RingbufferContainer::is_empty)
    }

    pub fn entry_count(&self) -> usize {
        self.maps.values().map(RecordStore::size).sum::<usize>()
            + self.queues.values().map(QueueContainer::size).sum::<usize>()
            + self.ringbuffers.values().map(RingbufferContainer::size).sum::<usize>()
    }

    pub fn snapshot(&self) -> PartitionSnapshot {
        PartitionSnapshot {
            partition_id: self.partition_id,
            replica_versions: self
                .replica_versions
                .iter()
                .map(|((kind, name), version)| (*kind, name.clone(), *version))
                .collect(),
            maps: self
                .maps
                .iter()
                .map(|(name, store)| {
                    let entries = store
                        .entries()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect();
                    (name.clone(), entries)
                })
                .collect(),
            queues: self
                .queues
                .iter()
                .map(|(name, queue)| {
                    (
                        name.clone(),
                        queue.next_item_id(),
                        queue.items().cloned().collect(),
                    )
                })
                .collect(),
            ringbuffers: self
                .ringbuffers
                .iter()
                .map(|(name, ring)| {
                    (
                        name.clone(),
                        ring.capacity(),
                        ring.head_sequence(),
                        ring.items().cloned().collect(),
                    )
                })
                .collect(),
        }
    }

    /// Replaces all local content with the owner's snapshot.
    pub fn restore(&mut self, snapshot: PartitionSnapshot) {
        self.maps = snapshot
            .maps
            .into_iter()
            .map(|(name, entries)| (name, entries.into_iter().collect()))
            .collect();
        self.queues = snapshot
            .queues
            .into_iter()
            .map(|(name, next_item_id, items)| (name, QueueContainer::restore(items, next_item_id)))
            .collect();
        self.ringbuffers = snapshot
            .ringbuffers
            .into_iter()
            .map(|(name, capacity, head, items)| {
                (name, RingbufferContainer::restore(capacity, head, items))
            })
            .collect();
        self.replica_versions = snapshot
            .replica_versions
            .into_iter()
            .map(|(kind, name, version)| ((kind, name), version))
            .collect();
        self.needs_sync = false;
    }
}
