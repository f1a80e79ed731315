//! Container Module Tests
//!
//! ## Test Scopes
//! - **Queue**: FIFO order and replica-side item ids.
//! - **Ringbuffer**: overwrite at capacity, sequence reads, replica gaps.
//! - **Partition**: destroy and snapshot/restore.

#[cfg(test)]
mod tests {
    use crate::container::{PartitionContainer, PartitionSnapshot, QueueContainer, RingbufferContainer};
    use crate::operation::types::ContainerKind;
    use crate::serialization::Data;

    // ============================================================
    // QUEUE TESTS
    // ============================================================

    #[test]
    fn test_queue_fifo_and_item_ids() {
        let mut queue = QueueContainer::new();
        assert_eq!(queue.offer(Data::from("a")), 1);
        assert_eq!(queue.offer(Data::from("b")), 2);

        assert_eq!(queue.peek().unwrap().data, Data::from("a"));
        let polled = queue.poll().unwrap();
        assert_eq!(polled.item_id, 1);
        assert_eq!(polled.data, Data::from("a"));
        assert_eq!(queue.size(), 1);
    }

    #[test]
    fn test_queue_replica_keeps_primary_ids() {
        let mut replica = QueueContainer::new();
        replica.offer_with_id(7, Data::from("x"));
        replica.offer_with_id(7, Data::from("x"));
        assert_eq!(replica.size(), 1);
        assert_eq!(replica.next_item_id(), 8);

        assert!(replica.remove_item(3).is_none());
        assert_eq!(replica.remove_item(7).unwrap().data, Data::from("x"));
        assert!(replica.is_empty());
    }

    // ============================================================
    // RINGBUFFER TESTS
    // ============================================================

    #[test]
    fn test_ringbuffer_overwrites_oldest() {
        let mut ring = RingbufferContainer::new(2);
        assert_eq!(ring.add(Data::from("a")), 0);
        assert_eq!(ring.add(Data::from("b")), 1);
        assert_eq!(ring.add(Data::from("c")), 2);

        assert_eq!(ring.head_sequence(), 1);
        assert_eq!(ring.tail_sequence(), 2);
        assert!(ring.read_one(0).is_err());
        assert_eq!(ring.read_one(1).unwrap(), Some(Data::from("b")));
        assert_eq!(ring.read_one(3).unwrap(), None);
        assert!(ring.read_one(4).is_err());
    }

    #[test]
    fn test_ringbuffer_replica_ignores_duplicates_and_jumps_gaps() {
        let mut ring = RingbufferContainer::new(10);
        ring.add_at(0, Data::from("a"));
        ring.add_at(0, Data::from("a"));
        assert_eq!(ring.size(), 1);

        ring.add_at(5, Data::from("f"));
        assert_eq!(ring.head_sequence(), 5);
        assert_eq!(ring.tail_sequence(), 5);
        assert_eq!(ring.read_one(5).unwrap(), Some(Data::from("f")));
    }

    // ============================================================
    // PARTITION CONTAINER TESTS
    // ============================================================

    #[test]
    fn test_destroy_reports_existence() {
        let mut container = PartitionContainer::new(3);
        container.queue_mut("jobs");
        assert!(container.contains(ContainerKind::Queue, "jobs"));
        assert!(container.destroy(ContainerKind::Queue, "jobs"));
        assert!(!container.destroy(ContainerKind::Queue, "jobs"));
    }

    #[test]
    fn test_snapshot_restores_every_structure() {
        // ARRANGE
        let mut owner = PartitionContainer::new(5);
        owner.map_mut("books").put(Data::from("k"), Data::from("v"));
        owner.queue_mut("jobs").offer(Data::from("j1"));
        let ring = owner.ringbuffer_mut("log", 2);
        ring.add(Data::from("e0"));
        ring.add(Data::from("e1"));
        ring.add(Data::from("e2"));
        owner.set_replica_version(ContainerKind::Map, "books", 9);
        owner.set_replica_version(ContainerKind::Queue, "jobs", 1);

        // ACT
        let bytes = owner.snapshot().to_bytes();
        let snapshot = PartitionSnapshot::from_bytes(bytes).unwrap();
        let mut replica = PartitionContainer::new(5);
        replica.needs_sync = true;
        replica.map_mut("stale").put(Data::from("old"), Data::from("old"));
        replica.restore(snapshot);

        // ASSERT
        assert!(!replica.needs_sync);
        assert_eq!(replica.replica_version(ContainerKind::Map, "books"), 9);
        assert_eq!(replica.replica_version(ContainerKind::Queue, "jobs"), 1);
        assert_eq!(replica.replica_version(ContainerKind::Map, "stale"), 0);
        assert!(replica.map("stale").is_none());
        assert_eq!(replica.map("books").unwrap().get(&Data::from("k")), Some(&Data::from("v")));
        assert_eq!(replica.queue("jobs").unwrap().next_item_id(), 2);
        let ring = replica.ringbuffer("log").unwrap();
        assert_eq!(ring.head_sequence(), 1);
        assert_eq!(ring.tail_sequence(), 2);
        assert_eq!(replica.entry_count(), owner.entry_count());
    }

    #[test]
    fn test_replica_versions_count_per_structure() {
        // ARRANGE
        let mut owner = PartitionContainer::new(3);
        assert_eq!(owner.next_replica_version(ContainerKind::Map, "a"), 1);
        assert_eq!(owner.next_replica_version(ContainerKind::Map, "a"), 2);
        assert_eq!(owner.next_replica_version(ContainerKind::Map, "b"), 1);
        owner.map_mut("a");
        owner.destroy(ContainerKind::Map, "a");
        let snapshot = owner.snapshot();

        // ACT
        let mut replica = PartitionContainer::new(3);
        replica.set_replica_version(ContainerKind::Map, "b", 4);
        let ahead = replica.is_ahead_of(&snapshot);
        replica.set_replica_version(ContainerKind::Map, "b", 1);
        let caught_up = replica.is_ahead_of(&snapshot);

        // ASSERT
        assert!(ahead);
        assert!(!caught_up);
        // destroying a structure keeps its counter
        assert_eq!(owner.replica_version(ContainerKind::Map, "a"), 2);
        assert_eq!(owner.next_replica_version(ContainerKind::Map, "a"), 3);
    }

    #[test]
    fn test_truncated_snapshot_rejected() {
        let mut owner = PartitionContainer::new(1);
        owner.map_mut("m").put(Data::from("k"), Data::from("v"));
        let bytes = owner.snapshot().to_bytes();
        let truncated = bytes.slice(0..bytes.len() - 1);
        assert!(PartitionSnapshot::from_bytes(truncated).is_err());
    }
}
