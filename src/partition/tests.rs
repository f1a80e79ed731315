//! Partition Module Tests
//!
//! ## Test Scopes
//! - **Table**: assignment, invariants, version-checked lookups.
//! - **Service**: snapshot replacement and key resolution.
//! - **Lanes**: at most one holder per partition at any instant.

#[cfg(test)]
mod tests {
    use crate::error::GridError;
    use crate::operation::types::{ContainerKind, MemberId, PartitionKey};
    use crate::partition::{PartitionLanes, PartitionReplicas, PartitionService, PartitionTable};
    use crate::serialization::Data;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn members(ids: &[&str]) -> Vec<MemberId> {
        ids.iter().map(|id| MemberId::from(*id)).collect()
    }

    // ============================================================
    // TABLE TESTS
    // ============================================================

    #[test]
    fn test_assign_round_robin_with_backups() {
        let table = PartitionTable::assign(1, 6, &members(&["c", "a", "b"]), 1).unwrap();

        // sorted order a, b, c
        assert_eq!(table.owner_of(0, 1).unwrap(), MemberId::from("a"));
        assert_eq!(table.backups_of(0, 1).unwrap(), &[MemberId::from("b")]);
        assert_eq!(table.owner_of(2, 1).unwrap(), MemberId::from("c"));
        assert_eq!(table.backups_of(2, 1).unwrap(), &[MemberId::from("a")]);
    }

    #[test]
    fn test_assign_caps_backups_by_member_count() {
        let table = PartitionTable::assign(1, 4, &members(&["solo"]), 2).unwrap();
        for partition in 0..4 {
            assert_eq!(table.owner_of(partition, 1).unwrap(), MemberId::from("solo"));
            assert!(table.backups_of(partition, 1).unwrap().is_empty());
        }
    }

    #[test]
    fn test_owner_in_backup_list_rejected() {
        let replicas = vec![PartitionReplicas {
            owner: Some(MemberId::from("a")),
            backups: members(&["a"]),
        }];
        let result = PartitionTable::new(1, replicas, 1);
        assert!(matches!(result, Err(GridError::InvalidTable(_))));
    }

    #[test]
    fn test_backup_list_longer_than_configured_rejected() {
        let replicas = vec![PartitionReplicas {
            owner: Some(MemberId::from("a")),
            backups: members(&["b", "c"]),
        }];
        assert!(PartitionTable::new(1, replicas.clone(), 1).is_err());
        assert!(PartitionTable::new(1, replicas, 2).is_ok());
    }

    #[test]
    fn test_lookup_with_other_version_is_stale() {
        let table = PartitionTable::assign(3, 4, &members(&["a", "b"]), 1).unwrap();
        let result = table.owner_of(1, 2);
        assert_eq!(
            result.unwrap_err(),
            GridError::StaleTopology {
                partition: 1,
                expected: 2,
                actual: 3
            }
        );
    }

    #[test]
    fn test_empty_table_has_no_owner() {
        let table = PartitionTable::empty(8);
        assert_eq!(table.owner_of(5, 0).unwrap_err(), GridError::NoOwner(5));
    }

    // ============================================================
    // SERVICE TESTS
    // ============================================================

    #[test]
    fn test_apply_snapshot_replaces_whole_table() {
        let service = PartitionService::new(MemberId::from("a"), 4, 1);
        let table = PartitionTable::assign(1, 4, &members(&["a", "b"]), 1).unwrap();

        let change = service.apply_snapshot(table).unwrap().unwrap();
        assert_eq!(change.previous.version(), 0);
        assert_eq!(change.current.version(), 1);
        assert_eq!(service.version(), 1);
        assert_eq!(service.local_primary_partitions(), vec![0, 2]);
        assert_eq!(service.local_backup_partitions(), vec![1, 3]);
    }

    #[test]
    fn test_older_snapshot_ignored() {
        let service = PartitionService::new(MemberId::from("a"), 4, 1);
        let v2 = PartitionTable::assign(2, 4, &members(&["a", "b"]), 1).unwrap();
        let v1 = PartitionTable::assign(1, 4, &members(&["b"]), 1).unwrap();

        service.apply_snapshot(v2).unwrap();
        assert!(service.apply_snapshot(v1).unwrap().is_none());
        assert_eq!(service.version(), 2);
    }

    #[test]
    fn test_snapshot_with_wrong_partition_count_rejected() {
        let service = PartitionService::new(MemberId::from("a"), 4, 1);
        let table = PartitionTable::assign(1, 8, &members(&["a"]), 1).unwrap();
        assert!(service.apply_snapshot(table).is_err());
    }

    #[test]
    fn test_resolve_partition_keys() {
        let service = PartitionService::new(MemberId::from("a"), 16, 1);
        let key = Data::from("orders");
        let p = service.resolve(&PartitionKey::Key(key.clone())).unwrap();
        assert_eq!(p, service.partition_for_key(&key));
        assert_eq!(service.resolve(&PartitionKey::Partition(3)).unwrap(), 3);
        assert!(service.resolve(&PartitionKey::Partition(16)).is_err());
    }

    #[test]
    fn test_keys_spread_over_partitions() {
        let service = PartitionService::new(MemberId::from("a"), 271, 1);
        let mut used = std::collections::HashSet::new();
        for i in 0..10_000 {
            used.insert(service.partition_for_key(&Data::from(format!("book_{}", i).as_str())));
        }
        assert!(used.len() > 200, "only {} partitions used", used.len());
    }

    // ============================================================
    // LANE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_single_writer_per_partition() {
        let lanes = Arc::new(PartitionLanes::new(4));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..32 {
            let lanes = lanes.clone();
            let in_flight = in_flight.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let mut guard = lanes.acquire(2).await.unwrap();
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                // suspend while holding the reservation
                tokio::time::sleep(Duration::from_millis(1)).await;
                guard.next_replica_version(ContainerKind::Map, "m");
                in_flight.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        let guard = lanes.acquire(2).await.unwrap();
        assert_eq!(guard.replica_version(ContainerKind::Map, "m"), 32);
        assert_eq!(guard.partition_id(), 2);
    }

    #[tokio::test]
    async fn test_different_partitions_proceed_in_parallel() {
        let lanes = PartitionLanes::new(4);
        let first = lanes.acquire(0).await.unwrap();
        let second = tokio::time::timeout(Duration::from_millis(100), lanes.acquire(1)).await;
        assert!(second.is_ok());
        assert_eq!(lanes.active_lanes(), 2);
        drop(first);
        drop(second);
        assert_eq!(lanes.active_lanes(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_lane() {
        let lanes = PartitionLanes::new(4);
        assert!(matches!(
            lanes.acquire(9).await,
            Err(GridError::PartitionOutOfRange { partition: 9, .. })
        ));
    }
}
