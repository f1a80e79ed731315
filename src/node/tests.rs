//! Node Module Tests
//!
//! Several engines in one process, wired through the loopback transport. Every request still
//! goes through its byte encoding.
//!
//! ## Test Scopes
//! - **Replication**: backups only for changed state, sync acknowledgement before the result,
//!   ack timeouts surfaced as warnings.
//! - **Idempotency**: lost responses and mid-invocation table changes apply effects once; a
//!   restarted member's calls are never mistaken for its old ones.
//! - **Deadlines**: a caller giving up neither fails nor cuts short the owner's work.
//! - **Maintenance**: eviction destroys an idle container exactly once.
//! - **Anti-entropy**: a replica that missed a backup is repaired from the owner.

#[cfg(test)]
mod tests {
    use crate::config::{BackupConfig, EngineConfig};
    use crate::error::GridError;
    use crate::node::{NodeEngine, RecordingLifecycle};
    use crate::operation::types::{CallerId, ContainerKind, MemberId, OpValue};
    use crate::operation::{
        EvictionCheck, MapGet, MapPut, MapPutBackup, MapRemove, Operation, QueueOffer, QueuePoll,
        RingbufferAdd, RingbufferTailSequence, TableVersion,
    };
    use crate::partition::{PartitionReplicas, PartitionTable};
    use crate::replication::BackupRequest;
    use crate::serialization::Data;
    use crate::transport::LoopbackTransport;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Cluster {
        transport: Arc<LoopbackTransport>,
        nodes: Vec<Arc<NodeEngine>>,
        lifecycles: Vec<Arc<RecordingLifecycle>>,
    }

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig {
            partition_count: 8,
            ..Default::default()
        };
        config.invocation.max_attempts = 5;
        config.invocation.retry_base_delay_ms = 5;
        config.invocation.retry_max_delay_ms = 20;
        config.invocation.call_timeout_ms = 5_000;
        config.invocation.backup_ack_timeout_ms = 1_000;
        config.ringbuffer.capacity = 16;
        config
    }

    async fn cluster(ids: &[&str], config: EngineConfig) -> Cluster {
        let transport = LoopbackTransport::new();
        let mut nodes = Vec::new();
        let mut lifecycles = Vec::new();
        for id in ids {
            let lifecycle = Arc::new(RecordingLifecycle::default());
            let node = NodeEngine::new(
                MemberId::from(*id),
                config.clone(),
                transport.clone(),
                lifecycle.clone(),
            )
            .unwrap();
            transport.register(&node);
            nodes.push(node);
            lifecycles.push(lifecycle);
        }

        let members: Vec<MemberId> = ids.iter().map(|id| MemberId::from(*id)).collect();
        let table = PartitionTable::assign(
            1,
            config.partition_count,
            &members,
            config.max_total_backups(),
        )
        .unwrap();
        for node in &nodes {
            assert!(node.apply_table(table.clone()).await.unwrap());
        }
        for node in &nodes {
            node.sync_replicas().await;
        }

        Cluster {
            transport,
            nodes,
            lifecycles,
        }
    }

    impl Cluster {
        fn node(&self, id: &str) -> &Arc<NodeEngine> {
            self.nodes
                .iter()
                .find(|node| node.member().0 == id)
                .expect("unknown node")
        }

        /// First `prefix{n}` whose partition is owned by `owner`.
        fn key_owned_by(&self, owner: &str, prefix: &str) -> (String, u32) {
            let node = &self.nodes[0];
            let table = node.current_table();
            (0..1_000)
                .map(|n| format!("{}{}", prefix, n))
                .map(|name| {
                    let partition = node.partitions().partition_for_key(&Data::from(name.as_str()));
                    (name, partition)
                })
                .find(|(_, partition)| {
                    table.owner_of(*partition, table.version()).unwrap() == MemberId::from(owner)
                })
                .expect("no key for owner")
        }

        async fn map_value(&self, id: &str, partition: u32, map: &str, key: &str) -> Option<Data> {
            let lane = self.node(id).executor().partition(partition).await.unwrap();
            lane.map(map)
                .and_then(|store| store.get(&Data::from(key)).cloned())
        }
    }

    /// Polls `condition` for up to two seconds.
    async fn eventually<F, Fut>(mut condition: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        for _ in 0..200 {
            if condition().await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    /// Same table with the first backup of every partition promoted to owner.
    fn promote_first_backups(table: &PartitionTable, version: u64) -> PartitionTable {
        let replicas = (0..table.partition_count())
            .map(|partition| {
                let current = table.replicas(partition).unwrap();
                let mut backups = current.backups.clone();
                let promoted = backups.remove(0);
                backups.insert(0, current.owner.clone().unwrap());
                PartitionReplicas {
                    owner: Some(promoted),
                    backups,
                }
            })
            .collect();
        PartitionTable::new(version, replicas, 1).unwrap()
    }

    fn put(map: &str, key: &str, value: &str) -> Operation {
        MapPut::new(map, Data::from(key), Data::from(value)).into()
    }

    // ============================================================
    // REPLICATION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_remove_of_missing_key_sends_no_backup() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let caller = cluster.node("a");
        let sent_before = cluster.transport.backups_sent();

        // ACT
        let response = caller
            .invoke(MapRemove::new("m", Data::from("a")).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Null);
        assert_eq!(response.backups.sync_acknowledged, 0);
        assert_eq!(cluster.transport.backups_sent(), sent_before);
    }

    #[tokio::test]
    async fn test_remove_of_existing_key_is_backed_up_before_result() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let caller = cluster.node("a");
        caller.invoke(put("m", "a", "v")).await.unwrap();

        let partition = caller.partitions().partition_for_key(&Data::from("a"));
        let table = caller.current_table();
        let owner = table.owner_of(partition, table.version()).unwrap();
        let backup = table.backups_of(partition, table.version()).unwrap()[0].clone();
        assert_eq!(
            cluster.map_value(&backup.0, partition, "m", "a").await,
            Some(Data::from("v"))
        );
        let sent_before = cluster.transport.backups_sent();

        // ACT
        let response = caller
            .invoke(MapRemove::new("m", Data::from("a")).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Data(Data::from("v")));
        assert_eq!(response.backups.sync_acknowledged, 1);
        assert!(response.backups.is_clean());
        assert_eq!(cluster.transport.backups_sent(), sent_before + 1);
        assert_eq!(cluster.map_value(&owner.0, partition, "m", "a").await, None);
        assert_eq!(cluster.map_value(&backup.0, partition, "m", "a").await, None);
    }

    #[tokio::test]
    async fn test_owner_and_sync_backup_hold_same_value() {
        let cluster = cluster(&["a", "b", "c"], test_config()).await;

        for n in 0..20 {
            let key = format!("k{}", n);
            let caller = &cluster.nodes[n % 3];
            caller.invoke(put("m", &key, &n.to_string())).await.unwrap();

            let partition = caller.partitions().partition_for_key(&Data::from(key.as_str()));
            let table = caller.current_table();
            let owner = table.owner_of(partition, table.version()).unwrap();
            let backup = &table.backups_of(partition, table.version()).unwrap()[0];
            let expected = Some(Data::from(n.to_string().as_str()));
            assert_eq!(cluster.map_value(&owner.0, partition, "m", &key).await, expected);
            assert_eq!(cluster.map_value(&backup.0, partition, "m", &key).await, expected);
        }
    }

    #[tokio::test]
    async fn test_backup_ack_timeout_is_reported_not_fatal() {
        // ARRANGE
        let mut config = test_config();
        config.invocation.backup_ack_timeout_ms = 50;
        let cluster = cluster(&["a", "b"], config).await;
        let (key, partition) = cluster.key_owned_by("a", "slow");
        cluster
            .transport
            .set_backup_delay(&MemberId::from("b"), Duration::from_millis(400));

        // ACT
        let response = cluster
            .node("a")
            .invoke(put("m", &key, "v"))
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Null);
        assert_eq!(
            response.backups.warnings,
            vec![GridError::BackupAcknowledgementTimeout {
                member: MemberId::from("b"),
                partition,
            }]
        );
        assert_eq!(
            cluster.map_value("a", partition, "m", &key).await,
            Some(Data::from("v"))
        );
    }

    #[tokio::test]
    async fn test_read_does_not_replicate() {
        let cluster = cluster(&["a", "b"], test_config()).await;
        let caller = cluster.node("b");
        caller.invoke(put("m", "k", "v")).await.unwrap();
        let sent_before = cluster.transport.backups_sent();

        let response = caller
            .invoke(MapGet::new("m", Data::from("k")).into())
            .await
            .unwrap();

        assert_eq!(response.value, OpValue::Data(Data::from("v")));
        assert_eq!(cluster.transport.backups_sent(), sent_before);
    }

    #[tokio::test]
    async fn test_async_backup_reaches_replica_without_being_awaited() {
        // ARRANGE
        let mut config = test_config();
        config.maps.insert(
            "audit".to_string(),
            BackupConfig {
                backup_count: 0,
                async_backup_count: 1,
            },
        );
        let cluster = cluster(&["a", "b"], config).await;
        let (key, partition) = cluster.key_owned_by("a", "audit");

        // ACT
        let response = cluster
            .node("a")
            .invoke(put("audit", &key, "v"))
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.backups.sync_acknowledged, 0);
        assert_eq!(response.backups.async_dispatched, 1);
        let (cluster, key) = (&cluster, key.as_str());
        assert!(
            eventually(move || async move {
                cluster.map_value("b", partition, "audit", key).await == Some(Data::from("v"))
            })
            .await
        );
    }

    #[tokio::test]
    async fn test_sync_and_async_structures_share_a_partition_without_gaps() {
        // ARRANGE
        let mut config = test_config();
        config.maps.insert(
            "am".to_string(),
            BackupConfig {
                backup_count: 0,
                async_backup_count: 1,
            },
        );
        let cluster = cluster(&["a", "b"], config).await;
        let (key, partition) = cluster.key_owned_by("a", "mixed");
        cluster
            .transport
            .set_backup_delay(&MemberId::from("b"), Duration::from_millis(2));
        let owner = cluster.node("a");

        // ACT
        for n in 0..20 {
            owner.invoke(put("am", &key, &n.to_string())).await.unwrap();
            owner.invoke(put("sm", &key, &n.to_string())).await.unwrap();
        }

        // ASSERT
        let replica = cluster.node("b");
        assert!(
            eventually(move || async move {
                let lane = replica.executor().partition(partition).await.unwrap();
                lane.replica_version(ContainerKind::Map, "am") == 20
            })
            .await
        );
        let lane = replica.executor().partition(partition).await.unwrap();
        assert!(!lane.needs_sync);
        assert_eq!(lane.replica_version(ContainerKind::Map, "sm"), 20);
        for map in ["am", "sm"] {
            assert_eq!(
                lane.map(map).unwrap().get(&Data::from(key.as_str())),
                Some(&Data::from("19"))
            );
        }
    }

    // ============================================================
    // IDEMPOTENCY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_restarted_member_calls_are_not_answered_from_old_memo() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (key, partition) = cluster.key_owned_by("b", "restart");
        cluster.node("a").invoke(put("m", &key, "v")).await.unwrap();

        let restarted = NodeEngine::new(
            MemberId::from("a"),
            test_config(),
            cluster.transport.clone(),
            Arc::new(RecordingLifecycle::default()),
        )
        .unwrap();
        cluster.transport.register(&restarted);
        let table = cluster.node("b").current_table();
        restarted.apply_table(table.as_ref().clone()).await.unwrap();

        // ACT
        let removed = restarted
            .invoke(MapRemove::new("m", Data::from(key.as_str())).into())
            .await
            .unwrap();
        let after = restarted
            .invoke(MapGet::new("m", Data::from(key.as_str())).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(removed.value, OpValue::Data(Data::from("v")));
        assert_eq!(after.value, OpValue::Null);
        assert_eq!(cluster.map_value("b", partition, "m", &key).await, None);
    }

    #[tokio::test]
    async fn test_lost_response_is_retried_without_second_effect() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (name, _) = cluster.key_owned_by("b", "ring");
        cluster
            .transport
            .drop_next_responses(&MemberId::from("b"), 1);
        let caller = cluster.node("a");

        // ACT
        let response = caller
            .invoke(RingbufferAdd::new(&name, Data::from("x")).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Long(0));
        assert_eq!(cluster.transport.operations_sent(), 2);
        let tail = caller
            .invoke(RingbufferTailSequence::new(&name).into())
            .await
            .unwrap();
        assert_eq!(tail.value, OpValue::Long(0));
    }

    #[tokio::test]
    async fn test_table_change_mid_invocation_reroutes_to_new_owner() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (name, partition) = cluster.key_owned_by("b", "moving");
        let promoted = promote_first_backups(&cluster.node("a").current_table(), 2);
        assert!(promoted.is_owner(partition, &MemberId::from("a")));

        let nodes = cluster.nodes.clone();
        let fired = AtomicUsize::new(0);
        cluster.transport.set_before_delivery(Box::new(move |_| {
            if fired.fetch_add(1, Ordering::SeqCst) == 0 {
                for node in &nodes {
                    node.partitions().apply_snapshot(promoted.clone()).unwrap();
                }
            }
        }));

        // ACT
        let response = cluster
            .node("a")
            .invoke(RingbufferAdd::new(&name, Data::from("x")).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Long(0));
        // b rejected the stale routing; the retry ran on a in process
        assert_eq!(cluster.transport.operations_sent(), 1);
        let on_a = cluster.node("a").executor().partition(partition).await.unwrap();
        assert_eq!(on_a.ringbuffer(&name).unwrap().tail_sequence(), 0);
        drop(on_a);
        let on_b = cluster.node("b").executor().partition(partition).await.unwrap();
        assert!(on_b.ringbuffer(&name).is_none());
    }

    #[tokio::test]
    async fn test_promoted_backup_answers_retry_from_memo() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (name, partition) = cluster.key_owned_by("b", "promoted");
        let promoted = promote_first_backups(&cluster.node("a").current_table(), 2);
        cluster
            .transport
            .drop_next_responses(&MemberId::from("b"), 1);

        // first delivery applies at b and backs up to a; the table moves before the second
        let nodes = cluster.nodes.clone();
        let deliveries = AtomicUsize::new(0);
        cluster.transport.set_before_delivery(Box::new(move |_| {
            if deliveries.fetch_add(1, Ordering::SeqCst) == 1 {
                for node in &nodes {
                    node.partitions().apply_snapshot(promoted.clone()).unwrap();
                }
            }
        }));

        // ACT
        let response = cluster
            .node("a")
            .invoke(RingbufferAdd::new(&name, Data::from("x")).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Long(0));
        let on_a = cluster.node("a").executor().partition(partition).await.unwrap();
        let ring = on_a.ringbuffer(&name).unwrap();
        assert_eq!(ring.tail_sequence(), 0);
        assert_eq!(ring.size(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_owner_surfaces_member_left() {
        let mut config = test_config();
        config.invocation.max_attempts = 3;
        let cluster = cluster(&["a", "b"], config).await;
        let (key, _) = cluster.key_owned_by("b", "gone");
        cluster
            .transport
            .set_unreachable(&MemberId::from("b"), true);

        let result = cluster.node("a").invoke(put("m", &key, "v")).await;

        assert_eq!(result.unwrap_err(), GridError::MemberLeft(MemberId::from("b")));
    }

    #[tokio::test]
    async fn test_generic_operation_runs_on_caller() {
        let cluster = cluster(&["a", "b"], test_config()).await;
        let sent_before = cluster.transport.operations_sent();

        let response = cluster
            .node("b")
            .invoke(TableVersion.into())
            .await
            .unwrap();

        assert_eq!(response.value, OpValue::Long(1));
        assert_eq!(cluster.transport.operations_sent(), sent_before);
    }

    // ============================================================
    // DEADLINE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_stale_table_until_attempts_run_out_times_out() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (key, partition) = cluster.key_owned_by("b", "stale");
        // b moves on to v2; a keeps routing with v1
        let members = [MemberId::from("a"), MemberId::from("b")];
        let newer = PartitionTable::assign(2, 8, &members, 1).unwrap();
        cluster.node("b").apply_table(newer).await.unwrap();

        // ACT
        let result = cluster.node("a").invoke(put("m", &key, "v")).await;

        // ASSERT
        assert_eq!(
            result.unwrap_err(),
            GridError::OperationTimeout {
                operation: "map.put".to_string(),
                attempts: 5,
            }
        );
        assert_eq!(cluster.transport.operations_sent(), 5);
        assert_eq!(cluster.map_value("b", partition, "m", &key).await, None);
    }

    #[tokio::test]
    async fn test_slow_remote_owner_times_out_but_finishes_replication() {
        // ARRANGE
        let mut config = test_config();
        config.invocation.call_timeout_ms = 100;
        let cluster = cluster(&["a", "b"], config).await;
        let (key, partition) = cluster.key_owned_by("b", "slow");
        // b's sync backup to a is what keeps the call waiting
        cluster
            .transport
            .set_backup_delay(&MemberId::from("a"), Duration::from_millis(300));

        // ACT
        let result = cluster.node("a").invoke(put("m", &key, "v")).await;

        // ASSERT
        assert!(matches!(
            result,
            Err(GridError::OperationTimeout { attempts: 1, .. })
        ));
        let (cluster, key) = (&cluster, key.as_str());
        assert!(
            eventually(move || async move {
                cluster.map_value("a", partition, "m", key).await == Some(Data::from("v"))
            })
            .await
        );
        assert_eq!(
            cluster.map_value("b", partition, "m", key).await,
            Some(Data::from("v"))
        );
    }

    #[tokio::test]
    async fn test_local_execution_outlives_caller_deadline() {
        // ARRANGE
        let mut config = test_config();
        config.invocation.call_timeout_ms = 100;
        let cluster = cluster(&["a", "b"], config).await;
        let (key, partition) = cluster.key_owned_by("a", "local");
        cluster
            .transport
            .set_backup_delay(&MemberId::from("b"), Duration::from_millis(300));
        let owner = cluster.node("a");

        // ACT
        let timed_out = owner.invoke(put("m", &key, "v1")).await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        cluster
            .transport
            .set_backup_delay(&MemberId::from("b"), Duration::ZERO);
        let next = owner.invoke(put("m", &key, "v2")).await.unwrap();

        // ASSERT
        assert!(matches!(timed_out, Err(GridError::OperationTimeout { .. })));
        assert_eq!(next.value, OpValue::Data(Data::from("v1")));
        assert!(next.backups.is_clean());
        let lane = cluster.node("b").executor().partition(partition).await.unwrap();
        assert!(!lane.needs_sync);
        assert_eq!(lane.replica_version(ContainerKind::Map, "m"), 2);
        assert_eq!(
            lane.map("m").unwrap().get(&Data::from(key.as_str())),
            Some(&Data::from("v2"))
        );
    }

    // ============================================================
    // MAINTENANCE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_eviction_destroys_empty_queue_exactly_once() {
        // ARRANGE
        let cluster = cluster(&["solo"], test_config()).await;
        let node = cluster.node("solo");
        node.invoke(QueueOffer::new("jobs", Data::from("j")).into())
            .await
            .unwrap();
        node.invoke(QueuePoll::new("jobs").into()).await.unwrap();

        // ACT
        let first = node
            .invoke(EvictionCheck::new(ContainerKind::Queue, "jobs").into())
            .await
            .unwrap();
        let second = node
            .invoke(EvictionCheck::new(ContainerKind::Queue, "jobs").into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(first.value, OpValue::Bool(true));
        assert_eq!(second.value, OpValue::Bool(false));
        let destroyed = cluster.lifecycles[0].destroyed();
        assert_eq!(destroyed.len(), 1);
        assert_eq!(destroyed[0].1, ContainerKind::Queue);
        assert_eq!(destroyed[0].2, "jobs");
    }

    #[tokio::test]
    async fn test_eviction_skips_non_empty_queue() {
        let cluster = cluster(&["solo"], test_config()).await;
        let node = cluster.node("solo");
        node.invoke(QueueOffer::new("jobs", Data::from("j")).into())
            .await
            .unwrap();

        let response = node
            .invoke(EvictionCheck::new(ContainerKind::Queue, "jobs").into())
            .await
            .unwrap();

        assert_eq!(response.value, OpValue::Bool(false));
        assert!(cluster.lifecycles[0].destroyed().is_empty());
    }

    #[tokio::test]
    async fn test_listener_blocks_eviction() {
        // ARRANGE
        let cluster = cluster(&["solo"], test_config()).await;
        let node = cluster.node("solo");
        let (_id, mut events) = node.add_listener(ContainerKind::Queue, "jobs");
        node.invoke(QueueOffer::new("jobs", Data::from("j")).into())
            .await
            .unwrap();
        node.invoke(QueuePoll::new("jobs").into()).await.unwrap();

        // ACT
        let response = node
            .invoke(EvictionCheck::new(ContainerKind::Queue, "jobs").into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Bool(false));
        assert!(events.try_recv().is_ok());
        assert!(cluster.lifecycles[0].destroyed().is_empty());
    }

    #[tokio::test]
    async fn test_eviction_of_emptied_map_store() {
        // ARRANGE
        let cluster = cluster(&["solo"], test_config()).await;
        let node = cluster.node("solo");
        node.invoke(put("sessions", "s1", "x")).await.unwrap();
        node.invoke(MapRemove::new("sessions", Data::from("s1")).into())
            .await
            .unwrap();
        let partition = node.partitions().partition_for_key(&Data::from("s1"));

        // ACT
        let response = node
            .invoke(EvictionCheck::on_partition(ContainerKind::Map, "sessions", partition).into())
            .await
            .unwrap();

        // ASSERT
        assert_eq!(response.value, OpValue::Bool(true));
        let lane = node.executor().partition(partition).await.unwrap();
        assert!(!lane.contains(ContainerKind::Map, "sessions"));
    }

    // ============================================================
    // ANTI-ENTROPY TESTS
    // ============================================================

    #[tokio::test]
    async fn test_missed_backup_is_repaired_from_owner() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (first, partition) = cluster.key_owned_by("a", "k");
        let second = (0..1_000)
            .map(|n| format!("other{}", n))
            .find(|key| {
                cluster.node("a").partitions().partition_for_key(&Data::from(key.as_str()))
                    == partition
            })
            .unwrap();
        let owner = cluster.node("a");
        let replica = cluster.node("b");

        cluster
            .transport
            .set_unreachable(&MemberId::from("b"), true);
        let degraded = owner.invoke(put("m", &first, "1")).await.unwrap();
        assert!(!degraded.backups.is_clean());
        cluster
            .transport
            .set_unreachable(&MemberId::from("b"), false);
        owner.invoke(put("m", &second, "2")).await.unwrap();
        {
            let lane = replica.executor().partition(partition).await.unwrap();
            assert!(lane.needs_sync);
            assert_eq!(lane.replica_version(ContainerKind::Map, "m"), 2);
            assert!(lane.map("m").unwrap().get(&Data::from(first.as_str())).is_none());
        }

        // ACT
        let repaired = replica.sync_replicas().await;

        // ASSERT
        assert_eq!(repaired, 1);
        let lane = replica.executor().partition(partition).await.unwrap();
        assert!(!lane.needs_sync);
        let store = lane.map("m").unwrap();
        assert_eq!(store.get(&Data::from(first.as_str())), Some(&Data::from("1")));
        assert_eq!(store.get(&Data::from(second.as_str())), Some(&Data::from("2")));
    }

    #[tokio::test]
    async fn test_replayed_backup_is_ignored() {
        // ARRANGE
        let cluster = cluster(&["a", "b"], test_config()).await;
        let (key, partition) = cluster.key_owned_by("a", "dup");
        let owner = cluster.node("a");
        owner.invoke(put("m", &key, "v1")).await.unwrap();

        let replica = cluster.node("b");
        let stale = BackupRequest {
            caller: CallerId {
                member: MemberId::from("a"),
                incarnation: 1,
                call_id: 999,
            },
            partition_id: partition,
            container_kind: ContainerKind::Map,
            container_name: "m".to_string(),
            replica_version: 1,
            table_version: 1,
            value: OpValue::Null,
            backup: MapPutBackup::new(
                "m",
                Data::from(key.as_str()),
                Data::from("stale"),
            )
            .into(),
        };

        // ACT
        let ack = replica.executor().apply_backup(stale).await.unwrap();

        // ASSERT
        assert!(!ack.applied);
        assert_eq!(
            cluster.map_value("b", partition, "m", &key).await,
            Some(Data::from("v1"))
        );
    }

    #[tokio::test]
    async fn test_newly_assigned_backup_is_flagged_for_sync() {
        let cluster = cluster(&["a", "b"], test_config()).await;
        let node = cluster.node("b");

        // b backs up nothing, then everything
        let owners_only = PartitionTable::assign(2, 8, &[MemberId::from("a")], 0).unwrap();
        node.apply_table(owners_only).await.unwrap();
        let both = PartitionTable::assign(3, 8, &[MemberId::from("a"), MemberId::from("b")], 1)
            .unwrap();
        node.apply_table(both).await.unwrap();

        let backup_partitions = node.partitions().local_backup_partitions();
        assert!(!backup_partitions.is_empty());
        for partition in backup_partitions {
            assert!(node.executor().partition(partition).await.unwrap().needs_sync);
        }
    }
}
