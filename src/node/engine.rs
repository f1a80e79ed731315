use super::executor::OperationExecutor;
use super::lifecycle::LifecycleHook;
use crate::config::EngineConfig;
use crate::error::GridResult;
use crate::events::{ContainerEvent, EventService, ListenerId};
use crate::invocation::protocol::{OperationRequest, ResponseEnvelope};
use crate::invocation::{CallMemo, InvocationEngine, InvocationResponse};
use crate::operation::types::{ContainerKind, MemberId};
use crate::operation::{Operation, OperationRegistry};
use crate::partition::{PartitionLanes, PartitionService, PartitionTable};
use crate::proxy::{DistributedMap, DistributedQueue, Ringbuffer};
use crate::replication::{BackupReplicator, BackupRequest};
use crate::transport::Transport;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One cluster member's engine: the caller-side invocation engine plus everything needed to
/// execute requests that other members route here.
pub struct NodeEngine {
    member: MemberId,
    config: Arc<EngineConfig>,
    registry: Arc<OperationRegistry>,
    partitions: Arc<PartitionService>,
    events: Arc<EventService>,
    executor: Arc<OperationExecutor>,
    invocation: InvocationEngine,
}

impl NodeEngine {
    pub fn new(
        member: MemberId,
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        lifecycle: Arc<dyn LifecycleHook>,
    ) -> GridResult<Arc<Self>> {
        config.validate()?;
        let config = Arc::new(config);
        let registry = Arc::new(OperationRegistry::standard()?);
        let partitions = Arc::new(PartitionService::new(
            member.clone(),
            config.partition_count,
            config.max_total_backups(),
        ));
        let lanes = Arc::new(PartitionLanes::new(config.partition_count));
        let events = Arc::new(EventService::new());
        let memo = Arc::new(CallMemo::new(&config.call_memo));
        let replicator = Arc::new(BackupReplicator::new(
            transport.clone(),
            registry.clone(),
            config.invocation.backup_ack_timeout(),
        ));

        let executor = Arc::new(OperationExecutor::new(
            member.clone(),
            config.clone(),
            partitions.clone(),
            lanes,
            events.clone(),
            lifecycle,
            memo,
            replicator,
            transport.clone(),
        ));
        let invocation = InvocationEngine::new(
            member.clone(),
            partitions.clone(),
            executor.clone(),
            transport,
            registry.clone(),
            &config.invocation,
        );

        tracing::info!(
            "Node {} ready ({} partitions, {} registered operation types)",
            member,
            config.partition_count,
            registry.operations().type_count()
        );

        Ok(Arc::new(Self {
            member,
            config,
            registry,
            partitions,
            events,
            executor,
            invocation,
        }))
    }

    pub fn member(&self) -> &MemberId {
        &self.member
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn partitions(&self) -> &PartitionService {
        &self.partitions
    }

    pub fn executor(&self) -> &OperationExecutor {
        &self.executor
    }

    pub fn current_table(&self) -> Arc<PartitionTable> {
        self.partitions.current()
    }

    pub async fn invoke(&self, operation: Operation) -> GridResult<InvocationResponse> {
        self.invocation.invoke(operation).await
    }

    /// Serves an encoded request from another member. Always answers with an envelope, even
    /// when the request could not be decoded.
    pub async fn handle_operation(&self, payload: Bytes) -> Bytes {
        let envelope = match OperationRequest::decode(payload, &self.registry) {
            Ok(request) => ResponseEnvelope {
                call_id: request.caller.call_id,
                result: self.executor.execute_detached(request).await,
            },
            Err(rejected) => {
                tracing::warn!(
                    "Rejected request for call {}: {}",
                    rejected.call_id,
                    rejected.error
                );
                ResponseEnvelope {
                    call_id: rejected.call_id,
                    result: Err(rejected.error),
                }
            }
        };
        envelope.encode()
    }

    pub async fn handle_backup(&self, payload: Bytes) -> GridResult<Bytes> {
        let request = BackupRequest::decode(payload, &self.registry)?;
        let ack = self.executor.apply_backup(request).await?;
        Ok(ack.encode())
    }

    pub async fn handle_partition_dump(&self, partition_id: u32) -> GridResult<Bytes> {
        self.executor.dump_partition(partition_id).await
    }

    /// Installs a table pushed by the migration collaborator. Partitions this member newly
    /// backs up are flagged so the next anti-entropy round pulls their state from the owner.
    pub async fn apply_table(&self, table: PartitionTable) -> GridResult<bool> {
        let Some(change) = self.partitions.apply_snapshot(table)? else {
            return Ok(false);
        };

        let gained: Vec<u32> = (0..self.partitions.partition_count())
            .filter(|&partition| {
                change.current.backup_index(partition, &self.member).is_some()
                    && change.previous.backup_index(partition, &self.member).is_none()
                    && !change.previous.is_owner(partition, &self.member)
            })
            .collect();
        if !gained.is_empty() {
            tracing::info!(
                "Now backing up {} new partition(s); scheduling sync",
                gained.len()
            );
            self.executor.mark_needs_sync(&gained).await?;
        }
        Ok(true)
    }

    /// One anti-entropy round.
    pub async fn sync_replicas(&self) -> usize {
        self.executor.sync_replicas().await
    }

    pub fn add_listener(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> (ListenerId, mpsc::UnboundedReceiver<ContainerEvent>) {
        self.events.add_listener(kind, name)
    }

    pub fn remove_listener(&self, kind: ContainerKind, name: &str, id: ListenerId) -> bool {
        self.events.remove_listener(kind, name, id)
    }

    pub fn map<K, V>(self: &Arc<Self>, name: &str) -> DistributedMap<K, V>
    where
        K: Serialize,
        V: Serialize + DeserializeOwned,
    {
        DistributedMap::new(self.clone(), name)
    }

    pub fn queue<T>(self: &Arc<Self>, name: &str) -> DistributedQueue<T>
    where
        T: Serialize + DeserializeOwned,
    {
        DistributedQueue::new(self.clone(), name)
    }

    pub fn ringbuffer<T>(self: &Arc<Self>, name: &str) -> Ringbuffer<T>
    where
        T: Serialize + DeserializeOwned,
    {
        Ringbuffer::new(self.clone(), name)
    }
}
