//! Owner-side and replica-side execution.
//!
//! [`OperationExecutor`] runs requests addressed to this member: partition operations on
//! their lane, generic operations on the bounded generic pool, and backups on the replica's
//! lane. It also serves partition snapshots and repairs replicas that fell behind.

use super::lifecycle::LifecycleHook;
use crate::config::EngineConfig;
use crate::container::PartitionSnapshot;
use crate::error::{GridError, GridResult};
use crate::events::EventService;
use crate::invocation::memo::CallMemo;
use crate::invocation::protocol::{OperationRequest, OperationResponse};
use crate::operation::types::{CallerId, MemberId};
use crate::operation::{GenericContext, GenericOperation, PartitionOperation, Target};
use crate::partition::{LaneGuard, PartitionLanes, PartitionService};
use crate::replication::{BackupAck, BackupReplicator, BackupReport, BackupRequest};
use crate::step::{PartitionContext, StepEngine};
use crate::transport::Transport;

use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub struct OperationExecutor {
    member: MemberId,
    config: Arc<EngineConfig>,
    partitions: Arc<PartitionService>,
    lanes: Arc<PartitionLanes>,
    events: Arc<EventService>,
    lifecycle: Arc<dyn LifecycleHook>,
    memo: Arc<CallMemo>,
    replicator: Arc<BackupReplicator>,
    transport: Arc<dyn Transport>,
    generic_pool: Semaphore,
}

impl OperationExecutor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        member: MemberId,
        config: Arc<EngineConfig>,
        partitions: Arc<PartitionService>,
        lanes: Arc<PartitionLanes>,
        events: Arc<EventService>,
        lifecycle: Arc<dyn LifecycleHook>,
        memo: Arc<CallMemo>,
        replicator: Arc<BackupReplicator>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let generic_pool = Semaphore::new(config.generic_pool_size);
        Self {
            member,
            config,
            partitions,
            lanes,
            events,
            lifecycle,
            memo,
            replicator,
            transport,
            generic_pool,
        }
    }

    /// Runs a request addressed to this member. A caller id seen before is answered from the
    /// memo without running anything.
    pub async fn execute(&self, request: &OperationRequest) -> GridResult<OperationResponse> {
        if let Some(memoized) = self.memo.get(&request.caller) {
            tracing::debug!(
                "Call {} from {} already applied, replaying result",
                request.caller.call_id,
                request.caller.member
            );
            return Ok(memoized);
        }

        match request.operation.target() {
            Target::Generic(op) => self.run_generic(op, request).await,
            Target::Partition(op) => self.run_partition(op, request).await,
        }
    }

    /// Like [`execute`](Self::execute), but the execution runs on its own task. A caller that
    /// stops waiting (deadline, dropped connection) does not cut replication or memo recording
    /// short.
    pub async fn execute_detached(
        self: &Arc<Self>,
        request: OperationRequest,
    ) -> GridResult<OperationResponse> {
        let executor = self.clone();
        let call_id = request.caller.call_id;
        tokio::spawn(async move { executor.execute(&request).await })
            .await
            .map_err(|e| GridError::Operation(format!("call {} execution failed: {}", call_id, e)))?
    }

    async fn run_generic(
        &self,
        op: &dyn GenericOperation,
        request: &OperationRequest,
    ) -> GridResult<OperationResponse> {
        let _permit = self
            .generic_pool
            .acquire()
            .await
            .map_err(|_| GridError::ShuttingDown)?;
        tracing::trace!("Generic {} for call {}", op.name(), request.caller.call_id);
        let ctx = GenericContext {
            member: &self.member,
            table_version: self.partitions.version(),
            partition_count: self.partitions.partition_count(),
        };
        Ok(OperationResponse {
            value: op.run(&ctx)?,
            backups: BackupReport::default(),
        })
    }

    async fn run_partition(
        &self,
        op: &dyn PartitionOperation,
        request: &OperationRequest,
    ) -> GridResult<OperationResponse> {
        let partition_id = match request.partition_id {
            Some(partition) => partition,
            None => self.partitions.resolve(&op.partition_key())?,
        };
        self.check_owner(partition_id, request.table_version)?;

        let mut lane = self.lanes.acquire(partition_id).await?;

        // the table or the memo may have moved while we queued for the lane
        self.check_owner(partition_id, request.table_version)?;
        if let Some(memoized) = self.memo.get(&request.caller) {
            return Ok(memoized);
        }

        let state = {
            let mut ctx = PartitionContext {
                partition_id,
                member: &self.member,
                container: &mut *lane,
                events: &self.events,
                lifecycle: self.lifecycle.as_ref(),
                config: &self.config,
            };
            StepEngine::execute(op, &mut ctx).await?
        };

        let mut backups = BackupReport::default();
        if op.should_backup(&state)
            && let Some(backup) = op.backup_operation(&state)
        {
            let kind = op.container_kind();
            let name = op.container_name();
            let replica_version = lane.next_replica_version(kind, name);
            let replicas = self
                .partitions
                .current()
                .replicas(partition_id)
                .map(|r| r.backups.clone())
                .unwrap_or_default();
            let backup_request = BackupRequest {
                caller: request.caller.clone(),
                partition_id,
                container_kind: kind,
                container_name: name.to_string(),
                replica_version,
                table_version: request.table_version,
                value: state.result.clone(),
                backup,
            };
            backups = self
                .replicator
                .replicate(
                    &backup_request,
                    &replicas,
                    op.sync_backup_count(&self.config),
                    op.async_backup_count(&self.config),
                )
                .await;
        }

        let response = OperationResponse {
            value: state.result,
            backups,
        };
        if !op.is_readonly() {
            self.memo.record(request.caller.clone(), response.clone());
        }
        drop(lane);

        tracing::debug!(
            "{} on partition {} done (call {}, steps {:?})",
            op.name(),
            partition_id,
            request.caller.call_id,
            state.trace
        );
        Ok(response)
    }

    fn check_owner(&self, partition_id: u32, routed_version: u64) -> GridResult<()> {
        let table = self.partitions.current();
        let owner = table.owner_of(partition_id, routed_version)?;
        if owner != self.member {
            return Err(GridError::StaleTopology {
                partition: partition_id,
                expected: routed_version,
                actual: table.version(),
            });
        }
        Ok(())
    }

    /// Applies a backup on this replica in primary generation order of its structure.
    pub async fn apply_backup(&self, request: BackupRequest) -> GridResult<BackupAck> {
        let mut lane = self.lanes.acquire(request.partition_id).await?;
        let kind = request.container_kind;
        let name = request.container_name.as_str();
        let applied = lane.replica_version(kind, name);

        if request.replica_version <= applied {
            tracing::debug!(
                "Backup v{} of {} '{}' on partition {} already applied (at v{})",
                request.replica_version,
                kind,
                name,
                request.partition_id,
                applied
            );
            return Ok(BackupAck {
                partition_id: request.partition_id,
                replica_version: request.replica_version,
                applied: false,
            });
        }
        if request.replica_version != applied + 1 {
            tracing::warn!(
                "Replica of {} '{}' on partition {} skipped from v{} to v{}; scheduling sync",
                kind,
                name,
                request.partition_id,
                applied,
                request.replica_version
            );
            lane.needs_sync = true;
        }

        request.backup.apply(&mut *lane, &self.config)?;
        lane.set_replica_version(kind, name, request.replica_version);
        self.memo.record(
            request.caller.clone(),
            OperationResponse {
                value: request.value,
                backups: BackupReport::default(),
            },
        );

        Ok(BackupAck {
            partition_id: request.partition_id,
            replica_version: request.replica_version,
            applied: true,
        })
    }

    /// Encoded snapshot of one local partition.
    pub async fn dump_partition(&self, partition_id: u32) -> GridResult<Bytes> {
        let lane = self.lanes.acquire(partition_id).await?;
        let snapshot = lane.snapshot();
        tracing::debug!(
            "Dumping partition {} ({} entries, {} versioned structures)",
            partition_id,
            lane.entry_count(),
            snapshot.replica_versions.len()
        );
        Ok(snapshot.to_bytes())
    }

    /// Flags partitions for the next anti-entropy round.
    pub async fn mark_needs_sync(&self, partitions: &[u32]) -> GridResult<()> {
        for &partition_id in partitions {
            self.lanes.acquire(partition_id).await?.needs_sync = true;
        }
        Ok(())
    }

    /// Pulls a fresh snapshot from the owner for every local backup partition flagged as
    /// behind. Returns the number of partitions repaired.
    pub async fn sync_replicas(&self) -> usize {
        let table = self.partitions.current();
        let mut repaired = 0;

        for partition_id in self.partitions.local_backup_partitions() {
            if !self.lane_needs_sync(partition_id).await {
                continue;
            }
            let Ok(owner) = table.owner_of(partition_id, table.version()) else {
                continue;
            };

            let snapshot = match self.transport.fetch_partition(&owner, partition_id).await {
                Ok(bytes) => match PartitionSnapshot::from_bytes(bytes) {
                    Ok(snapshot) => snapshot,
                    Err(e) => {
                        tracing::warn!("Bad snapshot of partition {} from {}: {}", partition_id, owner, e);
                        continue;
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to fetch partition {} from {}: {}", partition_id, owner, e);
                    continue;
                }
            };

            match self.lanes.acquire(partition_id).await {
                Ok(mut lane) => {
                    if lane.is_ahead_of(&snapshot) {
                        tracing::debug!(
                            "Snapshot of partition {} from {} older than replica; retrying later",
                            partition_id,
                            owner
                        );
                        continue;
                    }
                    lane.restore(snapshot);
                    repaired += 1;
                    tracing::info!(
                        "Partition {} resynced from {} ({} entries)",
                        partition_id,
                        owner,
                        lane.entry_count()
                    );
                }
                Err(e) => tracing::error!("Cannot reserve partition {}: {}", partition_id, e),
            }
        }
        repaired
    }

    async fn lane_needs_sync(&self, partition_id: u32) -> bool {
        match self.lanes.acquire(partition_id).await {
            Ok(lane) => lane.needs_sync,
            Err(_) => false,
        }
    }

    /// Exclusive access to a local partition (diagnostics and tests).
    pub async fn partition(&self, partition_id: u32) -> GridResult<LaneGuard> {
        self.lanes.acquire(partition_id).await
    }

    pub fn memo(&self) -> &CallMemo {
        &self.memo
    }

    pub fn caller_applied(&self, caller: &CallerId) -> bool {
        self.memo.contains(caller)
    }
}
