use super::protocol::{BackupAck, BackupReport, BackupRequest};
use crate::error::GridError;
use crate::operation::OperationRegistry;
use crate::operation::types::MemberId;
use crate::transport::Transport;

use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Fans backups out from a partition owner to its replicas.
pub struct BackupReplicator {
    transport: Arc<dyn Transport>,
    registry: Arc<OperationRegistry>,
    ack_timeout: Duration,
    /// One FIFO per replica member for async backups.
    async_queues: DashMap<MemberId, mpsc::UnboundedSender<Bytes>>,
}

impl BackupReplicator {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: Arc<OperationRegistry>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            registry,
            ack_timeout,
            async_queues: DashMap::new(),
        }
    }

    /// Sends `request` to `replicas` in list order: the first `sync_count` are awaited, the
    /// next `async_count` are queued. Replicas beyond that are ignored.
    pub async fn replicate(
        &self,
        request: &BackupRequest,
        replicas: &[MemberId],
        sync_count: usize,
        async_count: usize,
    ) -> BackupReport {
        let sync_end = sync_count.min(replicas.len());
        let async_end = (sync_count + async_count).min(replicas.len());
        let payload = request.encode(&self.registry);
        let mut report = BackupReport::default();

        tracing::debug!(
            "Replicating {} for {} '{}' on partition {} v{} to {} sync / {} async replicas",
            request.backup.behavior().name(),
            request.container_kind,
            request.container_name,
            request.partition_id,
            request.replica_version,
            sync_end,
            async_end - sync_end
        );

        if sync_end > 0 {
            self.send_sync(request, &replicas[..sync_end], payload.clone(), &mut report)
                .await;
        }
        for member in &replicas[sync_end..async_end] {
            self.enqueue_async(member, payload.clone());
            report.async_dispatched += 1;
        }
        report
    }

    async fn send_sync(
        &self,
        request: &BackupRequest,
        replicas: &[MemberId],
        payload: Bytes,
        report: &mut BackupReport,
    ) {
        let mut acks = JoinSet::new();
        for member in replicas {
            let transport = self.transport.clone();
            let member = member.clone();
            let payload = payload.clone();
            let ack_timeout = self.ack_timeout;
            acks.spawn(async move {
                let sent =
                    tokio::time::timeout(ack_timeout, transport.send_backup(&member, payload)).await;
                (member, sent)
            });
        }

        while let Some(joined) = acks.join_next().await {
            let (member, sent) = match joined {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!("Backup send task failed: {}", e);
                    continue;
                }
            };
            match sent {
                Ok(Ok(bytes)) => match BackupAck::decode(bytes) {
                    Ok(ack) => {
                        tracing::trace!(
                            "Backup ack from {} for partition {} v{} (applied={})",
                            member,
                            ack.partition_id,
                            ack.replica_version,
                            ack.applied
                        );
                        report.sync_acknowledged += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Unreadable backup ack from {}: {}", member, e);
                        report.warnings.push(e);
                    }
                },
                Ok(Err(e)) => {
                    tracing::warn!(
                        "Sync backup to {} for partition {} failed: {}",
                        member,
                        request.partition_id,
                        e
                    );
                    report.warnings.push(e);
                }
                Err(_) => {
                    tracing::warn!(
                        "No backup ack from {} for partition {} within {:?}; primary result stands",
                        member,
                        request.partition_id,
                        self.ack_timeout
                    );
                    report.warnings.push(GridError::BackupAcknowledgementTimeout {
                        member,
                        partition: request.partition_id,
                    });
                }
            }
        }
    }

    fn enqueue_async(&self, member: &MemberId, payload: Bytes) {
        let mut queue = self
            .async_queues
            .entry(member.clone())
            .or_insert_with(|| self.spawn_queue(member));
        if let Err(mpsc::error::SendError(payload)) = queue.send(payload) {
            // drain task is gone; start a fresh one
            let tx = self.spawn_queue(member);
            let _ = tx.send(payload);
            *queue = tx;
        }
    }

    fn spawn_queue(&self, member: &MemberId) -> mpsc::UnboundedSender<Bytes> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain_async_queue(
            self.transport.clone(),
            member.clone(),
            rx,
            self.ack_timeout,
        ));
        tx
    }
}

async fn drain_async_queue(
    transport: Arc<dyn Transport>,
    member: MemberId,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    ack_timeout: Duration,
) {
    tracing::debug!("Async backup queue for {} started", member);
    while let Some(payload) = rx.recv().await {
        match tokio::time::timeout(ack_timeout, transport.send_backup(&member, payload)).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::warn!("Async backup to {} lost ({}); left to anti-entropy", member, e)
            }
            Err(_) => tracing::warn!(
                "Async backup to {} not acknowledged within {:?}; left to anti-entropy",
                member,
                ack_timeout
            ),
        }
    }
}
