use super::Transport;
use crate::error::{GridError, GridResult};
use crate::node::engine::NodeEngine;
use crate::operation::types::MemberId;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::{DashMap, DashSet};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Called with the destination member right before an operation is delivered.
pub type DeliveryHook = Box<dyn Fn(&MemberId) + Send + Sync>;

/// In-process transport between engines living in the same process.
///
/// Frames still go through their byte encoding, so everything the wire would reject is
/// rejected here too. Faults can be injected per destination member.
#[derive(Default)]
pub struct LoopbackTransport {
    engines: DashMap<MemberId, Weak<NodeEngine>>,
    unreachable: DashSet<MemberId>,
    dropped_responses: DashMap<MemberId, usize>,
    backup_delays: DashMap<MemberId, Duration>,
    before_delivery: RwLock<Option<DeliveryHook>>,
    operations_sent: AtomicUsize,
    backups_sent: AtomicUsize,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, engine: &Arc<NodeEngine>) {
        self.engines
            .insert(engine.member().clone(), Arc::downgrade(engine));
    }

    pub fn set_unreachable(&self, member: &MemberId, unreachable: bool) {
        if unreachable {
            self.unreachable.insert(member.clone());
        } else {
            self.unreachable.remove(member);
        }
    }

    /// The next `count` operations sent to `member` are executed there, but their responses
    /// are lost on the way back.
    pub fn drop_next_responses(&self, member: &MemberId, count: usize) {
        self.dropped_responses.insert(member.clone(), count);
    }

    pub fn set_backup_delay(&self, member: &MemberId, delay: Duration) {
        self.backup_delays.insert(member.clone(), delay);
    }

    pub fn set_before_delivery(&self, hook: DeliveryHook) {
        *self.before_delivery.write() = Some(hook);
    }

    pub fn clear_before_delivery(&self) {
        *self.before_delivery.write() = None;
    }

    pub fn operations_sent(&self) -> usize {
        self.operations_sent.load(Ordering::SeqCst)
    }

    pub fn backups_sent(&self) -> usize {
        self.backups_sent.load(Ordering::SeqCst)
    }

    fn engine_for(&self, member: &MemberId) -> GridResult<Arc<NodeEngine>> {
        if self.unreachable.contains(member) {
            return Err(GridError::MemberUnreachable {
                member: member.clone(),
                reason: "link down".to_string(),
            });
        }
        self.engines
            .get(member)
            .and_then(|engine| engine.upgrade())
            .ok_or_else(|| GridError::MemberUnreachable {
                member: member.clone(),
                reason: "not registered".to_string(),
            })
    }

    fn take_dropped_response(&self, member: &MemberId) -> bool {
        match self.dropped_responses.get_mut(member) {
            Some(mut remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send_operation(&self, member: &MemberId, payload: Bytes) -> GridResult<Bytes> {
        if let Some(hook) = self.before_delivery.read().as_ref() {
            hook(member);
        }
        let engine = self.engine_for(member)?;
        self.operations_sent.fetch_add(1, Ordering::SeqCst);

        let reply = engine.handle_operation(payload).await;
        if self.take_dropped_response(member) {
            tracing::debug!("Dropping response from {}", member);
            return Err(GridError::MemberUnreachable {
                member: member.clone(),
                reason: "response lost".to_string(),
            });
        }
        Ok(reply)
    }

    async fn send_backup(&self, member: &MemberId, payload: Bytes) -> GridResult<Bytes> {
        let engine = self.engine_for(member)?;
        self.backups_sent.fetch_add(1, Ordering::SeqCst);

        let delay = self.backup_delays.get(member).map(|delay| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        engine.handle_backup(payload).await
    }

    async fn fetch_partition(&self, member: &MemberId, partition_id: u32) -> GridResult<Bytes> {
        self.engine_for(member)?
            .handle_partition_dump(partition_id)
            .await
    }
}
