//! Queue operations.
//!
//! The whole queue lives in the partition its name hashes to. The primary assigns item ids;
//! backups carry them so replicas offer and poll the same items in the same order.

use super::types::{ContainerKind, OpValue, PartitionKey};
use super::{
    BackupBehavior, BackupOperation, Operation, PartitionOperation, QUEUE_FACTORY_ID,
    unexpected_step,
};
use crate::config::EngineConfig;
use crate::container::PartitionContainer;
use crate::error::GridResult;
use crate::events::EventKind;
use crate::serialization::{
    BuilderMap, Data, IdentifiedDataSerializable, ObjectDataInput, ObjectDataOutput,
};
use crate::step::{PartitionContext, State, Step, Transition};

pub const OFFER: i32 = 1;
pub const POLL: i32 = 2;
pub const PEEK: i32 = 3;
pub const SIZE: i32 = 4;

pub const OFFER_BACKUP: i32 = 101;
pub const POLL_BACKUP: i32 = 102;

pub fn operation_builders() -> BuilderMap<Operation> {
    let mut builders: BuilderMap<Operation> = BuilderMap::new();
    builders.insert(OFFER, || Operation::QueueOffer(QueueOffer::default()));
    builders.insert(POLL, || Operation::QueuePoll(QueuePoll::default()));
    builders.insert(PEEK, || Operation::QueuePeek(QueuePeek::default()));
    builders.insert(SIZE, || Operation::QueueSize(QueueSize::default()));
    builders
}

pub fn backup_builders() -> BuilderMap<BackupOperation> {
    let mut builders: BuilderMap<BackupOperation> = BuilderMap::new();
    builders.insert(OFFER_BACKUP, || {
        BackupOperation::QueueOfferBackup(QueueOfferBackup::default())
    });
    builders.insert(POLL_BACKUP, || {
        BackupOperation::QueuePollBackup(QueuePollBackup::default())
    });
    builders
}

fn name_key(name: &str) -> PartitionKey {
    PartitionKey::Key(Data::from(name))
}

/// Appends an item. Returns `false` when the queue is at its configured `max_size`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueOffer {
    pub name: String,
    pub item: Data,
}

impl QueueOffer {
    pub fn new(name: &str, item: Data) -> Self {
        Self {
            name: name.to_string(),
            item,
        }
    }
}

impl PartitionOperation for QueueOffer {
    fn name(&self) -> &'static str {
        "queue.offer"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Queue
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        name_key(&self.name)
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Read => {
                let max_size = ctx.config.queue_config(&self.name).max_size;
                let size = ctx.container.queue(&self.name).map_or(0, |q| q.size());
                if max_size > 0 && size >= max_size {
                    tracing::debug!("Queue '{}' is full ({} items)", self.name, size);
                    state.result = OpValue::Bool(false);
                    return Ok(Transition::Complete);
                }
                Ok(Transition::Next(Step::Apply))
            }
            Step::Apply => {
                let item_id = ctx.container.queue_mut(&self.name).offer(self.item.clone());
                state.item_id = Some(item_id);
                state.new_value = Some(self.item.clone());
                state.changed = true;
                state.result = OpValue::Bool(true);
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                ctx.publish(
                    EventKind::Added,
                    ContainerKind::Queue,
                    &self.name,
                    None,
                    None,
                    state.new_value.clone(),
                );
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn backup_operation(&self, state: &State) -> Option<BackupOperation> {
        let item_id = state.item_id?;
        Some(QueueOfferBackup::new(&self.name, item_id, self.item.clone()).into())
    }
}

impl IdentifiedDataSerializable for QueueOffer {
    fn factory_id(&self) -> i32 {
        QUEUE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        OFFER
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.item);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.item = input.read_data()?;
        Ok(())
    }
}

/// Removes and returns the head item, or null when empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuePoll {
    pub name: String,
}

impl QueuePoll {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl PartitionOperation for QueuePoll {
    fn name(&self) -> &'static str {
        "queue.poll"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Queue
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        name_key(&self.name)
    }

    fn initial_step(&self) -> Step {
        Step::Apply
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Apply => {
                let polled = ctx
                    .container
                    .existing_queue_mut(&self.name)
                    .and_then(|queue| queue.poll());
                let Some(item) = polled else {
                    state.result = OpValue::Null;
                    return Ok(Transition::Complete);
                };
                state.item_id = Some(item.item_id);
                state.old_value = Some(item.data.clone());
                state.changed = true;
                state.result = OpValue::Data(item.data);
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                ctx.publish(
                    EventKind::Removed,
                    ContainerKind::Queue,
                    &self.name,
                    None,
                    state.old_value.clone(),
                    None,
                );
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn backup_operation(&self, state: &State) -> Option<BackupOperation> {
        let item_id = state.item_id?;
        Some(QueuePollBackup::new(&self.name, item_id).into())
    }
}

impl IdentifiedDataSerializable for QueuePoll {
    fn factory_id(&self) -> i32 {
        QUEUE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        POLL
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuePeek {
    pub name: String,
}

impl QueuePeek {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl PartitionOperation for QueuePeek {
    fn name(&self) -> &'static str {
        "queue.peek"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Queue
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        name_key(&self.name)
    }

    fn is_readonly(&self) -> bool {
        true
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Read => {
                let head = ctx
                    .container
                    .queue(&self.name)
                    .and_then(|queue| queue.peek())
                    .map(|item| item.data.clone());
                state.result = OpValue::from_option(head);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for QueuePeek {
    fn factory_id(&self) -> i32 {
        QUEUE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        PEEK
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSize {
    pub name: String,
}

impl QueueSize {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl PartitionOperation for QueueSize {
    fn name(&self) -> &'static str {
        "queue.size"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Queue
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        name_key(&self.name)
    }

    fn is_readonly(&self) -> bool {
        true
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Read => {
                let size = ctx.container.queue(&self.name).map_or(0, |q| q.size());
                state.result = OpValue::Long(size as i64);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for QueueSize {
    fn factory_id(&self) -> i32 {
        QUEUE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        SIZE
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        Ok(())
    }
}

// ============================================================
// BACKUPS
// ============================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueOfferBackup {
    pub name: String,
    pub item_id: i64,
    pub item: Data,
}

impl QueueOfferBackup {
    pub fn new(name: &str, item_id: i64, item: Data) -> Self {
        Self {
            name: name.to_string(),
            item_id,
            item,
        }
    }
}

impl BackupBehavior for QueueOfferBackup {
    fn name(&self) -> &'static str {
        "queue.offer_backup"
    }

    fn apply(&self, container: &mut PartitionContainer, _config: &EngineConfig) -> GridResult<()> {
        container
            .queue_mut(&self.name)
            .offer_with_id(self.item_id, self.item.clone());
        Ok(())
    }
}

impl IdentifiedDataSerializable for QueueOfferBackup {
    fn factory_id(&self) -> i32 {
        QUEUE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        OFFER_BACKUP
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_i64(self.item_id);
        out.write_data(&self.item);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.item_id = input.read_i64()?;
        self.item = input.read_data()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueuePollBackup {
    pub name: String,
    pub item_id: i64,
}

impl QueuePollBackup {
    pub fn new(name: &str, item_id: i64) -> Self {
        Self {
            name: name.to_string(),
            item_id,
        }
    }
}

impl BackupBehavior for QueuePollBackup {
    fn name(&self) -> &'static str {
        "queue.poll_backup"
    }

    fn apply(&self, container: &mut PartitionContainer, _config: &EngineConfig) -> GridResult<()> {
        let removed = container
            .existing_queue_mut(&self.name)
            .and_then(|queue| queue.remove_item(self.item_id));
        if removed.is_none() {
            tracing::debug!(
                "Queue '{}' backup has no item {} to poll",
                self.name,
                self.item_id
            );
        }
        Ok(())
    }
}

impl IdentifiedDataSerializable for QueuePollBackup {
    fn factory_id(&self) -> i32 {
        QUEUE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        POLL_BACKUP
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_i64(self.item_id);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.item_id = input.read_i64()?;
        Ok(())
    }
}
