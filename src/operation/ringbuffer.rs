//! Ring buffer operations.

use super::types::{ContainerKind, OpValue, PartitionKey};
use super::{
    BackupBehavior, BackupOperation, Operation, PartitionOperation, RINGBUFFER_FACTORY_ID,
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

pub const ADD: i32 = 1;
pub const READ_ONE: i32 = 2;
pub const TAIL_SEQUENCE: i32 = 3;

pub const ADD_BACKUP: i32 = 101;

pub fn operation_builders() -> BuilderMap<Operation> {
    let mut builders: BuilderMap<Operation> = BuilderMap::new();
    builders.insert(ADD, || Operation::RingbufferAdd(RingbufferAdd::default()));
    builders.insert(READ_ONE, || {
        Operation::RingbufferReadOne(RingbufferReadOne::default())
    });
    builders.insert(TAIL_SEQUENCE, || {
        Operation::RingbufferTailSequence(RingbufferTailSequence::default())
    });
    builders
}

pub fn backup_builders() -> BuilderMap<BackupOperation> {
    let mut builders: BuilderMap<BackupOperation> = BuilderMap::new();
    builders.insert(ADD_BACKUP, || {
        BackupOperation::RingbufferAddBackup(RingbufferAddBackup::default())
    });
    builders
}

/// Appends an item, overwriting the oldest at capacity. Returns the new item's sequence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingbufferAdd {
    pub name: String,
    pub item: Data,
}

impl RingbufferAdd {
    pub fn new(name: &str, item: Data) -> Self {
        Self {
            name: name.to_string(),
            item,
        }
    }
}

impl PartitionOperation for RingbufferAdd {
    fn name(&self) -> &'static str {
        "ringbuffer.add"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Ringbuffer
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(Data::from(self.name.as_str()))
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
                let capacity = ctx.config.ringbuffer_config(&self.name).capacity;
                let sequence = ctx
                    .container
                    .ringbuffer_mut(&self.name, capacity)
                    .add(self.item.clone());
                state.item_id = Some(sequence);
                state.new_value = Some(self.item.clone());
                state.changed = true;
                state.result = OpValue::Long(sequence);
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                ctx.publish(
                    EventKind::Added,
                    ContainerKind::Ringbuffer,
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
        let sequence = state.item_id?;
        Some(RingbufferAddBackup::new(&self.name, sequence, self.item.clone()).into())
    }
}

impl IdentifiedDataSerializable for RingbufferAdd {
    fn factory_id(&self) -> i32 {
        RINGBUFFER_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        ADD
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

/// Reads the item at `sequence`; null when reading one past the tail.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingbufferReadOne {
    pub name: String,
    pub sequence: i64,
}

impl RingbufferReadOne {
    pub fn new(name: &str, sequence: i64) -> Self {
        Self {
            name: name.to_string(),
            sequence,
        }
    }
}

impl PartitionOperation for RingbufferReadOne {
    fn name(&self) -> &'static str {
        "ringbuffer.read_one"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Ringbuffer
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(Data::from(self.name.as_str()))
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
                let item = match ctx.container.ringbuffer(&self.name) {
                    Some(ring) => ring.read_one(self.sequence)?,
                    None => None,
                };
                state.result = OpValue::from_option(item);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for RingbufferReadOne {
    fn factory_id(&self) -> i32 {
        RINGBUFFER_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        READ_ONE
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_i64(self.sequence);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.sequence = input.read_i64()?;
        Ok(())
    }
}

/// Sequence of the newest item; -1 for a ring that never received one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingbufferTailSequence {
    pub name: String,
}

impl RingbufferTailSequence {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl PartitionOperation for RingbufferTailSequence {
    fn name(&self) -> &'static str {
        "ringbuffer.tail_sequence"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Ringbuffer
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(Data::from(self.name.as_str()))
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
                let tail = ctx
                    .container
                    .ringbuffer(&self.name)
                    .map_or(-1, |ring| ring.tail_sequence());
                state.result = OpValue::Long(tail);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for RingbufferTailSequence {
    fn factory_id(&self) -> i32 {
        RINGBUFFER_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        TAIL_SEQUENCE
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
pub struct RingbufferAddBackup {
    pub name: String,
    pub sequence: i64,
    pub item: Data,
}

impl RingbufferAddBackup {
    pub fn new(name: &str, sequence: i64, item: Data) -> Self {
        Self {
            name: name.to_string(),
            sequence,
            item,
        }
    }
}

impl BackupBehavior for RingbufferAddBackup {
    fn name(&self) -> &'static str {
        "ringbuffer.add_backup"
    }

    fn apply(&self, container: &mut PartitionContainer, config: &EngineConfig) -> GridResult<()> {
        let capacity = config.ringbuffer_config(&self.name).capacity;
        container
            .ringbuffer_mut(&self.name, capacity)
            .add_at(self.sequence, self.item.clone());
        Ok(())
    }
}

impl IdentifiedDataSerializable for RingbufferAddBackup {
    fn factory_id(&self) -> i32 {
        RINGBUFFER_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        ADD_BACKUP
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_i64(self.sequence);
        out.write_data(&self.item);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.sequence = input.read_i64()?;
        self.item = input.read_data()?;
        Ok(())
    }
}
