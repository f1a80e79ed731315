//! Map operations.
//!
//! A map entry lives in the partition its key hashes to. Mutations publish an event and ship
//! `MapPutBackup`/`MapRemoveBackup` to the replicas; reads never back up.

use super::types::{ContainerKind, OpValue, PartitionKey};
use super::{
    BackupBehavior, BackupOperation, MAP_FACTORY_ID, Operation, PartitionOperation, unexpected_step,
};
use crate::config::EngineConfig;
use crate::container::PartitionContainer;
use crate::error::{GridError, GridResult};
use crate::events::EventKind;
use crate::serialization::{
    BuilderMap, Data, IdentifiedDataSerializable, ObjectDataInput, ObjectDataOutput,
};
use crate::step::{PartitionContext, State, Step, Transition};

pub const PUT: i32 = 1;
pub const PUT_IF_ABSENT: i32 = 2;
pub const GET: i32 = 3;
pub const CONTAINS_KEY: i32 = 4;
pub const REMOVE: i32 = 5;
pub const REMOVE_IF: i32 = 6;
pub const SIZE: i32 = 7;

pub const PUT_BACKUP: i32 = 101;
pub const REMOVE_BACKUP: i32 = 102;

pub fn operation_builders() -> BuilderMap<Operation> {
    let mut builders: BuilderMap<Operation> = BuilderMap::new();
    builders.insert(PUT, || Operation::MapPut(MapPut::default()));
    builders.insert(PUT_IF_ABSENT, || {
        Operation::MapPutIfAbsent(MapPutIfAbsent::default())
    });
    builders.insert(GET, || Operation::MapGet(MapGet::default()));
    builders.insert(CONTAINS_KEY, || {
        Operation::MapContainsKey(MapContainsKey::default())
    });
    builders.insert(REMOVE, || Operation::MapRemove(MapRemove::default()));
    builders.insert(REMOVE_IF, || Operation::MapRemoveIf(MapRemoveIf::default()));
    builders.insert(SIZE, || Operation::MapSize(MapSize::default()));
    builders
}

pub fn backup_builders() -> BuilderMap<BackupOperation> {
    let mut builders: BuilderMap<BackupOperation> = BuilderMap::new();
    builders.insert(PUT_BACKUP, || {
        BackupOperation::MapPutBackup(MapPutBackup::default())
    });
    builders.insert(REMOVE_BACKUP, || {
        BackupOperation::MapRemoveBackup(MapRemoveBackup::default())
    });
    builders
}

fn current_value(ctx: &PartitionContext<'_>, name: &str, key: &Data) -> Option<Data> {
    ctx.container
        .map(name)
        .and_then(|store| store.get(key))
        .cloned()
}

// ============================================================
// PUT
// ============================================================

/// Stores `value` under `key`; returns the previous value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapPut {
    pub name: String,
    pub key: Data,
    pub value: Data,
}

impl MapPut {
    pub fn new(name: &str, key: Data, value: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
            value,
        }
    }
}

impl PartitionOperation for MapPut {
    fn name(&self) -> &'static str {
        "map.put"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(self.key.clone())
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
                let old = ctx
                    .container
                    .map_mut(&self.name)
                    .put(self.key.clone(), self.value.clone());
                state.changed = true;
                state.result = OpValue::from_option(old.clone());
                state.old_value = old;
                state.new_value = Some(self.value.clone());
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                let kind = if state.old_value.is_some() {
                    EventKind::Updated
                } else {
                    EventKind::Added
                };
                ctx.publish(
                    kind,
                    ContainerKind::Map,
                    &self.name,
                    Some(self.key.clone()),
                    state.old_value.clone(),
                    state.new_value.clone(),
                );
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn backup_operation(&self, _state: &State) -> Option<BackupOperation> {
        Some(MapPutBackup::new(&self.name, self.key.clone(), self.value.clone()).into())
    }
}

impl IdentifiedDataSerializable for MapPut {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        PUT
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
        out.write_data(&self.value);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        self.value = input.read_data()?;
        Ok(())
    }
}

// ============================================================
// PUT IF ABSENT
// ============================================================

/// Stores `value` only if `key` is unmapped. Returns the existing value, or null if stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapPutIfAbsent {
    pub name: String,
    pub key: Data,
    pub value: Data,
}

impl MapPutIfAbsent {
    pub fn new(name: &str, key: Data, value: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
            value,
        }
    }
}

impl PartitionOperation for MapPutIfAbsent {
    fn name(&self) -> &'static str {
        "map.put_if_absent"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(self.key.clone())
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Read => match current_value(ctx, &self.name, &self.key) {
                Some(existing) => {
                    state.result = OpValue::Data(existing);
                    Ok(Transition::Complete)
                }
                None => Ok(Transition::Next(Step::Apply)),
            },
            Step::Apply => {
                ctx.container
                    .map_mut(&self.name)
                    .put(self.key.clone(), self.value.clone());
                state.changed = true;
                state.new_value = Some(self.value.clone());
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                ctx.publish(
                    EventKind::Added,
                    ContainerKind::Map,
                    &self.name,
                    Some(self.key.clone()),
                    None,
                    state.new_value.clone(),
                );
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn backup_operation(&self, _state: &State) -> Option<BackupOperation> {
        Some(MapPutBackup::new(&self.name, self.key.clone(), self.value.clone()).into())
    }
}

impl IdentifiedDataSerializable for MapPutIfAbsent {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        PUT_IF_ABSENT
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
        out.write_data(&self.value);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        self.value = input.read_data()?;
        Ok(())
    }
}

// ============================================================
// GET / CONTAINS KEY
// ============================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapGet {
    pub name: String,
    pub key: Data,
}

impl MapGet {
    pub fn new(name: &str, key: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
        }
    }
}

impl PartitionOperation for MapGet {
    fn name(&self) -> &'static str {
        "map.get"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(self.key.clone())
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
                state.result = OpValue::from_option(current_value(ctx, &self.name, &self.key));
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for MapGet {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        GET
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapContainsKey {
    pub name: String,
    pub key: Data,
}

impl MapContainsKey {
    pub fn new(name: &str, key: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
        }
    }
}

impl PartitionOperation for MapContainsKey {
    fn name(&self) -> &'static str {
        "map.contains_key"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(self.key.clone())
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
                let found = ctx
                    .container
                    .map(&self.name)
                    .is_some_and(|store| store.contains_key(&self.key));
                state.result = OpValue::Bool(found);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for MapContainsKey {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        CONTAINS_KEY
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        Ok(())
    }
}

// ============================================================
// REMOVE
// ============================================================

/// Removes `key`; returns the removed value or null. Removing a missing key changes nothing
/// and therefore ships no backup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapRemove {
    pub name: String,
    pub key: Data,
}

impl MapRemove {
    pub fn new(name: &str, key: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
        }
    }
}

impl PartitionOperation for MapRemove {
    fn name(&self) -> &'static str {
        "map.remove"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(self.key.clone())
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Read => match current_value(ctx, &self.name, &self.key) {
                Some(existing) => {
                    state.old_value = Some(existing);
                    Ok(Transition::Next(Step::Apply))
                }
                None => {
                    state.result = OpValue::Null;
                    Ok(Transition::Complete)
                }
            },
            Step::Apply => {
                let removed = ctx
                    .container
                    .existing_map_mut(&self.name)
                    .and_then(|store| store.remove(&self.key));
                state.changed = removed.is_some();
                state.result = OpValue::from_option(removed);
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                ctx.publish(
                    EventKind::Removed,
                    ContainerKind::Map,
                    &self.name,
                    Some(self.key.clone()),
                    state.old_value.clone(),
                    None,
                );
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn backup_operation(&self, _state: &State) -> Option<BackupOperation> {
        Some(MapRemoveBackup::new(&self.name, self.key.clone()).into())
    }
}

impl IdentifiedDataSerializable for MapRemove {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        REMOVE
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        Ok(())
    }
}

// ============================================================
// REMOVE IF
// ============================================================

/// Condition on the current value of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePredicate {
    Equals(Data),
    /// The serialized value starts with these bytes.
    Prefix(Data),
}

const PREDICATE_EQUALS: u8 = 0;
const PREDICATE_PREFIX: u8 = 1;

impl ValuePredicate {
    pub fn matches(&self, value: &Data) -> bool {
        match self {
            ValuePredicate::Equals(expected) => expected == value,
            ValuePredicate::Prefix(prefix) => value.as_bytes().starts_with(prefix.as_bytes()),
        }
    }

    fn write(&self, out: &mut ObjectDataOutput) {
        match self {
            ValuePredicate::Equals(data) => {
                out.write_u8(PREDICATE_EQUALS);
                out.write_data(data);
            }
            ValuePredicate::Prefix(data) => {
                out.write_u8(PREDICATE_PREFIX);
                out.write_data(data);
            }
        }
    }

    fn read(input: &mut ObjectDataInput) -> GridResult<Self> {
        match input.read_u8()? {
            PREDICATE_EQUALS => Ok(ValuePredicate::Equals(input.read_data()?)),
            PREDICATE_PREFIX => Ok(ValuePredicate::Prefix(input.read_data()?)),
            other => Err(GridError::Serialization(format!(
                "unknown predicate tag {}",
                other
            ))),
        }
    }
}

impl Default for ValuePredicate {
    fn default() -> Self {
        ValuePredicate::Equals(Data::default())
    }
}

/// Removes `key` if its value satisfies `predicate`; returns whether it removed.
///
/// The predicate runs on the blocking pool while the partition stays reserved, then
/// execution resumes at `EvaluatePredicate`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapRemoveIf {
    pub name: String,
    pub key: Data,
    pub predicate: ValuePredicate,
}

impl MapRemoveIf {
    pub fn new(name: &str, key: Data, predicate: ValuePredicate) -> Self {
        Self {
            name: name.to_string(),
            key,
            predicate,
        }
    }
}

impl PartitionOperation for MapRemoveIf {
    fn name(&self) -> &'static str {
        "map.remove_if"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Key(self.key.clone())
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::Read => {
                let Some(existing) = current_value(ctx, &self.name, &self.key) else {
                    state.result = OpValue::Bool(false);
                    return Ok(Transition::Complete);
                };
                state.old_value = Some(existing.clone());
                let predicate = self.predicate.clone();
                Ok(Transition::Offload {
                    work: Box::new(move || Ok(OpValue::Bool(predicate.matches(&existing)))),
                    resume_at: Step::EvaluatePredicate,
                })
            }
            Step::EvaluatePredicate => match state.offload_result.take() {
                Some(OpValue::Bool(true)) => Ok(Transition::Next(Step::Apply)),
                Some(OpValue::Bool(false)) => {
                    state.result = OpValue::Bool(false);
                    Ok(Transition::Complete)
                }
                other => Err(GridError::Operation(format!(
                    "predicate produced {:?}",
                    other
                ))),
            },
            Step::Apply => {
                let removed = ctx
                    .container
                    .existing_map_mut(&self.name)
                    .and_then(|store| store.remove(&self.key));
                state.changed = removed.is_some();
                state.result = OpValue::Bool(state.changed);
                Ok(Transition::Next(Step::PublishEvent))
            }
            Step::PublishEvent => {
                ctx.publish(
                    EventKind::Removed,
                    ContainerKind::Map,
                    &self.name,
                    Some(self.key.clone()),
                    state.old_value.clone(),
                    None,
                );
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn backup_operation(&self, _state: &State) -> Option<BackupOperation> {
        Some(MapRemoveBackup::new(&self.name, self.key.clone()).into())
    }
}

impl IdentifiedDataSerializable for MapRemoveIf {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        REMOVE_IF
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
        self.predicate.write(out);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        self.predicate = ValuePredicate::read(input)?;
        Ok(())
    }
}

// ============================================================
// SIZE
// ============================================================

/// Entry count of the map within one partition. Callers sum over all partitions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSize {
    pub name: String,
    pub partition_id: u32,
}

impl MapSize {
    pub fn new(name: &str, partition_id: u32) -> Self {
        Self {
            name: name.to_string(),
            partition_id,
        }
    }
}

impl PartitionOperation for MapSize {
    fn name(&self) -> &'static str {
        "map.size"
    }

    fn container_kind(&self) -> ContainerKind {
        ContainerKind::Map
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        PartitionKey::Partition(self.partition_id)
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
                let size = ctx.container.map(&self.name).map_or(0, |store| store.size());
                state.result = OpValue::Long(size as i64);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }
}

impl IdentifiedDataSerializable for MapSize {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        SIZE
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_u32(self.partition_id);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.partition_id = input.read_u32()?;
        Ok(())
    }
}

// ============================================================
// BACKUPS
// ============================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapPutBackup {
    pub name: String,
    pub key: Data,
    pub value: Data,
}

impl MapPutBackup {
    pub fn new(name: &str, key: Data, value: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
            value,
        }
    }
}

impl BackupBehavior for MapPutBackup {
    fn name(&self) -> &'static str {
        "map.put_backup"
    }

    fn apply(&self, container: &mut PartitionContainer, _config: &EngineConfig) -> GridResult<()> {
        container
            .map_mut(&self.name)
            .put(self.key.clone(), self.value.clone());
        Ok(())
    }
}

impl IdentifiedDataSerializable for MapPutBackup {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        PUT_BACKUP
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
        out.write_data(&self.value);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        self.value = input.read_data()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapRemoveBackup {
    pub name: String,
    pub key: Data,
}

impl MapRemoveBackup {
    pub fn new(name: &str, key: Data) -> Self {
        Self {
            name: name.to_string(),
            key,
        }
    }
}

impl BackupBehavior for MapRemoveBackup {
    fn name(&self) -> &'static str {
        "map.remove_backup"
    }

    fn apply(&self, container: &mut PartitionContainer, _config: &EngineConfig) -> GridResult<()> {
        if let Some(store) = container.existing_map_mut(&self.name) {
            store.remove(&self.key);
        }
        Ok(())
    }
}

impl IdentifiedDataSerializable for MapRemoveBackup {
    fn factory_id(&self) -> i32 {
        MAP_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        REMOVE_BACKUP
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.name);
        out.write_data(&self.key);
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.name = input.read_string()?;
        self.key = input.read_data()?;
        Ok(())
    }
}
