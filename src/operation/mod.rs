//! Operation Module
//!
//! Every request the engine executes is an [`Operation`]: a closed enum with one variant per
//! operation kind, each identified on the wire by `(factory_id, type_id)`. The data-structure
//! modules (`map`, `queue`, `ringbuffer`) and the engine-level `maintenance`/`generic` modules
//! each own a factory id and contribute a builder map to the [`OperationRegistry`].
//!
//! ## Contract
//! - **Partition operations** implement [`PartitionOperation`]: they run as a sequence of
//!   steps on the lane of the partition their key hashes to, and decide after running
//!   whether a backup is needed and what it looks like.
//! - **Generic operations** implement [`GenericOperation`] and run without partition
//!   affinity on the bounded generic pool.
//! - **Backups** are a separate enum, [`BackupOperation`]. They reapply an already decided
//!   effect on a replica and have no way to produce further backups.

pub mod generic;
pub mod maintenance;
pub mod map;
pub mod queue;
pub mod ringbuffer;
pub mod types;

use crate::config::EngineConfig;
use crate::container::PartitionContainer;
use crate::error::GridResult;
use crate::serialization::{
    IdentifiedDataSerializable, ObjectDataInput, ObjectDataOutput, TypeRegistry,
};
use crate::step::{PartitionContext, State, Step, Transition};

use bytes::Bytes;
use std::fmt;
use types::{ContainerKind, OpValue, PartitionKey};

pub use generic::{GenericContext, TableVersion};
pub use maintenance::EvictionCheck;
pub use map::{
    MapContainsKey, MapGet, MapPut, MapPutBackup, MapPutIfAbsent, MapRemove, MapRemoveBackup,
    MapRemoveIf, MapSize, ValuePredicate,
};
pub use queue::{QueueOffer, QueueOfferBackup, QueuePeek, QueuePoll, QueuePollBackup, QueueSize};
pub use ringbuffer::{RingbufferAdd, RingbufferAddBackup, RingbufferReadOne, RingbufferTailSequence};

pub const MAP_FACTORY_ID: i32 = 1;
pub const QUEUE_FACTORY_ID: i32 = 2;
pub const RINGBUFFER_FACTORY_ID: i32 = 3;
pub const ENGINE_FACTORY_ID: i32 = 4;

/// An operation bound to the partition of its key.
pub trait PartitionOperation: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn container_kind(&self) -> ContainerKind;

    fn container_name(&self) -> &str;

    fn partition_key(&self) -> PartitionKey;

    fn is_readonly(&self) -> bool {
        false
    }

    fn initial_step(&self) -> Step {
        Step::Read
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition>;

    /// Decided after the steps ran. Never true when nothing changed.
    fn should_backup(&self, state: &State) -> bool {
        !self.is_readonly() && state.changed
    }

    fn backup_operation(&self, _state: &State) -> Option<BackupOperation> {
        None
    }

    fn sync_backup_count(&self, config: &EngineConfig) -> usize {
        backup_counts(config, self.container_kind(), self.container_name()).0
    }

    fn async_backup_count(&self, config: &EngineConfig) -> usize {
        backup_counts(config, self.container_kind(), self.container_name()).1
    }
}

/// A partition-independent operation.
pub trait GenericOperation: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn run(&self, ctx: &GenericContext<'_>) -> GridResult<OpValue>;
}

/// Replica-side reapplication of a decided effect.
pub trait BackupBehavior: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn apply(&self, container: &mut PartitionContainer, config: &EngineConfig) -> GridResult<()>;
}

/// `(sync, async)` backup counts configured for a named container.
pub fn backup_counts(config: &EngineConfig, kind: ContainerKind, name: &str) -> (usize, usize) {
    match kind {
        ContainerKind::Map => {
            let c = config.map_config(name);
            (c.backup_count, c.async_backup_count)
        }
        ContainerKind::Queue => {
            let c = config.queue_config(name);
            (c.backup_count, c.async_backup_count)
        }
        ContainerKind::Ringbuffer => {
            let c = config.ringbuffer_config(name);
            (c.backup_count, c.async_backup_count)
        }
    }
}

pub(crate) fn unexpected_step(operation: &str, step: Step) -> crate::error::GridError {
    crate::error::GridError::Operation(format!("{} has no step {:?}", operation, step))
}

/// Declares a closed enum over concrete operation structs and forwards the wire identity to
/// the wrapped value.
macro_rules! operation_enum {
    ($(#[$meta:meta])* $enum_name:ident { $($variant:ident($ty:ty)),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub enum $enum_name {
            $($variant($ty)),*
        }

        $(
            impl From<$ty> for $enum_name {
                fn from(op: $ty) -> Self {
                    $enum_name::$variant(op)
                }
            }
        )*

        impl IdentifiedDataSerializable for $enum_name {
            fn factory_id(&self) -> i32 {
                match self {
                    $($enum_name::$variant(op) => op.factory_id()),*
                }
            }

            fn type_id(&self) -> i32 {
                match self {
                    $($enum_name::$variant(op) => op.type_id()),*
                }
            }

            fn write_data(&self, out: &mut ObjectDataOutput) {
                match self {
                    $($enum_name::$variant(op) => op.write_data(out)),*
                }
            }

            fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
                match self {
                    $($enum_name::$variant(op) => op.read_data(input)),*
                }
            }
        }
    };
}

operation_enum! {
    /// Every operation the engine can execute.
    Operation {
        MapPut(MapPut),
        MapPutIfAbsent(MapPutIfAbsent),
        MapGet(MapGet),
        MapContainsKey(MapContainsKey),
        MapRemove(MapRemove),
        MapRemoveIf(MapRemoveIf),
        MapSize(MapSize),
        QueueOffer(QueueOffer),
        QueuePoll(QueuePoll),
        QueuePeek(QueuePeek),
        QueueSize(QueueSize),
        RingbufferAdd(RingbufferAdd),
        RingbufferReadOne(RingbufferReadOne),
        RingbufferTailSequence(RingbufferTailSequence),
        EvictionCheck(EvictionCheck),
        TableVersion(TableVersion),
    }
}

operation_enum! {
    /// Effects shipped from a primary to its replicas.
    BackupOperation {
        MapPutBackup(MapPutBackup),
        MapRemoveBackup(MapRemoveBackup),
        QueueOfferBackup(QueueOfferBackup),
        QueuePollBackup(QueuePollBackup),
        RingbufferAddBackup(RingbufferAddBackup),
    }
}

/// How an operation is scheduled.
pub enum Target<'a> {
    Partition(&'a dyn PartitionOperation),
    Generic(&'a dyn GenericOperation),
}

impl Operation {
    pub fn target(&self) -> Target<'_> {
        match self {
            Operation::MapPut(op) => Target::Partition(op),
            Operation::MapPutIfAbsent(op) => Target::Partition(op),
            Operation::MapGet(op) => Target::Partition(op),
            Operation::MapContainsKey(op) => Target::Partition(op),
            Operation::MapRemove(op) => Target::Partition(op),
            Operation::MapRemoveIf(op) => Target::Partition(op),
            Operation::MapSize(op) => Target::Partition(op),
            Operation::QueueOffer(op) => Target::Partition(op),
            Operation::QueuePoll(op) => Target::Partition(op),
            Operation::QueuePeek(op) => Target::Partition(op),
            Operation::QueueSize(op) => Target::Partition(op),
            Operation::RingbufferAdd(op) => Target::Partition(op),
            Operation::RingbufferReadOne(op) => Target::Partition(op),
            Operation::RingbufferTailSequence(op) => Target::Partition(op),
            Operation::EvictionCheck(op) => Target::Partition(op),
            Operation::TableVersion(op) => Target::Generic(op),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.target() {
            Target::Partition(op) => op.name(),
            Target::Generic(op) => op.name(),
        }
    }

    pub fn is_readonly(&self) -> bool {
        match self.target() {
            Target::Partition(op) => op.is_readonly(),
            Target::Generic(_) => true,
        }
    }
}

impl BackupOperation {
    pub fn behavior(&self) -> &dyn BackupBehavior {
        match self {
            BackupOperation::MapPutBackup(op) => op,
            BackupOperation::MapRemoveBackup(op) => op,
            BackupOperation::QueueOfferBackup(op) => op,
            BackupOperation::QueuePollBackup(op) => op,
            BackupOperation::RingbufferAddBackup(op) => op,
        }
    }

    pub fn apply(&self, container: &mut PartitionContainer, config: &EngineConfig) -> GridResult<()> {
        self.behavior().apply(container, config)
    }
}

/// The registration tables for operations and backups, assembled at startup.
pub struct OperationRegistry {
    operations: TypeRegistry<Operation>,
    backups: TypeRegistry<BackupOperation>,
}

impl OperationRegistry {
    pub fn new(
        operations: TypeRegistry<Operation>,
        backups: TypeRegistry<BackupOperation>,
    ) -> Self {
        Self {
            operations,
            backups,
        }
    }

    /// Registers every built-in factory.
    pub fn standard() -> GridResult<Self> {
        let mut operations = TypeRegistry::new();
        operations.register(MAP_FACTORY_ID, map::operation_builders())?;
        operations.register(QUEUE_FACTORY_ID, queue::operation_builders())?;
        operations.register(RINGBUFFER_FACTORY_ID, ringbuffer::operation_builders())?;
        operations.register(ENGINE_FACTORY_ID, engine_builders())?;

        let mut backups = TypeRegistry::new();
        backups.register(MAP_FACTORY_ID, map::backup_builders())?;
        backups.register(QUEUE_FACTORY_ID, queue::backup_builders())?;
        backups.register(RINGBUFFER_FACTORY_ID, ringbuffer::backup_builders())?;

        tracing::debug!(
            "Operation registry ready: {} operation types, {} backup types",
            operations.type_count(),
            backups.type_count()
        );
        Ok(Self::new(operations, backups))
    }

    pub fn operations(&self) -> &TypeRegistry<Operation> {
        &self.operations
    }

    pub fn backups(&self) -> &TypeRegistry<BackupOperation> {
        &self.backups
    }

    pub fn write_operation(&self, out: &mut ObjectDataOutput, op: &Operation) {
        self.operations.write_object(out, op);
    }

    pub fn read_operation(&self, input: &mut ObjectDataInput) -> GridResult<Operation> {
        self.operations.read_object(input)
    }

    pub fn write_backup(&self, out: &mut ObjectDataOutput, op: &BackupOperation) {
        self.backups.write_object(out, op);
    }

    pub fn read_backup(&self, input: &mut ObjectDataInput) -> GridResult<BackupOperation> {
        self.backups.read_object(input)
    }

    pub fn operation_to_bytes(&self, op: &Operation) -> Bytes {
        self.operations.to_bytes(op)
    }
}

fn engine_builders() -> crate::serialization::BuilderMap<Operation> {
    let mut builders = maintenance::operation_builders();
    builders.extend(generic::operation_builders());
    builders
}
