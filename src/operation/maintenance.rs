//! Maintenance operations submitted by an external scheduler.

use super::types::{ContainerKind, OpValue, PartitionKey};
use super::{ENGINE_FACTORY_ID, Operation, PartitionOperation, unexpected_step};
use crate::error::{GridError, GridResult};
use crate::serialization::{
    BuilderMap, Data, IdentifiedDataSerializable, ObjectDataInput, ObjectDataOutput,
};
use crate::step::{PartitionContext, State, Step, Transition};

use std::time::Duration;

pub const EVICTION_CHECK: i32 = 1;

pub fn operation_builders() -> BuilderMap<Operation> {
    let mut builders: BuilderMap<Operation> = BuilderMap::new();
    builders.insert(EVICTION_CHECK, || {
        Operation::EvictionCheck(EvictionCheck::default())
    });
    builders
}

/// Destroys a structure that is empty, has been idle past its empty TTL (queues only), and
/// has no listeners. Returns whether it destroyed.
///
/// Queues and ring buffers live whole in the partition of their name. A map is spread over
/// every partition, so its check names the partition whose record store it looks at (see
/// [`EvictionCheck::on_partition`]); the scheduler submits one per partition.
///
/// Runs on the owner only and never backs up; replicas are cleaned up by the lifecycle
/// collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct EvictionCheck {
    pub kind: ContainerKind,
    pub name: String,
    pub partition_id: Option<u32>,
}

impl EvictionCheck {
    pub fn new(kind: ContainerKind, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            partition_id: None,
        }
    }

    pub fn on_partition(kind: ContainerKind, name: &str, partition_id: u32) -> Self {
        Self {
            partition_id: Some(partition_id),
            ..Self::new(kind, name)
        }
    }

    fn is_evictable(&self, ctx: &PartitionContext<'_>) -> GridResult<bool> {
        let empty = match self.kind {
            ContainerKind::Queue => match ctx.container.queue(&self.name) {
                Some(queue) => {
                    let ttl = Duration::from_millis(ctx.config.queue_config(&self.name).empty_ttl_ms);
                    queue.is_empty() && queue.idle_for() >= ttl
                }
                None => return Ok(false),
            },
            ContainerKind::Ringbuffer => match ctx.container.ringbuffer(&self.name) {
                Some(ring) => ring.is_empty(),
                None => return Ok(false),
            },
            ContainerKind::Map => {
                if self.partition_id.is_none() {
                    return Err(GridError::Operation(
                        "map eviction checks need a partition".to_string(),
                    ));
                }
                match ctx.container.map(&self.name) {
                    Some(store) => store.is_empty(),
                    None => return Ok(false),
                }
            }
        };
        Ok(empty && !ctx.events.has_listeners(self.kind, &self.name))
    }
}

impl Default for EvictionCheck {
    fn default() -> Self {
        Self::new(ContainerKind::Queue, "")
    }
}

impl PartitionOperation for EvictionCheck {
    fn name(&self) -> &'static str {
        "maintenance.eviction_check"
    }

    fn container_kind(&self) -> ContainerKind {
        self.kind
    }

    fn container_name(&self) -> &str {
        &self.name
    }

    fn partition_key(&self) -> PartitionKey {
        match self.partition_id {
            Some(partition) => PartitionKey::Partition(partition),
            None => PartitionKey::Key(Data::from(self.name.as_str())),
        }
    }

    fn initial_step(&self) -> Step {
        Step::CheckEviction
    }

    fn run_step(
        &self,
        step: Step,
        state: &mut State,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<Transition> {
        match step {
            Step::CheckEviction => {
                if self.is_evictable(ctx)? {
                    Ok(Transition::Next(Step::Destroy))
                } else {
                    state.result = OpValue::Bool(false);
                    Ok(Transition::Complete)
                }
            }
            Step::Destroy => {
                let destroyed = ctx.container.destroy(self.kind, &self.name);
                if destroyed {
                    tracing::info!(
                        "Evicted empty {} '{}' on partition {}",
                        self.kind,
                        self.name,
                        ctx.partition_id
                    );
                    ctx.lifecycle
                        .destroy_container(ctx.partition_id, self.kind, &self.name);
                }
                state.changed = destroyed;
                state.result = OpValue::Bool(destroyed);
                Ok(Transition::Complete)
            }
            other => Err(unexpected_step(self.name(), other)),
        }
    }

    fn should_backup(&self, _state: &State) -> bool {
        false
    }
}

impl IdentifiedDataSerializable for EvictionCheck {
    fn factory_id(&self) -> i32 {
        ENGINE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        EVICTION_CHECK
    }

    fn write_data(&self, out: &mut ObjectDataOutput) {
        out.write_u8(self.kind.code());
        out.write_string(&self.name);
        match self.partition_id {
            Some(partition) => {
                out.write_bool(true);
                out.write_u32(partition);
            }
            None => out.write_bool(false),
        }
    }

    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()> {
        self.kind = ContainerKind::from_code(input.read_u8()?)?;
        self.name = input.read_string()?;
        self.partition_id = match input.read_bool()? {
            true => Some(input.read_u32()?),
            false => None,
        };
        Ok(())
    }
}
