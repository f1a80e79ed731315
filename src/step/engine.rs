use super::types::{State, Transition};
use crate::config::EngineConfig;
use crate::container::PartitionContainer;
use crate::error::{GridError, GridResult};
use crate::events::{ContainerEvent, EventKind, EventService};
use crate::node::lifecycle::LifecycleHook;
use crate::operation::PartitionOperation;
use crate::operation::types::{ContainerKind, MemberId};
use crate::serialization::Data;

/// Upper bound on visited steps; a cycle in an operation's transitions is a bug.
const MAX_STEPS: usize = 64;

/// What a step may touch. The container reference comes from the lane guard, so building a
/// context requires holding the partition.
pub struct PartitionContext<'a> {
    pub partition_id: u32,
    pub member: &'a MemberId,
    pub container: &'a mut PartitionContainer,
    pub events: &'a EventService,
    pub lifecycle: &'a dyn LifecycleHook,
    pub config: &'a EngineConfig,
}

impl PartitionContext<'_> {
    /// Publishes a change of `name` to this member's listeners.
    pub fn publish(
        &self,
        kind: EventKind,
        container: ContainerKind,
        name: &str,
        key: Option<Data>,
        old_value: Option<Data>,
        new_value: Option<Data>,
    ) {
        self.events.publish(ContainerEvent {
            kind,
            container,
            name: name.to_string(),
            partition_id: self.partition_id,
            key,
            old_value,
            new_value,
        });
    }
}

pub struct StepEngine;

impl StepEngine {
    pub async fn execute(
        operation: &dyn PartitionOperation,
        ctx: &mut PartitionContext<'_>,
    ) -> GridResult<State> {
        let mut state = State::new(ctx.partition_id);
        let mut step = operation.initial_step();

        for _ in 0..MAX_STEPS {
            state.trace.push(step);
            tracing::trace!(
                "{} on partition {}: step {:?}",
                operation.name(),
                ctx.partition_id,
                step
            );

            let transition = match operation.run_step(step, &mut state, ctx) {
                Ok(transition) => transition,
                Err(e) => {
                    tracing::debug!(
                        "{} aborted at {:?} on partition {}: {}",
                        operation.name(),
                        step,
                        ctx.partition_id,
                        e
                    );
                    return Err(e);
                }
            };

            match transition {
                Transition::Next(next) => step = next,
                Transition::Offload { work, resume_at } => {
                    let value = tokio::task::spawn_blocking(work)
                        .await
                        .map_err(|e| GridError::Operation(format!("offloaded step failed: {}", e)))??;
                    state.offload_result = Some(value);
                    step = resume_at;
                }
                Transition::Complete => return Ok(state),
            }
        }

        Err(GridError::Operation(format!(
            "{} exceeded {} steps",
            operation.name(),
            MAX_STEPS
        )))
    }
}
