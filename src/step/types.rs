use crate::error::GridResult;
use crate::operation::types::OpValue;
use crate::serialization::Data;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// Load the current value or container state.
    Read,
    /// Consume the result of an offloaded predicate.
    EvaluatePredicate,
    /// Mutate the container.
    Apply,
    /// Notify local listeners of the change.
    PublishEvent,
    /// Maintenance: decide whether the container may be destroyed.
    CheckEviction,
    /// Maintenance: hand the container to the lifecycle collaborator.
    Destroy,
}

/// Scratch record threaded through the steps of one operation.
#[derive(Debug, Clone, Default)]
pub struct State {
    pub partition_id: u32,
    pub old_value: Option<Data>,
    pub new_value: Option<Data>,
    /// Whether any step mutated partition state. Drives the backup decision.
    pub changed: bool,
    /// Value handed back to the caller.
    pub result: OpValue,
    /// Output of the last offloaded computation.
    pub offload_result: Option<OpValue>,
    /// Queue item id or ring buffer sequence decided by the primary.
    pub item_id: Option<i64>,
    pub trace: Vec<Step>,
}

impl State {
    pub fn new(partition_id: u32) -> Self {
        Self {
            partition_id,
            ..Default::default()
        }
    }
}

pub type OffloadedWork = Box<dyn FnOnce() -> GridResult<OpValue> + Send + 'static>;

pub enum Transition {
    Next(Step),
    /// Run `work` off the async runtime, then continue at `resume_at`.
    Offload {
        work: OffloadedWork,
        resume_at: Step,
    },
    Complete,
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Next(step) => write!(f, "Next({:?})", step),
            Transition::Offload { resume_at, .. } => write!(f, "Offload(resume_at={:?})", resume_at),
            Transition::Complete => f.write_str("Complete"),
        }
    }
}
