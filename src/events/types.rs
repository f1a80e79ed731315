use crate::operation::types::ContainerKind;
use crate::serialization::Data;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Added,
    Updated,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerEvent {
    pub kind: EventKind,
    pub container: ContainerKind,
    pub name: String,
    pub partition_id: u32,
    /// Map key; `None` for queue and ring buffer events.
    pub key: Option<Data>,
    pub old_value: Option<Data>,
    pub new_value: Option<Data>,
}
