use super::queue::QueueItem;
use crate::error::{GridError, GridResult};
use crate::operation::types::ContainerKind;
use crate::serialization::{Data, ObjectDataInput, ObjectDataOutput};

use bytes::Bytes;

/// Full content of one partition, shipped from the owner to a replica during anti-entropy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionSnapshot {
    pub partition_id: u32,
    /// `(kind, name, replica_version)`
    pub replica_versions: Vec<(ContainerKind, String, u64)>,
    pub maps: Vec<(String, Vec<(Data, Data)>)>,
    /// `(name, next_item_id, items)`
    pub queues: Vec<(String, i64, Vec<QueueItem>)>,
    /// `(name, capacity, head_sequence, items)`
    pub ringbuffers: Vec<(String, usize, i64, Vec<Data>)>,
}

impl PartitionSnapshot {
    pub fn to_bytes(&self) -> Bytes {
        let mut out = ObjectDataOutput::new();
        out.write_u32(self.partition_id);
        out.write_u32(self.replica_versions.len() as u32);
        for (kind, name, version) in &self.replica_versions {
            out.write_u8(kind.code());
            out.write_string(name);
            out.write_u64(*version);
        }

        out.write_u32(self.maps.len() as u32);
        for (name, entries) in &self.maps {
            out.write_string(name);
            out.write_u32(entries.len() as u32);
            for (key, value) in entries {
                out.write_data(key);
                out.write_data(value);
            }
        }

        out.write_u32(self.queues.len() as u32);
        for (name, next_item_id, items) in &self.queues {
            out.write_string(name);
            out.write_i64(*next_item_id);
            out.write_u32(items.len() as u32);
            for item in items {
                out.write_i64(item.item_id);
                out.write_data(&item.data);
            }
        }

        out.write_u32(self.ringbuffers.len() as u32);
        for (name, capacity, head, items) in &self.ringbuffers {
            out.write_string(name);
            out.write_u64(*capacity as u64);
            out.write_i64(*head);
            out.write_u32(items.len() as u32);
            for item in items {
                out.write_data(item);
            }
        }
        out.into_bytes()
    }

    pub fn from_bytes(bytes: Bytes) -> GridResult<Self> {
        let mut input = ObjectDataInput::new(bytes);
        let partition_id = input.read_u32()?;
        let mut replica_versions = Vec::new();
        for _ in 0..input.read_u32()? {
            let kind = ContainerKind::from_code(input.read_u8()?)?;
            let name = input.read_string()?;
            replica_versions.push((kind, name, input.read_u64()?));
        }

        let mut maps = Vec::new();
        for _ in 0..input.read_u32()? {
            let name = input.read_string()?;
            let mut entries = Vec::new();
            for _ in 0..input.read_u32()? {
                entries.push((input.read_data()?, input.read_data()?));
            }
            maps.push((name, entries));
        }

        let mut queues = Vec::new();
        for _ in 0..input.read_u32()? {
            let name = input.read_string()?;
            let next_item_id = input.read_i64()?;
            let mut items = Vec::new();
            for _ in 0..input.read_u32()? {
                items.push(QueueItem {
                    item_id: input.read_i64()?,
                    data: input.read_data()?,
                });
            }
            queues.push((name, next_item_id, items));
        }

        let mut ringbuffers = Vec::new();
        for _ in 0..input.read_u32()? {
            let name = input.read_string()?;
            let capacity = input.read_u64()? as usize;
            let head = input.read_i64()?;
            let mut items = Vec::new();
            for _ in 0..input.read_u32()? {
                items.push(input.read_data()?);
            }
            ringbuffers.push((name, capacity, head, items));
        }

        if input.remaining() > 0 {
            return Err(GridError::Serialization(format!(
                "{} trailing bytes after partition snapshot",
                input.remaining()
            )));
        }

        Ok(Self {
            partition_id,
            replica_versions,
            maps,
            queues,
            ringbuffers,
        })
    }
}
