use crate::error::{GridError, GridResult};
use crate::operation::types::{CallerId, ContainerKind, OpValue};
use crate::operation::{BackupOperation, OperationRegistry};
use crate::serialization::{ObjectDataInput, ObjectDataOutput};

use bytes::Bytes;

pub const ENDPOINT_BACKUP: &str = "/internal/backup";

/// A backup shipped from a partition owner to one replica.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRequest {
    /// Caller of the operation that produced this backup; replicas memoize the result under it
    /// so a retry after promotion does not apply the operation twice.
    pub caller: CallerId,
    pub partition_id: u32,
    /// Structure the backup belongs to; `replica_version` counts backups of this structure.
    pub container_kind: ContainerKind,
    pub container_name: String,
    pub replica_version: u64,
    pub table_version: u64,
    /// Result the primary returned.
    pub value: OpValue,
    pub backup: BackupOperation,
}

impl BackupRequest {
    pub fn encode(&self, registry: &OperationRegistry) -> Bytes {
        let mut out = ObjectDataOutput::new();
        self.caller.write(&mut out);
        out.write_u32(self.partition_id);
        out.write_u8(self.container_kind.code());
        out.write_string(&self.container_name);
        out.write_u64(self.replica_version);
        out.write_u64(self.table_version);
        self.value.write(&mut out);
        registry.write_backup(&mut out, &self.backup);
        out.into_bytes()
    }

    pub fn decode(bytes: Bytes, registry: &OperationRegistry) -> GridResult<Self> {
        let mut input = ObjectDataInput::new(bytes);
        let request = Self {
            caller: CallerId::read(&mut input)?,
            partition_id: input.read_u32()?,
            container_kind: ContainerKind::from_code(input.read_u8()?)?,
            container_name: input.read_string()?,
            replica_version: input.read_u64()?,
            table_version: input.read_u64()?,
            value: OpValue::read(&mut input)?,
            backup: registry.read_backup(&mut input)?,
        };
        if input.remaining() != 0 {
            return Err(GridError::Serialization(format!(
                "{} trailing byte(s) after backup request",
                input.remaining()
            )));
        }
        Ok(request)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupAck {
    pub partition_id: u32,
    pub replica_version: u64,
    /// False when the replica had already applied this version.
    pub applied: bool,
}

impl BackupAck {
    pub fn encode(&self) -> Bytes {
        let mut out = ObjectDataOutput::new();
        out.write_u32(self.partition_id);
        out.write_u64(self.replica_version);
        out.write_bool(self.applied);
        out.into_bytes()
    }

    pub fn decode(bytes: Bytes) -> GridResult<Self> {
        let mut input = ObjectDataInput::new(bytes);
        Ok(Self {
            partition_id: input.read_u32()?,
            replica_version: input.read_u64()?,
            applied: input.read_bool()?,
        })
    }
}

/// Replication outcome reported alongside a successful result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackupReport {
    pub sync_acknowledged: usize,
    pub async_dispatched: usize,
    /// Backups that may not have reached their replica.
    pub warnings: Vec<GridError>,
}

impl BackupReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn write(&self, out: &mut ObjectDataOutput) {
        out.write_u32(self.sync_acknowledged as u32);
        out.write_u32(self.async_dispatched as u32);
        out.write_u32(self.warnings.len() as u32);
        for warning in &self.warnings {
            out.write_error(warning);
        }
    }

    pub fn read(input: &mut ObjectDataInput) -> GridResult<Self> {
        let sync_acknowledged = input.read_u32()? as usize;
        let async_dispatched = input.read_u32()? as usize;
        let count = input.read_u32()?;
        let mut warnings = Vec::new();
        for _ in 0..count {
            warnings.push(input.read_error()?);
        }
        Ok(Self {
            sync_acknowledged,
            async_dispatched,
            warnings,
        })
    }
}
