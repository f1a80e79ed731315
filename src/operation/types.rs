use crate::error::{GridError, GridResult};
use crate::serialization::{Data, ObjectDataInput, ObjectDataOutput};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a cluster member.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MemberId(pub String);

impl MemberId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MemberId {
    fn from(value: &str) -> Self {
        MemberId(value.to_string())
    }
}

pub type CallId = u64;

/// Originating member plus the call id it assigned; the key for at-most-once memoization.
///
/// `incarnation` is drawn once per engine instance. A member restarted under the same id
/// starts its call ids over, and the incarnation keeps those calls apart from the old ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerId {
    pub member: MemberId,
    pub incarnation: u64,
    pub call_id: CallId,
}

impl CallerId {
    pub fn write(&self, out: &mut ObjectDataOutput) {
        out.write_string(&self.member.0);
        out.write_u64(self.incarnation);
        out.write_u64(self.call_id);
    }

    pub fn read(input: &mut ObjectDataInput) -> GridResult<Self> {
        Ok(Self {
            member: MemberId(input.read_string()?),
            incarnation: input.read_u64()?,
            call_id: input.read_u64()?,
        })
    }
}

/// Per-member monotonically increasing call ids. Zero is never handed out.
#[derive(Debug, Default)]
pub struct CallIdSequence {
    last: AtomicU64,
}

impl CallIdSequence {
    pub fn next(&self) -> CallId {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Kind of distributed object a container belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    Map,
    Queue,
    Ringbuffer,
}

impl ContainerKind {
    pub fn code(self) -> u8 {
        match self {
            ContainerKind::Map => 0,
            ContainerKind::Queue => 1,
            ContainerKind::Ringbuffer => 2,
        }
    }

    pub fn from_code(code: u8) -> GridResult<Self> {
        match code {
            0 => Ok(ContainerKind::Map),
            1 => Ok(ContainerKind::Queue),
            2 => Ok(ContainerKind::Ringbuffer),
            other => Err(GridError::Serialization(format!(
                "unknown container kind {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Map => f.write_str("map"),
            ContainerKind::Queue => f.write_str("queue"),
            ContainerKind::Ringbuffer => f.write_str("ringbuffer"),
        }
    }
}

/// The value an operation produces. `Null` is the absent value (e.g. removing a missing key).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum OpValue {
    #[default]
    Null,
    Bool(bool),
    Long(i64),
    Data(Data),
}

const VALUE_NULL: u8 = 0;
const VALUE_BOOL: u8 = 1;
const VALUE_LONG: u8 = 2;
const VALUE_DATA: u8 = 3;

impl OpValue {
    pub fn from_option(value: Option<Data>) -> Self {
        value.map(OpValue::Data).unwrap_or(OpValue::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, OpValue::Null)
    }

    pub fn into_data(self) -> GridResult<Option<Data>> {
        match self {
            OpValue::Null => Ok(None),
            OpValue::Data(data) => Ok(Some(data)),
            other => Err(GridError::Operation(format!(
                "expected data, got {:?}",
                other
            ))),
        }
    }

    pub fn as_bool(&self) -> GridResult<bool> {
        match self {
            OpValue::Bool(value) => Ok(*value),
            other => Err(GridError::Operation(format!(
                "expected bool, got {:?}",
                other
            ))),
        }
    }

    pub fn as_long(&self) -> GridResult<i64> {
        match self {
            OpValue::Long(value) => Ok(*value),
            other => Err(GridError::Operation(format!(
                "expected long, got {:?}",
                other
            ))),
        }
    }

    pub fn write(&self, out: &mut ObjectDataOutput) {
        match self {
            OpValue::Null => out.write_u8(VALUE_NULL),
            OpValue::Bool(value) => {
                out.write_u8(VALUE_BOOL);
                out.write_bool(*value);
            }
            OpValue::Long(value) => {
                out.write_u8(VALUE_LONG);
                out.write_i64(*value);
            }
            OpValue::Data(data) => {
                out.write_u8(VALUE_DATA);
                out.write_data(data);
            }
        }
    }

    pub fn read(input: &mut ObjectDataInput) -> GridResult<Self> {
        match input.read_u8()? {
            VALUE_NULL => Ok(OpValue::Null),
            VALUE_BOOL => Ok(OpValue::Bool(input.read_bool()?)),
            VALUE_LONG => Ok(OpValue::Long(input.read_i64()?)),
            VALUE_DATA => Ok(OpValue::Data(input.read_data()?)),
            other => Err(GridError::Serialization(format!(
                "unknown value tag {}",
                other
            ))),
        }
    }
}

/// How an operation picks its partition.
#[derive(Debug, Clone, PartialEq)]
pub enum PartitionKey {
    /// Hash of the key bytes.
    Key(Data),
    /// A caller-chosen partition (per-partition scans such as map size).
    Partition(u32),
}
