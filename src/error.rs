//! Error taxonomy for the operation engine.
//!
//! Errors fall into three groups:
//!
//! - **Transient routing errors** (`StaleTopology`, `MemberUnreachable`): retried by the
//!   invocation engine and invisible to the caller unless the retry budget runs out.
//! - **Definitive failures** (`OperationTimeout`, `MemberLeft`, `UnknownType`, `Serialization`,
//!   `Operation`): surfaced to the caller immediately.
//! - **Replication warnings** (`BackupAcknowledgementTimeout`): never fail the primary; they are
//!   reported next to a successful result.
//!
//! Errors that cross the wire are flattened to `(code, message)` with [`GridError::code`] and
//! rebuilt on the caller side with [`GridError::from_wire`].

use crate::operation::types::MemberId;
use thiserror::Error;

pub type GridResult<T> = Result<T, GridError>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GridError {
    /// The partition table moved on between routing and execution.
    #[error("Stale topology for partition {partition}: routed with v{expected}, current v{actual}")]
    StaleTopology {
        partition: u32,
        expected: u64,
        actual: u64,
    },

    /// The target member could not be reached (connection refused, dropped reply, ...).
    #[error("Member {member} unreachable: {reason}")]
    MemberUnreachable { member: MemberId, reason: String },

    /// The invocation deadline or retry budget was exhausted.
    #[error("Operation {operation} timed out after {attempts} attempt(s)")]
    OperationTimeout { operation: String, attempts: usize },

    /// The owner kept being unreachable until the retry budget was exhausted.
    #[error("Member {0} left the cluster")]
    MemberLeft(MemberId),

    #[error("Unknown type: factory {factory_id}, type {type_id}")]
    UnknownType { factory_id: i32, type_id: i32 },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backup acknowledgement from {member} timed out for partition {partition}")]
    BackupAcknowledgementTimeout { member: MemberId, partition: u32 },

    #[error("Partition {partition} out of range (count {count})")]
    PartitionOutOfRange { partition: u32, count: u32 },

    #[error("Partition {0} has no owner")]
    NoOwner(u32),

    #[error("Invalid partition table: {0}")]
    InvalidTable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation itself rejected its input (e.g. a ring buffer sequence out of range).
    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Engine is shutting down")]
    ShuttingDown,
}

impl GridError {
    /// Transient errors the invocation engine re-resolves and retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GridError::StaleTopology { .. } | GridError::MemberUnreachable { .. } | GridError::NoOwner(_)
        )
    }

    pub fn code(&self) -> i32 {
        match self {
            GridError::StaleTopology { .. } => 1,
            GridError::MemberUnreachable { .. } => 2,
            GridError::OperationTimeout { .. } => 3,
            GridError::MemberLeft(_) => 4,
            GridError::UnknownType { .. } => 5,
            GridError::Serialization(_) => 6,
            GridError::BackupAcknowledgementTimeout { .. } => 7,
            GridError::PartitionOutOfRange { .. } => 8,
            GridError::NoOwner(_) => 9,
            GridError::InvalidTable(_) => 10,
            GridError::Config(_) => 11,
            GridError::Operation(_) => 12,
            GridError::ShuttingDown => 13,
        }
    }

    /// Rebuilds an error received from a remote member.
    ///
    /// Structured variants are sent with their fields encoded in the message by
    /// [`GridError::wire_message`]; anything that fails to parse degrades to `Operation`.
    pub fn from_wire(code: i32, message: String) -> Self {
        let fields: Vec<&str> = message.split('|').collect();
        let num = |idx: usize| fields.get(idx).and_then(|v| v.parse::<i64>().ok());
        match code {
            1 => match (num(0), num(1), num(2)) {
                (Some(partition), Some(expected), Some(actual)) => GridError::StaleTopology {
                    partition: partition as u32,
                    expected: expected as u64,
                    actual: actual as u64,
                },
                _ => GridError::Operation(message),
            },
            2 => GridError::MemberUnreachable {
                member: MemberId(fields.first().copied().unwrap_or_default().to_string()),
                reason: fields.get(1).copied().unwrap_or_default().to_string(),
            },
            3 => GridError::OperationTimeout {
                operation: fields.first().copied().unwrap_or_default().to_string(),
                attempts: num(1).unwrap_or(0) as usize,
            },
            4 => GridError::MemberLeft(MemberId(message)),
            5 => match (num(0), num(1)) {
                (Some(f), Some(t)) => GridError::UnknownType {
                    factory_id: f as i32,
                    type_id: t as i32,
                },
                _ => GridError::Operation(message),
            },
            6 => GridError::Serialization(message),
            7 => GridError::BackupAcknowledgementTimeout {
                member: MemberId(fields.first().copied().unwrap_or_default().to_string()),
                partition: num(1).unwrap_or(0) as u32,
            },
            8 => match (num(0), num(1)) {
                (Some(partition), Some(count)) => GridError::PartitionOutOfRange {
                    partition: partition as u32,
                    count: count as u32,
                },
                _ => GridError::Operation(message),
            },
            9 => GridError::NoOwner(num(0).unwrap_or(0) as u32),
            10 => GridError::InvalidTable(message),
            11 => GridError::Config(message),
            13 => GridError::ShuttingDown,
            _ => GridError::Operation(message),
        }
    }

    /// Message half of the wire form, see [`GridError::from_wire`].
    pub fn wire_message(&self) -> String {
        match self {
            GridError::StaleTopology {
                partition,
                expected,
                actual,
            } => format!("{}|{}|{}", partition, expected, actual),
            GridError::MemberUnreachable { member, reason } => format!("{}|{}", member.0, reason),
            GridError::OperationTimeout {
                operation,
                attempts,
            } => format!("{}|{}", operation, attempts),
            GridError::MemberLeft(member) => member.0.clone(),
            GridError::UnknownType {
                factory_id,
                type_id,
            } => format!("{}|{}", factory_id, type_id),
            GridError::PartitionOutOfRange { partition, count } => {
                format!("{}|{}", partition, count)
            }
            GridError::BackupAcknowledgementTimeout { member, partition } => {
                format!("{}|{}", member.0, partition)
            }
            GridError::NoOwner(partition) => partition.to_string(),
            GridError::Serialization(msg)
            | GridError::InvalidTable(msg)
            | GridError::Config(msg)
            | GridError::Operation(msg) => msg.clone(),
            GridError::ShuttingDown => String::new(),
        }
    }
}
