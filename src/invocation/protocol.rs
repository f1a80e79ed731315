//! Invocation wire format.
//!
//! A request is `[caller][partition?][table_version][factory_id][type_id][fields…]`; the
//! reply is a [`ResponseEnvelope`] tagged with the request's call id.

use crate::error::{GridError, GridResult};
use crate::operation::types::{CallId, CallerId, OpValue};
use crate::operation::{Operation, OperationRegistry};
use crate::replication::BackupReport;
use crate::serialization::{ObjectDataInput, ObjectDataOutput};

use bytes::Bytes;

pub const ENDPOINT_OPERATION: &str = "/internal/operation";

const RESULT_OK: u8 = 0;
const RESULT_ERR: u8 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct OperationRequest {
    pub caller: CallerId,
    /// Resolved by the caller; `None` for generic operations.
    pub partition_id: Option<u32>,
    /// Partition table version the caller routed with.
    pub table_version: u64,
    pub operation: Operation,
}

/// A request that could not be decoded. `call_id` is 0 if even the header was unreadable.
#[derive(Debug)]
pub struct RejectedRequest {
    pub call_id: CallId,
    pub error: GridError,
}

impl OperationRequest {
    pub fn encode(&self, registry: &OperationRegistry) -> Bytes {
        let mut out = ObjectDataOutput::new();
        self.caller.write(&mut out);
        match self.partition_id {
            Some(partition) => {
                out.write_bool(true);
                out.write_u32(partition);
            }
            None => out.write_bool(false),
        }
        out.write_u64(self.table_version);
        registry.write_operation(&mut out, &self.operation);
        out.into_bytes()
    }

    pub fn decode(bytes: Bytes, registry: &OperationRegistry) -> Result<Self, RejectedRequest> {
        let mut input = ObjectDataInput::new(bytes);
        let caller = CallerId::read(&mut input).map_err(|error| RejectedRequest { call_id: 0, error })?;
        let call_id = caller.call_id;
        let reject = |error| RejectedRequest { call_id, error };

        let partition_id = match input.read_bool().map_err(reject)? {
            true => Some(input.read_u32().map_err(reject)?),
            false => None,
        };
        let table_version = input.read_u64().map_err(reject)?;
        let operation = registry.read_operation(&mut input).map_err(reject)?;
        if input.remaining() != 0 {
            return Err(reject(GridError::Serialization(format!(
                "{} trailing byte(s) after operation",
                input.remaining()
            ))));
        }

        Ok(Self {
            caller,
            partition_id,
            table_version,
            operation,
        })
    }
}

/// What the executing member produced for one call; memoized under the caller id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationResponse {
    pub value: OpValue,
    pub backups: BackupReport,
}

/// Exactly one per request.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub call_id: CallId,
    pub result: GridResult<OperationResponse>,
}

impl ResponseEnvelope {
    pub fn encode(&self) -> Bytes {
        let mut out = ObjectDataOutput::new();
        out.write_u64(self.call_id);
        match &self.result {
            Ok(response) => {
                out.write_u8(RESULT_OK);
                response.value.write(&mut out);
                response.backups.write(&mut out);
            }
            Err(error) => {
                out.write_u8(RESULT_ERR);
                out.write_error(error);
            }
        }
        out.into_bytes()
    }

    pub fn decode(bytes: Bytes) -> GridResult<Self> {
        let mut input = ObjectDataInput::new(bytes);
        let call_id = input.read_u64()?;
        let result = match input.read_u8()? {
            RESULT_OK => Ok(OperationResponse {
                value: OpValue::read(&mut input)?,
                backups: BackupReport::read(&mut input)?,
            }),
            RESULT_ERR => Err(input.read_error()?),
            other => {
                return Err(GridError::Serialization(format!(
                    "unknown response tag {}",
                    other
                )));
            }
        };
        Ok(Self { call_id, result })
    }
}

/// What `invoke` hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub call_id: CallId,
    pub value: OpValue,
    pub backups: BackupReport,
}
