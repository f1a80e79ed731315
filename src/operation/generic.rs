//! Partition-independent operations.

use super::types::{MemberId, OpValue};
use super::{ENGINE_FACTORY_ID, GenericOperation, Operation};
use crate::error::GridResult;
use crate::serialization::{BuilderMap, IdentifiedDataSerializable, ObjectDataInput, ObjectDataOutput};

pub const TABLE_VERSION: i32 = 2;

pub fn operation_builders() -> BuilderMap<Operation> {
    let mut builders: BuilderMap<Operation> = BuilderMap::new();
    builders.insert(TABLE_VERSION, || Operation::TableVersion(TableVersion));
    builders
}

/// What a generic operation may read.
pub struct GenericContext<'a> {
    pub member: &'a MemberId,
    pub table_version: u64,
    pub partition_count: u32,
}

/// Reports the partition table version of the executing member.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableVersion;

impl GenericOperation for TableVersion {
    fn name(&self) -> &'static str {
        "engine.table_version"
    }

    fn run(&self, ctx: &GenericContext<'_>) -> GridResult<OpValue> {
        Ok(OpValue::Long(ctx.table_version as i64))
    }
}

impl IdentifiedDataSerializable for TableVersion {
    fn factory_id(&self) -> i32 {
        ENGINE_FACTORY_ID
    }

    fn type_id(&self) -> i32 {
        TABLE_VERSION
    }

    fn write_data(&self, _out: &mut ObjectDataOutput) {}

    fn read_data(&mut self, _input: &mut ObjectDataInput) -> GridResult<()> {
        Ok(())
    }
}
