//! Type Registry
//!
//! Maps `(factory_id, type_id)` pairs to zero-argument constructors. A constructor returns a
//! blank instance which then fills itself from the field stream via
//! [`IdentifiedDataSerializable::read_data`]. Wire compatibility therefore depends only on the
//! stable integer ids, never on Rust type metadata.
//!
//! The table is assembled once at startup by the hosting data-structure modules and shared
//! read-only afterwards.

use super::codec::{ObjectDataInput, ObjectDataOutput};
use crate::error::{GridError, GridResult};

use bytes::Bytes;
use std::collections::HashMap;

/// A value that knows its own wire identity and field order.
///
/// Read/write symmetry is the implementor's responsibility: `read_data` must consume exactly
/// the fields `write_data` produced, in the same order.
pub trait IdentifiedDataSerializable {
    fn factory_id(&self) -> i32;
    fn type_id(&self) -> i32;
    fn write_data(&self, out: &mut ObjectDataOutput);
    fn read_data(&mut self, input: &mut ObjectDataInput) -> GridResult<()>;
}

pub type Constructor<T> = fn() -> T;

/// `type_id -> constructor` for one factory.
pub type BuilderMap<T> = HashMap<i32, Constructor<T>>;

pub struct TypeRegistry<T> {
    factories: HashMap<i32, BuilderMap<T>>,
}

impl<T: IdentifiedDataSerializable> TypeRegistry<T> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Associates every `type_id` in `builders` with `factory_id`.
    ///
    /// A factory id may only be registered once; two modules claiming the same id is a
    /// startup configuration bug.
    pub fn register(&mut self, factory_id: i32, builders: BuilderMap<T>) -> GridResult<()> {
        if self.factories.contains_key(&factory_id) {
            return Err(GridError::Config(format!(
                "factory {} registered twice",
                factory_id
            )));
        }
        tracing::debug!(
            "Registered factory {} with {} type(s)",
            factory_id,
            builders.len()
        );
        self.factories.insert(factory_id, builders);
        Ok(())
    }

    /// Returns a blank instance ready for field-by-field deserialization.
    pub fn create_instance(&self, factory_id: i32, type_id: i32) -> GridResult<T> {
        self.factories
            .get(&factory_id)
            .and_then(|builders| builders.get(&type_id))
            .map(|constructor| constructor())
            .ok_or(GridError::UnknownType {
                factory_id,
                type_id,
            })
    }

    pub fn has_type(&self, factory_id: i32, type_id: i32) -> bool {
        self.factories
            .get(&factory_id)
            .map(|builders| builders.contains_key(&type_id))
            .unwrap_or(false)
    }

    pub fn type_count(&self) -> usize {
        self.factories.values().map(|builders| builders.len()).sum()
    }

    /// Writes the id header followed by the object's own fields.
    pub fn write_object(&self, out: &mut ObjectDataOutput, object: &T) {
        out.write_i32(object.factory_id());
        out.write_i32(object.type_id());
        object.write_data(out);
    }

    pub fn read_object(&self, input: &mut ObjectDataInput) -> GridResult<T> {
        let factory_id = input.read_i32()?;
        let type_id = input.read_i32()?;
        let mut object = self.create_instance(factory_id, type_id)?;
        object.read_data(input)?;
        Ok(object)
    }

    pub fn to_bytes(&self, object: &T) -> Bytes {
        let mut out = ObjectDataOutput::new();
        self.write_object(&mut out, object);
        out.into_bytes()
    }

    /// Decodes a standalone object; trailing bytes mean writer and reader disagree on the
    /// field order and are rejected.
    pub fn from_bytes(&self, bytes: Bytes) -> GridResult<T> {
        let mut input = ObjectDataInput::new(bytes);
        let object = self.read_object(&mut input)?;
        if input.remaining() != 0 {
            return Err(GridError::Serialization(format!(
                "{} trailing byte(s) after object",
                input.remaining()
            )));
        }
        Ok(object)
    }
}

impl<T: IdentifiedDataSerializable> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
