//! Binary Serialization Module
//!
//! Every object that crosses a member boundary (operations, backup operations, request and
//! response envelopes) is written as:
//!
//! ```text
//! [factory_id: i32][type_id: i32][field-stream ...]
//! ```
//!
//! The field stream is written and read in an order the concrete type alone defines.
//! There is no schema exchange and no reflection: the receiving side looks the id pair up in a
//! [`registry::TypeRegistry`] to obtain a blank instance, then lets that instance read its own
//! fields.
//!
//! ## Submodules
//! - **`codec`**: `ObjectDataOutput` / `ObjectDataInput`, big-endian primitives over `bytes`.
//! - **`registry`**: the `(factory_id, type_id) -> constructor` lookup table.

pub mod codec;
pub mod registry;

pub use codec::{Data, ObjectDataInput, ObjectDataOutput};
pub use registry::{BuilderMap, IdentifiedDataSerializable, TypeRegistry};
