//! Proxy Module
//!
//! Typed facades over [`NodeEngine::invoke`](crate::node::NodeEngine::invoke). Keys and values
//! are turned into [`Data`](crate::serialization::Data) with `serde_json`, one operation is
//! built per call and the engine routes it to the partition owner.
//!
//! Proxies are cheap handles: they hold the engine `Arc` and the structure name, nothing else.
//! Two proxies with the same name on any member address the same distributed structure.

pub mod map;
pub mod queue;
pub mod ringbuffer;

pub use map::DistributedMap;
pub use queue::DistributedQueue;
pub use ringbuffer::Ringbuffer;

use crate::error::GridResult;
use crate::operation::types::OpValue;
use serde::de::DeserializeOwned;

fn decode_value<T: DeserializeOwned>(value: OpValue) -> GridResult<Option<T>> {
    value.into_data()?.map(|data| data.to_json()).transpose()
}

#[cfg(test)]
mod tests;
