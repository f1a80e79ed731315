use super::decode_value;
use crate::error::GridResult;
use crate::node::NodeEngine;
use crate::operation::{RingbufferAdd, RingbufferReadOne, RingbufferTailSequence};
use crate::serialization::Data;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// A bounded, replicated ring buffer. Adding past capacity overwrites the oldest item.
pub struct Ringbuffer<T> {
    engine: Arc<NodeEngine>,
    name: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> Ringbuffer<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(engine: Arc<NodeEngine>, name: &str) -> Self {
        Self {
            engine,
            name: name.to_string(),
            _item: PhantomData,
        }
    }

    /// Appends `item` and returns its sequence.
    pub async fn add(&self, item: &T) -> GridResult<i64> {
        let op = RingbufferAdd::new(&self.name, Data::from_json(item)?);
        self.engine.invoke(op.into()).await?.value.as_long()
    }

    /// `None` when `sequence` is the next one to be written.
    pub async fn read_one(&self, sequence: i64) -> GridResult<Option<T>> {
        let op = RingbufferReadOne::new(&self.name, sequence);
        decode_value(self.engine.invoke(op.into()).await?.value)
    }

    /// Sequence of the newest item, `-1` while empty.
    pub async fn tail_sequence(&self) -> GridResult<i64> {
        let op = RingbufferTailSequence::new(&self.name);
        self.engine.invoke(op.into()).await?.value.as_long()
    }
}
