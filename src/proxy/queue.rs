use super::decode_value;
use crate::error::GridResult;
use crate::node::NodeEngine;
use crate::operation::{QueueOffer, QueuePeek, QueuePoll, QueueSize};
use crate::serialization::Data;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;

/// A replicated FIFO queue. The whole queue lives in the partition its name hashes to.
pub struct DistributedQueue<T> {
    engine: Arc<NodeEngine>,
    name: String,
    _item: PhantomData<fn() -> T>,
}

impl<T> DistributedQueue<T>
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

    /// Returns `false` when the queue is at its configured `max_size`.
    pub async fn offer(&self, item: &T) -> GridResult<bool> {
        let op = QueueOffer::new(&self.name, Data::from_json(item)?);
        self.engine.invoke(op.into()).await?.value.as_bool()
    }

    pub async fn poll(&self) -> GridResult<Option<T>> {
        let op = QueuePoll::new(&self.name);
        decode_value(self.engine.invoke(op.into()).await?.value)
    }

    pub async fn peek(&self) -> GridResult<Option<T>> {
        let op = QueuePeek::new(&self.name);
        decode_value(self.engine.invoke(op.into()).await?.value)
    }

    pub async fn size(&self) -> GridResult<usize> {
        let op = QueueSize::new(&self.name);
        Ok(self.engine.invoke(op.into()).await?.value.as_long()? as usize)
    }
}
