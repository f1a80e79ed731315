use super::decode_value;
use crate::error::{GridError, GridResult};
use crate::node::NodeEngine;
use crate::operation::types::OpValue;
use crate::operation::{
    MapContainsKey, MapGet, MapPut, MapPutIfAbsent, MapRemove, MapRemoveIf, MapSize, Operation,
    ValuePredicate,
};
use crate::serialization::Data;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::task::JoinSet;

/// A partitioned, replicated map.
pub struct DistributedMap<K, V> {
    engine: Arc<NodeEngine>,
    name: String,
    _types: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for DistributedMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            name: self.name.clone(),
            _types: PhantomData,
        }
    }
}

impl<K, V> DistributedMap<K, V>
where
    K: Serialize,
    V: Serialize + DeserializeOwned,
{
    pub fn new(engine: Arc<NodeEngine>, name: &str) -> Self {
        Self {
            engine,
            name: name.to_string(),
            _types: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, operation: Operation) -> GridResult<OpValue> {
        let response = self.engine.invoke(operation).await?;
        if !response.backups.is_clean() {
            tracing::warn!(
                "Map '{}' call {} completed with backup warnings: {:?}",
                self.name,
                response.call_id,
                response.backups.warnings
            );
        }
        Ok(response.value)
    }

    /// Stores `value` and returns the previous value, if any.
    pub async fn put(&self, key: &K, value: &V) -> GridResult<Option<V>> {
        let op = MapPut::new(&self.name, Data::from_json(key)?, Data::from_json(value)?);
        decode_value(self.call(op.into()).await?)
    }

    /// Stores `value` only if `key` is absent; returns the value already present otherwise.
    pub async fn put_if_absent(&self, key: &K, value: &V) -> GridResult<Option<V>> {
        let op = MapPutIfAbsent::new(&self.name, Data::from_json(key)?, Data::from_json(value)?);
        decode_value(self.call(op.into()).await?)
    }

    pub async fn get(&self, key: &K) -> GridResult<Option<V>> {
        let op = MapGet::new(&self.name, Data::from_json(key)?);
        decode_value(self.call(op.into()).await?)
    }

    pub async fn contains_key(&self, key: &K) -> GridResult<bool> {
        let op = MapContainsKey::new(&self.name, Data::from_json(key)?);
        self.call(op.into()).await?.as_bool()
    }

    pub async fn remove(&self, key: &K) -> GridResult<Option<V>> {
        let op = MapRemove::new(&self.name, Data::from_json(key)?);
        decode_value(self.call(op.into()).await?)
    }

    /// Removes `key` only if its current value equals `expected`.
    pub async fn remove_if_equals(&self, key: &K, expected: &V) -> GridResult<bool> {
        let predicate = ValuePredicate::Equals(Data::from_json(expected)?);
        let op = MapRemoveIf::new(&self.name, Data::from_json(key)?, predicate);
        self.call(op.into()).await?.as_bool()
    }

    /// Entry count across all partitions. Each partition is asked by its own owner, so the
    /// total is not a point-in-time snapshot.
    pub async fn size(&self) -> GridResult<usize> {
        let mut sizes = JoinSet::new();
        for partition_id in 0..self.engine.partitions().partition_count() {
            let engine = self.engine.clone();
            let op = MapSize::new(&self.name, partition_id);
            sizes.spawn(async move { engine.invoke(op.into()).await });
        }

        let mut total = 0usize;
        while let Some(joined) = sizes.join_next().await {
            let response =
                joined.map_err(|e| GridError::Operation(format!("size task failed: {}", e)))??;
            total += response.value.as_long()? as usize;
        }
        Ok(total)
    }
}
