use crate::serialization::Data;

use std::collections::HashMap;

/// Key/value records of one map within one partition.
#[derive(Debug, Default, Clone)]
pub struct RecordStore {
    records: HashMap<Data, Data>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &Data) -> Option<&Data> {
        self.records.get(key)
    }

    pub fn contains_key(&self, key: &Data) -> bool {
        self.records.contains_key(key)
    }

    /// Returns the previous value.
    pub fn put(&mut self, key: Data, value: Data) -> Option<Data> {
        self.records.insert(key, value)
    }

    pub fn remove(&mut self, key: &Data) -> Option<Data> {
        self.records.remove(key)
    }

    pub fn size(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&Data, &Data)> {
        self.records.iter()
    }
}

impl FromIterator<(Data, Data)> for RecordStore {
    fn from_iter<I: IntoIterator<Item = (Data, Data)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}
