use crate::error::{GridError, GridResult};
use crate::serialization::Data;

use std::collections::VecDeque;

/// Fixed-capacity ring of items addressed by sequence. Adding to a full ring overwrites the
/// oldest item.
///
/// `head_sequence` is the sequence of the oldest stored item and `tail_sequence` the newest;
/// an empty ring has `tail_sequence == head_sequence - 1`.
#[derive(Debug, Clone)]
pub struct RingbufferContainer {
    capacity: usize,
    items: VecDeque<Data>,
    head_sequence: i64,
    tail_sequence: i64,
}

impl RingbufferContainer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: VecDeque::new(),
            head_sequence: 0,
            tail_sequence: -1,
        }
    }

    pub(crate) fn restore(capacity: usize, head_sequence: i64, items: Vec<Data>) -> Self {
        let tail_sequence = head_sequence + items.len() as i64 - 1;
        Self {
            capacity: capacity.max(1),
            items: items.into(),
            head_sequence,
            tail_sequence,
        }
    }

    /// Appends an item and returns its sequence.
    pub fn add(&mut self, data: Data) -> i64 {
        self.tail_sequence += 1;
        self.items.push_back(data);
        if self.items.len() > self.capacity {
            self.items.pop_front();
            self.head_sequence += 1;
        }
        self.tail_sequence
    }

    /// Replica side of `add`. Sequences already stored are ignored; a jump past the tail
    /// drops the local items and restarts the ring at the primary's sequence.
    pub fn add_at(&mut self, sequence: i64, data: Data) {
        if sequence <= self.tail_sequence {
            return;
        }
        if sequence != self.tail_sequence + 1 {
            self.items.clear();
            self.head_sequence = sequence;
            self.tail_sequence = sequence - 1;
        }
        self.add(data);
    }

    /// Reads the item stored under `sequence`. One past the tail reads as `None`.
    pub fn read_one(&self, sequence: i64) -> GridResult<Option<Data>> {
        if sequence < self.head_sequence || sequence > self.tail_sequence + 1 {
            return Err(GridError::Operation(format!(
                "sequence {} outside [{}, {}]",
                sequence,
                self.head_sequence,
                self.tail_sequence + 1
            )));
        }
        Ok(self
            .items
            .get((sequence - self.head_sequence) as usize)
            .cloned())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn head_sequence(&self) -> i64 {
        self.head_sequence
    }

    pub fn tail_sequence(&self) -> i64 {
        self.tail_sequence
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> impl Iterator<Item = &Data> {
        self.items.iter()
    }
}
