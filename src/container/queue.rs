use crate::serialization::Data;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub item_id: i64,
    pub data: Data,
}

/// FIFO items of one queue. The whole queue lives in the partition its name hashes to.
///
/// Item ids are assigned by the primary and shipped with the backups, so a replica polls
/// exactly the item the primary polled.
#[derive(Debug, Clone)]
pub struct QueueContainer {
    items: VecDeque<QueueItem>,
    next_item_id: i64,
    last_activity: Instant,
}

impl QueueContainer {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
            next_item_id: 1,
            last_activity: Instant::now(),
        }
    }

    pub(crate) fn restore(items: Vec<QueueItem>, next_item_id: i64) -> Self {
        Self {
            items: items.into(),
            next_item_id,
            last_activity: Instant::now(),
        }
    }

    /// Appends an item and returns the id it was given.
    pub fn offer(&mut self, data: Data) -> i64 {
        let item_id = self.next_item_id;
        self.next_item_id += 1;
        self.items.push_back(QueueItem { item_id, data });
        self.touch();
        item_id
    }

    /// Replica side of `offer`: keeps the primary's item id.
    pub fn offer_with_id(&mut self, item_id: i64, data: Data) {
        if self.items.iter().any(|item| item.item_id == item_id) {
            return;
        }
        self.next_item_id = self.next_item_id.max(item_id + 1);
        self.items.push_back(QueueItem { item_id, data });
        self.touch();
    }

    pub fn poll(&mut self) -> Option<QueueItem> {
        let item = self.items.pop_front();
        self.touch();
        item
    }

    /// Replica side of `poll`.
    pub fn remove_item(&mut self, item_id: i64) -> Option<QueueItem> {
        let position = self.items.iter().position(|item| item.item_id == item_id)?;
        self.touch();
        self.items.remove(position)
    }

    pub fn peek(&self) -> Option<&QueueItem> {
        self.items.front()
    }

    pub fn size(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn next_item_id(&self) -> i64 {
        self.next_item_id
    }

    pub fn items(&self) -> impl Iterator<Item = &QueueItem> {
        self.items.iter()
    }

    /// Time since the last offer or poll.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.elapsed()
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

impl Default for QueueContainer {
    fn default() -> Self {
        Self::new()
    }
}
