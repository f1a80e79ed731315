use super::protocol::OperationResponse;
use crate::config::CallMemoConfig;
use crate::operation::types::CallerId;

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

struct MemoEntry {
    response: OperationResponse,
    recorded_at: Instant,
}

/// Results of calls already applied on this member, keyed by caller.
///
/// A retry that arrives with a known caller id gets the stored response instead of running
/// the operation again. Entries expire after `ttl`; past `capacity` the oldest are dropped.
pub struct CallMemo {
    entries: DashMap<CallerId, MemoEntry>,
    /// Recording order. A caller recorded twice appears twice; only the newer slot still
    /// matches its entry.
    order: Mutex<VecDeque<(CallerId, Instant)>>,
    capacity: usize,
    ttl: Duration,
}

impl CallMemo {
    pub fn new(config: &CallMemoConfig) -> Self {
        Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: config.capacity.max(1),
            ttl: Duration::from_millis(config.ttl_ms),
        }
    }

    pub fn get(&self, caller: &CallerId) -> Option<OperationResponse> {
        let entry = self.entries.get(caller)?;
        if entry.recorded_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.response.clone())
    }

    pub fn contains(&self, caller: &CallerId) -> bool {
        self.get(caller).is_some()
    }

    pub fn record(&self, caller: CallerId, response: OperationResponse) {
        let recorded_at = Instant::now();
        let mut order = self.order.lock();
        self.entries.insert(
            caller.clone(),
            MemoEntry {
                response,
                recorded_at,
            },
        );
        order.push_back((caller, recorded_at));
        self.evict(&mut order);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pops from the front while it is expired or the table is over capacity.
    fn evict(&self, order: &mut VecDeque<(CallerId, Instant)>) {
        while let Some((caller, recorded_at)) = order.front() {
            let expired = recorded_at.elapsed() > self.ttl;
            if !expired && order.len() <= self.capacity {
                break;
            }
            let recorded_at = *recorded_at;
            self.entries
                .remove_if(caller, |_, entry| entry.recorded_at == recorded_at);
            order.pop_front();
        }
    }
}
