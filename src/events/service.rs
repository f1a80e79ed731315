use super::types::ContainerEvent;
use crate::operation::types::ContainerKind;

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

pub type ListenerId = u64;

type ListenerKey = (ContainerKind, String);

/// Local listener registrations, keyed by container.
pub struct EventService {
    listeners: DashMap<ListenerKey, Vec<(ListenerId, mpsc::UnboundedSender<ContainerEvent>)>>,
    next_id: AtomicU64,
}

impl EventService {
    pub fn new() -> Self {
        Self {
            listeners: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add_listener(
        &self,
        kind: ContainerKind,
        name: &str,
    ) -> (ListenerId, mpsc::UnboundedReceiver<ContainerEvent>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .entry((kind, name.to_string()))
            .or_default()
            .push((id, tx));
        tracing::debug!("Registered listener {} on {} '{}'", id, kind, name);
        (id, rx)
    }

    pub fn remove_listener(&self, kind: ContainerKind, name: &str, id: ListenerId) -> bool {
        let key = (kind, name.to_string());
        let removed = match self.listeners.get_mut(&key) {
            Some(mut entry) => {
                let before = entry.len();
                entry.retain(|(listener, _)| *listener != id);
                before != entry.len()
            }
            None => false,
        };
        self.listeners.remove_if(&key, |_, senders| senders.is_empty());
        removed
    }

    /// True if a listener whose receiver is still alive is registered.
    pub fn has_listeners(&self, kind: ContainerKind, name: &str) -> bool {
        self.listeners
            .get(&(kind, name.to_string()))
            .is_some_and(|senders| senders.iter().any(|(_, tx)| !tx.is_closed()))
    }

    /// Delivers to every listener of the event's container. Returns the number of deliveries.
    pub fn publish(&self, event: ContainerEvent) -> usize {
        let key = (event.container, event.name.clone());
        let Some(mut senders) = self.listeners.get_mut(&key) else {
            return 0;
        };
        senders.retain(|(_, tx)| !tx.is_closed());

        let mut delivered = 0;
        for (_, tx) in senders.iter() {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            }
        }
        tracing::trace!(
            "Published {:?} on {} '{}' to {} listeners",
            event.kind,
            event.container,
            event.name,
            delivered
        );
        delivered
    }
}

impl Default for EventService {
    fn default() -> Self {
        Self::new()
    }
}
