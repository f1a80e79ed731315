use crate::operation::types::ContainerKind;

use parking_lot::Mutex;

/// Collaborator told about containers removed by maintenance operations.
pub trait LifecycleHook: Send + Sync {
    fn destroy_container(&self, partition_id: u32, kind: ContainerKind, name: &str);
}

/// Default hook: records the destruction in the log.
#[derive(Debug, Default)]
pub struct LoggingLifecycle;

impl LifecycleHook for LoggingLifecycle {
    fn destroy_container(&self, partition_id: u32, kind: ContainerKind, name: &str) {
        tracing::info!("Destroyed {} '{}' (partition {})", kind, name, partition_id);
    }
}

/// Keeps every destruction it was told about.
#[derive(Debug, Default)]
pub struct RecordingLifecycle {
    destroyed: Mutex<Vec<(u32, ContainerKind, String)>>,
}

impl RecordingLifecycle {
    pub fn destroyed(&self) -> Vec<(u32, ContainerKind, String)> {
        self.destroyed.lock().clone()
    }
}

impl LifecycleHook for RecordingLifecycle {
    fn destroy_container(&self, partition_id: u32, kind: ContainerKind, name: &str) {
        self.destroyed
            .lock()
            .push((partition_id, kind, name.to_string()));
    }
}
