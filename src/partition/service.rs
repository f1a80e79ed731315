use super::hash::partition_for;
use super::table::PartitionTable;
use crate::error::{GridError, GridResult};
use crate::operation::types::{MemberId, PartitionKey};
use crate::serialization::Data;

use parking_lot::RwLock;
use std::sync::Arc;

/// Holds the current partition table snapshot for this member.
///
/// Readers clone the `Arc` and keep routing against that snapshot; a migration swaps in a
/// whole new table, so nobody ever observes a half-updated one.
pub struct PartitionService {
    local_member: MemberId,
    partition_count: u32,
    max_backups: usize,
    table: RwLock<Arc<PartitionTable>>,
}

/// Result of accepting a new snapshot.
pub struct TableChange {
    pub previous: Arc<PartitionTable>,
    pub current: Arc<PartitionTable>,
}

impl PartitionService {
    pub fn new(local_member: MemberId, partition_count: u32, max_backups: usize) -> Self {
        Self {
            local_member,
            partition_count,
            max_backups,
            table: RwLock::new(Arc::new(PartitionTable::empty(partition_count))),
        }
    }

    pub fn local_member(&self) -> &MemberId {
        &self.local_member
    }

    pub fn partition_count(&self) -> u32 {
        self.partition_count
    }

    pub fn current(&self) -> Arc<PartitionTable> {
        self.table.read().clone()
    }

    pub fn version(&self) -> u64 {
        self.table.read().version()
    }

    /// Installs a snapshot pushed by the migration collaborator.
    ///
    /// Snapshots that are not newer than the current one are ignored (`Ok(None)`), so a
    /// delayed feed message can never roll the table back.
    pub fn apply_snapshot(&self, table: PartitionTable) -> GridResult<Option<TableChange>> {
        if table.partition_count() != self.partition_count {
            return Err(GridError::InvalidTable(format!(
                "snapshot has {} partitions, cluster has {}",
                table.partition_count(),
                self.partition_count
            )));
        }
        table.validate(self.max_backups)?;

        let mut guard = self.table.write();
        if table.version() <= guard.version() {
            tracing::debug!(
                "Ignoring partition table v{} (current v{})",
                table.version(),
                guard.version()
            );
            return Ok(None);
        }

        let current = Arc::new(table);
        let previous = std::mem::replace(&mut *guard, current.clone());
        drop(guard);

        tracing::info!(
            "Partition table updated v{} -> v{}",
            previous.version(),
            current.version()
        );
        Ok(Some(TableChange { previous, current }))
    }

    pub fn partition_for_key(&self, key: &Data) -> u32 {
        partition_for(key, self.partition_count)
    }

    pub fn resolve(&self, key: &PartitionKey) -> GridResult<u32> {
        match key {
            PartitionKey::Key(data) => Ok(self.partition_for_key(data)),
            PartitionKey::Partition(partition) if *partition < self.partition_count => {
                Ok(*partition)
            }
            PartitionKey::Partition(partition) => Err(GridError::PartitionOutOfRange {
                partition: *partition,
                count: self.partition_count,
            }),
        }
    }

    pub fn owner_of(&self, partition: u32, version: u64) -> GridResult<MemberId> {
        self.table.read().owner_of(partition, version)
    }

    pub fn backups_of(&self, partition: u32, version: u64) -> GridResult<Vec<MemberId>> {
        Ok(self.table.read().backups_of(partition, version)?.to_vec())
    }

    pub fn local_primary_partitions(&self) -> Vec<u32> {
        let table = self.current();
        (0..self.partition_count)
            .filter(|&partition| table.is_owner(partition, &self.local_member))
            .collect()
    }

    pub fn local_backup_partitions(&self) -> Vec<u32> {
        let table = self.current();
        (0..self.partition_count)
            .filter(|&partition| table.backup_index(partition, &self.local_member).is_some())
            .collect()
    }
}
