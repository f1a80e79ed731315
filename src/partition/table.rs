//! Versioned Partition Table
//!
//! An immutable snapshot of `partition -> (owner, [backups])`. A new snapshot is produced by
//! the migration collaborator for every topology change; this crate never edits one in place.

use crate::config::MAX_BACKUP_COUNT;
use crate::error::{GridError, GridResult};
use crate::operation::types::MemberId;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Replica assignment of a single partition. Backups are ordered: the first
/// `sync_backup_count` entries act as sync replicas, the following ones as async replicas.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PartitionReplicas {
    pub owner: Option<MemberId>,
    pub backups: Vec<MemberId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartitionTable {
    version: u64,
    replicas: Vec<PartitionReplicas>,
}

impl PartitionTable {
    /// Builds and validates a snapshot. `max_backups` is the configured backup count and
    /// must itself be within `MAX_BACKUP_COUNT`.
    pub fn new(
        version: u64,
        replicas: Vec<PartitionReplicas>,
        max_backups: usize,
    ) -> GridResult<Self> {
        let table = Self { version, replicas };
        table.validate(max_backups)?;
        Ok(table)
    }

    /// Version 0 with no owners; every lookup fails with `NoOwner` until the first snapshot.
    pub fn empty(partition_count: u32) -> Self {
        Self {
            version: 0,
            replicas: vec![PartitionReplicas::default(); partition_count as usize],
        }
    }

    /// Round-robin assignment over the member list sorted by id: partition `p` is owned by
    /// member `p % n`, followed by up to `backup_count` distinct successors as backups.
    pub fn assign(
        version: u64,
        partition_count: u32,
        members: &[MemberId],
        backup_count: usize,
    ) -> GridResult<Self> {
        if members.is_empty() {
            return Ok(Self {
                version,
                replicas: vec![PartitionReplicas::default(); partition_count as usize],
            });
        }
        let mut sorted: Vec<MemberId> = members.to_vec();
        sorted.sort();
        sorted.dedup();

        let n = sorted.len();
        let backups_per_partition = backup_count.min(n - 1);
        let replicas = (0..partition_count as usize)
            .map(|partition| {
                let primary_idx = partition % n;
                PartitionReplicas {
                    owner: Some(sorted[primary_idx].clone()),
                    backups: (1..=backups_per_partition)
                        .map(|offset| sorted[(primary_idx + offset) % n].clone())
                        .collect(),
                }
            })
            .collect();

        Self::new(version, replicas, backup_count)
    }

    pub fn validate(&self, max_backups: usize) -> GridResult<()> {
        if max_backups > MAX_BACKUP_COUNT {
            return Err(GridError::InvalidTable(format!(
                "backup count {} exceeds maximum {}",
                max_backups, MAX_BACKUP_COUNT
            )));
        }
        if self.replicas.is_empty() {
            return Err(GridError::InvalidTable("no partitions".to_string()));
        }
        for (partition, replicas) in self.replicas.iter().enumerate() {
            if replicas.backups.len() > max_backups {
                return Err(GridError::InvalidTable(format!(
                    "partition {} has {} backups, limit {}",
                    partition,
                    replicas.backups.len(),
                    max_backups
                )));
            }
            if let Some(owner) = &replicas.owner
                && replicas.backups.contains(owner)
            {
                return Err(GridError::InvalidTable(format!(
                    "partition {} lists its owner {} as a backup",
                    partition, owner
                )));
            }
            let distinct: HashSet<&MemberId> = replicas.backups.iter().collect();
            if distinct.len() != replicas.backups.len() {
                return Err(GridError::InvalidTable(format!(
                    "partition {} has duplicate backups",
                    partition
                )));
            }
            if replicas.owner.is_none() && !replicas.backups.is_empty() {
                return Err(GridError::InvalidTable(format!(
                    "partition {} has backups but no owner",
                    partition
                )));
            }
        }
        Ok(())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn partition_count(&self) -> u32 {
        self.replicas.len() as u32
    }

    fn replicas_checked(&self, partition: u32, version: u64) -> GridResult<&PartitionReplicas> {
        if version != self.version {
            return Err(GridError::StaleTopology {
                partition,
                expected: version,
                actual: self.version,
            });
        }
        self.replicas
            .get(partition as usize)
            .ok_or(GridError::PartitionOutOfRange {
                partition,
                count: self.partition_count(),
            })
    }

    /// Owner of `partition` as of `version`; a version other than this snapshot's is stale.
    pub fn owner_of(&self, partition: u32, version: u64) -> GridResult<MemberId> {
        self.replicas_checked(partition, version)?
            .owner
            .clone()
            .ok_or(GridError::NoOwner(partition))
    }

    pub fn backups_of(&self, partition: u32, version: u64) -> GridResult<&[MemberId]> {
        Ok(&self.replicas_checked(partition, version)?.backups)
    }

    pub fn replicas(&self, partition: u32) -> Option<&PartitionReplicas> {
        self.replicas.get(partition as usize)
    }

    /// Position of `member` in the backup list of `partition` (0 = first backup).
    pub fn backup_index(&self, partition: u32, member: &MemberId) -> Option<usize> {
        self.replicas(partition)
            .and_then(|r| r.backups.iter().position(|m| m == member))
    }

    pub fn is_owner(&self, partition: u32, member: &MemberId) -> bool {
        self.replicas(partition)
            .and_then(|r| r.owner.as_ref())
            .map(|owner| owner == member)
            .unwrap_or(false)
    }
}
