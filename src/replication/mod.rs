//! Replication Module
//!
//! Primary-backup replication of decided effects.
//!
//! ## Flow
//! 1. After an operation changed partition state, the primary bumps the replica version of
//!    the structure it touched and wraps the operation's [`BackupOperation`](crate::operation::BackupOperation)
//!    in a [`BackupRequest`].
//! 2. [`BackupReplicator`] sends it to the first `sync_backup_count` replicas of the partition
//!    and waits for their acknowledgements (bounded by `backup_ack_timeout_ms`), then hands it
//!    to the next `async_backup_count` replicas without waiting.
//! 3. An acknowledgement timeout does not fail the operation. The caller gets its result with
//!    a `BackupAcknowledgementTimeout` warning in the [`BackupReport`].
//!
//! ## Ordering
//! Sync backups are sent while the primary still holds the partition lane, so they leave in
//! generation order. Async backups for one replica member go through a single FIFO queue
//! drained by one task. Whether a structure is backed up sync or async is fixed by its
//! configuration, so every backup of one structure to one replica takes the same path.
//! Replicas apply a backup only if its version is newer than the last one applied for that
//! structure; a jump flags the partition for anti-entropy.

pub mod protocol;
pub mod replicator;

pub use protocol::{BackupAck, BackupReport, BackupRequest};
pub use replicator::BackupReplicator;
