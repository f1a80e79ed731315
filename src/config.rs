//! Engine Configuration
//!
//! All settings have defaults so an empty TOML file (or none at all) yields a working
//! single-member node. Per-structure settings are resolved by container name: a named
//! override wins, otherwise the structure's defaults apply.

use crate::error::{GridError, GridResult};
use crate::operation::types::MemberId;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Upper bound on `backup_count + async_backup_count` for any structure.
pub const MAX_BACKUP_COUNT: usize = 6;

pub const DEFAULT_PARTITION_COUNT: u32 = 271;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub partition_count: u32,
    /// Concurrent slots for partition-independent operations.
    pub generic_pool_size: usize,
    pub invocation: InvocationConfig,
    pub call_memo: CallMemoConfig,
    pub map: BackupConfig,
    pub queue: QueueConfig,
    pub ringbuffer: RingbufferConfig,
    pub maps: HashMap<String, BackupConfig>,
    pub queues: HashMap<String, QueueConfig>,
    pub ringbuffers: HashMap<String, RingbufferConfig>,
    /// Static member list used by the node binary to build the initial partition table.
    pub members: Vec<MemberConfig>,
    pub anti_entropy_interval_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationConfig {
    pub max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    pub call_timeout_ms: u64,
    pub backup_ack_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallMemoConfig {
    pub capacity: usize,
    pub ttl_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackupConfig {
    pub backup_count: usize,
    pub async_backup_count: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub backup_count: usize,
    pub async_backup_count: usize,
    /// Zero means unbounded.
    pub max_size: usize,
    /// How long an empty queue may linger before an eviction check destroys it.
    pub empty_ttl_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RingbufferConfig {
    pub backup_count: usize,
    pub async_backup_count: usize,
    pub capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemberConfig {
    pub id: MemberId,
    pub address: SocketAddr,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            partition_count: DEFAULT_PARTITION_COUNT,
            generic_pool_size: 4,
            invocation: InvocationConfig::default(),
            call_memo: CallMemoConfig::default(),
            map: BackupConfig::default(),
            queue: QueueConfig::default(),
            ringbuffer: RingbufferConfig::default(),
            maps: HashMap::new(),
            queues: HashMap::new(),
            ringbuffers: HashMap::new(),
            members: Vec::new(),
            anti_entropy_interval_ms: 5_000,
        }
    }
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_base_delay_ms: 150,
            retry_max_delay_ms: 1_200,
            call_timeout_ms: 30_000,
            backup_ack_timeout_ms: 5_000,
        }
    }
}

impl Default for CallMemoConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_ms: 120_000,
        }
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_count: 1,
            async_backup_count: 0,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backup_count: 1,
            async_backup_count: 0,
            max_size: 0,
            empty_ttl_ms: 0,
        }
    }
}

impl Default for RingbufferConfig {
    fn default() -> Self {
        Self {
            backup_count: 1,
            async_backup_count: 0,
            capacity: 10_000,
        }
    }
}

impl InvocationConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn backup_ack_timeout(&self) -> Duration {
        Duration::from_millis(self.backup_ack_timeout_ms)
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> GridResult<Self> {
        let config: EngineConfig =
            toml::from_str(raw).map_err(|e| GridError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> GridResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GridError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> GridResult<()> {
        if self.partition_count == 0 {
            return Err(GridError::Config("partition_count must be > 0".to_string()));
        }
        if self.invocation.max_attempts == 0 {
            return Err(GridError::Config(
                "invocation.max_attempts must be > 0".to_string(),
            ));
        }
        if self.generic_pool_size == 0 {
            return Err(GridError::Config("generic_pool_size must be > 0".to_string()));
        }

        let mut counts: Vec<(String, usize, usize)> = vec![
            ("map".to_string(), self.map.backup_count, self.map.async_backup_count),
            ("queue".to_string(), self.queue.backup_count, self.queue.async_backup_count),
            (
                "ringbuffer".to_string(),
                self.ringbuffer.backup_count,
                self.ringbuffer.async_backup_count,
            ),
        ];
        counts.extend(
            self.maps
                .iter()
                .map(|(name, c)| (format!("maps.{}", name), c.backup_count, c.async_backup_count)),
        );
        counts.extend(
            self.queues
                .iter()
                .map(|(name, c)| (format!("queues.{}", name), c.backup_count, c.async_backup_count)),
        );
        counts.extend(self.ringbuffers.iter().map(|(name, c)| {
            (format!("ringbuffers.{}", name), c.backup_count, c.async_backup_count)
        }));

        for (name, sync, asynchronous) in counts {
            if sync + asynchronous > MAX_BACKUP_COUNT {
                return Err(GridError::Config(format!(
                    "{}: backup_count + async_backup_count = {} exceeds {}",
                    name,
                    sync + asynchronous,
                    MAX_BACKUP_COUNT
                )));
            }
        }

        for (name, c) in std::iter::once(("ringbuffer", &self.ringbuffer))
            .chain(self.ringbuffers.iter().map(|(n, c)| (n.as_str(), c)))
        {
            if c.capacity == 0 {
                return Err(GridError::Config(format!("{}: capacity must be > 0", name)));
            }
        }

        Ok(())
    }

    pub fn map_config(&self, name: &str) -> BackupConfig {
        self.maps.get(name).copied().unwrap_or(self.map)
    }

    pub fn queue_config(&self, name: &str) -> QueueConfig {
        self.queues.get(name).copied().unwrap_or(self.queue)
    }

    pub fn ringbuffer_config(&self, name: &str) -> RingbufferConfig {
        self.ringbuffers.get(name).copied().unwrap_or(self.ringbuffer)
    }

    /// Largest total backup count any structure may ask for; sizes the partition table.
    pub fn max_total_backups(&self) -> usize {
        let named = self
            .maps
            .values()
            .map(|c| c.backup_count + c.async_backup_count)
            .chain(self.queues.values().map(|c| c.backup_count + c.async_backup_count))
            .chain(
                self.ringbuffers
                    .values()
                    .map(|c| c.backup_count + c.async_backup_count),
            );
        [
            self.map.backup_count + self.map.async_backup_count,
            self.queue.backup_count + self.queue.async_backup_count,
            self.ringbuffer.backup_count + self.ringbuffer.async_backup_count,
        ]
        .into_iter()
        .chain(named)
        .max()
        .unwrap_or(0)
        .min(MAX_BACKUP_COUNT)
    }
}
