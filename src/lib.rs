//! Partitioned Data Grid Engine
//!
//! This library crate implements the operation execution and primary-backup replication core
//! of a distributed in-memory data grid. It serves as the foundation for the node binary
//! (`main.rs`).
//!
//! ## Architecture Modules
//! Every read or write against a distributed map, queue or ring buffer is an operation that
//! runs on the member owning the key's partition:
//!
//! - **`serialization`**: Binary codec and the `(factory_id, type_id)` registry used to ship
//!   operations between members without reflection.
//! - **`partition`**: Key hashing, the versioned partition table and per-partition
//!   single-writer lanes.
//! - **`container`**: Per-partition state (record stores, queues, ring buffers) and snapshots.
//! - **`operation`**: The operation families, their backup counterparts and the registry.
//! - **`step`**: The resumable step engine that runs an operation against its partition.
//! - **`invocation`**: Caller side: routing, retries with backoff, call memo for idempotency.
//! - **`replication`**: Sync/async backup fan-out and replica version ordering.
//! - **`events`**: Listener registry fed by mutating steps.
//! - **`transport`**: HTTP and in-process transports plus the axum handlers.
//! - **`node`**: `NodeEngine`, which wires the pieces into one member.
//! - **`proxy`**: Typed facades (`DistributedMap`, `DistributedQueue`, `Ringbuffer`).

pub mod config;
pub mod container;
pub mod error;
pub mod events;
pub mod invocation;
pub mod node;
pub mod operation;
pub mod partition;
pub mod proxy;
pub mod replication;
pub mod serialization;
pub mod step;
pub mod transport;
