//! Transport Module
//!
//! Point-to-point delivery of encoded operations, backups and partition snapshots between
//! members. The engine only sees the [`Transport`] trait:
//!
//! - [`http::HttpTransport`] posts frames to the peer's axum router (see [`handlers`]).
//! - [`loopback::LoopbackTransport`] delivers in process to registered engines and can inject
//!   faults (unreachable members, lost responses, slow backups) for cluster tests.
//!
//! Every failure to reach a peer is reported as `MemberUnreachable`, which the invocation
//! layer treats as retryable.

pub mod handlers;
pub mod http;
pub mod loopback;
pub mod protocol;

pub use http::HttpTransport;
pub use loopback::LoopbackTransport;

use crate::error::GridResult;
use crate::operation::types::MemberId;

use async_trait::async_trait;
use bytes::Bytes;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers an encoded `OperationRequest`; returns the encoded `ResponseEnvelope`.
    async fn send_operation(&self, member: &MemberId, payload: Bytes) -> GridResult<Bytes>;

    /// Delivers an encoded `BackupRequest`; returns the encoded `BackupAck`.
    async fn send_backup(&self, member: &MemberId, payload: Bytes) -> GridResult<Bytes>;

    /// Fetches the encoded snapshot of one partition from its owner.
    async fn fetch_partition(&self, member: &MemberId, partition_id: u32) -> GridResult<Bytes>;
}

#[cfg(test)]
mod tests;
