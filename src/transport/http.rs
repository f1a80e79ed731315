use super::Transport;
use super::protocol::ENDPOINT_PARTITION;
use crate::error::{GridError, GridResult};
use crate::invocation::protocol::ENDPOINT_OPERATION;
use crate::operation::types::MemberId;
use crate::replication::protocol::ENDPOINT_BACKUP;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::time::Duration;

/// Sends frames to peers over HTTP.
///
/// Each request is a single attempt; retrying is up to the invocation engine, which
/// re-resolves the owner before trying again.
pub struct HttpTransport {
    http_client: reqwest::Client,
    directory: DashMap<MemberId, SocketAddr>,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            directory: DashMap::new(),
            request_timeout,
        }
    }

    pub fn register(&self, member: MemberId, address: SocketAddr) {
        tracing::debug!("Member {} at {}", member, address);
        self.directory.insert(member, address);
    }

    pub fn forget(&self, member: &MemberId) {
        self.directory.remove(member);
    }

    fn address_of(&self, member: &MemberId) -> GridResult<SocketAddr> {
        self.directory
            .get(member)
            .map(|entry| *entry.value())
            .ok_or_else(|| GridError::MemberUnreachable {
                member: member.clone(),
                reason: "no known address".to_string(),
            })
    }

    async fn post(&self, member: &MemberId, path: &str, payload: Bytes) -> GridResult<Bytes> {
        let addr = self.address_of(member)?;
        let response = self
            .http_client
            .post(format!("http://{}{}", addr, path))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(payload)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| unreachable(member, e))?;
        read_body(member, response).await
    }

    async fn get(&self, member: &MemberId, path: String) -> GridResult<Bytes> {
        let addr = self.address_of(member)?;
        let response = self
            .http_client
            .get(format!("http://{}{}", addr, path))
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| unreachable(member, e))?;
        read_body(member, response).await
    }
}

fn unreachable(member: &MemberId, e: reqwest::Error) -> GridError {
    GridError::MemberUnreachable {
        member: member.clone(),
        reason: e.to_string(),
    }
}

async fn read_body(member: &MemberId, response: reqwest::Response) -> GridResult<Bytes> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GridError::Operation(format!(
            "{} answered {}: {}",
            member, status, body
        )));
    }
    response.bytes().await.map_err(|e| unreachable(member, e))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_operation(&self, member: &MemberId, payload: Bytes) -> GridResult<Bytes> {
        self.post(member, ENDPOINT_OPERATION, payload).await
    }

    async fn send_backup(&self, member: &MemberId, payload: Bytes) -> GridResult<Bytes> {
        self.post(member, ENDPOINT_BACKUP, payload).await
    }

    async fn fetch_partition(&self, member: &MemberId, partition_id: u32) -> GridResult<Bytes> {
        self.get(member, format!("{}/{}", ENDPOINT_PARTITION, partition_id))
            .await
    }
}
