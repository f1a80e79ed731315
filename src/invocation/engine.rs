use super::protocol::{InvocationResponse, OperationRequest, OperationResponse, ResponseEnvelope};
use super::retry::RetryPolicy;
use crate::config::InvocationConfig;
use crate::error::{GridError, GridResult};
use crate::node::executor::OperationExecutor;
use crate::operation::types::{CallId, CallIdSequence, CallerId, MemberId};
use crate::operation::{Operation, OperationRegistry, Target};
use crate::partition::PartitionService;
use crate::transport::Transport;

use std::sync::Arc;
use std::time::Duration;

/// Sends operations to partition owners and drives retries.
pub struct InvocationEngine {
    member: MemberId,
    partitions: Arc<PartitionService>,
    executor: Arc<OperationExecutor>,
    transport: Arc<dyn Transport>,
    registry: Arc<OperationRegistry>,
    retry: RetryPolicy,
    call_timeout: Duration,
    incarnation: u64,
    call_ids: CallIdSequence,
}

impl InvocationEngine {
    pub fn new(
        member: MemberId,
        partitions: Arc<PartitionService>,
        executor: Arc<OperationExecutor>,
        transport: Arc<dyn Transport>,
        registry: Arc<OperationRegistry>,
        config: &InvocationConfig,
    ) -> Self {
        Self {
            member,
            partitions,
            executor,
            transport,
            registry,
            retry: RetryPolicy::new(config),
            call_timeout: config.call_timeout(),
            incarnation: rand::random(),
            call_ids: CallIdSequence::default(),
        }
    }

    pub fn incarnation(&self) -> u64 {
        self.incarnation
    }

    pub async fn invoke(&self, operation: Operation) -> GridResult<InvocationResponse> {
        let call_id = self.call_ids.next();
        let mut attempts = 0;

        let outcome = tokio::time::timeout(
            self.call_timeout,
            self.invoke_with_retry(call_id, &operation, &mut attempts),
        )
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Call {} ({}) hit its {:?} deadline after {} attempt(s)",
                    call_id,
                    operation.name(),
                    self.call_timeout,
                    attempts
                );
                Err(GridError::OperationTimeout {
                    operation: operation.name().to_string(),
                    attempts,
                })
            }
        }
    }

    async fn invoke_with_retry(
        &self,
        call_id: CallId,
        operation: &Operation,
        attempts: &mut usize,
    ) -> GridResult<InvocationResponse> {
        let mut last_error = None;

        for attempt in 1..=self.retry.max_attempts {
            *attempts = attempt;
            match self.attempt(call_id, operation).await {
                Ok(response) => {
                    return Ok(InvocationResponse {
                        call_id,
                        value: response.value,
                        backups: response.backups,
                    });
                }
                Err(e) if e.is_retryable() => {
                    tracing::warn!(
                        "Call {} ({}) attempt {}/{} failed: {}",
                        call_id,
                        operation.name(),
                        attempt,
                        self.retry.max_attempts,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_after(attempt)).await;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(match last_error {
            Some(GridError::MemberUnreachable { member, .. }) => GridError::MemberLeft(member),
            _ => GridError::OperationTimeout {
                operation: operation.name().to_string(),
                attempts: *attempts,
            },
        })
    }

    /// One routing decision against the current table snapshot.
    async fn attempt(&self, call_id: CallId, operation: &Operation) -> GridResult<OperationResponse> {
        let caller = CallerId {
            member: self.member.clone(),
            incarnation: self.incarnation,
            call_id,
        };

        let (owner, partition_id, table_version) = match operation.target() {
            Target::Generic(_) => (self.member.clone(), None, self.partitions.version()),
            Target::Partition(op) => {
                let partition_id = self.partitions.resolve(&op.partition_key())?;
                let table = self.partitions.current();
                let owner = table.owner_of(partition_id, table.version())?;
                (owner, Some(partition_id), table.version())
            }
        };

        let request = OperationRequest {
            caller,
            partition_id,
            table_version,
            operation: operation.clone(),
        };

        if owner == self.member {
            tracing::trace!("Call {} runs locally", call_id);
            return self.executor.execute_detached(request).await;
        }

        tracing::trace!("Call {} sent to {}", call_id, owner);
        let reply = self
            .transport
            .send_operation(&owner, request.encode(&self.registry))
            .await?;
        let envelope = ResponseEnvelope::decode(reply)?;
        if envelope.call_id != call_id {
            return Err(GridError::Serialization(format!(
                "response for call {} arrived for call {}",
                envelope.call_id, call_id
            )));
        }
        envelope.result
    }
}
