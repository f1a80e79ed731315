//! Transport Module Tests
//!
//! ## Test Scopes
//! - **Loopback**: delivery, injected faults, snapshot fetch.
//! - **Http**: unknown members are unreachable without touching the network.
//! - **Handlers**: table feed and map endpoints called directly.

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::container::PartitionSnapshot;
    use crate::error::GridError;
    use crate::invocation::protocol::{OperationRequest, ResponseEnvelope};
    use crate::node::{LoggingLifecycle, NodeEngine};
    use crate::operation::types::{CallerId, MemberId, OpValue};
    use crate::operation::{MapPut, Operation};
    use crate::partition::PartitionTable;
    use crate::serialization::Data;
    use crate::transport::handlers::{
        handle_get_table, handle_map_get, handle_map_put, handle_map_remove, handle_put_table,
    };
    use crate::transport::protocol::MapPutRequest;
    use crate::transport::{HttpTransport, LoopbackTransport, Transport};

    use axum::Json;
    use axum::extract::{Extension, Path};
    use axum::http::StatusCode;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::time::Duration;

    async fn single_node() -> (Arc<LoopbackTransport>, Arc<NodeEngine>) {
        let transport = LoopbackTransport::new();
        let config = EngineConfig {
            partition_count: 4,
            ..Default::default()
        };
        let node = NodeEngine::new(
            MemberId::from("solo"),
            config,
            transport.clone(),
            Arc::new(LoggingLifecycle),
        )
        .unwrap();
        transport.register(&node);
        let table = PartitionTable::assign(1, 4, &[MemberId::from("solo")], 0).unwrap();
        node.apply_table(table).await.unwrap();
        (transport, node)
    }

    fn put_request(node: &NodeEngine, call_id: u64, key: &str) -> Bytes {
        let partition = node.partitions().partition_for_key(&Data::from(key));
        OperationRequest {
            caller: CallerId {
                member: MemberId::from("remote"),
                incarnation: 1,
                call_id,
            },
            partition_id: Some(partition),
            table_version: 1,
            operation: Operation::from(MapPut::new("m", Data::from(key), Data::from("v"))),
        }
        .encode(node.registry())
    }

    // ============================================================
    // LOOPBACK TESTS
    // ============================================================

    #[tokio::test]
    async fn test_unregistered_member_is_unreachable() {
        let transport = LoopbackTransport::new();

        let result = transport
            .send_operation(&MemberId::from("ghost"), Bytes::new())
            .await;

        assert!(matches!(result, Err(GridError::MemberUnreachable { .. })));
    }

    #[tokio::test]
    async fn test_delivery_and_link_down() {
        // ARRANGE
        let (transport, node) = single_node().await;
        let solo = MemberId::from("solo");

        // ACT
        transport.set_unreachable(&solo, true);
        let down = transport.send_operation(&solo, put_request(&node, 1, "k")).await;
        transport.set_unreachable(&solo, false);
        let up = transport.send_operation(&solo, put_request(&node, 2, "k")).await;

        // ASSERT
        assert!(matches!(down, Err(GridError::MemberUnreachable { .. })));
        let envelope = ResponseEnvelope::decode(up.unwrap()).unwrap();
        assert_eq!(envelope.call_id, 2);
        assert_eq!(envelope.result.unwrap().value, OpValue::Null);
        assert_eq!(transport.operations_sent(), 1);
    }

    #[tokio::test]
    async fn test_dropped_response_still_applies() {
        // ARRANGE
        let (transport, node) = single_node().await;
        let solo = MemberId::from("solo");
        transport.drop_next_responses(&solo, 1);

        // ACT
        let lost = transport.send_operation(&solo, put_request(&node, 7, "k")).await;

        // ASSERT
        assert!(matches!(lost, Err(GridError::MemberUnreachable { .. })));
        let caller = CallerId {
            member: MemberId::from("remote"),
            incarnation: 1,
            call_id: 7,
        };
        assert!(node.executor().caller_applied(&caller));
    }

    #[tokio::test]
    async fn test_garbage_frame_gets_error_envelope() {
        let (transport, _node) = single_node().await;

        let reply = transport
            .send_operation(&MemberId::from("solo"), Bytes::from_static(&[1, 2, 3]))
            .await
            .unwrap();

        let envelope = ResponseEnvelope::decode(reply).unwrap();
        assert_eq!(envelope.call_id, 0);
        assert!(matches!(envelope.result, Err(GridError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_fetch_partition_returns_snapshot() {
        // ARRANGE
        let (transport, node) = single_node().await;
        transport
            .send_operation(&MemberId::from("solo"), put_request(&node, 1, "k"))
            .await
            .unwrap();
        let partition = node.partitions().partition_for_key(&Data::from("k"));

        // ACT
        let bytes = transport
            .fetch_partition(&MemberId::from("solo"), partition)
            .await
            .unwrap();

        // ASSERT
        let snapshot = PartitionSnapshot::from_bytes(bytes).unwrap();
        assert_eq!(snapshot.partition_id, partition);
        assert_eq!(snapshot.maps.len(), 1);
        assert_eq!(snapshot.maps[0].0, "m");
    }

    // ============================================================
    // HTTP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_http_unknown_member_is_unreachable() {
        let transport = HttpTransport::new(Duration::from_millis(100));
        transport.register(MemberId::from("known"), "127.0.0.1:1".parse().unwrap());
        transport.forget(&MemberId::from("known"));

        let result = transport.send_backup(&MemberId::from("known"), Bytes::new()).await;

        assert!(matches!(
            result,
            Err(GridError::MemberUnreachable { ref reason, .. }) if reason == "no known address"
        ));
    }

    // ============================================================
    // HANDLER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_table_feed_ignores_older_tables() {
        let (_transport, node) = single_node().await;
        let newer = PartitionTable::assign(5, 4, &[MemberId::from("solo")], 0).unwrap();
        let older = PartitionTable::assign(3, 4, &[MemberId::from("solo")], 0).unwrap();

        let first = handle_put_table(Extension(node.clone()), Json(newer)).await.unwrap();
        let second = handle_put_table(Extension(node.clone()), Json(older)).await.unwrap();

        assert!(first.0.applied);
        assert!(!second.0.applied);
        assert_eq!(second.0.version, 5);
        assert_eq!(handle_get_table(Extension(node)).await.0.version(), 5);
    }

    #[tokio::test]
    async fn test_table_with_wrong_partition_count_rejected() {
        let (_transport, node) = single_node().await;
        let table = PartitionTable::assign(2, 9, &[MemberId::from("solo")], 0).unwrap();

        let result = handle_put_table(Extension(node), Json(table)).await;

        assert_eq!(result.unwrap_err().0, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_map_endpoints() {
        // ARRANGE
        let (_transport, node) = single_node().await;
        let path = || Path(("books".to_string(), "dune".to_string()));

        // ACT
        let missing = handle_map_get(Extension(node.clone()), path()).await;
        let put = handle_map_put(
            Extension(node.clone()),
            path(),
            Json(MapPutRequest {
                value_json: r#"{"author":"Herbert"}"#.to_string(),
            }),
        )
        .await;
        let found = handle_map_get(Extension(node.clone()), path()).await;
        let removed = handle_map_remove(Extension(node.clone()), path()).await;
        let gone = handle_map_get(Extension(node), path()).await;

        // ASSERT
        assert_eq!(missing.0, StatusCode::NOT_FOUND);
        assert_eq!(put.0, StatusCode::OK);
        assert_eq!(put.1.0.value_json, None);
        assert_eq!(found.0, StatusCode::OK);
        assert_eq!(
            found.1.0.value_json.as_deref(),
            Some(r#"{"author":"Herbert"}"#)
        );
        assert_eq!(removed.0, StatusCode::OK);
        assert_eq!(gone.0, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_map_put_rejects_bad_json() {
        let (_transport, node) = single_node().await;

        let (status, body) = handle_map_put(
            Extension(node),
            Path(("books".to_string(), "dune".to_string())),
            Json(MapPutRequest {
                value_json: "{not json".to_string(),
            }),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0.warnings.len(), 1);
    }
}
