//! Proxy Module Tests
//!
//! Typed calls from every member of a small loopback cluster must see the same structures.

#[cfg(test)]
mod tests {
    use crate::config::EngineConfig;
    use crate::node::{LoggingLifecycle, NodeEngine};
    use crate::operation::types::MemberId;
    use crate::partition::PartitionTable;
    use crate::transport::LoopbackTransport;

    use serde::{Deserialize, Serialize};
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Book {
        title: String,
        pages: u32,
    }

    fn book(title: &str, pages: u32) -> Book {
        Book {
            title: title.to_string(),
            pages,
        }
    }

    async fn three_nodes() -> Vec<Arc<NodeEngine>> {
        let transport = LoopbackTransport::new();
        let mut config = EngineConfig {
            partition_count: 16,
            ..Default::default()
        };
        config.queue.max_size = 3;
        config.ringbuffer.capacity = 4;

        let ids = ["n1", "n2", "n3"];
        let nodes: Vec<Arc<NodeEngine>> = ids
            .iter()
            .map(|id| {
                let node = NodeEngine::new(
                    MemberId::from(*id),
                    config.clone(),
                    transport.clone(),
                    Arc::new(LoggingLifecycle),
                )
                .unwrap();
                transport.register(&node);
                node
            })
            .collect();

        let members: Vec<MemberId> = ids.iter().map(|id| MemberId::from(*id)).collect();
        let table = PartitionTable::assign(1, 16, &members, 1).unwrap();
        for node in &nodes {
            node.apply_table(table.clone()).await.unwrap();
        }
        nodes
    }

    // ============================================================
    // MAP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_map_visible_from_every_member() {
        // ARRANGE
        let nodes = three_nodes().await;
        let writer = nodes[0].map::<String, Book>("books");

        // ACT
        for n in 0..10 {
            let previous = writer
                .put(&format!("isbn-{}", n), &book("Dune", 400 + n))
                .await
                .unwrap();
            assert_eq!(previous, None);
        }

        // ASSERT
        for node in &nodes {
            let reader = node.map::<String, Book>("books");
            assert_eq!(reader.size().await.unwrap(), 10);
            assert_eq!(
                reader.get(&"isbn-3".to_string()).await.unwrap(),
                Some(book("Dune", 403))
            );
        }
    }

    #[tokio::test]
    async fn test_map_conditional_calls() {
        // ARRANGE
        let nodes = three_nodes().await;
        let map = nodes[1].map::<String, u32>("counters");
        let key = "hits".to_string();
        map.put(&key, &1).await.unwrap();

        // ACT & ASSERT
        assert_eq!(map.put_if_absent(&key, &5).await.unwrap(), Some(1));
        assert_eq!(map.put(&key, &2).await.unwrap(), Some(1));
        assert!(!map.remove_if_equals(&key, &1).await.unwrap());
        assert!(map.contains_key(&key).await.unwrap());
        assert!(map.remove_if_equals(&key, &2).await.unwrap());
        assert!(!map.contains_key(&key).await.unwrap());
        assert_eq!(map.remove(&key).await.unwrap(), None);
    }

    // ============================================================
    // QUEUE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_queue_is_fifo_and_bounded() {
        let nodes = three_nodes().await;
        let producer = nodes[0].queue::<String>("jobs");
        let consumer = nodes[2].queue::<String>("jobs");

        for job in ["a", "b", "c"] {
            assert!(producer.offer(&job.to_string()).await.unwrap());
        }
        assert!(!producer.offer(&"d".to_string()).await.unwrap());
        assert_eq!(consumer.size().await.unwrap(), 3);

        assert_eq!(consumer.peek().await.unwrap().as_deref(), Some("a"));
        assert_eq!(consumer.poll().await.unwrap().as_deref(), Some("a"));
        assert_eq!(consumer.poll().await.unwrap().as_deref(), Some("b"));
        assert_eq!(consumer.poll().await.unwrap().as_deref(), Some("c"));
        assert_eq!(consumer.poll().await.unwrap(), None);
    }

    // ============================================================
    // RINGBUFFER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_ringbuffer_overwrites_oldest() {
        // ARRANGE
        let nodes = three_nodes().await;
        let ring = nodes[1].ringbuffer::<u32>("events");
        assert_eq!(ring.tail_sequence().await.unwrap(), -1);

        // ACT
        for value in 0..6u32 {
            assert_eq!(ring.add(&value).await.unwrap(), value as i64);
        }

        // ASSERT
        assert_eq!(ring.tail_sequence().await.unwrap(), 5);
        assert_eq!(ring.read_one(5).await.unwrap(), Some(5));
        assert_eq!(ring.read_one(2).await.unwrap(), Some(2));
        assert_eq!(ring.read_one(6).await.unwrap(), None);
        // sequences 0 and 1 were overwritten
        assert!(ring.read_one(1).await.is_err());
    }
}
