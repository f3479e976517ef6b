//! In-process message queue.
//!
//! Default broker for single-node deployments and the fixture for every
//! pipeline test. Group semantics match a real broker: each group on a
//! topic sees every message, members within a group share it round-robin.
//! Delivery is at-most-once per group; a member with a full buffer loses
//! the message (counted and logged) rather than blocking publishers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, trace, warn};

use super::error::MessageQueueError;
use super::types::{Message, MessageId, QueueHealth, Subscription};
use super::MessageQueue;

const SUBSCRIPTION_BUFFER: usize = 256;

struct GroupState {
    members: Vec<mpsc::Sender<Message>>,
    /// Round-robin cursor for the next delivery.
    cursor: usize,
}

#[derive(Default)]
pub struct InMemoryMessageQueue {
    /// topic → group → members
    topics: RwLock<HashMap<String, HashMap<String, GroupState>>>,
    acknowledged: RwLock<HashMap<String, HashSet<MessageId>>>,
    message_counter: AtomicU64,
    dropped_messages: AtomicU64,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_message_id(&self) -> MessageId {
        let seq = self.message_counter.fetch_add(1, Ordering::SeqCst);
        MessageId::new(format!("mem-{}-{}", Utc::now().timestamp_millis(), seq))
    }

    /// Total messages published across all topics. Test hook.
    pub fn published_count(&self) -> u64 {
        self.message_counter.load(Ordering::SeqCst)
    }

    /// Messages lost to full subscriber buffers. Test hook.
    pub fn dropped_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::SeqCst)
    }

    pub async fn is_acknowledged(&self, topic: &str, message_id: &MessageId) -> bool {
        self.acknowledged
            .read()
            .await
            .get(topic)
            .is_some_and(|acks| acks.contains(message_id))
    }

    pub async fn acknowledged_count(&self, topic: &str) -> usize {
        self.acknowledged
            .read()
            .await
            .get(topic)
            .map_or(0, |acks| acks.len())
    }

    async fn deliver(&self, topic: &str, key: Option<String>, payload: &[u8]) -> MessageId {
        let id = self.next_message_id();
        let mut topics = self.topics.write().await;
        let Some(groups) = topics.get_mut(topic) else {
            // No subscriber yet; publishing into the void is not an error.
            trace!(topic, "published message with no subscribers");
            return id;
        };

        for (group, state) in groups.iter_mut() {
            // Drop members whose receiver side is gone.
            state.members.retain(|member| !member.is_closed());
            if state.members.is_empty() {
                continue;
            }
            let message = Message {
                id: id.clone(),
                topic: topic.to_string(),
                key: key.clone(),
                payload: payload.to_vec(),
                timestamp: Utc::now(),
            };
            state.cursor %= state.members.len();
            let member = &state.members[state.cursor];
            state.cursor = (state.cursor + 1) % state.members.len();
            if member.try_send(message).is_err() {
                let dropped = self.dropped_messages.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(topic, group, dropped, "subscriber buffer full, message dropped");
            }
        }
        id
    }
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<MessageId, MessageQueueError> {
        if topic.is_empty() {
            return Err(MessageQueueError::invalid_topic("topic must not be empty"));
        }
        Ok(self.deliver(topic, None, payload).await)
    }

    async fn publish_with_key(
        &self,
        topic: &str,
        key: &str,
        payload: &[u8],
    ) -> Result<MessageId, MessageQueueError> {
        if topic.is_empty() {
            return Err(MessageQueueError::invalid_topic("topic must not be empty"));
        }
        Ok(self.deliver(topic, Some(key.to_string()), payload).await)
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Subscription, MessageQueueError> {
        if topic.is_empty() {
            return Err(MessageQueueError::invalid_topic("topic must not be empty"));
        }
        if group.is_empty() {
            return Err(MessageQueueError::invalid_group("group must not be empty"));
        }

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let mut topics = self.topics.write().await;
        let groups = topics.entry(topic.to_string()).or_default();
        let state = groups.entry(group.to_string()).or_insert_with(|| GroupState {
            members: Vec::new(),
            cursor: 0,
        });
        state.members.push(tx);
        debug!(topic, group, members = state.members.len(), "subscriber joined");
        Ok(Subscription::new(rx))
    }

    async fn acknowledge(
        &self,
        topic: &str,
        message_id: &MessageId,
    ) -> Result<(), MessageQueueError> {
        let mut acks = self.acknowledged.write().await;
        acks.entry(topic.to_string())
            .or_default()
            .insert(message_id.clone());
        Ok(())
    }

    async fn health_check(&self) -> Result<QueueHealth, MessageQueueError> {
        let topics = self.topics.read().await;
        let consumer_count = topics
            .values()
            .flat_map(|groups| groups.values())
            .map(|state| state.members.len() as u32)
            .sum();
        Ok(QueueHealth {
            connected: true,
            pending_messages: 0,
            consumer_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn recv_soon(sub: &mut Subscription) -> Message {
        timeout(Duration::from_secs(1), sub.recv())
            .await
            .expect("timed out waiting for message")
            .expect("subscription closed")
    }

    #[tokio::test]
    async fn publish_reaches_a_subscriber() {
        let queue = InMemoryMessageQueue::new();
        let mut sub = queue.subscribe("events.scored", "g1").await.unwrap();

        let id = queue.publish("events.scored", b"payload").await.unwrap();
        let msg = recv_soon(&mut sub).await;
        assert_eq!(msg.id, id);
        assert_eq!(msg.payload, b"payload");
        assert_eq!(msg.key, None);
    }

    #[tokio::test]
    async fn key_is_carried_through() {
        let queue = InMemoryMessageQueue::new();
        let mut sub = queue.subscribe("alerts.critical", "g1").await.unwrap();
        queue
            .publish_with_key("alerts.critical", "api", b"x")
            .await
            .unwrap();
        assert_eq!(recv_soon(&mut sub).await.key.as_deref(), Some("api"));
    }

    #[tokio::test]
    async fn each_group_sees_every_message() {
        let queue = InMemoryMessageQueue::new();
        let mut incidents = queue.subscribe("alerts.critical", "incident-tracker").await.unwrap();
        let mut dashboard = queue.subscribe("alerts.critical", "dashboard").await.unwrap();

        queue.publish("alerts.critical", b"alert").await.unwrap();
        assert_eq!(recv_soon(&mut incidents).await.payload, b"alert");
        assert_eq!(recv_soon(&mut dashboard).await.payload, b"alert");
    }

    #[tokio::test]
    async fn members_of_one_group_share_messages() {
        let queue = InMemoryMessageQueue::new();
        let mut a = queue.subscribe("t", "workers").await.unwrap();
        let mut b = queue.subscribe("t", "workers").await.unwrap();

        queue.publish("t", b"1").await.unwrap();
        queue.publish("t", b"2").await.unwrap();

        // Round-robin: one message each, in some order.
        let first = recv_soon(&mut a).await;
        let second = recv_soon(&mut b).await;
        assert_ne!(first.payload, second.payload);
        assert!(a.try_recv().is_err());
        assert!(b.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let queue = InMemoryMessageQueue::new();
        assert!(queue.publish("nobody.listens", b"x").await.is_ok());
        assert_eq!(queue.published_count(), 1);
    }

    #[tokio::test]
    async fn empty_topic_and_group_are_rejected() {
        let queue = InMemoryMessageQueue::new();
        assert!(matches!(
            queue.publish("", b"x").await,
            Err(MessageQueueError::InvalidTopic(_))
        ));
        assert!(matches!(
            queue.subscribe("t", "").await,
            Err(MessageQueueError::InvalidGroup(_))
        ));
    }

    #[tokio::test]
    async fn acknowledgements_are_recorded() {
        let queue = InMemoryMessageQueue::new();
        let id = queue.publish("t", b"x").await.unwrap();
        assert!(!queue.is_acknowledged("t", &id).await);

        queue.acknowledge("t", &id).await.unwrap();
        assert!(queue.is_acknowledged("t", &id).await);
        assert_eq!(queue.acknowledged_count("t").await, 1);

        // Duplicate acks are harmless.
        queue.acknowledge("t", &id).await.unwrap();
        assert_eq!(queue.acknowledged_count("t").await, 1);
    }

    #[tokio::test]
    async fn health_counts_consumers() {
        let queue = Arc::new(InMemoryMessageQueue::new());
        let _a = queue.subscribe("t", "g1").await.unwrap();
        let _b = queue.subscribe("t", "g2").await.unwrap();
        let health = queue.health_check().await.unwrap();
        assert!(health.connected);
        assert_eq!(health.consumer_count, 2);
        assert!(health.is_healthy());
    }

    #[tokio::test]
    async fn dropped_subscriber_is_pruned() {
        let queue = InMemoryMessageQueue::new();
        let sub = queue.subscribe("t", "g1").await.unwrap();
        drop(sub);

        queue.publish("t", b"x").await.unwrap();
        let health = queue.health_check().await.unwrap();
        assert_eq!(health.consumer_count, 0);
    }
}
