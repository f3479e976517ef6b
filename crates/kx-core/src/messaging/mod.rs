//! Message queue abstraction.
//!
//! The pipeline's stream plumbing (scored events in, tiered alerts out)
//! talks to brokers only through [`MessageQueue`]. Consumer groups follow
//! broker semantics: within a group each message is delivered once; across
//! groups every group sees every message.
//!
//! ```text
//!   events.scored ──▶ [alert-manager group] ──▶ alerts.critical / alerts.info
//!                                                  │            │
//!                                   [incident-tracker group]  [dashboard group]
//! ```
//!
//! [`InMemoryMessageQueue`] is the in-process backend used by the default
//! deployment and by tests.

pub mod error;
pub mod memory;
pub mod types;

pub use error::MessageQueueError;
pub use memory::InMemoryMessageQueue;
pub use types::{Message, MessageId, QueueHealth, Subscription};

use async_trait::async_trait;

/// A publish/subscribe message broker.
#[async_trait]
pub trait MessageQueue: Send + Sync + 'static {
    /// Publishes a payload to a topic.
    ///
    /// # Errors
    ///
    /// Returns an error when the broker rejects the publish or is
    /// unreachable.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<MessageId, MessageQueueError>;

    /// Publishes with a routing key. Backends without key support may
    /// ignore the key; the default implementation does.
    async fn publish_with_key(
        &self,
        topic: &str,
        _key: &str,
        payload: &[u8],
    ) -> Result<MessageId, MessageQueueError> {
        self.publish(topic, payload).await
    }

    /// Joins a consumer group on a topic and returns the delivery stream.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Subscription, MessageQueueError>;

    /// Confirms processing of a delivered message.
    async fn acknowledge(
        &self,
        topic: &str,
        message_id: &MessageId,
    ) -> Result<(), MessageQueueError>;

    /// Broker connectivity and backlog.
    async fn health_check(&self) -> Result<QueueHealth, MessageQueueError>;
}
