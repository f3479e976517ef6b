//! Message types shared by all queue backends.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Broker-assigned message identifier, used for acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A message as delivered to a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub topic: String,
    /// Partition/routing key; the pipeline keys alert streams by service
    /// name so one service's alerts stay ordered.
    pub key: Option<String>,
    pub payload: Vec<u8>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// An active subscription's receiving half.
pub struct Subscription {
    pub receiver: mpsc::Receiver<Message>,
}

impl Subscription {
    pub fn new(receiver: mpsc::Receiver<Message>) -> Self {
        Self { receiver }
    }

    pub async fn recv(&mut self) -> Option<Message> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Result<Message, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Broker connectivity and backlog, as reported by `health_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueHealth {
    pub connected: bool,
    pub pending_messages: u64,
    pub consumer_count: u32,
}

impl QueueHealth {
    pub fn healthy() -> Self {
        Self {
            connected: true,
            pending_messages: 0,
            consumer_count: 0,
        }
    }

    pub fn disconnected() -> Self {
        Self {
            connected: false,
            pending_messages: 0,
            consumer_count: 0,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.connected && self.pending_messages < 10_000
    }
}

impl Default for QueueHealth {
    fn default() -> Self {
        Self::disconnected()
    }
}
