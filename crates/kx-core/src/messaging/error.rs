//! Message queue error type.

use thiserror::Error;

/// Errors from queue backends. `Clone` so a single failure can be fanned
/// out to every consumer that needs to observe it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessageQueueError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription closed: {0}")]
    SubscriptionClosed(String),

    #[error("Invalid topic: {0}")]
    InvalidTopic(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid consumer group: {0}")]
    InvalidGroup(String),

    #[error("Queue error: {0}")]
    Unknown(String),
}

impl MessageQueueError {
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    pub fn subscription_closed(msg: impl Into<String>) -> Self {
        Self::SubscriptionClosed(msg.into())
    }

    pub fn invalid_topic(msg: impl Into<String>) -> Self {
        Self::InvalidTopic(msg.into())
    }

    pub fn message_not_found(msg: impl Into<String>) -> Self {
        Self::MessageNotFound(msg.into())
    }

    pub fn invalid_group(msg: impl Into<String>) -> Self {
        Self::InvalidGroup(msg.into())
    }

    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Transient errors are worth retrying; the rest are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::SubscriptionClosed(_)
        )
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::SubscriptionClosed(_) => "subscription_closed",
            Self::InvalidTopic(_) => "invalid_topic",
            Self::MessageNotFound(_) => "message_not_found",
            Self::InvalidGroup(_) => "invalid_group",
            Self::Unknown(_) => "unknown",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(MessageQueueError::connection("down").is_transient());
        assert!(MessageQueueError::timeout("slow").is_transient());
        assert!(MessageQueueError::subscription_closed("gone").is_transient());
        assert!(!MessageQueueError::invalid_topic("bad").is_transient());
        assert!(!MessageQueueError::serialization("bad json").is_transient());
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(MessageQueueError::connection("x").kind(), "connection");
        assert_eq!(MessageQueueError::unknown("x").kind(), "unknown");
    }
}
