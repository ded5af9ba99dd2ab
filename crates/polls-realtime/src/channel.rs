//! Realtime channel subscription contract
//!
//! The transport itself (socket handling, heartbeats, join/leave frames) is
//! provided by the implementor. The engine only relies on the operations of
//! [`ChannelSubscriber`] and on raw [`ChannelMessage`]s arriving in order per
//! subscription.

use serde_json::Value;
use tokio::sync::mpsc;

use polls_core::prelude::*;

/// A table channel, addressed as `realtime:<schema>:<table>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTopic {
    schema: String,
    table: String,
}

impl ChannelTopic {
    pub fn table(table: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    /// Full topic name as used on the wire
    pub fn name(&self) -> String {
        format!("realtime:{}:{}", self.schema, self.table)
    }
}

impl std::fmt::Display for ChannelTopic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "realtime:{}:{}", self.schema, self.table)
    }
}

/// A raw, undecoded message delivered on a channel
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub topic: String,
    pub payload: Value,
}

/// An active subscription. Messages stop once the topic is unsubscribed or
/// the transport disconnects.
#[derive(Debug)]
pub struct Subscription {
    pub topic: ChannelTopic,
    pub receiver: mpsc::Receiver<ChannelMessage>,
}

/// Transport-level operations the connection lifecycle drives
#[trait_variant::make(ChannelSubscriber: Send)]
pub trait LocalChannelSubscriber {
    /// Open the transport connection
    async fn connect(&self) -> Result<()>;

    /// Close the transport connection, dropping any remaining channels
    async fn disconnect(&self) -> Result<()>;

    /// Join a channel. Subscribing an already joined topic replaces the
    /// previous subscription.
    async fn subscribe(&self, topic: &ChannelTopic) -> Result<Subscription>;

    /// Leave a channel
    async fn unsubscribe(&self, topic: &ChannelTopic) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_name() {
        let topic = ChannelTopic::table("polls", "public");
        assert_eq!(topic.name(), "realtime:public:polls");
        assert_eq!(topic.to_string(), topic.name());
        assert_eq!(topic.table_name(), "polls");
        assert_eq!(topic.schema(), "public");
    }

    #[test]
    fn test_topic_equality() {
        assert_eq!(
            ChannelTopic::table("options", "public"),
            ChannelTopic::table("options", "public")
        );
        assert_ne!(
            ChannelTopic::table("options", "public"),
            ChannelTopic::table("options", "audit")
        );
    }
}
