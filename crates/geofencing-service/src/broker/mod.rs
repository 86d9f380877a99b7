//! Topic broker: named channels bound to message producers.
//!
//! Publishing hands a [`MessageContext`] to the topic's producer, which turns
//! it into a [`UasZonesUpdate`] for the topic's subscribers.

pub mod producer;
pub mod publisher;

use async_trait::async_trait;
use geofencing_core::{UasZone, UasZonesUpdate};
use std::sync::Arc;
use thiserror::Error;

pub use producer::UasZonesUpdatesProducer;
pub use publisher::TopicPublisher;

/// What happened, as handed to a topic's producer.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContext {
    /// Full snapshot of the zones currently matching the topic's filter
    Snapshot,
    ZoneCreated(UasZone),
    ZoneDeleted { identifier: String },
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("topic {0} is not registered")]
    UnknownTopic(String),
    #[error("producer for topic {topic} failed: {reason}")]
    Producer { topic: String, reason: String },
    #[error("failed to encode message for topic {topic}: {source}")]
    Encode {
        topic: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("broker unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn produce(&self, context: &MessageContext) -> anyhow::Result<UasZonesUpdate>;
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Register a topic, or rebind an existing one to a new producer.
    async fn add_topic(&self, name: &str, producer: Arc<dyn MessageProducer>) -> Result<(), BrokerError>;

    async fn publish_topic(&self, name: &str, context: MessageContext) -> Result<(), BrokerError>;

    /// Drop a topic and its producer. Returns false when it was not registered.
    async fn remove_topic(&self, name: &str) -> Result<bool, BrokerError>;
}
