//! In-process broker backed by one broadcast channel per topic.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{Broker, BrokerError, MessageContext, MessageProducer};

const DEFAULT_CHANNEL_CAPACITY: usize = 256;

struct Topic {
    producer: Arc<dyn MessageProducer>,
    sender: broadcast::Sender<String>,
}

/// Delivers produced messages, serialized as JSON, to local receivers.
pub struct TopicPublisher {
    topics: DashMap<String, Topic>,
    capacity: usize,
}

impl TopicPublisher {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Receive every message published on `name` from now on.
    pub fn subscribe(&self, name: &str) -> Option<broadcast::Receiver<String>> {
        self.topics.get(name).map(|topic| topic.sender.subscribe())
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

impl Default for TopicPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broker for TopicPublisher {
    async fn add_topic(&self, name: &str, producer: Arc<dyn MessageProducer>) -> Result<(), BrokerError> {
        self.topics
            .entry(name.to_string())
            .and_modify(|topic| topic.producer = producer.clone())
            .or_insert_with(|| Topic {
                producer: producer.clone(),
                sender: broadcast::channel(self.capacity).0,
            });
        debug!("Topic {} registered", name);
        Ok(())
    }

    async fn publish_topic(&self, name: &str, context: MessageContext) -> Result<(), BrokerError> {
        // Clone out of the map so no shard lock is held across the producer await.
        let (producer, sender) = match self.topics.get(name) {
            Some(topic) => (topic.producer.clone(), topic.sender.clone()),
            None => return Err(BrokerError::UnknownTopic(name.to_string())),
        };

        let message = producer
            .produce(&context)
            .await
            .map_err(|e| BrokerError::Producer {
                topic: name.to_string(),
                reason: format!("{:#}", e),
            })?;
        let payload = serde_json::to_string(&message).map_err(|source| BrokerError::Encode {
            topic: name.to_string(),
            source,
        })?;

        match sender.send(payload) {
            Ok(receivers) => debug!("{} on {} delivered to {} receivers", message.message_type(), name, receivers),
            Err(_) => debug!("{} on {} has no receivers", message.message_type(), name),
        }
        Ok(())
    }

    async fn remove_topic(&self, name: &str) -> Result<bool, BrokerError> {
        let removed = self.topics.remove(name).is_some();
        if removed {
            debug!("Topic {} removed", name);
        }
        Ok(removed)
    }
}
