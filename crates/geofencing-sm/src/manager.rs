use async_trait::async_trait;
use thiserror::Error;

use crate::models::{SmSubscription, SmTopic, SubscriptionPatch};

#[derive(Debug, Error)]
pub enum SmError {
    #[error("{resource} not found in subscription manager")]
    NotFound { resource: String },
}

/// True when the error chain carries an `SmError::NotFound`.
pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<SmError>(), Some(SmError::NotFound { .. })))
}

/// Remote topic and subscription registry.
///
/// Each call is atomic on the remote side; callers sequence them.
#[async_trait]
pub trait SubscriptionManager: Send + Sync {
    async fn get_topics(&self) -> anyhow::Result<Vec<SmTopic>>;

    async fn post_topic(&self, topic: &SmTopic) -> anyhow::Result<SmTopic>;

    async fn post_subscription(&self, subscription: &SmSubscription)
        -> anyhow::Result<SmSubscription>;

    async fn put_subscription(&self, id: i64, patch: SubscriptionPatch) -> anyhow::Result<()>;

    async fn delete_subscription(&self, id: i64) -> anyhow::Result<()>;
}
