//! Subscription manager client
//!
//! Talks to the external service that owns broker topics and the queues
//! subscribers consume from.

pub mod client;
pub mod manager;
pub mod models;

pub use client::SubscriptionManagerClient;
pub use manager::{is_not_found, SmError, SubscriptionManager};
pub use models::{SmSubscription, SmTopic, SubscriptionPatch};
