//! Wire models of the subscription manager API.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmTopic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub name: String,
}

impl SmTopic {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmSubscription {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub topic_id: i64,
    /// Assigned by the subscription manager
    #[serde(default)]
    pub queue: String,
    #[serde(default)]
    pub active: bool,
}

impl SmSubscription {
    pub fn for_topic(topic_id: i64, active: bool) -> Self {
        Self {
            id: None,
            topic_id,
            queue: String::new(),
            active,
        }
    }
}

/// Partial update of a remote subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPatch {
    pub active: bool,
}
