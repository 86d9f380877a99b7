//! Subscription manager HTTP client.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

use crate::manager::{SmError, SubscriptionManager};
use crate::models::{SmSubscription, SmTopic, SubscriptionPatch};

/// HTTP client for the subscription manager API.
pub struct SubscriptionManagerClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl SubscriptionManagerClient {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn topics_url(&self) -> String {
        format!("{}/topics/", self.base_url)
    }

    fn subscriptions_url(&self) -> String {
        format!("{}/subscriptions/", self.base_url)
    }

    fn subscription_url(&self, id: i64) -> String {
        format!("{}/subscriptions/{}", self.base_url, id)
    }

    fn prepare(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }
}

async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(anyhow::anyhow!("{} failed: {} {}", what, status, body))
}

#[async_trait]
impl SubscriptionManager for SubscriptionManagerClient {
    async fn get_topics(&self) -> Result<Vec<SmTopic>> {
        let response = self
            .prepare(self.client.get(self.topics_url()))
            .send()
            .await
            .context("Failed to fetch topics")?;
        let response = ensure_success(response, "Topic list request").await?;

        response
            .json()
            .await
            .context("Failed to parse topic list response")
    }

    async fn post_topic(&self, topic: &SmTopic) -> Result<SmTopic> {
        let response = self
            .prepare(self.client.post(self.topics_url()).json(topic))
            .send()
            .await
            .context("Failed to create topic")?;
        let response = ensure_success(response, "Topic create").await?;

        let created: SmTopic = response
            .json()
            .await
            .context("Failed to parse topic response")?;
        tracing::debug!("Created remote topic {} ({:?})", created.name, created.id);
        Ok(created)
    }

    async fn post_subscription(&self, subscription: &SmSubscription) -> Result<SmSubscription> {
        let response = self
            .prepare(self.client.post(self.subscriptions_url()).json(subscription))
            .send()
            .await
            .context("Failed to create subscription")?;
        let response = ensure_success(response, "Subscription create").await?;

        response
            .json()
            .await
            .context("Failed to parse subscription response")
    }

    async fn put_subscription(&self, id: i64, patch: SubscriptionPatch) -> Result<()> {
        let response = self
            .prepare(self.client.put(self.subscription_url(id)).json(&patch))
            .send()
            .await
            .context("Failed to update subscription")?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(SmError::NotFound {
                resource: format!("subscription {}", id),
            }
            .into());
        }
        ensure_success(response, "Subscription update").await?;
        Ok(())
    }

    async fn delete_subscription(&self, id: i64) -> Result<()> {
        let response = self
            .prepare(self.client.delete(self.subscription_url(id)))
            .send()
            .await
            .context("Failed to delete subscription")?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Remote subscription {} already gone", id);
            return Ok(());
        }
        ensure_success(response, "Subscription delete").await?;
        Ok(())
    }
}
