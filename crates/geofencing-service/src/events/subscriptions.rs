//! Subscription lifecycle: create, update and delete pipelines.

use anyhow::anyhow;
use geofencing_core::{
    topic_name, PreparedFilter, SmSubscriptionLink, UasZonesFilter, UasZonesSubscription,
};
use geofencing_sm::{is_not_found, SmSubscription, SmTopic, SubscriptionPatch};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{required, PipelineDeps};
use crate::broker::UasZonesUpdatesProducer;
use crate::error::{ServiceError, ServiceResult};
use crate::persistence::subscriptions as store;

// ========== CREATE ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    DeriveTopicName,
    AddBrokerTopic,
    GetOrCreateSmTopic,
    CreateSmSubscription,
    SaveSubscription,
}

pub const CREATE_STEPS: [CreateStep; 5] = [
    CreateStep::DeriveTopicName,
    CreateStep::AddBrokerTopic,
    CreateStep::GetOrCreateSmTopic,
    CreateStep::CreateSmSubscription,
    CreateStep::SaveSubscription,
];

pub struct CreateSubscriptionContext {
    pub filter: UasZonesFilter,
    pub prepared: PreparedFilter,
    pub owner: String,
    pub topic_name: Option<String>,
    pub sm_topic: Option<SmTopic>,
    pub sm_subscription: Option<SmSubscription>,
    pub subscription: Option<UasZonesSubscription>,
}

impl CreateSubscriptionContext {
    pub fn new(filter: UasZonesFilter, prepared: PreparedFilter, owner: impl Into<String>) -> Self {
        Self {
            filter,
            prepared,
            owner: owner.into(),
            topic_name: None,
            sm_topic: None,
            sm_subscription: None,
            subscription: None,
        }
    }
}

pub async fn create_subscription(
    deps: PipelineDeps<'_>,
    mut ctx: CreateSubscriptionContext,
) -> ServiceResult<UasZonesSubscription> {
    for step in CREATE_STEPS {
        debug!(?step, owner = %ctx.owner, "create subscription");
        match step {
            CreateStep::DeriveTopicName => derive_topic_name(&mut ctx)?,
            CreateStep::AddBrokerTopic => add_broker_topic(deps, &mut ctx).await?,
            CreateStep::GetOrCreateSmTopic => get_or_create_sm_topic(deps, &mut ctx).await?,
            CreateStep::CreateSmSubscription => create_sm_subscription(deps, &mut ctx).await?,
            CreateStep::SaveSubscription => save_subscription(deps, &mut ctx).await?,
        }
    }

    let subscription = ctx
        .subscription
        .ok_or_else(|| ServiceError::Internal("subscription was not saved".to_string()))?;
    info!(
        "Subscription {} created on topic {}",
        subscription.id, subscription.sm_subscription.topic_name
    );
    Ok(subscription)
}

fn derive_topic_name(ctx: &mut CreateSubscriptionContext) -> ServiceResult<()> {
    let name = topic_name(&ctx.filter)
        .map_err(|e| ServiceError::Internal(format!("cannot serialize filter: {}", e)))?;
    ctx.topic_name = Some(name);
    Ok(())
}

async fn add_broker_topic(deps: PipelineDeps<'_>, ctx: &mut CreateSubscriptionContext) -> ServiceResult<()> {
    let name = required(&ctx.topic_name, "topic name")?;
    let producer = UasZonesUpdatesProducer::new(deps.pool.clone(), ctx.prepared.clone());
    deps.broker.add_topic(name, Arc::new(producer)).await?;
    Ok(())
}

/// Reuse the remote topic with this name, or create it.
///
/// A failed create is followed by one more lookup, so a topic created
/// concurrently for the same filter is picked up instead of failing.
async fn get_or_create_sm_topic(
    deps: PipelineDeps<'_>,
    ctx: &mut CreateSubscriptionContext,
) -> ServiceResult<()> {
    let name = required(&ctx.topic_name, "topic name")?.clone();
    let sm = deps.subscription_manager;

    let existing = find_topic(deps, &name).await?;
    let topic = match existing {
        Some(topic) => {
            debug!("Reusing remote topic {}", name);
            topic
        }
        None => match sm.post_topic(&SmTopic::named(name.as_str())).await {
            Ok(topic) => topic,
            Err(err) => {
                warn!("Creating remote topic {} failed, looking it up again: {:#}", name, err);
                find_topic(deps, &name).await?.ok_or(ServiceError::Remote(err))?
            }
        },
    };

    if topic.id.is_none() {
        return Err(ServiceError::Remote(anyhow!("remote topic {} has no id", name)));
    }
    ctx.sm_topic = Some(topic);
    Ok(())
}

async fn find_topic(deps: PipelineDeps<'_>, name: &str) -> ServiceResult<Option<SmTopic>> {
    let topics = deps
        .subscription_manager
        .get_topics()
        .await
        .map_err(ServiceError::Remote)?;
    Ok(topics.into_iter().find(|topic| topic.name == name))
}

async fn create_sm_subscription(
    deps: PipelineDeps<'_>,
    ctx: &mut CreateSubscriptionContext,
) -> ServiceResult<()> {
    let topic = required(&ctx.sm_topic, "remote topic")?;
    let topic_id = topic
        .id
        .ok_or_else(|| ServiceError::Internal("remote topic without id".to_string()))?;

    let created = deps
        .subscription_manager
        .post_subscription(&SmSubscription::for_topic(topic_id, true))
        .await
        .map_err(ServiceError::Remote)?;

    if created.id.is_none() {
        return Err(ServiceError::Remote(anyhow!(
            "remote subscription on topic {} has no id",
            topic_id
        )));
    }
    ctx.sm_subscription = Some(created);
    Ok(())
}

async fn save_subscription(deps: PipelineDeps<'_>, ctx: &mut CreateSubscriptionContext) -> ServiceResult<()> {
    let topic_name = required(&ctx.topic_name, "topic name")?.clone();
    let remote = required(&ctx.sm_subscription, "remote subscription")?;
    let remote_id = remote
        .id
        .ok_or_else(|| ServiceError::Internal("remote subscription without id".to_string()))?;

    let subscription = UasZonesSubscription {
        id: Uuid::new_v4().simple().to_string(),
        owner: ctx.owner.clone(),
        uas_zones_filter: ctx.filter.clone(),
        sm_subscription: SmSubscriptionLink {
            id: remote_id,
            queue: remote.queue.clone(),
            topic_name,
            active: remote.active,
        },
    };

    if let Err(err) = store::insert_subscription(deps.pool, &subscription).await {
        // Roll back the remote side so it does not outlive the failed save.
        if let Err(cleanup) = deps.subscription_manager.delete_subscription(remote_id).await {
            warn!(
                "Failed to remove remote subscription {} after save failure: {:#}",
                remote_id, cleanup
            );
        }
        return Err(ServiceError::Storage(err));
    }

    ctx.subscription = Some(subscription);
    Ok(())
}

// ========== UPDATE ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    UpdateSmSubscription,
    UpdateLocalSubscription,
}

pub const UPDATE_STEPS: [UpdateStep; 2] = [
    UpdateStep::UpdateSmSubscription,
    UpdateStep::UpdateLocalSubscription,
];

pub struct UpdateSubscriptionContext {
    pub subscription: UasZonesSubscription,
    pub active: bool,
}

pub async fn update_subscription(
    deps: PipelineDeps<'_>,
    mut ctx: UpdateSubscriptionContext,
) -> ServiceResult<UasZonesSubscription> {
    for step in UPDATE_STEPS {
        debug!(?step, subscription = %ctx.subscription.id, "update subscription");
        match step {
            UpdateStep::UpdateSmSubscription => {
                deps.subscription_manager
                    .put_subscription(
                        ctx.subscription.sm_subscription.id,
                        SubscriptionPatch { active: ctx.active },
                    )
                    .await
                    .map_err(ServiceError::Remote)?;
            }
            UpdateStep::UpdateLocalSubscription => {
                let found = store::set_subscription_active(deps.pool, &ctx.subscription.id, ctx.active)
                    .await
                    .map_err(ServiceError::Storage)?;
                if !found {
                    return Err(ServiceError::NotFound(format!("subscription {}", ctx.subscription.id)));
                }
                ctx.subscription.sm_subscription.active = ctx.active;
            }
        }
    }

    info!(
        "Subscription {} is now {}",
        ctx.subscription.id,
        if ctx.active { "active" } else { "inactive" }
    );
    Ok(ctx.subscription)
}

// ========== DELETE ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStep {
    DeleteSmSubscription,
    DeleteLocalSubscription,
    RemoveBrokerTopic,
}

pub const DELETE_STEPS: [DeleteStep; 3] = [
    DeleteStep::DeleteSmSubscription,
    DeleteStep::DeleteLocalSubscription,
    DeleteStep::RemoveBrokerTopic,
];

pub struct DeleteSubscriptionContext {
    pub subscription: UasZonesSubscription,
}

pub async fn delete_subscription(deps: PipelineDeps<'_>, ctx: DeleteSubscriptionContext) -> ServiceResult<()> {
    let subscription = ctx.subscription;

    for step in DELETE_STEPS {
        debug!(?step, subscription = %subscription.id, "delete subscription");
        match step {
            DeleteStep::DeleteSmSubscription => {
                let remote_id = subscription.sm_subscription.id;
                match deps.subscription_manager.delete_subscription(remote_id).await {
                    Ok(()) => {}
                    Err(err) if is_not_found(&err) => {
                        debug!("Remote subscription {} already deleted", remote_id);
                    }
                    Err(err) => return Err(ServiceError::Remote(err)),
                }
            }
            DeleteStep::DeleteLocalSubscription => {
                store::delete_subscription(deps.pool, &subscription.id)
                    .await
                    .map_err(ServiceError::Storage)?;
            }
            DeleteStep::RemoveBrokerTopic => {
                remove_unused_topic(deps, &subscription.sm_subscription.topic_name).await
            }
        }
    }

    info!("Subscription {} deleted", subscription.id);
    Ok(())
}

/// Drop the broker topic once no stored subscription publishes on it. The
/// subscription is already gone, so failures here are only logged.
async fn remove_unused_topic(deps: PipelineDeps<'_>, topic: &str) {
    match store::count_by_topic(deps.pool, topic).await {
        Ok(0) => match deps.broker.remove_topic(topic).await {
            Ok(removed) => debug!("Topic {} unused, removed: {}", topic, removed),
            Err(e) => warn!("Failed to remove unused topic {}: {}", topic, e),
        },
        Ok(remaining) => debug!("Topic {} still used by {} subscriptions", topic, remaining),
        Err(e) => warn!("Failed to count subscriptions on topic {}: {:#}", topic, e),
    }
}
