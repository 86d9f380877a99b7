//! Zone-change notification pipelines.
//!
//! Create: the zone is persisted before subscriptions are matched, so a
//! snapshot produced during the fan-out already contains it. Delete: matching
//! runs before the zone is removed.

use geofencing_core::{PreparedFilter, UasZone, UasZonesSubscription};
use tracing::{debug, info, warn};

use super::{required, PipelineDeps};
use crate::broker::MessageContext;
use crate::error::{ServiceError, ServiceResult};
use crate::persistence::{subscriptions, zones};

/// Outcome of a zone change: the zone and where it was announced.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneChangeReport {
    pub zone: UasZone,
    pub published_topics: Vec<String>,
    pub failed_topics: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateZoneStep {
    SaveZone,
    FindRelevantSubscriptions,
    PublishZoneCreation,
}

pub const CREATE_ZONE_STEPS: [CreateZoneStep; 3] = [
    CreateZoneStep::SaveZone,
    CreateZoneStep::FindRelevantSubscriptions,
    CreateZoneStep::PublishZoneCreation,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteZoneStep {
    FindRelevantSubscriptions,
    DeleteZone,
    PublishZoneDeletion,
}

pub const DELETE_ZONE_STEPS: [DeleteZoneStep; 3] = [
    DeleteZoneStep::FindRelevantSubscriptions,
    DeleteZoneStep::DeleteZone,
    DeleteZoneStep::PublishZoneDeletion,
];

pub struct CreateZoneContext {
    pub zone: UasZone,
    pub owner: String,
    pub stored: Option<UasZone>,
    pub subscriptions: Option<Vec<UasZonesSubscription>>,
    pub published_topics: Vec<String>,
    pub failed_topics: Vec<String>,
}

impl CreateZoneContext {
    pub fn new(zone: UasZone, owner: impl Into<String>) -> Self {
        Self {
            zone,
            owner: owner.into(),
            stored: None,
            subscriptions: None,
            published_topics: Vec::new(),
            failed_topics: Vec::new(),
        }
    }
}

pub struct DeleteZoneContext {
    /// Stored zone being removed
    pub zone: UasZone,
    pub subscriptions: Option<Vec<UasZonesSubscription>>,
    pub deleted: bool,
    pub published_topics: Vec<String>,
    pub failed_topics: Vec<String>,
}

impl DeleteZoneContext {
    pub fn new(zone: UasZone) -> Self {
        Self {
            zone,
            subscriptions: None,
            deleted: false,
            published_topics: Vec::new(),
            failed_topics: Vec::new(),
        }
    }
}

pub async fn create_zone(deps: PipelineDeps<'_>, mut ctx: CreateZoneContext) -> ServiceResult<ZoneChangeReport> {
    for step in CREATE_ZONE_STEPS {
        debug!(?step, zone = %ctx.zone.identifier, "create zone");
        match step {
            CreateZoneStep::SaveZone => {
                let stored = zones::create_zone(deps.pool, &ctx.zone, &ctx.owner, deps.circle_edges)
                    .await
                    .map_err(|e| match e.downcast::<zones::DuplicateZone>() {
                        Ok(duplicate) => ServiceError::Validation(duplicate.to_string()),
                        Err(e) => ServiceError::Storage(e),
                    })?;
                ctx.stored = Some(stored);
            }
            CreateZoneStep::FindRelevantSubscriptions => {
                let stored = required(&ctx.stored, "stored zone")?;
                ctx.subscriptions = Some(find_relevant_subscriptions(deps, stored).await?);
            }
            CreateZoneStep::PublishZoneCreation => {
                let stored = required(&ctx.stored, "stored zone")?;
                let relevant = required(&ctx.subscriptions, "relevant subscriptions")?;
                let context = MessageContext::ZoneCreated(stored.clone());
                let (published, failed) = publish(deps, relevant, context).await;
                ctx.published_topics = published;
                ctx.failed_topics = failed;
            }
        }
    }

    let zone = ctx
        .stored
        .ok_or_else(|| ServiceError::Internal("zone was not saved".to_string()))?;
    info!(
        "Zone {} created, announced on {} topics",
        zone.identifier,
        ctx.published_topics.len()
    );
    Ok(ZoneChangeReport {
        zone,
        published_topics: ctx.published_topics,
        failed_topics: ctx.failed_topics,
    })
}

pub async fn delete_zone(deps: PipelineDeps<'_>, mut ctx: DeleteZoneContext) -> ServiceResult<ZoneChangeReport> {
    for step in DELETE_ZONE_STEPS {
        debug!(?step, zone = %ctx.zone.identifier, "delete zone");
        match step {
            DeleteZoneStep::FindRelevantSubscriptions => {
                ctx.subscriptions = Some(find_relevant_subscriptions(deps, &ctx.zone).await?);
            }
            DeleteZoneStep::DeleteZone => {
                ctx.deleted = zones::delete_zone(deps.pool, &ctx.zone.identifier)
                    .await
                    .map_err(ServiceError::Storage)?;
                if !ctx.deleted {
                    return Err(ServiceError::NotFound(format!("zone {}", ctx.zone.identifier)));
                }
            }
            DeleteZoneStep::PublishZoneDeletion => {
                let relevant = required(&ctx.subscriptions, "relevant subscriptions")?;
                let context = MessageContext::ZoneDeleted {
                    identifier: ctx.zone.identifier.clone(),
                };
                let (published, failed) = publish(deps, relevant, context).await;
                ctx.published_topics = published;
                ctx.failed_topics = failed;
            }
        }
    }

    info!(
        "Zone {} deleted, announced on {} topics",
        ctx.zone.identifier,
        ctx.published_topics.len()
    );
    Ok(ZoneChangeReport {
        zone: ctx.zone,
        published_topics: ctx.published_topics,
        failed_topics: ctx.failed_topics,
    })
}

/// Active subscriptions whose filter matches the zone.
async fn find_relevant_subscriptions(
    deps: PipelineDeps<'_>,
    zone: &UasZone,
) -> ServiceResult<Vec<UasZonesSubscription>> {
    let active = subscriptions::load_active_subscriptions(deps.pool)
        .await
        .map_err(ServiceError::Storage)?;

    let mut relevant = Vec::new();
    for subscription in active {
        let filter = match PreparedFilter::new(&subscription.uas_zones_filter, deps.circle_edges) {
            Ok(filter) => filter,
            Err(e) => {
                warn!("Skipping subscription {} with invalid filter: {}", subscription.id, e);
                continue;
            }
        };
        if filter.matches(zone) {
            relevant.push(subscription);
        }
    }

    debug!("{} subscriptions match zone {}", relevant.len(), zone.identifier);
    Ok(relevant)
}

/// Publish once per distinct topic. Failures are logged and do not stop the fan-out.
async fn publish(
    deps: PipelineDeps<'_>,
    relevant: &[UasZonesSubscription],
    context: MessageContext,
) -> (Vec<String>, Vec<String>) {
    let mut published = Vec::new();
    let mut failed = Vec::new();

    for subscription in relevant {
        let topic = &subscription.sm_subscription.topic_name;
        if published.contains(topic) || failed.contains(topic) {
            continue;
        }
        match deps.broker.publish_topic(topic, context.clone()).await {
            Ok(()) => published.push(topic.clone()),
            Err(e) => {
                warn!("Failed to publish on topic {}: {}", topic, e);
                failed.push(topic.clone());
            }
        }
    }

    (published, failed)
}
