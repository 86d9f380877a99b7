//! Service facade wiring persistence, the broker and the subscription manager.

use anyhow::{Context, Result};
use geofencing_core::{PreparedFilter, UasZone, UasZonesFilter, UasZonesSubscription};
use geofencing_sm::{SubscriptionManager, SubscriptionManagerClient};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::broker::{Broker, MessageContext, UasZonesUpdatesProducer};
use crate::config::Config;
use crate::error::{ServiceError, ServiceResult};
use crate::events::subscriptions::{
    self as lifecycle, CreateSubscriptionContext, DeleteSubscriptionContext, UpdateSubscriptionContext,
};
use crate::events::zones::{self as notifications, CreateZoneContext, DeleteZoneContext, ZoneChangeReport};
use crate::events::PipelineDeps;
use crate::persistence::{self, subscriptions, zones};

pub struct GeofencingService {
    pool: SqlitePool,
    subscription_manager: Arc<dyn SubscriptionManager>,
    broker: Arc<dyn Broker>,
    config: Config,
}

impl GeofencingService {
    pub fn new(
        pool: SqlitePool,
        subscription_manager: Arc<dyn SubscriptionManager>,
        broker: Arc<dyn Broker>,
        config: Config,
    ) -> Self {
        Self {
            pool,
            subscription_manager,
            broker,
            config,
        }
    }

    /// Open the database and the subscription manager client described by `config`.
    pub async fn connect(config: Config, broker: Arc<dyn Broker>) -> Result<Self> {
        let db = persistence::init_database(&config.database_path, config.database_max_connections)
            .await
            .context("Failed to initialize database")?;
        let client = SubscriptionManagerClient::new(
            config.subscription_manager_url.clone(),
            config.subscription_manager_username.clone(),
            config.subscription_manager_password.clone(),
            config.subscription_manager_timeout,
        )?;
        info!("Subscription manager at {}", client.base_url());

        Self::start(db.pool().clone(), Arc::new(client), broker, config)
            .await
            .context("Failed to restore broker topics")
    }

    /// Build the service and re-register the broker topics of the
    /// subscriptions already stored in `pool`.
    pub async fn start(
        pool: SqlitePool,
        subscription_manager: Arc<dyn SubscriptionManager>,
        broker: Arc<dyn Broker>,
        config: Config,
    ) -> ServiceResult<Self> {
        let service = Self::new(pool, subscription_manager, broker, config);
        service.restore_topics().await?;
        Ok(service)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn deps(&self) -> PipelineDeps<'_> {
        PipelineDeps {
            pool: &self.pool,
            broker: self.broker.as_ref(),
            subscription_manager: self.subscription_manager.as_ref(),
            circle_edges: self.config.polygon_to_circle_edges,
        }
    }

    fn prepare(&self, filter: &UasZonesFilter) -> ServiceResult<PreparedFilter> {
        Ok(PreparedFilter::new(filter, self.config.polygon_to_circle_edges)?)
    }

    // ========== ZONES ==========

    /// Zones matching `filter`, restricted to `owner`'s zones when given.
    pub async fn filter_zones(&self, filter: &UasZonesFilter, owner: Option<&str>) -> ServiceResult<Vec<UasZone>> {
        let prepared = self.prepare(filter)?;
        zones::get_zones(&self.pool, &prepared, owner)
            .await
            .map_err(ServiceError::Storage)
    }

    pub async fn get_zone(&self, identifier: &str, owner: Option<&str>) -> ServiceResult<UasZone> {
        zones::get_zone_by_identifier(&self.pool, identifier, owner)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or_else(|| ServiceError::NotFound(format!("zone {}", identifier)))
    }

    pub async fn create_zone(&self, zone: UasZone, owner: &str) -> ServiceResult<ZoneChangeReport> {
        zone.validate()?;
        notifications::create_zone(self.deps(), CreateZoneContext::new(zone, owner)).await
    }

    pub async fn delete_zone(&self, identifier: &str, owner: Option<&str>) -> ServiceResult<ZoneChangeReport> {
        let zone = self.get_zone(identifier, owner).await?;
        notifications::delete_zone(self.deps(), DeleteZoneContext::new(zone)).await
    }

    // ========== SUBSCRIPTIONS ==========

    pub async fn list_subscriptions(&self, owner: Option<&str>) -> ServiceResult<Vec<UasZonesSubscription>> {
        subscriptions::list_subscriptions(&self.pool, owner)
            .await
            .map_err(ServiceError::Storage)
    }

    pub async fn get_subscription(&self, id: &str, owner: Option<&str>) -> ServiceResult<UasZonesSubscription> {
        subscriptions::get_subscription(&self.pool, id, owner)
            .await
            .map_err(ServiceError::Storage)?
            .ok_or_else(|| ServiceError::NotFound(format!("subscription {}", id)))
    }

    pub async fn create_subscription(
        &self,
        filter: UasZonesFilter,
        owner: &str,
    ) -> ServiceResult<UasZonesSubscription> {
        let prepared = self.prepare(&filter)?;
        lifecycle::create_subscription(self.deps(), CreateSubscriptionContext::new(filter, prepared, owner)).await
    }

    pub async fn update_subscription(
        &self,
        id: &str,
        owner: Option<&str>,
        active: bool,
    ) -> ServiceResult<UasZonesSubscription> {
        let subscription = self.get_subscription(id, owner).await?;
        lifecycle::update_subscription(self.deps(), UpdateSubscriptionContext { subscription, active }).await
    }

    pub async fn delete_subscription(&self, id: &str, owner: Option<&str>) -> ServiceResult<()> {
        let subscription = self.get_subscription(id, owner).await?;
        lifecycle::delete_subscription(self.deps(), DeleteSubscriptionContext { subscription }).await
    }

    /// Push an `INITIAL` message with every zone currently matching the
    /// subscription's filter.
    pub async fn publish_snapshot(&self, id: &str, owner: Option<&str>) -> ServiceResult<()> {
        let subscription = self.get_subscription(id, owner).await?;
        self.broker
            .publish_topic(&subscription.sm_subscription.topic_name, MessageContext::Snapshot)
            .await?;
        Ok(())
    }

    /// Re-register broker topics for every stored subscription. Returns the
    /// number of topics registered.
    pub async fn restore_topics(&self) -> ServiceResult<usize> {
        let stored = subscriptions::list_subscriptions(&self.pool, None)
            .await
            .map_err(ServiceError::Storage)?;

        let mut registered = HashSet::new();
        for subscription in stored {
            let topic = subscription.sm_subscription.topic_name.clone();
            if registered.contains(&topic) {
                continue;
            }
            let prepared = match self.prepare(&subscription.uas_zones_filter) {
                Ok(prepared) => prepared,
                Err(e) => {
                    warn!("Not restoring topic of subscription {}: {}", subscription.id, e);
                    continue;
                }
            };
            let producer = UasZonesUpdatesProducer::new(self.pool.clone(), prepared);
            self.broker.add_topic(&topic, Arc::new(producer)).await?;
            registered.insert(topic);
        }

        info!("Restored {} broker topics", registered.len());
        Ok(registered.len())
    }
}
