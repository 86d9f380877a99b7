use anyhow::Result;
use async_trait::async_trait;
use geofencing_core::{PreparedFilter, UasZonesUpdate};
use sqlx::SqlitePool;

use super::{MessageContext, MessageProducer};
use crate::persistence::zones;

/// Builds update messages for one subscription filter.
///
/// Snapshots re-query the zone store with the filter, so they always reflect
/// the zones stored at publish time.
pub struct UasZonesUpdatesProducer {
    pool: SqlitePool,
    filter: PreparedFilter,
}

impl UasZonesUpdatesProducer {
    pub fn new(pool: SqlitePool, filter: PreparedFilter) -> Self {
        Self { pool, filter }
    }
}

#[async_trait]
impl MessageProducer for UasZonesUpdatesProducer {
    async fn produce(&self, context: &MessageContext) -> Result<UasZonesUpdate> {
        let message = match context {
            MessageContext::Snapshot => UasZonesUpdate::Initial {
                uas_zones: zones::get_zones(&self.pool, &self.filter, None).await?,
            },
            MessageContext::ZoneCreated(zone) => UasZonesUpdate::creation(zone.clone()),
            MessageContext::ZoneDeleted { identifier } => UasZonesUpdate::deletion(identifier.as_str()),
        };
        Ok(message)
    }
}
