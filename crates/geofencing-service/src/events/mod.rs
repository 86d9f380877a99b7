//! Ordered, side-effecting pipelines.
//!
//! Each pipeline is a fixed list of steps run in order over one mutable
//! context. A step reads what earlier steps wrote into the context; finding
//! it missing is an internal error, never a skipped step.

pub mod subscriptions;
pub mod zones;

use geofencing_sm::SubscriptionManager;
use sqlx::SqlitePool;

use crate::broker::Broker;
use crate::error::ServiceError;

/// Collaborators shared by every pipeline run.
#[derive(Clone, Copy)]
pub struct PipelineDeps<'a> {
    pub pool: &'a SqlitePool,
    pub broker: &'a dyn Broker,
    pub subscription_manager: &'a dyn SubscriptionManager,
    pub circle_edges: usize,
}

/// Take a value an earlier step must have produced.
pub(crate) fn required<'a, T>(value: &'a Option<T>, what: &str) -> Result<&'a T, ServiceError> {
    value
        .as_ref()
        .ok_or_else(|| ServiceError::Internal(format!("pipeline step ran before {} was set", what)))
}
