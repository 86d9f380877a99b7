//! Geofencing service: UAS zone storage, filter queries and subscription
//! notifications.

pub mod broker;
pub mod config;
pub mod error;
pub mod events;
pub mod persistence;
pub mod service;

pub use broker::{Broker, BrokerError, MessageContext, MessageProducer, TopicPublisher};
pub use config::Config;
pub use error::{ServiceError, ServiceResult};
pub use events::zones::ZoneChangeReport;
pub use service::GeofencingService;
