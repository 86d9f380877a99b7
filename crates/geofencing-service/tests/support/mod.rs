//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use geofencing_core::{
    AirspaceVolume, Authority, AuthorityPurpose, HorizontalProjection, Restriction, TimePeriod,
    UasZone, UasZonesFilter, UasZonesUpdate, UomDistance, VerticalReference, YesNo, ZoneReason,
    ZoneType,
};
use geofencing_service::broker::{Broker, BrokerError, MessageContext, MessageProducer};
use geofencing_service::persistence::init_database;
use geofencing_service::{Config, GeofencingService};
use geofencing_sm::{SmError, SmSubscription, SmTopic, SubscriptionManager, SubscriptionPatch};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

pub const OWNER: &str = "operator";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ========== SUBSCRIPTION MANAGER ==========

/// In-memory subscription manager that records every call.
#[derive(Default)]
pub struct FakeSubscriptionManager {
    topics: Mutex<Vec<SmTopic>>,
    subscriptions: Mutex<HashMap<i64, SmSubscription>>,
    calls: Mutex<Vec<String>>,
    next_id: AtomicI64,
    /// `post_topic` fails after storing the topic, as if another caller won the race
    pub lose_topic_race: AtomicBool,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl FakeSubscriptionManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn seed_topic(&self, name: &str) -> i64 {
        let id = self.next_id();
        self.topics.lock().unwrap().push(SmTopic {
            id: Some(id),
            name: name.to_string(),
        });
        id
    }

    pub fn topics(&self) -> Vec<SmTopic> {
        self.topics.lock().unwrap().clone()
    }

    pub fn subscription(&self, id: i64) -> Option<SmSubscription> {
        self.subscriptions.lock().unwrap().get(&id).cloned()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.lock().unwrap().len()
    }

    /// Drop a remote subscription behind the service's back.
    pub fn forget_subscription(&self, id: i64) {
        self.subscriptions.lock().unwrap().remove(&id);
    }
}

#[async_trait]
impl SubscriptionManager for FakeSubscriptionManager {
    async fn get_topics(&self) -> anyhow::Result<Vec<SmTopic>> {
        self.record("get_topics".to_string());
        Ok(self.topics())
    }

    async fn post_topic(&self, topic: &SmTopic) -> anyhow::Result<SmTopic> {
        self.record(format!("post_topic:{}", topic.name));
        let id = self.seed_topic(&topic.name);
        if self.lose_topic_race.load(Ordering::SeqCst) {
            anyhow::bail!("409 Conflict: topic {} already exists", topic.name);
        }
        Ok(SmTopic {
            id: Some(id),
            name: topic.name.clone(),
        })
    }

    async fn post_subscription(&self, subscription: &SmSubscription) -> anyhow::Result<SmSubscription> {
        self.record(format!("post_subscription:{}", subscription.topic_id));
        let id = self.next_id();
        let created = SmSubscription {
            id: Some(id),
            topic_id: subscription.topic_id,
            queue: format!("queue-{}", id),
            active: subscription.active,
        };
        self.subscriptions.lock().unwrap().insert(id, created.clone());
        Ok(created)
    }

    async fn put_subscription(&self, id: i64, patch: SubscriptionPatch) -> anyhow::Result<()> {
        self.record(format!("put_subscription:{}:{}", id, patch.active));
        if self.fail_put.load(Ordering::SeqCst) {
            anyhow::bail!("503 Service Unavailable");
        }
        match self.subscriptions.lock().unwrap().get_mut(&id) {
            Some(subscription) => {
                subscription.active = patch.active;
                Ok(())
            }
            None => Err(SmError::NotFound {
                resource: format!("subscription {}", id),
            }
            .into()),
        }
    }

    async fn delete_subscription(&self, id: i64) -> anyhow::Result<()> {
        self.record(format!("delete_subscription:{}", id));
        if self.fail_delete.load(Ordering::SeqCst) {
            anyhow::bail!("503 Service Unavailable");
        }
        match self.subscriptions.lock().unwrap().remove(&id) {
            Some(_) => Ok(()),
            None => Err(SmError::NotFound {
                resource: format!("subscription {}", id),
            }
            .into()),
        }
    }
}

// ========== BROKER ==========

/// Broker that runs producers and keeps the produced messages.
#[derive(Default)]
pub struct RecordingBroker {
    producers: Mutex<HashMap<String, Arc<dyn MessageProducer>>>,
    published: Mutex<Vec<(String, UasZonesUpdate)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_topic(&self, name: &str) {
        self.failing.lock().unwrap().insert(name.to_string());
    }

    pub fn has_topic(&self, name: &str) -> bool {
        self.producers.lock().unwrap().contains_key(name)
    }

    pub fn published(&self) -> Vec<(String, UasZonesUpdate)> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<UasZonesUpdate> {
        self.published()
            .into_iter()
            .filter(|(name, _)| name == topic)
            .map(|(_, message)| message)
            .collect()
    }
}

#[async_trait]
impl Broker for RecordingBroker {
    async fn add_topic(&self, name: &str, producer: Arc<dyn MessageProducer>) -> Result<(), BrokerError> {
        self.producers.lock().unwrap().insert(name.to_string(), producer);
        Ok(())
    }

    async fn publish_topic(&self, name: &str, context: MessageContext) -> Result<(), BrokerError> {
        if self.failing.lock().unwrap().contains(name) {
            return Err(BrokerError::Unavailable(format!("topic {} is down", name)));
        }
        let producer = self
            .producers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::UnknownTopic(name.to_string()))?;
        let message = producer
            .produce(&context)
            .await
            .map_err(|e| BrokerError::Producer {
                topic: name.to_string(),
                reason: e.to_string(),
            })?;
        self.published.lock().unwrap().push((name.to_string(), message));
        Ok(())
    }

    async fn remove_topic(&self, name: &str) -> Result<bool, BrokerError> {
        Ok(self.producers.lock().unwrap().remove(name).is_some())
    }
}

// ========== SERVICE ==========

pub async fn service_with(
    subscription_manager: Arc<FakeSubscriptionManager>,
    broker: Arc<dyn Broker>,
) -> GeofencingService {
    init_tracing();
    let db = init_database(":memory:", 1).await.unwrap();
    GeofencingService::new(
        db.pool().clone(),
        subscription_manager,
        broker,
        Config::default(),
    )
}

// ========== FIXTURES ==========

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

pub fn end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

/// Footprint of the basilica zone.
pub fn basilique_ring() -> Vec<[f64; 2]> {
    vec![
        [50.8636, 4.3294],
        [50.8653, 4.3281],
        [50.8685, 4.3174],
        [50.8677, 4.3148],
        [50.8659, 4.3159],
        [50.8628, 4.3265],
        [50.8636, 4.3294],
    ]
}

/// Triangle overlapping the basilica zone.
pub fn overlapping_ring() -> Vec<[f64; 2]> {
    vec![
        [50.8625, 4.3281],
        [50.8655, 4.3293],
        [50.8655, 4.3237],
        [50.8625, 4.3281],
    ]
}

pub fn shifted_north(ring: Vec<[f64; 2]>, delta: f64) -> Vec<[f64; 2]> {
    ring.into_iter().map(|[lon, lat]| [lon, lat + delta]).collect()
}

pub fn polygon_volume(ring: Vec<[f64; 2]>, lower: f64, upper: f64) -> AirspaceVolume {
    AirspaceVolume {
        horizontal_projection: HorizontalProjection::Polygon {
            coordinates: vec![ring],
        },
        uom_dimensions: UomDistance::Meters,
        lower_limit: lower,
        lower_vertical_reference: Some(VerticalReference::Wgs84),
        upper_limit: upper,
        upper_vertical_reference: Some(VerticalReference::Wgs84),
    }
}

pub fn authority(name: &str, email: &str) -> Authority {
    Authority {
        name: name.to_string(),
        service: Some("Airspace management".to_string()),
        contact_name: Some("Duty officer".to_string()),
        email: Some(email.to_string()),
        site_url: None,
        phone: None,
        purpose: AuthorityPurpose::Authorization,
        interval_before: Some("P1D".to_string()),
    }
}

pub fn zone(identifier: &str, ring: Vec<[f64; 2]>) -> UasZone {
    UasZone {
        identifier: identifier.to_string(),
        name: format!("Zone {}", identifier),
        zone_type: ZoneType::Common,
        restriction: Restriction::Prohibited,
        restriction_conditions: Vec::new(),
        region: 1,
        reason: vec![ZoneReason::Sensitive],
        other_reason_info: None,
        regulation_exemption: Some(YesNo::No),
        u_space_class: None,
        message: None,
        country: "BEL".to_string(),
        zone_authority: authority("Brussels authority", "ops@authority.be"),
        applicability: TimePeriod {
            permanent: YesNo::No,
            start_date_time: start(),
            end_date_time: end(),
            schedule: Vec::new(),
        },
        geometry: vec![polygon_volume(ring, 0.0, 100.0)],
        extended_properties: serde_json::Map::new(),
        created_at: None,
        updated_at: None,
    }
}

pub fn filter(ring: Vec<[f64; 2]>) -> UasZonesFilter {
    UasZonesFilter {
        airspace_volume: polygon_volume(ring, 0.0, 100.0),
        regions: vec![1],
        start_date_time: start(),
        end_date_time: end(),
        updated_after_date_time: None,
    }
}
