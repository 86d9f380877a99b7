pub mod error;
pub mod geometry;
pub mod matching;
pub mod messages;
pub mod models;
pub mod topic;

pub use error::ValidationError;
pub use geometry::{circle_to_polygon, circumscribed_polygon, polygon_intersects, Polygon};
pub use matching::{zone_matches, PreparedFilter};
pub use messages::UasZonesUpdate;
pub use models::{
    AirspaceVolume, Authority, AuthorityPurpose, DailyPeriod, HorizontalProjection, Restriction,
    SmSubscriptionLink, TimePeriod, USpaceClass, UasZone, UasZonesFilter, UasZonesSubscription,
    UomDistance, VerticalReference, Weekday, YesNo, ZoneReason, ZoneType,
};
pub use topic::topic_name;
