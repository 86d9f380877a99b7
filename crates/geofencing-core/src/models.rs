//! Core data models for the geofencing service.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::geometry::{self, Polygon};

pub const MAX_IDENTIFIER_LEN: usize = 7;
pub const MAX_TEXT_LEN: usize = 200;
pub const MAX_REASONS: usize = 9;

// ========== AIRSPACE VOLUMES ==========

/// Unit of measure for altitude limits and circle radii.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UomDistance {
    #[default]
    #[serde(rename = "M")]
    Meters,
    #[serde(rename = "FT")]
    Feet,
}

impl UomDistance {
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            UomDistance::Meters => value,
            UomDistance::Feet => geometry::feet_to_meters(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerticalReference {
    Agl,
    Amsl,
    Wgs84,
}

/// 2D footprint of an airspace volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HorizontalProjection {
    /// GeoJSON polygon; the first ring is the shell, `[lon, lat]` vertices.
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    /// Circle around `[lon, lat]`; the radius uses the volume's unit of measure.
    Circle { center: [f64; 2], radius: f64 },
}

impl HorizontalProjection {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            HorizontalProjection::Polygon { coordinates } => match coordinates.as_slice() {
                [] => Err(ValidationError::EmptyPolygon),
                [shell] => geometry::validate_ring(shell),
                [_, holes @ ..] => Err(ValidationError::InteriorRings(holes.len())),
            },
            HorizontalProjection::Circle { center, radius } => {
                if !center[0].is_finite() || !center[1].is_finite() {
                    return Err(ValidationError::InvalidCoordinate(center[0], center[1]));
                }
                if !radius.is_finite() || *radius < 0.0 {
                    return Err(ValidationError::NegativeRadius(*radius));
                }
                Ok(())
            }
        }
    }
}

/// A 3D region: footprint plus a vertical band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AirspaceVolume {
    pub horizontal_projection: HorizontalProjection,
    #[serde(default)]
    pub uom_dimensions: UomDistance,
    #[serde(default)]
    pub lower_limit: f64,
    #[serde(default)]
    pub lower_vertical_reference: Option<VerticalReference>,
    pub upper_limit: f64,
    #[serde(default)]
    pub upper_vertical_reference: Option<VerticalReference>,
}

impl AirspaceVolume {
    pub fn lower_limit_m(&self) -> f64 {
        self.uom_dimensions.to_meters(self.lower_limit)
    }

    pub fn upper_limit_m(&self) -> f64 {
        self.uom_dimensions.to_meters(self.upper_limit)
    }

    /// Footprint as a polygon. Circles become their circumscribed polygon.
    pub fn footprint(&self, circle_edges: usize) -> Result<Polygon, ValidationError> {
        match &self.horizontal_projection {
            HorizontalProjection::Polygon { coordinates } => Polygon::from_geojson(coordinates),
            HorizontalProjection::Circle { center, radius } => {
                let radius_m = self.uom_dimensions.to_meters(*radius);
                geometry::circumscribed_polygon(*center, radius_m, circle_edges)
            }
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.horizontal_projection.validate()?;

        if !self.lower_limit.is_finite() {
            return Err(ValidationError::field("lower_limit", "must be a finite number"));
        }
        if !self.upper_limit.is_finite() {
            return Err(ValidationError::field("upper_limit", "must be a finite number"));
        }
        if self.lower_limit > self.upper_limit {
            return Err(ValidationError::InvertedLimits {
                lower: self.lower_limit,
                upper: self.upper_limit,
            });
        }
        Ok(())
    }
}

// ========== APPLICABILITY ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum YesNo {
    Yes,
    No,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

/// Recurring sub-window inside a time period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPeriod {
    pub day: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimePeriod {
    pub permanent: YesNo,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(default)]
    pub schedule: Vec<DailyPeriod>,
}

impl TimePeriod {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.permanent == YesNo::No && self.start_date_time > self.end_date_time {
            return Err(ValidationError::InvertedPeriod {
                field: "applicability",
                start: self.start_date_time.to_rfc3339(),
                end: self.end_date_time.to_rfc3339(),
            });
        }
        for daily in &self.schedule {
            if daily.start_time > daily.end_time {
                return Err(ValidationError::InvertedPeriod {
                    field: "schedule",
                    start: daily.start_time.to_string(),
                    end: daily.end_time.to_string(),
                });
            }
        }
        Ok(())
    }
}

// ========== AUTHORITY ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuthorityPurpose {
    Authorization,
    Notification,
    Information,
}

/// Contact and authorization metadata attached to a zone. `name` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Authority {
    pub name: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub site_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    pub purpose: AuthorityPurpose,
    #[serde(default)]
    pub interval_before: Option<String>,
}

impl Authority {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::field("zone_authority.name", "must not be empty"));
        }
        if name.chars().count() > MAX_TEXT_LEN {
            return Err(ValidationError::field(
                "zone_authority.name",
                format!("longer than {MAX_TEXT_LEN} characters"),
            ));
        }

        let has_contact = [&self.email, &self.site_url, &self.phone]
            .iter()
            .any(|value| value.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if !has_contact {
            return Err(ValidationError::field(
                "zone_authority",
                "one of email, site_url, phone must be defined",
            ));
        }

        if let Some(email) = self.email.as_deref() {
            if !email.contains('@') {
                return Err(ValidationError::field("zone_authority.email", "not a valid email address"));
            }
        }

        if let Some(interval) = self.interval_before.as_deref() {
            if !is_iso8601_duration(interval) {
                return Err(ValidationError::field(
                    "zone_authority.interval_before",
                    format!("'{interval}' is not an ISO 8601 duration"),
                ));
            }
        }
        Ok(())
    }
}

/// Checks `PnYnMnWnDTnHnMnS`-style durations (at least one component, `T` followed by one).
pub fn is_iso8601_duration(value: &str) -> bool {
    let Some(rest) = value.strip_prefix('P') else {
        return false;
    };
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    fn components(part: &str, designators: &[char]) -> Option<usize> {
        let mut count = 0;
        let mut next_allowed = 0;
        let mut digits = String::new();
        for c in part.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            let position = designators[next_allowed..].iter().position(|d| *d == c)?;
            if digits.is_empty() {
                return None;
            }
            digits.clear();
            next_allowed += position + 1;
            count += 1;
        }
        digits.is_empty().then_some(count)
    }

    let Some(date_count) = components(date_part, &['Y', 'M', 'W', 'D']) else {
        return false;
    };
    let time_count = match time_part {
        Some(time) => match components(time, &['H', 'M', 'S']) {
            Some(0) | None => return false,
            Some(count) => count,
        },
        None => 0,
    };
    date_count + time_count > 0
}

// ========== UAS ZONES ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ZoneType {
    Common,
    Customized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Restriction {
    Prohibited,
    ReqAuthorisation,
    Conditional,
    NoRestriction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneReason {
    AirTraffic,
    Sensitive,
    Privacy,
    Population,
    Nature,
    Noise,
    ForeignTerritory,
    Emergency,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum USpaceClass {
    Eurocontrol,
    Corus,
}

/// A restricted or regulated airspace volume with temporal applicability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UasZone {
    pub identifier: String,
    pub name: String,
    #[serde(rename = "type")]
    pub zone_type: ZoneType,
    pub restriction: Restriction,
    #[serde(default)]
    pub restriction_conditions: Vec<String>,
    pub region: u16,
    #[serde(default)]
    pub reason: Vec<ZoneReason>,
    #[serde(default)]
    pub other_reason_info: Option<String>,
    #[serde(default)]
    pub regulation_exemption: Option<YesNo>,
    #[serde(default)]
    pub u_space_class: Option<USpaceClass>,
    #[serde(default)]
    pub message: Option<String>,
    /// ISO 3166-1 alpha-3 country code
    pub country: String,
    pub zone_authority: Authority,
    pub applicability: TimePeriod,
    pub geometry: Vec<AirspaceVolume>,
    #[serde(default)]
    pub extended_properties: Map<String, Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Last update; defaults to `created_at` when the zone is stored.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UasZone {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let identifier_len = self.identifier.chars().count();
        if identifier_len == 0 || identifier_len > MAX_IDENTIFIER_LEN {
            return Err(ValidationError::field(
                "identifier",
                format!("must be 1 to {MAX_IDENTIFIER_LEN} characters"),
            ));
        }
        if self.name.chars().count() > MAX_TEXT_LEN {
            return Err(ValidationError::field(
                "name",
                format!("longer than {MAX_TEXT_LEN} characters"),
            ));
        }
        if self.country.len() != 3 || !self.country.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ValidationError::field(
                "country",
                format!("'{}' is not an ISO 3166-1 alpha-3 code", self.country),
            ));
        }
        if self.reason.len() > MAX_REASONS {
            return Err(ValidationError::field(
                "reason",
                format!("at most {MAX_REASONS} reasons allowed"),
            ));
        }
        if self.geometry.is_empty() {
            return Err(ValidationError::field("geometry", "at least one airspace volume required"));
        }
        for volume in &self.geometry {
            volume.validate()?;
        }
        self.applicability.validate()?;
        self.zone_authority.validate()?;
        Ok(())
    }
}

// ========== FILTERS & SUBSCRIPTIONS ==========

/// Spatial, vertical, regional and temporal query predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UasZonesFilter {
    pub airspace_volume: AirspaceVolume,
    /// Accepted region codes; empty accepts every region.
    #[serde(default)]
    pub regions: Vec<u16>,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    #[serde(default)]
    pub updated_after_date_time: Option<DateTime<Utc>>,
}

impl UasZonesFilter {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.airspace_volume.validate()?;
        if self.start_date_time > self.end_date_time {
            return Err(ValidationError::InvertedPeriod {
                field: "filter",
                start: self.start_date_time.to_rfc3339(),
                end: self.end_date_time.to_rfc3339(),
            });
        }
        Ok(())
    }
}

/// Linkage between a local subscription and the remote subscription manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmSubscriptionLink {
    pub id: i64,
    /// Queue the subscriber consumes from
    pub queue: String,
    pub topic_name: String,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UasZonesSubscription {
    pub id: String,
    pub owner: String,
    pub uas_zones_filter: UasZonesFilter,
    pub sm_subscription: SmSubscriptionLink,
}
