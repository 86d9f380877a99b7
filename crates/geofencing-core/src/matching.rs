//! Zone-match predicate.
//!
//! A zone matches a filter when all of the following hold:
//! 1. one of its airspace volumes has a footprint intersecting the filter footprint
//!    and a vertical band inside the filter band (both in meters),
//! 2. its region is accepted by the filter (an empty region list accepts all),
//! 3. its applicability window lies inside the filter window,
//! 4. it was updated at or after the filter watermark, when one is given.
//!
//! The same predicate backs the store query (as a final refinement step) and the
//! per-zone re-evaluation done by the notification pipeline.

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::geometry::{polygon_intersects, Polygon};
use crate::models::{AirspaceVolume, TimePeriod, UasZone, UasZonesFilter};

/// A validated filter with its footprint resolved and limits normalized to meters.
#[derive(Debug, Clone)]
pub struct PreparedFilter {
    pub footprint: Polygon,
    pub lower_limit_m: f64,
    pub upper_limit_m: f64,
    pub regions: Vec<u16>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub updated_after: Option<DateTime<Utc>>,
    circle_edges: usize,
}

impl PreparedFilter {
    pub fn new(filter: &UasZonesFilter, circle_edges: usize) -> Result<Self, ValidationError> {
        filter.validate()?;
        let volume = &filter.airspace_volume;

        Ok(Self {
            footprint: volume.footprint(circle_edges)?,
            lower_limit_m: volume.lower_limit_m(),
            upper_limit_m: volume.upper_limit_m(),
            regions: filter.regions.clone(),
            start: filter.start_date_time,
            end: filter.end_date_time,
            updated_after: filter.updated_after_date_time,
            circle_edges,
        })
    }

    /// Edge count used when zone circles are turned into polygons.
    pub fn circle_edges(&self) -> usize {
        self.circle_edges
    }

    pub fn matches(&self, zone: &UasZone) -> bool {
        zone_matches(zone, self)
    }
}

pub fn zone_matches(zone: &UasZone, filter: &PreparedFilter) -> bool {
    region_accepted(zone.region, &filter.regions)
        && applicability_within(&zone.applicability, filter.start, filter.end)
        && updated_since(zone.updated_at, filter.updated_after)
        && zone
            .geometry
            .iter()
            .any(|volume| volume_matches(volume, filter))
}

/// Horizontal and vertical clauses, evaluated on the same volume.
pub fn volume_matches(volume: &AirspaceVolume, filter: &PreparedFilter) -> bool {
    if !band_within(
        volume.lower_limit_m(),
        volume.upper_limit_m(),
        filter.lower_limit_m,
        filter.upper_limit_m,
    ) {
        return false;
    }

    match volume.footprint(filter.circle_edges) {
        Ok(footprint) => polygon_intersects(&footprint, &filter.footprint),
        Err(_) => false,
    }
}

/// Zone band must sit inside the filter band; equal boundaries count.
pub fn band_within(zone_lower_m: f64, zone_upper_m: f64, filter_lower_m: f64, filter_upper_m: f64) -> bool {
    zone_upper_m <= filter_upper_m && zone_lower_m >= filter_lower_m
}

pub fn region_accepted(region: u16, regions: &[u16]) -> bool {
    regions.is_empty() || regions.contains(&region)
}

/// The filter window must contain the zone window.
pub fn applicability_within(period: &TimePeriod, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    period.start_date_time >= start && period.end_date_time <= end
}

pub fn updated_since(updated_at: Option<DateTime<Utc>>, watermark: Option<DateTime<Utc>>) -> bool {
    match watermark {
        None => true,
        Some(watermark) => updated_at.is_some_and(|updated| updated >= watermark),
    }
}
