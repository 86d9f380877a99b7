//! Planar and spherical geometry for zone footprints.
//!
//! Coordinates are `[lon, lat]` pairs in decimal degrees, matching the GeoJSON
//! wire shape. Intersection tests are planar over the raw vertices; circle
//! approximation propagates bearings on a spherical earth.

use crate::error::ValidationError;

pub const FEET_METERS_RATIO: f64 = 0.3048;

/// Radius inflation applied so the approximating polygon never under-covers the circle.
pub const CIRCUMSCRIBED_RADIUS_FACTOR: f64 = 1.05;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub fn feet_to_meters(feet: f64) -> f64 {
    feet * FEET_METERS_RATIO
}

pub fn meters_to_feet(meters: f64) -> f64 {
    meters / FEET_METERS_RATIO
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }
}

/// A closed ring of `[lon, lat]` vertices (first == last).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    ring: Vec<[f64; 2]>,
}

impl Polygon {
    /// Build a polygon from a closed ring, rejecting degenerate or open rings.
    pub fn new(ring: Vec<[f64; 2]>) -> Result<Self, ValidationError> {
        validate_ring(&ring)?;
        Ok(Self { ring })
    }

    /// Build a polygon from GeoJSON polygon coordinates. Only a single shell
    /// is accepted.
    pub fn from_geojson(coordinates: &[Vec<[f64; 2]>]) -> Result<Self, ValidationError> {
        match coordinates {
            [] => Err(ValidationError::EmptyPolygon),
            [shell] => Self::new(shell.clone()),
            [_, holes @ ..] => Err(ValidationError::InteriorRings(holes.len())),
        }
    }

    pub fn ring(&self) -> &[[f64; 2]] {
        &self.ring
    }

    pub fn to_geojson(&self) -> Vec<Vec<[f64; 2]>> {
        vec![self.ring.clone()]
    }

    pub fn bounding_box(&self) -> BoundingBox {
        let mut bbox = BoundingBox {
            min_lon: f64::INFINITY,
            min_lat: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for [lon, lat] in &self.ring {
            bbox.min_lon = bbox.min_lon.min(*lon);
            bbox.min_lat = bbox.min_lat.min(*lat);
            bbox.max_lon = bbox.max_lon.max(*lon);
            bbox.max_lat = bbox.max_lat.max(*lat);
        }
        bbox
    }

    /// Ray casting point-in-polygon test. Points exactly on an edge may go either way;
    /// `polygon_intersects` catches those through the edge tests.
    pub fn contains_point(&self, point: [f64; 2]) -> bool {
        let [x, y] = point;
        let n = self.ring.len();
        if n < 4 {
            return false;
        }

        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let [xi, yi] = self.ring[i];
            let [xj, yj] = self.ring[j];

            if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
                inside = !inside;
            }
            j = i;
        }

        inside
    }

    fn edges(&self) -> impl Iterator<Item = ([f64; 2], [f64; 2])> + '_ {
        self.ring.windows(2).map(|pair| (pair[0], pair[1]))
    }
}

/// Check a GeoJSON linestring: finite coordinates, at least 3 distinct vertices, closed.
pub fn validate_ring(ring: &[[f64; 2]]) -> Result<(), ValidationError> {
    if let Some([lon, lat]) = ring
        .iter()
        .find(|[lon, lat]| !lon.is_finite() || !lat.is_finite())
    {
        return Err(ValidationError::InvalidCoordinate(*lon, *lat));
    }

    let mut distinct: Vec<[f64; 2]> = Vec::with_capacity(ring.len());
    for vertex in ring {
        if !distinct.contains(vertex) {
            distinct.push(*vertex);
        }
    }
    if distinct.len() < 3 {
        return Err(ValidationError::TooFewVertices);
    }

    if ring.first() != ring.last() {
        return Err(ValidationError::UnclosedRing);
    }

    Ok(())
}

/// True iff the two polygons share at least one point (boundary touch included).
pub fn polygon_intersects(a: &Polygon, b: &Polygon) -> bool {
    if !a.bounding_box().intersects(&b.bounding_box()) {
        return false;
    }

    for (a1, a2) in a.edges() {
        for (b1, b2) in b.edges() {
            if segments_intersect_2d(a1, a2, b1, b2) {
                return true;
            }
        }
    }

    // No edge crossings: either disjoint or one polygon lies fully inside the other.
    let a_inside_b = a.ring.first().is_some_and(|p| b.contains_point(*p));
    let b_inside_a = b.ring.first().is_some_and(|p| a.contains_point(*p));
    a_inside_b || b_inside_a
}

pub(crate) fn segments_intersect_2d(
    a1: [f64; 2],
    a2: [f64; 2],
    b1: [f64; 2],
    b2: [f64; 2],
) -> bool {
    // Degrees; only absorbs floating-point error from the cross products.
    const EPS: f64 = 1e-12;

    fn orient(p: [f64; 2], q: [f64; 2], r: [f64; 2]) -> f64 {
        (q[0] - p[0]) * (r[1] - p[1]) - (q[1] - p[1]) * (r[0] - p[0])
    }

    fn within(a: f64, b: f64, value: f64) -> bool {
        let min = a.min(b) - EPS;
        let max = a.max(b) + EPS;
        value >= min && value <= max
    }

    fn on_segment(p: [f64; 2], q: [f64; 2], r: [f64; 2]) -> bool {
        within(p[0], q[0], r[0]) && within(p[1], q[1], r[1])
    }

    let o1 = orient(a1, a2, b1);
    let o2 = orient(a1, a2, b2);
    let o3 = orient(b1, b2, a1);
    let o4 = orient(b1, b2, a2);

    if o1.abs() <= EPS && on_segment(a1, a2, b1) {
        return true;
    }
    if o2.abs() <= EPS && on_segment(a1, a2, b2) {
        return true;
    }
    if o3.abs() <= EPS && on_segment(b1, b2, a1) {
        return true;
    }
    if o4.abs() <= EPS && on_segment(b1, b2, a2) {
        return true;
    }

    let a_crosses = (o1 > EPS && o2 < -EPS) || (o1 < -EPS && o2 > EPS);
    let b_crosses = (o3 > EPS && o4 < -EPS) || (o3 < -EPS && o4 > EPS);
    a_crosses && b_crosses
}

/// Approximate a circle with a regular polygon of `edges` edges.
///
/// Vertices sit exactly on the circle, so the polygon is inscribed. A zero
/// radius yields a degenerate single-point ring, which still takes part in
/// intersection tests.
pub fn circle_to_polygon(
    center: [f64; 2],
    radius_m: f64,
    edges: usize,
) -> Result<Polygon, ValidationError> {
    let [lon, lat] = center;
    if !lon.is_finite() || !lat.is_finite() {
        return Err(ValidationError::InvalidCoordinate(lon, lat));
    }
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(ValidationError::NegativeRadius(radius_m));
    }
    if edges < 3 {
        return Err(ValidationError::TooFewEdges(edges));
    }

    let mut ring = Vec::with_capacity(edges + 1);
    for i in 0..edges {
        let bearing_deg = 360.0 * i as f64 / edges as f64;
        let (vertex_lat, vertex_lon) = offset_by_bearing(lat, lon, radius_m, bearing_deg.to_radians());
        ring.push([vertex_lon, vertex_lat]);
    }
    ring.push(ring[0]);

    Ok(Polygon { ring })
}

/// Polygon approximation that covers the whole circle (radius inflated by 5%).
pub fn circumscribed_polygon(
    center: [f64; 2],
    radius_m: f64,
    edges: usize,
) -> Result<Polygon, ValidationError> {
    if !radius_m.is_finite() || radius_m < 0.0 {
        return Err(ValidationError::NegativeRadius(radius_m));
    }
    circle_to_polygon(center, radius_m * CIRCUMSCRIBED_RADIUS_FACTOR, edges)
}

/// Great-circle distance in meters between two points given in degrees.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Offset a position by distance and bearing.
///
/// # Arguments
/// * `lat`, `lon` - Starting position in degrees
/// * `distance_m` - Distance in meters
/// * `bearing_rad` - Bearing in radians (0 = north, π/2 = east)
///
/// # Returns
/// (new_lat, new_lon) in degrees
pub fn offset_by_bearing(lat: f64, lon: f64, distance_m: f64, bearing_rad: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    (lat2.to_degrees(), lon2.to_degrees())
}
