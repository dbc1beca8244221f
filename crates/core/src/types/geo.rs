//! Coordinates, circular geofences, and the geofence test.
//!
//! Distances use the haversine great-circle formula on a spherical Earth of
//! radius [`EARTH_RADIUS_METERS`]. Coordinates are WGS-84 decimal degrees.

use serde::{Deserialize, Serialize};

use super::id::GeofenceId;

/// Mean Earth radius used for all distance calculations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A latitude/longitude pair in decimal degrees.
///
/// No range invariant is enforced here. A point whose components are not
/// finite is "unusable": it never matches a geofence and never panics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point from latitude and longitude.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Whether both components are finite numbers.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Whether the point lies inside the valid WGS-84 range.
    ///
    /// Latitude must be within `[-90, 90]` and longitude within `[-180, 180]`.
    #[must_use]
    pub fn is_in_range(&self) -> bool {
        self.is_usable()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A circular authorized zone.
///
/// `radius_meters > 0` is enforced by whoever creates geofences; the
/// evaluator only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    /// Geofence ID.
    pub id: GeofenceId,
    /// Display name, used in logs only.
    pub name: String,
    /// Center of the zone.
    pub center: GeoPoint,
    /// Zone radius in meters.
    pub radius_meters: f64,
    /// Inactive zones are never evaluated.
    pub active: bool,
}

/// Outcome of evaluating a point against a set of geofences.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeofenceEvaluation {
    /// Whether the point is inside at least one zone.
    pub inside_any: bool,
    /// Smallest center distance seen before evaluation stopped.
    ///
    /// `f64::INFINITY` if no zone was evaluated. After a match this only
    /// covers the zones up to and including the matching one.
    pub nearest_distance_meters: f64,
    /// The first zone (in input order) that contains the point.
    pub matched: Option<GeofenceId>,
    /// Number of zones skipped because their center was unusable.
    pub skipped: usize,
}

impl GeofenceEvaluation {
    /// Nearest distance formatted for logs, `N/A` when nothing was evaluated.
    #[must_use]
    pub fn nearest_distance_display(&self) -> String {
        if self.nearest_distance_meters.is_finite() {
            format!("{:.1}m", self.nearest_distance_meters)
        } else {
            "N/A".to_string()
        }
    }
}

/// Haversine distance between two points, in meters.
///
/// Returns `f64::INFINITY` if either point is unusable.
#[must_use]
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    if !a.is_usable() || !b.is_usable() {
        return f64::INFINITY;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h marginally past 1 for antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Test whether `point` lies inside any active geofence.
///
/// Zones are visited in input order and evaluation stops at the first zone
/// whose center is within `radius_meters` (inclusive). Zones with an unusable
/// center are skipped and counted in [`GeofenceEvaluation::skipped`]; callers
/// report them as data-quality problems. An empty or fully skipped zone list
/// yields `inside_any == false` with an infinite nearest distance.
#[must_use]
pub fn evaluate(point: GeoPoint, zones: &[Geofence]) -> GeofenceEvaluation {
    let mut evaluation = GeofenceEvaluation {
        inside_any: false,
        nearest_distance_meters: f64::INFINITY,
        matched: None,
        skipped: 0,
    };

    for zone in zones.iter().filter(|zone| zone.active) {
        if !zone.center.is_usable() {
            evaluation.skipped += 1;
            continue;
        }

        let distance = haversine_distance(point, zone.center);
        evaluation.nearest_distance_meters = evaluation.nearest_distance_meters.min(distance);

        if distance <= zone.radius_meters {
            evaluation.inside_any = true;
            evaluation.matched = Some(zone.id);
            break;
        }
    }

    evaluation
}
