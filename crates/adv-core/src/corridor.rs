//! Corridor derivation: the padded search box for off-road track discovery.

use crate::geo::{bbox_area_km2, haversine_km};
use crate::models::{BoundingBox, Point};
use serde::{Deserialize, Serialize};

/// Kilometers per degree of latitude used for pad conversion.
const KM_PER_DEG: f64 = 111.0;

/// Fraction of the endpoint distance used as the initial pad.
const PAD_DISTANCE_RATIO: f64 = 0.25;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorConfig {
    pub pad_km_min: f64,
    pub pad_km_max: f64,
    pub max_area_km2: f64,
}

impl Default for CorridorConfig {
    fn default() -> Self {
        Self {
            pad_km_min: 5.0,
            pad_km_max: 30.0,
            max_area_km2: 15_000.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorridorResult {
    pub bbox: BoundingBox,
    pub pad_km: f64,
    pub area_km2: f64,
    /// True when the pad was scaled down to respect the area cap.
    pub shrunk: bool,
    pub endpoint_distance_km: f64,
}

/// Derive the padded corridor box for a start/end pair.
///
/// The pad grows with endpoint distance, clamped to the configured range,
/// then shrinks once if the resulting area exceeds the cap. Identical
/// endpoints are not an error; they yield a minimum-pad box around the
/// single position.
pub fn corridor(start: Point, end: Point, config: &CorridorConfig) -> CorridorResult {
    let endpoint_distance_km = haversine_km(start, end);
    let mut pad_km = (endpoint_distance_km * PAD_DISTANCE_RATIO)
        .max(config.pad_km_min)
        .clamp(config.pad_km_min, config.pad_km_max);

    let (mut bbox, mut area_km2) = padded_bbox(start, end, pad_km);
    let mut shrunk = false;
    if area_km2 > config.max_area_km2 && area_km2 > 0.0 {
        pad_km = shrink_pad(start, end, config.max_area_km2).min(pad_km);
        let recomputed = padded_bbox(start, end, pad_km);
        bbox = recomputed.0;
        area_km2 = recomputed.1;
        shrunk = true;
    }

    CorridorResult {
        bbox,
        pad_km,
        area_km2,
        shrunk,
        endpoint_distance_km,
    }
}

/// Resolve the corridor, honoring a caller-supplied box when allowed.
///
/// An explicit box is used only when its area exceeds neither the computed
/// corridor's area nor the configured cap; otherwise the request is logged
/// and the computed corridor wins. Never an error.
pub fn resolve_corridor(
    start: Point,
    end: Point,
    requested: Option<BoundingBox>,
    config: &CorridorConfig,
) -> CorridorResult {
    let computed = corridor(start, end, config);
    let Some(bbox) = requested else {
        return computed;
    };

    let requested_area = bbox_area_km2(&bbox);
    if requested_area <= computed.area_km2 && requested_area <= config.max_area_km2 {
        return CorridorResult {
            bbox,
            area_km2: requested_area,
            shrunk: false,
            ..computed
        };
    }

    tracing::warn!(
        requested_area_km2 = requested_area,
        computed_area_km2 = computed.area_km2,
        max_area_km2 = config.max_area_km2,
        "rejecting oversized corridor override"
    );
    computed
}

/// Largest pad whose box stays within `max_area_km2`.
///
/// The box area grows as (W0 + 2q)(H0 + 2q) in the pad's on-the-ground
/// growth q, with W0/H0 the unpadded extents; a plain sqrt rescale of the
/// pad undershoots the clamp whenever the endpoint span dominates, so the
/// quadratic is solved directly. Floors at zero: a base box already over
/// the cap cannot shrink below the endpoints' own extent.
fn shrink_pad(start: Point, end: Point, max_area_km2: f64) -> f64 {
    let mid_lat = (start.lat + end.lat) / 2.0;
    let mid_lon = (start.lon + end.lon) / 2.0;
    let width_km = haversine_km(
        Point {
            lat: mid_lat,
            lon: start.lon,
        },
        Point {
            lat: mid_lat,
            lon: end.lon,
        },
    );
    let height_km = haversine_km(
        Point {
            lat: start.lat,
            lon: mid_lon,
        },
        Point {
            lat: end.lat,
            lon: mid_lon,
        },
    );

    let b = width_km + height_km;
    let disc = b * b - 4.0 * (width_km * height_km - max_area_km2);
    if disc <= 0.0 {
        return 0.0;
    }
    let growth_km = ((disc.sqrt() - b) / 4.0).max(0.0);

    // Degrees-to-measured-km residue: the pad is converted with the flat
    // 111 km/deg convention while the box is measured with haversine.
    let km_per_deg_measured = crate::geo::EARTH_RADIUS_KM * std::f64::consts::PI / 180.0;
    growth_km * KM_PER_DEG / km_per_deg_measured
}

fn padded_bbox(start: Point, end: Point, pad_km: f64) -> (BoundingBox, f64) {
    let lat_delta = pad_km / KM_PER_DEG;
    let mean_lat = (start.lat + end.lat) / 2.0;
    let mut cos_lat = mean_lat.to_radians().cos();
    if cos_lat.abs() < f64::EPSILON {
        cos_lat = 1.0;
    }
    let lon_delta = pad_km / (KM_PER_DEG * cos_lat);

    let bbox = BoundingBox {
        south: start.lat.min(end.lat) - lat_delta,
        west: start.lon.min(end.lon) - lon_delta,
        north: start.lat.max(end.lat) + lat_delta,
        east: start.lon.max(end.lon) + lon_delta,
    };
    let area = bbox_area_km2(&bbox);
    (bbox, area)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> Point {
        Point { lat, lon }
    }

    #[test]
    fn corridor_contains_both_endpoints() {
        let start = p(46.0, 7.0);
        let end = p(46.4, 8.1);
        let result = corridor(start, end, &CorridorConfig::default());
        assert!(result.bbox.contains(start));
        assert!(result.bbox.contains(end));
        assert!(!result.shrunk);
        assert!(result.pad_km >= 5.0);
    }

    #[test]
    fn corridor_never_exceeds_area_cap() {
        let config = CorridorConfig {
            pad_km_min: 8.0,
            pad_km_max: 25.0,
            max_area_km2: 1_000.0,
        };
        let result = corridor(p(0.0, 0.0), p(0.0, 10.0), &config);
        assert!(result.shrunk);
        assert!(
            result.area_km2 <= config.max_area_km2 * 1.001,
            "area {} over cap",
            result.area_km2
        );
    }

    #[test]
    fn pad_stays_in_range_unless_shrunk() {
        let config = CorridorConfig {
            pad_km_min: 5.0,
            pad_km_max: 20.0,
            max_area_km2: 1_000_000.0,
        };
        let result = corridor(p(10.0, 10.0), p(12.0, 12.0), &config);
        assert!(!result.shrunk);
        assert!(result.pad_km >= config.pad_km_min && result.pad_km <= config.pad_km_max);
    }

    #[test]
    fn identical_endpoints_yield_minimum_pad_box() {
        let result = corridor(p(45.0, 9.0), p(45.0, 9.0), &CorridorConfig::default());
        assert_eq!(result.endpoint_distance_km, 0.0);
        assert_eq!(result.pad_km, CorridorConfig::default().pad_km_min);
        assert!(result.bbox.contains(p(45.0, 9.0)));
    }

    #[test]
    fn override_honored_only_when_smaller() {
        let config = CorridorConfig::default();
        let start = p(46.0, 7.0);
        let end = p(46.2, 7.4);
        let computed = corridor(start, end, &config);

        let tight = BoundingBox::new(46.0, 7.0, 46.2, 7.4).unwrap();
        let resolved = resolve_corridor(start, end, Some(tight), &config);
        assert_eq!(resolved.bbox, tight);
        assert!(!resolved.shrunk);

        let huge = BoundingBox::new(40.0, 0.0, 50.0, 20.0).unwrap();
        let resolved = resolve_corridor(start, end, Some(huge), &config);
        assert_eq!(resolved.bbox, computed.bbox);
    }
}
