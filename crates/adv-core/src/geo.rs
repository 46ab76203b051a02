//! Spatial math for corridor and stitching calculations.

use crate::models::{BoundingBox, Point};

pub const EARTH_RADIUS_KM: f64 = 6_371.0;
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude on the spherical model.
const M_PER_DEG_LAT: f64 = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: Point, b: Point) -> f64 {
    let phi1 = a.lat.to_radians();
    let phi2 = b.lat.to_radians();
    let dphi = (b.lat - a.lat).to_radians();
    let dlambda = (b.lon - a.lon).to_radians();
    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Great-circle distance between two points in meters.
pub fn haversine_m(a: Point, b: Point) -> f64 {
    haversine_km(a, b) * 1_000.0
}

/// Meters per degree of longitude at a given latitude.
pub fn meters_per_deg_lon(lat_deg: f64) -> f64 {
    M_PER_DEG_LAT * lat_deg.to_radians().cos()
}

/// Shift a point by north/east offsets in meters.
pub fn offset_m(origin: Point, north_m: f64, east_m: f64) -> Point {
    let lat = origin.lat + north_m / M_PER_DEG_LAT;
    let lon_scale = meters_per_deg_lon(origin.lat).max(1e-9);
    let lon = origin.lon + east_m / lon_scale;
    Point { lat, lon }
}

/// Midpoint of two positions (planar mean; the spans involved are short).
pub fn midpoint(a: Point, b: Point) -> Point {
    Point {
        lat: (a.lat + b.lat) / 2.0,
        lon: (a.lon + b.lon) / 2.0,
    }
}

/// Total length of a coordinate sequence in kilometers.
pub fn path_length_km(points: &[Point]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}

/// A point projected onto the start-to-end axis of a route.
#[derive(Debug, Clone, Copy)]
pub struct AxisProjection {
    /// Position along the axis, clamped to [0, 1].
    pub fraction: f64,
    /// Distance from the point to its projection, in kilometers.
    pub lateral_km: f64,
}

/// Project `point` onto the segment `start -> end` in a local ENU frame.
pub fn axis_projection(point: Point, start: Point, end: Point) -> AxisProjection {
    let ref_lat = start.lat;
    let lon_scale = meters_per_deg_lon(ref_lat).max(1e-9);

    let px = (point.lon - start.lon) * lon_scale;
    let py = (point.lat - start.lat) * M_PER_DEG_LAT;
    let sx = (end.lon - start.lon) * lon_scale;
    let sy = (end.lat - start.lat) * M_PER_DEG_LAT;

    let seg_len_sq = sx * sx + sy * sy;
    if seg_len_sq < 1e-6 {
        // Degenerate axis: everything projects onto the start point.
        return AxisProjection {
            fraction: 0.0,
            lateral_km: (px * px + py * py).sqrt() / 1_000.0,
        };
    }

    let t = ((px * sx + py * sy) / seg_len_sq).clamp(0.0, 1.0);
    let dx = px - t * sx;
    let dy = py - t * sy;
    AxisProjection {
        fraction: t,
        lateral_km: (dx * dx + dy * dy).sqrt() / 1_000.0,
    }
}

/// Bounding-box area measured width-at-mid-latitude by height-at-mid-longitude.
pub fn bbox_area_km2(bbox: &BoundingBox) -> f64 {
    let mid_lat = (bbox.south + bbox.north) / 2.0;
    let mid_lon = (bbox.west + bbox.east) / 2.0;
    let width_km = haversine_km(
        Point {
            lat: mid_lat,
            lon: bbox.west,
        },
        Point {
            lat: mid_lat,
            lon: bbox.east,
        },
    );
    let height_km = haversine_km(
        Point {
            lat: bbox.south,
            lon: mid_lon,
        },
        Point {
            lat: bbox.north,
            lon: mid_lon,
        },
    );
    width_km * height_km
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> Point {
        Point { lat, lon }
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let dist = haversine_km(p(0.0, 0.0), p(1.0, 0.0));
        assert!((dist - 111.2).abs() < 0.2, "got {dist}");
    }

    #[test]
    fn haversine_same_point_is_zero() {
        assert!(haversine_m(p(46.2, 7.5), p(46.2, 7.5)) < 1e-6);
    }

    #[test]
    fn offset_round_trips_within_tolerance() {
        let origin = p(46.0, 7.0);
        let moved = offset_m(origin, 500.0, -300.0);
        let dist = haversine_m(origin, moved);
        assert!((dist - 583.1).abs() < 5.0, "got {dist}");
    }

    #[test]
    fn axis_projection_clamps_fraction() {
        let start = p(0.0, 0.0);
        let end = p(0.0, 1.0);
        // Behind the start point.
        let behind = axis_projection(p(0.0, -0.5), start, end);
        assert_eq!(behind.fraction, 0.0);
        // Past the end point.
        let past = axis_projection(p(0.0, 1.5), start, end);
        assert_eq!(past.fraction, 1.0);
        // Halfway, offset sideways.
        let mid = axis_projection(p(0.1, 0.5), start, end);
        assert!((mid.fraction - 0.5).abs() < 1e-6);
        assert!((mid.lateral_km - 11.1).abs() < 0.1, "got {}", mid.lateral_km);
    }

    #[test]
    fn bbox_area_is_commutative_in_corner_order() {
        let nw = p(11.0, 20.0);
        let se = p(10.0, 22.0);
        let a = BoundingBox::from_corners(nw, se).unwrap();
        let b = BoundingBox::from_corners(se, nw).unwrap();
        assert_eq!(bbox_area_km2(&a), bbox_area_km2(&b));
        assert!(bbox_area_km2(&a) > 0.0);
    }
}
