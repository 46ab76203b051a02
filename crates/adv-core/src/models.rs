//! Core data models for the adventure route planner.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A geographic position in decimal degrees.
///
/// Serialized with named fields so the coordinate order is never guessed at
/// the API boundary; GeoJSON-ordered pairs are produced via [`Point::lon_lat`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub lat: f64,
    pub lon: f64,
}

impl Point {
    /// Build a validated point from latitude/longitude degrees.
    pub fn new(lat: f64, lon: f64) -> Result<Self, GeoError> {
        if !lat.is_finite() || !lon.is_finite() {
            return Err(GeoError::NotFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeoError::LatitudeRange(lat));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(GeoError::LongitudeRange(lon));
        }
        Ok(Self { lat, lon })
    }

    /// Resolve an untagged numeric pair whose axis order is unknown.
    ///
    /// Accepts the pair only when exactly one of (lat, lon) / (lon, lat) is
    /// plausible. Pairs that fit both orders are rejected rather than
    /// guessed; callers with a declared order should use [`Point::new`].
    pub fn infer_from_pair(a: f64, b: f64) -> Result<Self, GeoError> {
        if !a.is_finite() || !b.is_finite() {
            return Err(GeoError::NotFinite);
        }
        let as_lat_lon = (-90.0..=90.0).contains(&a) && (-180.0..=180.0).contains(&b);
        let as_lon_lat = (-90.0..=90.0).contains(&b) && (-180.0..=180.0).contains(&a);
        match (as_lat_lon, as_lon_lat) {
            (true, true) if a == b => Ok(Self { lat: a, lon: b }),
            (true, true) => Err(GeoError::AmbiguousOrder(a, b)),
            (true, false) => Ok(Self { lat: a, lon: b }),
            (false, true) => Ok(Self { lat: b, lon: a }),
            (false, false) => Err(GeoError::NoValidOrder(a, b)),
        }
    }

    /// True when both components are finite and within coordinate range.
    pub fn is_valid(&self) -> bool {
        Self::new(self.lat, self.lon).is_ok()
    }

    /// GeoJSON-ordered pair.
    pub fn lon_lat(&self) -> [f64; 2] {
        [self.lon, self.lat]
    }
}

/// Geographic bounding box in degrees.
///
/// Invariant: `south < north` and `west < east`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl BoundingBox {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, GeoError> {
        for value in [south, west, north, east] {
            if !value.is_finite() {
                return Err(GeoError::NotFinite);
            }
        }
        if south >= north || west >= east {
            return Err(GeoError::EmptyBox);
        }
        Ok(Self {
            south,
            west,
            north,
            east,
        })
    }

    /// Smallest box spanning two diagonal corners, in either order.
    pub fn from_corners(a: Point, b: Point) -> Result<Self, GeoError> {
        Self::new(
            a.lat.min(b.lat),
            a.lon.min(b.lon),
            a.lat.max(b.lat),
            a.lon.max(b.lon),
        )
    }

    pub fn contains(&self, point: Point) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lon >= self.west
            && point.lon <= self.east
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("coordinate is not finite")]
    NotFinite,
    #[error("latitude {0} outside [-90, 90]")]
    LatitudeRange(f64),
    #[error("longitude {0} outside [-180, 180]")]
    LongitudeRange(f64),
    #[error("coordinate pair ({0}, {1}) is ambiguous: both axis orders are plausible")]
    AmbiguousOrder(f64, f64),
    #[error("coordinate pair ({0}, {1}) fits no axis order")]
    NoValidOrder(f64, f64),
    #[error("bounding box has an empty extent")]
    EmptyBox,
}

/// One candidate off-road way discovered inside the corridor.
///
/// Read-only after discovery; `id` is stable per source way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackCandidate {
    pub id: String,
    pub coords: Vec<Point>,
}

/// A routed path returned by the routing collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePath {
    pub points: Vec<Point>,
    pub distance_m: f64,
    pub duration_s: f64,
}

/// Failure modes of the routing collaborator.
///
/// Rate-limit signals never surface here; the gate absorbs them by waiting.
#[derive(Debug, Clone, Error)]
pub enum RouteError {
    #[error("routing service returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("routing transport failed: {0}")]
    Transport(String),
    #[error("route request needs at least two points")]
    NotEnoughPoints,
}

/// Provenance record emitted while assembling a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Synthetic anchors inserted for selected-track entry points.
    AutoAnchors { count: usize },
    TrackAttached {
        id: String,
        join_distance_m: f64,
        length_km: f64,
    },
    /// Selected track whose entry point ended up outside the join radius.
    TrackSkipped { id: String, join_distance_m: f64 },
    PairRescued { pair: usize, attempts: u32 },
    ShortHopSkipped { pair: usize },
    /// Skip-one recovery: the unroutable anchor was dropped from the chain.
    AnchorDropped { pair: usize },
    TimeBudgetEscape { remaining_anchors: usize },
    FallbackUsed { reason: String },
}

/// Final result of a stitch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanOutcome {
    pub coordinates: Vec<Point>,
    pub evidence: Vec<Evidence>,
    pub used_fallback: bool,
    pub distance_m: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_new_validates_ranges() {
        assert!(Point::new(45.0, -122.0).is_ok());
        assert!(matches!(
            Point::new(91.0, 0.0),
            Err(GeoError::LatitudeRange(_))
        ));
        assert!(matches!(
            Point::new(0.0, 181.0),
            Err(GeoError::LongitudeRange(_))
        ));
        assert!(matches!(
            Point::new(f64::NAN, 0.0),
            Err(GeoError::NotFinite)
        ));
    }

    #[test]
    fn infer_pair_accepts_unambiguous_orders() {
        // 117.8 cannot be a latitude, so the order is provably (lat, lon) swapped.
        let point = Point::infer_from_pair(-117.8, 33.6).unwrap();
        assert_eq!(point.lat, 33.6);
        assert_eq!(point.lon, -117.8);

        let point = Point::infer_from_pair(33.6, -117.8).unwrap();
        assert_eq!(point.lat, 33.6);
        assert_eq!(point.lon, -117.8);
    }

    #[test]
    fn infer_pair_fails_closed_on_ambiguity() {
        assert!(matches!(
            Point::infer_from_pair(8.5, 47.3),
            Err(GeoError::AmbiguousOrder(_, _))
        ));
        assert!(matches!(
            Point::infer_from_pair(200.0, 200.0),
            Err(GeoError::NoValidOrder(_, _))
        ));
    }

    #[test]
    fn bounding_box_rejects_empty_extent() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_err());
        assert!(BoundingBox::new(10.0, 20.0, 20.0, 10.0).is_err());
        assert!(BoundingBox::new(10.0, 10.0, 20.0, 20.0).is_ok());
    }

    #[test]
    fn evidence_serializes_with_kind_tag() {
        let entry = Evidence::PairRescued {
            pair: 2,
            attempts: 1,
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["kind"], "pair_rescued");
        assert_eq!(value["pair"], 2);
    }
}
