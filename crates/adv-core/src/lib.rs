pub mod corridor;
pub mod geo;
pub mod models;
pub mod stitch;
pub mod tracks;

pub use corridor::{corridor, resolve_corridor, CorridorConfig, CorridorResult};
pub use geo::{axis_projection, bbox_area_km2, haversine_km, haversine_m, path_length_km};
pub use models::{
    BoundingBox, Evidence, GeoError, PlanOutcome, Point, RouteError, RoutePath, TrackCandidate,
};
pub use stitch::{stitch, PlanSpec, RouteSource, Segment, StitchConfig};
pub use tracks::{select_tracks, ScoredCandidate, SelectorConfig};
