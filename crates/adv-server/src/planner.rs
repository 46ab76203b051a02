//! Plan orchestration: corridor, discovery, stitching, response assembly.

use crate::gpx;
use crate::state::AppState;
use adv_core::corridor::{resolve_corridor, CorridorResult};
use adv_core::models::{BoundingBox, Evidence, Point, RouteError};
use adv_core::stitch::{stitch, PlanSpec};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct PlanRequest {
    pub start: Point,
    pub end: Point,
    #[serde(default)]
    pub vias: Vec<Point>,
    /// Optional explicit corridor override: [south, west, north, east].
    #[serde(default)]
    pub bbox: Option<[f64; 4]>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanResponse {
    pub plan_id: String,
    pub generated_at: String,
    /// GeoJSON-ordered coordinate pairs of the final path.
    pub coordinates: Vec<[f64; 2]>,
    pub distance_m: f64,
    pub used_fallback: bool,
    pub evidence: Vec<Evidence>,
    pub corridor: CorridorResult,
    /// Candidate tracks discovered inside the corridor.
    pub track_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gpx_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geojson_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Routing(#[from] RouteError),
}

/// Run one plan request end to end.
pub async fn plan_adventure(
    state: &AppState,
    request: PlanRequest,
) -> Result<PlanResponse, PlanError> {
    let spec = validate(&request)?;
    let requested_bbox = match request.bbox {
        Some([south, west, north, east]) => Some(
            BoundingBox::new(south, west, north, east)
                .map_err(|err| PlanError::InvalidRequest(err.to_string()))?,
        ),
        None => None,
    };

    let corridor = resolve_corridor(spec.start, spec.end, requested_bbox, &state.config.corridor());
    tracing::info!(
        area_km2 = corridor.area_km2,
        pad_km = corridor.pad_km,
        shrunk = corridor.shrunk,
        "corridor resolved"
    );

    let tracks = match state.discovery.unpaved_tracks(&corridor.bbox).await {
        Ok(tracks) => tracks,
        Err(err) => {
            tracing::warn!(error = %err, "track discovery failed, planning without tracks");
            Vec::new()
        }
    };
    let track_count = tracks.len();

    let outcome = stitch(&state.gate, &spec, &tracks, &state.config.stitch()).await?;
    tracing::info!(
        coordinates = outcome.coordinates.len(),
        used_fallback = outcome.used_fallback,
        "plan stitched"
    );

    let plan_id = Uuid::new_v4().to_string();
    let gpx_url = upload_document(
        state,
        &format!("plans/{plan_id}.gpx"),
        gpx::to_gpx(&plan_id, &outcome.coordinates).into_bytes(),
        "application/gpx+xml",
    )
    .await;
    let geojson_url = upload_document(
        state,
        &format!("plans/{plan_id}.geojson"),
        gpx::to_geojson(&outcome.coordinates).to_string().into_bytes(),
        "application/geo+json",
    )
    .await;

    Ok(PlanResponse {
        coordinates: outcome.coordinates.iter().map(Point::lon_lat).collect(),
        distance_m: outcome.distance_m,
        used_fallback: outcome.used_fallback,
        evidence: outcome.evidence,
        corridor,
        track_count,
        gpx_url,
        geojson_url,
        generated_at: Utc::now().to_rfc3339(),
        plan_id,
    })
}

fn validate(request: &PlanRequest) -> Result<PlanSpec, PlanError> {
    let start = Point::new(request.start.lat, request.start.lon)
        .map_err(|err| PlanError::InvalidRequest(format!("start: {err}")))?;
    let end = Point::new(request.end.lat, request.end.lon)
        .map_err(|err| PlanError::InvalidRequest(format!("end: {err}")))?;
    let vias = request
        .vias
        .iter()
        .enumerate()
        .map(|(i, via)| {
            Point::new(via.lat, via.lon)
                .map_err(|err| PlanError::InvalidRequest(format!("via {i}: {err}")))
        })
        .collect::<Result<Vec<Point>, PlanError>>()?;
    Ok(PlanSpec { start, end, vias })
}

/// Best effort: a failed upload never fails the plan.
async fn upload_document(
    state: &AppState,
    path: &str,
    bytes: Vec<u8>,
    content_type: &str,
) -> Option<String> {
    let storage = state.storage.as_ref()?;
    match storage.put(path, bytes, content_type).await {
        Ok(url) => Some(url),
        Err(err) => {
            tracing::warn!(error = %err, path, "document upload failed");
            None
        }
    }
}
