//! Off-road track discovery against an Overpass endpoint.

use crate::cache::{self, CacheEntry};
use adv_core::models::{BoundingBox, Point, TrackCandidate};
use dashmap::DashMap;
use reqwest::Client;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub overpass_url: String,
    pub timeout_s: u64,
    pub retries: u32,
    pub backoff_ms: u64,
    pub max_elements: usize,
    /// Overpass regex matched against `surface` tags of highway ways.
    pub surface_pattern: String,
    /// Overpass regex matched against `tracktype` of highway=track ways.
    pub tracktype_pattern: String,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            overpass_url: "https://overpass-api.de/api/interpreter".to_string(),
            timeout_s: 25,
            retries: 2,
            backoff_ms: 500,
            max_elements: 400,
            surface_pattern: "unpaved|gravel|dirt|ground|earth|compacted|fine_gravel|sand"
                .to_string(),
            tracktype_pattern: "grade[2-5]".to_string(),
            cache_ttl: Duration::from_secs(900),
            cache_max_entries: 128,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("spatial provider HTTP {0}")]
    Upstream(u16),
    #[error("spatial provider transport failed: {0}")]
    Transport(String),
}

#[derive(Debug, Clone)]
struct DiscoveryCacheEntry {
    fetched_at: Instant,
    tracks: Vec<TrackCandidate>,
}

impl CacheEntry for DiscoveryCacheEntry {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

pub struct DiscoveryClient {
    client: Client,
    config: DiscoveryConfig,
    cache: DashMap<String, DiscoveryCacheEntry>,
}

#[derive(Debug, serde::Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassWay>,
}

#[derive(Debug, serde::Deserialize)]
struct OverpassWay {
    id: i64,
    geometry: Option<Vec<OverpassGeometryPoint>>,
}

#[derive(Debug, serde::Deserialize)]
struct OverpassGeometryPoint {
    lat: f64,
    lon: f64,
}

impl DiscoveryClient {
    pub fn new(config: DiscoveryConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_s.max(5)))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            cache: DashMap::new(),
        }
    }

    /// Query unpaved ways inside the corridor box.
    ///
    /// Returns an empty list when the area genuinely has none; failures
    /// surface as errors and are degraded by the caller.
    pub async fn unpaved_tracks(
        &self,
        bbox: &BoundingBox,
    ) -> Result<Vec<TrackCandidate>, DiscoveryError> {
        let cache_key = format!(
            "{:.4},{:.4},{:.4},{:.4}",
            bbox.south, bbox.west, bbox.north, bbox.east
        );
        let mut stale: Option<Vec<TrackCandidate>> = None;
        if let Some(entry) = self.cache.get(&cache_key) {
            let age = entry.fetched_at.elapsed();
            if age <= self.config.cache_ttl {
                return Ok(entry.tracks.clone());
            }
            if age <= self.config.cache_ttl.saturating_mul(2) {
                stale = Some(entry.tracks.clone());
            }
        }

        let query = self.build_query(bbox);
        let payload = match self.fetch(&query).await {
            Ok(payload) => payload,
            Err(err) => {
                if let Some(tracks) = stale {
                    tracing::warn!(error = %err, "track discovery failed, using stale cache");
                    return Ok(tracks);
                }
                return Err(err);
            }
        };

        let tracks = self.normalize(payload);
        self.cache.insert(
            cache_key,
            DiscoveryCacheEntry {
                fetched_at: Instant::now(),
                tracks: tracks.clone(),
            },
        );
        if self.cache.len() > self.config.cache_max_entries {
            cache::prune_cache(
                &self.cache,
                self.config.cache_max_entries,
                self.config.cache_ttl.saturating_mul(2),
            );
        }

        Ok(tracks)
    }

    fn build_query(&self, bbox: &BoundingBox) -> String {
        let bbox_part = format!(
            "{},{},{},{}",
            bbox.south, bbox.west, bbox.north, bbox.east
        );
        let timeout = self.config.timeout_s.max(5);
        let tracktype = &self.config.tracktype_pattern;
        let surface = &self.config.surface_pattern;
        format!(
            "[out:json][timeout:{timeout}];\n(\n  way[\"highway\"=\"track\"][\"tracktype\"~\"{tracktype}\"]({bbox_part});\n  way[\"highway\"=\"track\"][!\"tracktype\"]({bbox_part});\n  way[\"highway\"][\"surface\"~\"{surface}\"]({bbox_part});\n);\nout geom;"
        )
    }

    async fn fetch(&self, query: &str) -> Result<OverpassResponse, DiscoveryError> {
        let max_attempts = self.config.retries.saturating_add(1);
        let backoff_base_ms = self.config.backoff_ms.max(1);
        let mut last_err = DiscoveryError::Transport("no attempt made".to_string());

        for attempt in 0..max_attempts {
            let response = self
                .client
                .post(&self.config.overpass_url)
                .header("Content-Type", "text/plain")
                .body(query.to_string())
                .send()
                .await;

            match response {
                Ok(response) => {
                    if !response.status().is_success() {
                        last_err = DiscoveryError::Upstream(response.status().as_u16());
                    } else {
                        match response.json::<OverpassResponse>().await {
                            Ok(parsed) => return Ok(parsed),
                            Err(err) => {
                                last_err = DiscoveryError::Transport(err.to_string());
                            }
                        }
                    }
                }
                Err(err) => {
                    last_err = DiscoveryError::Transport(err.to_string());
                }
            }

            if attempt + 1 < max_attempts {
                let delay_ms = backoff_base_ms.saturating_mul(attempt.saturating_add(1) as u64);
                sleep(Duration::from_millis(delay_ms)).await;
            }
        }

        Err(last_err)
    }

    fn normalize(&self, payload: OverpassResponse) -> Vec<TrackCandidate> {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut tracks: Vec<TrackCandidate> = Vec::new();

        for way in payload.elements {
            if !seen.insert(way.id) {
                continue;
            }
            let Some(geometry) = way.geometry else {
                continue;
            };
            let coords: Vec<Point> = geometry
                .iter()
                .filter_map(|g| Point::new(g.lat, g.lon).ok())
                .collect();
            if coords.is_empty() {
                continue;
            }
            tracks.push(TrackCandidate {
                id: format!("way/{}", way.id),
                coords,
            });
        }

        if tracks.len() > self.config.max_elements {
            tracing::warn!(
                discovered = tracks.len(),
                kept = self.config.max_elements,
                "track discovery truncated"
            );
            tracks.truncate(self.config.max_elements);
        }

        tracks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_with(max_elements: usize) -> DiscoveryClient {
        DiscoveryClient::new(DiscoveryConfig {
            max_elements,
            ..DiscoveryConfig::default()
        })
    }

    fn payload_from(json: &str) -> OverpassResponse {
        serde_json::from_str(json).expect("payload parses")
    }

    #[test]
    fn query_scopes_all_clauses_to_the_bbox() {
        let client = client_with(400);
        let bbox = BoundingBox::new(46.0, 7.0, 46.5, 7.5).unwrap();
        let query = client.build_query(&bbox);
        assert!(query.contains("[out:json]"));
        assert!(query.contains("out geom;"));
        assert_eq!(query.matches("46,7,46.5,7.5").count(), 3);
        assert!(query.contains("tracktype"));
        assert!(query.contains("surface"));
    }

    #[test]
    fn normalize_builds_stable_ids_and_drops_bad_points() {
        let client = client_with(400);
        let payload = payload_from(
            r#"{"elements":[
                {"id": 42, "geometry": [{"lat": 46.1, "lon": 7.1}, {"lat": 999.0, "lon": 7.2}, {"lat": 46.2, "lon": 7.2}]},
                {"id": 42, "geometry": [{"lat": 46.1, "lon": 7.1}]},
                {"id": 43, "geometry": null},
                {"id": 44, "geometry": [{"lat": 46.3, "lon": 7.3}]}
            ]}"#,
        );
        let tracks = client.normalize(payload);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].id, "way/42");
        assert_eq!(tracks[0].coords.len(), 2, "invalid point dropped");
        assert_eq!(tracks[1].id, "way/44");
    }

    #[test]
    fn normalize_truncates_to_element_cap() {
        let client = client_with(2);
        let payload = payload_from(
            r#"{"elements":[
                {"id": 1, "geometry": [{"lat": 46.0, "lon": 7.0}]},
                {"id": 2, "geometry": [{"lat": 46.1, "lon": 7.1}]},
                {"id": 3, "geometry": [{"lat": 46.2, "lon": 7.2}]}
            ]}"#,
        );
        let tracks = client.normalize(payload);
        assert_eq!(tracks.len(), 2);
    }
}
