//! Server configuration from environment.

use adv_core::corridor::CorridorConfig;
use adv_core::stitch::StitchConfig;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,

    // Routing service
    pub routing_url: String,
    pub routing_profile: String,
    pub routing_api_key: Option<String>,
    pub routing_max_rps: f64,
    pub routing_jitter_ms: u64,
    pub routing_retry_after_s: u64,
    pub routing_timeout_s: u64,
    pub route_cache_max: usize,
    pub route_cache_ttl_s: u64,

    // Corridor
    pub corridor_pad_km_min: f64,
    pub corridor_pad_km_max: f64,
    pub corridor_max_area_km2: f64,

    // Stitching
    pub max_tracks: usize,
    pub axis_km: f64,
    pub join_radius_m: f64,
    pub rescue_per_pair: u32,
    pub rescue_total: u32,
    pub rescue_jitter_m: f64,
    pub time_budget_ms: u64,

    // Track discovery
    pub overpass_url: String,
    pub overpass_timeout_s: u64,
    pub overpass_retries: u32,
    pub overpass_backoff_ms: u64,
    pub discovery_max_elements: usize,
    pub discovery_cache_ttl_s: u64,
    pub discovery_cache_max: usize,
    pub surface_pattern: String,
    pub tracktype_pattern: String,

    // Optional upload target for rendered GPX documents
    pub storage_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env_parse("ADV_PORT", 3000),
            routing_url: env_string("ADV_ROUTING_URL", "https://graphhopper.com/api/1"),
            routing_profile: env_string("ADV_ROUTING_PROFILE", "motorcycle"),
            routing_api_key: env_opt("ADV_ROUTING_API_KEY"),
            routing_max_rps: env_parse("ADV_ROUTING_MAX_RPS", 2.0),
            routing_jitter_ms: env_parse("ADV_ROUTING_JITTER_MS", 150),
            routing_retry_after_s: env_parse("ADV_ROUTING_RETRY_AFTER_S", 2),
            routing_timeout_s: env_parse("ADV_ROUTING_TIMEOUT_S", 20),
            route_cache_max: env_parse("ADV_ROUTE_CACHE_MAX", 2048),
            route_cache_ttl_s: env_parse("ADV_ROUTE_CACHE_TTL_S", 3600),
            corridor_pad_km_min: env_parse("ADV_CORRIDOR_PAD_KM_MIN", 5.0_f64).max(0.5),
            corridor_pad_km_max: env_parse("ADV_CORRIDOR_PAD_KM_MAX", 30.0),
            corridor_max_area_km2: env_parse("ADV_CORRIDOR_MAX_AREA_KM2", 15_000.0),
            max_tracks: env_parse("ADV_MAX_TRACKS", 6),
            axis_km: env_parse("ADV_AXIS_KM", 15.0),
            // The join radius never drops below the minimum segment length.
            join_radius_m: env_parse("ADV_JOIN_RADIUS_M", 300.0_f64).max(50.0),
            rescue_per_pair: env_parse("ADV_RESCUE_PER_PAIR", 3),
            rescue_total: env_parse("ADV_RESCUE_TOTAL", 8),
            rescue_jitter_m: env_parse("ADV_RESCUE_JITTER_M", 40.0),
            time_budget_ms: env_parse("ADV_TIME_BUDGET_MS", 20_000),
            overpass_url: env_string(
                "ADV_OVERPASS_URL",
                "https://overpass-api.de/api/interpreter",
            ),
            overpass_timeout_s: env_parse("ADV_OVERPASS_TIMEOUT_S", 25),
            overpass_retries: env_parse("ADV_OVERPASS_RETRIES", 2),
            overpass_backoff_ms: env_parse("ADV_OVERPASS_BACKOFF_MS", 500),
            discovery_max_elements: env_parse("ADV_DISCOVERY_MAX_ELEMENTS", 400),
            discovery_cache_ttl_s: env_parse("ADV_DISCOVERY_CACHE_TTL_S", 900),
            discovery_cache_max: env_parse("ADV_DISCOVERY_CACHE_MAX", 128),
            surface_pattern: env_string(
                "ADV_SURFACE_PATTERN",
                "unpaved|gravel|dirt|ground|earth|compacted|fine_gravel|sand",
            ),
            tracktype_pattern: env_string("ADV_TRACKTYPE_PATTERN", "grade[2-5]"),
            storage_url: env_opt("ADV_STORAGE_URL"),
        }
    }

    pub fn corridor(&self) -> CorridorConfig {
        CorridorConfig {
            pad_km_min: self.corridor_pad_km_min,
            pad_km_max: self.corridor_pad_km_max,
            max_area_km2: self.corridor_max_area_km2,
        }
    }

    pub fn stitch(&self) -> StitchConfig {
        StitchConfig {
            max_tracks: self.max_tracks,
            axis_km: self.axis_km,
            join_radius_m: self.join_radius_m,
            rescue_per_pair: self.rescue_per_pair,
            rescue_total: self.rescue_total,
            rescue_jitter_m: self.rescue_jitter_m,
            time_budget_ms: self.time_budget_ms,
            ..StitchConfig::default()
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
