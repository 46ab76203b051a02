//! Shared application state: configuration plus the external collaborators.

use crate::config::Config;
use crate::discovery::{DiscoveryClient, DiscoveryConfig};
use crate::routing::{RoutingConfig, RoutingGate};
use crate::storage::StorageClient;
use std::time::Duration;

pub struct AppState {
    pub config: Config,
    pub gate: RoutingGate,
    pub discovery: DiscoveryClient,
    pub storage: Option<StorageClient>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let gate = RoutingGate::new(RoutingConfig {
            base_url: config.routing_url.clone(),
            profile: config.routing_profile.clone(),
            api_key: config.routing_api_key.clone(),
            max_requests_per_sec: config.routing_max_rps,
            jitter_ms: config.routing_jitter_ms,
            default_retry_after: Duration::from_secs(config.routing_retry_after_s),
            timeout: Duration::from_secs(config.routing_timeout_s),
            cache_max_entries: config.route_cache_max,
            cache_max_age: Duration::from_secs(config.route_cache_ttl_s),
        });
        let discovery = DiscoveryClient::new(DiscoveryConfig {
            overpass_url: config.overpass_url.clone(),
            timeout_s: config.overpass_timeout_s,
            retries: config.overpass_retries,
            backoff_ms: config.overpass_backoff_ms,
            max_elements: config.discovery_max_elements,
            surface_pattern: config.surface_pattern.clone(),
            tracktype_pattern: config.tracktype_pattern.clone(),
            cache_ttl: Duration::from_secs(config.discovery_cache_ttl_s),
            cache_max_entries: config.discovery_cache_max,
        });
        let storage = config.storage_url.as_deref().map(StorageClient::new);

        Self {
            config,
            gate,
            discovery,
            storage,
        }
    }
}
