//! Rate-limited client for the external road-routing service.
//!
//! The gate paces every dispatch against a process-wide requests-per-second
//! cap, waits out rate-limit signals without bound (backpressure, not
//! failure), and memoizes successful two-point calls so rescue loops and
//! repeated plans do not burn quota on identical legs.

use crate::cache::{self, CacheEntry};
use adv_core::models::{Point, RouteError, RoutePath};
use adv_core::stitch::RouteSource;
use dashmap::DashMap;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::time::sleep;

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub base_url: String,
    pub profile: String,
    pub api_key: Option<String>,
    pub max_requests_per_sec: f64,
    pub jitter_ms: u64,
    pub default_retry_after: Duration,
    pub timeout: Duration,
    pub cache_max_entries: usize,
    pub cache_max_age: Duration,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graphhopper.com/api/1".to_string(),
            profile: "motorcycle".to_string(),
            api_key: None,
            max_requests_per_sec: 2.0,
            jitter_ms: 150,
            default_retry_after: Duration::from_secs(2),
            timeout: Duration::from_secs(20),
            cache_max_entries: 2048,
            cache_max_age: Duration::from_secs(3600),
        }
    }
}

/// Coordinates quantized to 1e-5 degrees (about a meter), so float formatting
/// never becomes an identity mechanism.
type MemoKey = [(i64, i64); 2];

#[derive(Debug, Clone)]
struct MemoEntry {
    fetched_at: Instant,
    path: RoutePath,
}

impl CacheEntry for MemoEntry {
    fn fetched_at(&self) -> Instant {
        self.fetched_at
    }
}

pub struct RoutingGate {
    client: Client,
    config: RoutingConfig,
    last_slot: Mutex<Option<Instant>>,
    memo: DashMap<MemoKey, MemoEntry>,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    paths: Vec<RoutedPath>,
}

#[derive(Debug, Deserialize)]
struct RoutedPath {
    distance: f64,
    /// Travel time in milliseconds.
    time: u64,
    points: RouteGeometry,
}

#[derive(Debug, Deserialize)]
struct RouteGeometry {
    /// GeoJSON order: [lon, lat].
    coordinates: Vec<[f64; 2]>,
}

impl RoutingGate {
    pub fn new(config: RoutingConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            config,
            last_slot: Mutex::new(None),
            memo: DashMap::new(),
        }
    }

    /// Reserve the next dispatch slot and sleep until it arrives.
    async fn pace(&self) {
        let gap = min_gap(self.config.max_requests_per_sec) + jitter(self.config.jitter_ms);
        let wakeup = {
            let mut last = self.last_slot.lock().await;
            let now = Instant::now();
            let slot = match *last {
                Some(previous) => (previous + gap).max(now),
                None => now,
            };
            *last = Some(slot);
            slot
        };
        let now = Instant::now();
        if wakeup > now {
            sleep(wakeup - now).await;
        }
    }

    async fn dispatch(&self, points: &[Point]) -> Result<RoutePath, RouteError> {
        let url = format!("{}/route", self.config.base_url.trim_end_matches('/'));
        loop {
            self.pace().await;

            let mut request = self.client.get(&url).query(&[
                ("profile", self.config.profile.as_str()),
                ("points_encoded", "false"),
            ]);
            for point in points {
                request = request.query(&[("point", format!("{},{}", point.lat, point.lon))]);
            }
            if let Some(key) = self.config.api_key.as_deref() {
                request = request.query(&[("key", key)]);
            }

            let response = request
                .send()
                .await
                .map_err(|err| RouteError::Transport(err.to_string()))?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let delay = parse_retry_after(response.headers())
                    .unwrap_or(self.config.default_retry_after);
                tracing::warn!(
                    delay_ms = delay.as_millis() as u64,
                    "routing service rate limited, waiting"
                );
                sleep(delay).await;
                continue;
            }

            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(RouteError::Upstream {
                    status: status.as_u16(),
                    message: truncate(&message, 200),
                });
            }

            let payload: RouteResponse = response
                .json()
                .await
                .map_err(|err| RouteError::Transport(err.to_string()))?;
            let Some(path) = payload.paths.into_iter().next() else {
                return Err(RouteError::Upstream {
                    status: status.as_u16(),
                    message: "routing response contained no path".to_string(),
                });
            };

            return Ok(RoutePath {
                points: path
                    .points
                    .coordinates
                    .iter()
                    .map(|pair| Point {
                        lat: pair[1],
                        lon: pair[0],
                    })
                    .collect(),
                distance_m: path.distance,
                duration_s: path.time as f64 / 1_000.0,
            });
        }
    }
}

impl RouteSource for RoutingGate {
    fn route(&self, points: &[Point]) -> impl Future<Output = Result<RoutePath, RouteError>> + Send {
        let points = points.to_vec();
        async move {
            if points.len() < 2 {
                return Err(RouteError::NotEnoughPoints);
            }

            let key = memo_key(&points);
            if let Some(key) = key {
                if let Some(hit) = self.memo.get(&key) {
                    tracing::debug!("route memo hit");
                    return Ok(hit.path.clone());
                }
            }

            let path = self.dispatch(&points).await?;

            if let Some(key) = key {
                self.memo.insert(
                    key,
                    MemoEntry {
                        fetched_at: Instant::now(),
                        path: path.clone(),
                    },
                );
                if self.memo.len() > self.config.cache_max_entries {
                    cache::prune_cache(
                        &self.memo,
                        self.config.cache_max_entries,
                        self.config.cache_max_age,
                    );
                }
            }

            Ok(path)
        }
    }
}

/// Memo key for two-point calls only; longer calls are never cached.
fn memo_key(points: &[Point]) -> Option<MemoKey> {
    if points.len() != 2 {
        return None;
    }
    Some([quantize(points[0]), quantize(points[1])])
}

fn quantize(point: Point) -> (i64, i64) {
    (
        (point.lat * 1e5).round() as i64,
        (point.lon * 1e5).round() as i64,
    )
}

fn min_gap(max_requests_per_sec: f64) -> Duration {
    if max_requests_per_sec <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(1.0 / max_requests_per_sec)
}

fn jitter(max_ms: u64) -> Duration {
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    Duration::from_millis(now_nanos % (max_ms + 1))
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn truncate(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        return message.to_string();
    }
    let mut end = max_len;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_key_quantizes_nearby_coordinates_together() {
        let a = [
            Point {
                lat: 46.000001,
                lon: 7.000001,
            },
            Point {
                lat: 46.1,
                lon: 7.1,
            },
        ];
        let b = [
            Point {
                lat: 46.000004,
                lon: 7.000004,
            },
            Point {
                lat: 46.1,
                lon: 7.1,
            },
        ];
        assert_eq!(memo_key(&a), memo_key(&b));
    }

    #[test]
    fn memo_key_only_covers_two_point_calls() {
        let points = vec![
            Point { lat: 0.0, lon: 0.0 },
            Point { lat: 0.1, lon: 0.1 },
            Point { lat: 0.2, lon: 0.2 },
        ];
        assert!(memo_key(&points).is_none());
    }

    #[test]
    fn min_gap_follows_rps_cap() {
        assert_eq!(min_gap(2.0), Duration::from_millis(500));
        assert_eq!(min_gap(0.0), Duration::ZERO);
    }

    #[test]
    fn jitter_stays_within_bound() {
        for _ in 0..50 {
            assert!(jitter(100) <= Duration::from_millis(100));
        }
        assert_eq!(jitter(0), Duration::ZERO);
    }

    #[test]
    fn retry_after_parses_seconds() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "3".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(3)));

        headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[tokio::test]
    async fn pacing_reserves_increasing_slots() {
        let gate = RoutingGate::new(RoutingConfig {
            max_requests_per_sec: 1000.0,
            jitter_ms: 0,
            ..RoutingConfig::default()
        });
        let before = Instant::now();
        gate.pace().await;
        gate.pace().await;
        gate.pace().await;
        // Three dispatches at 1000 rps need at least 2 ms of spacing.
        assert!(before.elapsed() >= Duration::from_millis(2));
    }
}
