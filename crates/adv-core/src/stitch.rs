//! Route stitching: chaining paved connectors and selected off-road tracks.
//!
//! The stitcher walks an anchor chain in strict order, requesting connector
//! segments from the routing collaborator, repairing failed pairs with a
//! jittered-midpoint rescue, and escaping to coarser strategies (tail
//! routing, anchor skipping, full fallback) when a pair cannot be connected
//! within its budgets. Every escape path is a named variant so each
//! transition can be exercised on its own.

use crate::geo::{haversine_m, midpoint, offset_m};
use crate::models::{Evidence, PlanOutcome, Point, RouteError, RoutePath, TrackCandidate};
use crate::tracks::{select_tracks, ScoredCandidate, SelectorConfig};
use rand::Rng;
use std::cmp::Ordering;
use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct StitchConfig {
    /// Maximum number of tracks to attach.
    pub max_tracks: usize,
    /// Lateral tolerance from the start-end axis, in kilometers.
    pub axis_km: f64,
    /// Maximum connector-endpoint to track-entry distance for attachment.
    pub join_radius_m: f64,
    /// Hops shorter than this are collapsed or skipped without a routing call.
    pub min_segment_m: f64,
    /// Rescue attempts allowed for a single pair.
    pub rescue_per_pair: u32,
    /// Rescue attempts shared across all pairs of one request.
    pub rescue_total: u32,
    /// Bound of the random midpoint perturbation, in meters.
    pub rescue_jitter_m: f64,
    /// Wall-clock budget for the whole stitch.
    pub time_budget_ms: u64,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            max_tracks: 6,
            axis_km: 15.0,
            join_radius_m: 300.0,
            min_segment_m: 50.0,
            rescue_per_pair: 3,
            rescue_total: 8,
            rescue_jitter_m: 40.0,
            time_budget_ms: 20_000,
        }
    }
}

/// The endpoints and intermediate via points of one plan request.
#[derive(Debug, Clone)]
pub struct PlanSpec {
    pub start: Point,
    pub end: Point,
    pub vias: Vec<Point>,
}

impl PlanSpec {
    fn raw_anchors(&self) -> Vec<Point> {
        let mut anchors = Vec::with_capacity(self.vias.len() + 2);
        anchors.push(self.start);
        anchors.extend_from_slice(&self.vias);
        anchors.push(self.end);
        anchors
    }
}

/// The routing collaborator seam.
///
/// Implementations are expected to absorb rate limiting internally; errors
/// reaching the stitcher are treated as pair failures, not backpressure.
pub trait RouteSource {
    fn route(&self, points: &[Point]) -> impl Future<Output = Result<RoutePath, RouteError>> + Send;
}

/// One piece of the stitched output.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Paved path from the routing service.
    Connector(Vec<Point>),
    /// Off-road track geometry, copied verbatim from its candidate.
    Track { id: String, coords: Vec<Point> },
}

impl Segment {
    fn points(&self) -> &[Point] {
        match self {
            Segment::Connector(points) => points,
            Segment::Track { coords, .. } => coords,
        }
    }
}

#[derive(Debug, Clone)]
struct Anchor {
    point: Point,
    kind: AnchorKind,
}

#[derive(Debug, Clone, Copy)]
enum AnchorKind {
    User,
    /// Synthetic anchor at the entry point of a selected track.
    TrackEntry { index: usize },
}

/// How one anchor pair was resolved during the connecting walk.
enum PairAttempt {
    Connected { path: RoutePath, attempts: u32 },
    TimedOut,
    Exhausted,
}

/// Chain under construction.
struct ChainState {
    segments: Vec<Segment>,
    evidence: Vec<Evidence>,
    distance_m: f64,
    rescue_spent: u32,
    cursor: Point,
}

impl ChainState {
    fn new(cursor: Point) -> Self {
        Self {
            segments: Vec::new(),
            evidence: Vec::new(),
            distance_m: 0.0,
            rescue_spent: 0,
            cursor,
        }
    }

    fn push_connector(&mut self, path: RoutePath) {
        if let Some(last) = path.points.last() {
            self.cursor = *last;
        }
        self.distance_m += path.distance_m;
        self.segments.push(Segment::Connector(path.points));
    }
}

/// Build a stitched route from start to end through selected tracks.
///
/// Connector and rescue failures are always recovered locally; the only
/// error the caller can see is the fallback call itself failing.
pub async fn stitch<R: RouteSource>(
    router: &R,
    spec: &PlanSpec,
    tracks: &[TrackCandidate],
    config: &StitchConfig,
) -> Result<PlanOutcome, RouteError> {
    let started = Instant::now();
    let budget = Duration::from_millis(config.time_budget_ms);

    // Cleaning
    let cleaned = clean_anchors(&spec.raw_anchors(), config.min_segment_m);
    if cleaned.len() < 2 {
        return fallback(router, spec, "fewer than two usable anchors").await;
    }

    // Selecting
    let selector = SelectorConfig {
        max_tracks: config.max_tracks,
        max_axis_km: config.axis_km,
        ..SelectorConfig::default()
    };
    let selected = select_tracks(tracks, spec.start, spec.end, &selector);
    if selected.is_empty() {
        return fallback(router, spec, "no usable tracks in corridor").await;
    }

    let anchors = build_anchor_chain(&cleaned, &selected, spec.start, spec.end);
    tracing::debug!(
        anchors = anchors.len(),
        tracks = selected.len(),
        "anchor chain built"
    );

    // Connecting
    match connect(router, &anchors, &selected, config, started, budget).await {
        Ok(chain) => Ok(merge(chain, selected.len())),
        Err(reason) => fallback(router, spec, &reason).await,
    }
}

/// Drop malformed points and collapse hops below the minimum segment length.
fn clean_anchors(raw: &[Point], min_segment_m: f64) -> Vec<Point> {
    let mut cleaned: Vec<Point> = Vec::with_capacity(raw.len());
    for point in raw {
        if !point.is_valid() {
            tracing::warn!(lat = point.lat, lon = point.lon, "dropping malformed anchor");
            continue;
        }
        if let Some(last) = cleaned.last() {
            if haversine_m(*last, *point) < min_segment_m {
                continue;
            }
        }
        cleaned.push(*point);
    }
    cleaned
}

/// Merge user anchors and track entry points, ordered along the route axis.
///
/// Start and end stay fixed at the chain's ends; vias and track entries are
/// interleaved by axis fraction, with stable ordering on ties.
fn build_anchor_chain(
    cleaned: &[Point],
    selected: &[ScoredCandidate],
    start: Point,
    end: Point,
) -> Vec<Anchor> {
    use crate::geo::axis_projection;

    let mut middle: Vec<(f64, Anchor)> = cleaned[1..cleaned.len() - 1]
        .iter()
        .map(|&point| {
            let fraction = axis_projection(point, start, end).fraction;
            (
                fraction,
                Anchor {
                    point,
                    kind: AnchorKind::User,
                },
            )
        })
        .collect();

    for (index, candidate) in selected.iter().enumerate() {
        let entry = candidate.entry_point();
        let fraction = axis_projection(entry, start, end).fraction;
        middle.push((
            fraction,
            Anchor {
                point: entry,
                kind: AnchorKind::TrackEntry { index },
            },
        ));
    }

    middle.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut anchors = Vec::with_capacity(middle.len() + 2);
    anchors.push(Anchor {
        point: cleaned[0],
        kind: AnchorKind::User,
    });
    anchors.extend(middle.into_iter().map(|(_, anchor)| anchor));
    anchors.push(Anchor {
        point: cleaned[cleaned.len() - 1],
        kind: AnchorKind::User,
    });
    anchors
}

/// Walk the anchor chain pair by pair. Any unrecoverable condition returns
/// the reason string that sends the whole request to fallback.
async fn connect<R: RouteSource>(
    router: &R,
    anchors: &[Anchor],
    selected: &[ScoredCandidate],
    config: &StitchConfig,
    started: Instant,
    budget: Duration,
) -> Result<ChainState, String> {
    let mut chain = ChainState::new(anchors[0].point);
    let mut idx = 1;

    while idx < anchors.len() {
        if started.elapsed() >= budget {
            route_tail(router, &mut chain, anchors, idx).await?;
            return Ok(chain);
        }

        let target = &anchors[idx];
        let pair = idx - 1;
        let hop_m = haversine_m(chain.cursor, target.point);

        if hop_m < config.min_segment_m {
            tracing::debug!(pair, hop_m, "skipping short hop");
            chain.evidence.push(Evidence::ShortHopSkipped { pair });
            attach_track(target, selected, config, &mut chain);
            idx += 1;
            continue;
        }

        match resolve_pair(router, &mut chain, target.point, pair, config, started, budget).await {
            PairAttempt::Connected { path, attempts } => {
                if attempts > 0 {
                    chain.evidence.push(Evidence::PairRescued { pair, attempts });
                }
                chain.push_connector(path);
                attach_track(target, selected, config, &mut chain);
                idx += 1;
            }
            PairAttempt::TimedOut => {
                route_tail(router, &mut chain, anchors, idx).await?;
                return Ok(chain);
            }
            PairAttempt::Exhausted => {
                // Skip-one recovery: drop the unroutable anchor and aim at
                // the one after it.
                let Some(next) = anchors.get(idx + 1) else {
                    return Err(format!("pair {pair} unroutable and no anchor left to skip to"));
                };
                let path = router
                    .route(&[chain.cursor, next.point])
                    .await
                    .map_err(|err| format!("anchor-skip recovery failed: {err}"))?;
                tracing::warn!(pair, "dropped unroutable anchor");
                chain.evidence.push(Evidence::AnchorDropped { pair });
                chain.push_connector(path);
                attach_track(next, selected, config, &mut chain);
                idx += 2;
            }
        }
    }

    Ok(chain)
}

/// Route the rest of the chain in a single call (time-budget escape).
async fn route_tail<R: RouteSource>(
    router: &R,
    chain: &mut ChainState,
    anchors: &[Anchor],
    idx: usize,
) -> Result<(), String> {
    let remaining = anchors.len() - idx;
    tracing::warn!(remaining, "time budget exceeded, routing remaining chain directly");
    let mut points = Vec::with_capacity(remaining + 1);
    points.push(chain.cursor);
    points.extend(anchors[idx..].iter().map(|anchor| anchor.point));
    let path = router
        .route(&points)
        .await
        .map_err(|err| format!("tail routing failed: {err}"))?;
    chain.evidence.push(Evidence::TimeBudgetEscape {
        remaining_anchors: remaining,
    });
    chain.push_connector(path);
    Ok(())
}

/// Connect one pair, entering rescue after a direct failure.
async fn resolve_pair<R: RouteSource>(
    router: &R,
    chain: &mut ChainState,
    to: Point,
    pair: usize,
    config: &StitchConfig,
    started: Instant,
    budget: Duration,
) -> PairAttempt {
    let from = chain.cursor;
    match router.route(&[from, to]).await {
        Ok(path) => return PairAttempt::Connected { path, attempts: 0 },
        Err(err) => {
            tracing::debug!(pair, error = %err, "direct connector failed, entering rescue");
        }
    }

    let mut attempts = 0u32;
    let mut last_signature: Option<(i64, i64)> = None;
    while attempts < config.rescue_per_pair && chain.rescue_spent < config.rescue_total {
        if started.elapsed() >= budget {
            return PairAttempt::TimedOut;
        }
        attempts += 1;
        chain.rescue_spent += 1;

        let (north_m, east_m) = {
            let mut rng = rand::rng();
            (
                rng.random_range(-config.rescue_jitter_m..=config.rescue_jitter_m),
                rng.random_range(-config.rescue_jitter_m..=config.rescue_jitter_m),
            )
        };
        let signature = (north_m.round() as i64, east_m.round() as i64);
        if last_signature == Some(signature) {
            tracing::debug!(pair, "rescue stalled on repeated jitter, aborting");
            break;
        }
        last_signature = Some(signature);

        let mid = offset_m(midpoint(from, to), north_m, east_m);
        match router.route(&[from, mid, to]).await {
            Ok(path) => return PairAttempt::Connected { path, attempts },
            Err(err) => {
                tracing::debug!(pair, attempt = attempts, error = %err, "rescue attempt failed");
            }
        }
    }

    PairAttempt::Exhausted
}

/// Attach the target's track geometry when the chain ends inside the join
/// radius of its entry point.
fn attach_track(
    target: &Anchor,
    selected: &[ScoredCandidate],
    config: &StitchConfig,
    chain: &mut ChainState,
) {
    let AnchorKind::TrackEntry { index } = target.kind else {
        return;
    };
    let candidate = &selected[index];
    let join_distance_m = haversine_m(chain.cursor, candidate.entry_point());
    if join_distance_m > config.join_radius_m {
        tracing::debug!(
            id = %candidate.track.id,
            join_distance_m,
            "track entry outside join radius, skipping"
        );
        chain.evidence.push(Evidence::TrackSkipped {
            id: candidate.track.id.clone(),
            join_distance_m,
        });
        return;
    }

    chain.evidence.push(Evidence::TrackAttached {
        id: candidate.track.id.clone(),
        join_distance_m,
        length_km: candidate.length_km,
    });
    chain.distance_m += candidate.length_km * 1_000.0;
    chain.segments.push(Segment::Track {
        id: candidate.track.id.clone(),
        coords: candidate.track.coords.clone(),
    });
    chain.cursor = candidate.exit_point();
}

/// Flatten segments into the final coordinate sequence.
fn merge(chain: ChainState, auto_anchor_count: usize) -> PlanOutcome {
    let mut coordinates: Vec<Point> = Vec::new();
    for segment in &chain.segments {
        for point in segment.points() {
            if coordinates.last() == Some(point) {
                continue;
            }
            coordinates.push(*point);
        }
    }

    let mut evidence = vec![Evidence::AutoAnchors {
        count: auto_anchor_count,
    }];
    evidence.extend(chain.evidence);

    PlanOutcome {
        coordinates,
        evidence,
        used_fallback: false,
        distance_m: chain.distance_m,
    }
}

/// Single direct route over the original anchors; the last resort.
async fn fallback<R: RouteSource>(
    router: &R,
    spec: &PlanSpec,
    reason: &str,
) -> Result<PlanOutcome, RouteError> {
    tracing::warn!(reason, "stitching abandoned, falling back to direct route");
    // The original anchor list, minus anything the routing service would choke on.
    let anchors: Vec<Point> = spec
        .raw_anchors()
        .into_iter()
        .filter(|point| point.is_valid())
        .collect();
    let path = router.route(&anchors).await?;
    Ok(PlanOutcome {
        coordinates: path.points,
        distance_m: path.distance_m,
        evidence: vec![Evidence::FallbackUsed {
            reason: reason.to_string(),
        }],
        used_fallback: true,
    })
}
