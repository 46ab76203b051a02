//! Scoring and selection of off-road track candidates.

use crate::geo::{axis_projection, path_length_km};
use crate::models::{Point, TrackCandidate};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorConfig {
    /// Maximum number of tracks to accept.
    pub max_tracks: usize,
    /// Maximum lateral offset from the start-end axis, in kilometers.
    pub max_axis_km: f64,
    /// Minimum axis-fraction spacing between accepted tracks.
    pub min_axis_gap: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            max_tracks: 6,
            max_axis_km: 15.0,
            min_axis_gap: 0.1,
        }
    }
}

/// A candidate scored against the start-end axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub track: TrackCandidate,
    /// Projected position along the axis, 0 = start, 1 = end.
    pub axis_fraction: f64,
    pub lateral_offset_km: f64,
    pub length_km: f64,
}

impl ScoredCandidate {
    /// First coordinate of the track, where a connector joins it.
    pub fn entry_point(&self) -> Point {
        self.track.coords[0]
    }

    /// Last coordinate of the track, where the chain continues from.
    pub fn exit_point(&self) -> Point {
        *self
            .track
            .coords
            .last()
            .expect("track candidates have at least one coordinate")
    }
}

/// Score candidates against the start-end axis and pick a spaced subset.
///
/// Candidates are ranked by descending length (discovery order breaks ties),
/// accepted greedily while keeping the configured axis-fraction gap, then
/// returned in ascending axis order so anchors are visited start to end.
pub fn select_tracks(
    tracks: &[TrackCandidate],
    start: Point,
    end: Point,
    config: &SelectorConfig,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = tracks
        .iter()
        .filter(|track| !track.coords.is_empty())
        .filter_map(|track| {
            let representative = track.coords[track.coords.len() / 2];
            let projection = axis_projection(representative, start, end);
            if projection.lateral_km > config.max_axis_km {
                return None;
            }
            Some(ScoredCandidate {
                track: track.clone(),
                axis_fraction: projection.fraction,
                lateral_offset_km: projection.lateral_km,
                length_km: path_length_km(&track.coords),
            })
        })
        .collect();

    // Stable sort: equal lengths keep discovery order.
    scored.sort_by(|a, b| {
        b.length_km
            .partial_cmp(&a.length_km)
            .unwrap_or(Ordering::Equal)
    });

    let mut accepted: Vec<ScoredCandidate> = Vec::new();
    for candidate in scored {
        if accepted.len() >= config.max_tracks {
            break;
        }
        let spaced = accepted
            .iter()
            .all(|other| (other.axis_fraction - candidate.axis_fraction).abs() >= config.min_axis_gap);
        if spaced {
            accepted.push(candidate);
        }
    }

    accepted.sort_by(|a, b| {
        a.axis_fraction
            .partial_cmp(&b.axis_fraction)
            .unwrap_or(Ordering::Equal)
    });
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(lat: f64, lon: f64) -> Point {
        Point { lat, lon }
    }

    fn track(id: &str, coords: Vec<Point>) -> TrackCandidate {
        TrackCandidate {
            id: id.to_string(),
            coords,
        }
    }

    fn straight_track(id: &str, at_lon: f64, lat_offset: f64, length_deg: f64) -> TrackCandidate {
        track(
            id,
            vec![
                p(lat_offset, at_lon),
                p(lat_offset, at_lon + length_deg),
            ],
        )
    }

    const START: Point = Point { lat: 0.0, lon: 0.0 };
    const END: Point = Point { lat: 0.0, lon: 1.0 };

    #[test]
    fn discards_candidates_beyond_axis_tolerance() {
        let config = SelectorConfig {
            max_tracks: 10,
            max_axis_km: 5.0,
            min_axis_gap: 0.0,
        };
        let near = straight_track("near", 0.3, 0.01, 0.02);
        let far = straight_track("far", 0.5, 0.5, 0.02);
        let selected = select_tracks(&[near, far], START, END, &config);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].track.id, "near");
        assert!(selected[0].lateral_offset_km <= 5.0);
    }

    #[test]
    fn never_returns_more_than_max() {
        let config = SelectorConfig {
            max_tracks: 2,
            max_axis_km: 50.0,
            min_axis_gap: 0.05,
        };
        let tracks: Vec<TrackCandidate> = (0..8)
            .map(|i| straight_track(&format!("t{i}"), 0.1 * i as f64, 0.0, 0.02))
            .collect();
        let selected = select_tracks(&tracks, START, END, &config);
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn prefers_longer_tracks() {
        let config = SelectorConfig {
            max_tracks: 1,
            max_axis_km: 50.0,
            min_axis_gap: 0.0,
        };
        let short = straight_track("short", 0.2, 0.0, 0.01);
        let long = straight_track("long", 0.6, 0.0, 0.05);
        let selected = select_tracks(&[short, long], START, END, &config);
        assert_eq!(selected[0].track.id, "long");
    }

    #[test]
    fn enforces_axis_gap_between_accepted() {
        let config = SelectorConfig {
            max_tracks: 10,
            max_axis_km: 50.0,
            min_axis_gap: 0.1,
        };
        // Two long tracks clustered at the same axis position, one further out.
        let a = straight_track("a", 0.40, 0.0, 0.05);
        let b = straight_track("b", 0.42, 0.0, 0.05);
        let c = straight_track("c", 0.80, 0.0, 0.02);
        let selected = select_tracks(&[a, b, c], START, END, &config);
        let ids: Vec<&str> = selected.iter().map(|s| s.track.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn returns_ascending_axis_order() {
        let config = SelectorConfig {
            max_tracks: 4,
            max_axis_km: 50.0,
            min_axis_gap: 0.05,
        };
        let tracks = vec![
            straight_track("late", 0.8, 0.0, 0.05),
            straight_track("early", 0.1, 0.0, 0.02),
            straight_track("mid", 0.5, 0.0, 0.03),
        ];
        let selected = select_tracks(&tracks, START, END, &config);
        let fractions: Vec<f64> = selected.iter().map(|s| s.axis_fraction).collect();
        let mut sorted = fractions.clone();
        sorted.sort_by(|x, y| x.partial_cmp(y).unwrap());
        assert_eq!(fractions, sorted);
        assert_eq!(selected.first().unwrap().track.id, "early");
    }

    #[test]
    fn equal_lengths_keep_discovery_order() {
        let config = SelectorConfig {
            max_tracks: 1,
            max_axis_km: 50.0,
            min_axis_gap: 0.0,
        };
        let first = straight_track("first", 0.3, 0.0, 0.02);
        let second = straight_track("second", 0.6, 0.0, 0.02);
        let selected = select_tracks(&[first, second], START, END, &config);
        assert_eq!(selected[0].track.id, "first");
    }
}
