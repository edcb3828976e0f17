//! Round-robin track selection for a single clip, as a pure state machine.
//!
//! A clip starts in `Seeking`. Each probed track either matches (`Found`) or
//! is skipped; once every track has been skipped the machine moves to
//! `Fallback`, which the scheduler either honors or turns into `Exhausted`.

use model::MatchResult;

#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    Seeking {
        tried: usize,
    },
    Found {
        track: usize,
        result: MatchResult,
        skips: usize,
    },
    Fallback {
        track: usize,
        skips: usize,
    },
    Exhausted,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectionEvent {
    Matched { track: usize, result: MatchResult },
    Rejected,
    FallbackUnavailable,
}

impl Selection {
    pub fn start() -> Self {
        Selection::Seeking { tried: 0 }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Selection::Seeking { .. } | Selection::Fallback { .. })
    }
}

/// Index of the next track to probe while seeking.
pub fn probe_index(round_robin_index: usize, tried: usize, track_count: usize) -> usize {
    (round_robin_index + tried) % track_count
}

pub fn transition(
    state: Selection,
    event: SelectionEvent,
    track_count: usize,
    fallback_track: usize,
) -> Selection {
    match (state, event) {
        (Selection::Seeking { tried }, SelectionEvent::Matched { track, result }) => {
            Selection::Found {
                track,
                result,
                skips: tried,
            }
        }
        (Selection::Seeking { tried }, SelectionEvent::Rejected) => {
            if tried + 1 < track_count {
                Selection::Seeking { tried: tried + 1 }
            } else {
                Selection::Fallback {
                    track: fallback_track,
                    skips: track_count,
                }
            }
        }
        (Selection::Fallback { .. }, SelectionEvent::FallbackUnavailable) => Selection::Exhausted,
        (state, _) => state,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::{GpsPoint, Rating};

    fn result() -> MatchResult {
        let p = GpsPoint::new(0.0, 0.0, 0.0);
        MatchResult {
            start_point: p,
            comparison_point: p,
            end_point: GpsPoint::new(5.0, 0.0, 0.0),
            start_distance_m: 0.0,
            end_distance_m: 0.0,
            duration_deviation_s: 0.0,
            master_deviation_m: 0.0,
            total_score: 0.0,
            rating: Rating::Excellent,
            is_start_valid: true,
            is_end_valid: true,
            is_valid: true,
            failure_reason: None,
        }
    }

    #[test]
    fn first_match_wins() {
        let s = transition(
            Selection::start(),
            SelectionEvent::Matched {
                track: 2,
                result: result(),
            },
            3,
            0,
        );
        assert_eq!(
            s,
            Selection::Found {
                track: 2,
                result: result(),
                skips: 0
            }
        );
        assert!(s.is_terminal());
    }

    #[test]
    fn skips_are_counted() {
        let mut s = Selection::start();
        s = transition(s, SelectionEvent::Rejected, 3, 0);
        s = transition(s, SelectionEvent::Rejected, 3, 0);
        assert_eq!(s, Selection::Seeking { tried: 2 });
        s = transition(
            s,
            SelectionEvent::Matched {
                track: 1,
                result: result(),
            },
            3,
            0,
        );
        assert!(matches!(s, Selection::Found { track: 1, skips: 2, .. }));
    }

    #[test]
    fn all_rejected_falls_back_then_exhausts() {
        let mut s = Selection::start();
        for _ in 0..3 {
            s = transition(s, SelectionEvent::Rejected, 3, 1);
        }
        assert_eq!(s, Selection::Fallback { track: 1, skips: 3 });
        assert!(!s.is_terminal());
        s = transition(s, SelectionEvent::FallbackUnavailable, 3, 1);
        assert_eq!(s, Selection::Exhausted);
        assert_eq!(transition(s, SelectionEvent::Rejected, 3, 1), Selection::Exhausted);
    }

    #[test]
    fn single_track_falls_back_immediately() {
        let s = transition(Selection::start(), SelectionEvent::Rejected, 1, 0);
        assert_eq!(s, Selection::Fallback { track: 0, skips: 1 });
    }

    #[test]
    fn probe_order_wraps() {
        let order: Vec<usize> = (0..4).map(|i| probe_index(2, i, 4)).collect();
        assert_eq!(order, vec![2, 3, 0, 1]);
    }
}
