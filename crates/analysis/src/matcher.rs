//! Search inside one track for the segment that best continues a path.

use model::{ComparisonMode, ConfigError, GpsPoint, MatchResult, ScoringConfig, Track};
use tracing::{debug, trace};

use crate::geo::{nearest_index_sorted, point_distance_m};
use crate::scoring::{score, Deviations};

/// Range of candidate start times, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SearchWindow {
    pub start: f64,
    pub end: f64,
}

impl SearchWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        !(self.start <= self.end)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchRequest {
    pub target_start: GpsPoint,
    pub target_end: GpsPoint,
    pub clip_duration_s: f64,
    pub window: SearchWindow,
    /// Lead-in consumed by the crossfade; zero for the first clip.
    pub fade_overlap_s: f64,
    /// Reference-path point the segment end should stay close to.
    pub master_end: Option<GpsPoint>,
}

/// Either a usable segment or the reason there is none.
#[derive(Clone, Debug, PartialEq)]
pub enum MatchOutcome {
    Valid(MatchResult),
    Invalid {
        reason: String,
        best_attempt: Option<MatchResult>,
    },
}

impl MatchOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, MatchOutcome::Valid(_))
    }

    pub fn valid(&self) -> Option<&MatchResult> {
        match self {
            MatchOutcome::Valid(r) => Some(r),
            MatchOutcome::Invalid { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            MatchOutcome::Valid(_) => None,
            MatchOutcome::Invalid { reason, .. } => Some(reason),
        }
    }
}

/// Segment search used by the scheduler.
pub trait Matcher {
    fn find_segment(&self, track: &Track, request: &MatchRequest) -> MatchOutcome;

    /// Configuration the segments are scored with.
    fn scoring(&self) -> &ScoringConfig;
}

/// Exhaustive search over the window, scored with a fixed configuration.
#[derive(Clone, Debug, Default)]
pub struct GpsMatcher {
    config: ScoringConfig,
}

impl GpsMatcher {
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }
}

impl Matcher for GpsMatcher {
    fn find_segment(&self, track: &Track, request: &MatchRequest) -> MatchOutcome {
        find_segment(track, request, &self.config)
    }

    fn scoring(&self) -> &ScoringConfig {
        &self.config
    }
}

/// Tolerance between a fade lead-in time and the track point standing in for it.
/// Sparse tracks cannot resolve better than half their sampling interval.
fn lead_in_tolerance(track: &Track, fade: f64) -> f64 {
    (fade / 2.0).max(track.sample_interval_s() / 2.0)
}

pub fn find_segment(track: &Track, request: &MatchRequest, config: &ScoringConfig) -> MatchOutcome {
    let points = track.points();
    let window = request.window;
    let lo = points.partition_point(|p| p.t < window.start);
    let hi = points.partition_point(|p| p.t <= window.end);
    if window.is_empty() || lo >= hi {
        let reason = format!(
            "no points within search window {:.1}s..{:.1}s",
            window.start, window.end
        );
        debug!(track = track.name(), %reason, "no segment");
        return MatchOutcome::Invalid {
            reason,
            best_attempt: None,
        };
    }

    let fade_shifted = config.comparison == ComparisonMode::FadeShifted;
    let fade = request.fade_overlap_s;
    let tolerance = lead_in_tolerance(track, fade);
    let threshold = config.start_threshold_m();
    let min_len = request.clip_duration_s * config.min_duration_multiplier;
    let max_len = request.clip_duration_s * config.max_duration_multiplier;
    let end_limit = track.effective_max();

    let mut best_valid: Option<MatchResult> = None;
    let mut best_attempt: Option<MatchResult> = None;
    let mut closest_start = f64::INFINITY;
    let mut lead_in_rejections = 0usize;
    let mut start_candidates = 0usize;

    for p in &points[lo..hi] {
        let comparison = if fade_shifted && fade > 0.0 {
            let lead = p.t - fade;
            let Ok(j) = nearest_index_sorted(points, lead) else {
                continue;
            };
            if (points[j].t - lead).abs() > tolerance {
                lead_in_rejections += 1;
                continue;
            }
            points[j]
        } else {
            *p
        };

        let start_distance_m = point_distance_m(&request.target_start, &comparison);
        closest_start = closest_start.min(start_distance_m);
        if !(start_distance_m <= threshold) {
            continue;
        }
        start_candidates += 1;

        let q_lo = points.partition_point(|q| q.t - p.t < min_len);
        let q_hi = points.partition_point(|q| q.t - p.t <= max_len && q.t <= end_limit);
        for q in points.get(q_lo..q_hi).unwrap_or(&[]) {
            let master_deviation_m = match (fade_shifted, request.master_end) {
                (true, Some(m)) => point_distance_m(&m, q),
                _ => 0.0,
            };
            let d = Deviations {
                start_distance_m,
                end_distance_m: point_distance_m(&request.target_end, q),
                duration_deviation_s: ((q.t - p.t) - request.clip_duration_s).abs(),
                master_deviation_m,
            };
            let s = score(&d, config);
            let result = MatchResult {
                start_point: *p,
                comparison_point: comparison,
                end_point: *q,
                start_distance_m: d.start_distance_m,
                end_distance_m: d.end_distance_m,
                duration_deviation_s: d.duration_deviation_s,
                master_deviation_m: d.master_deviation_m,
                total_score: s.total,
                rating: s.rating,
                is_start_valid: s.is_start_valid,
                is_end_valid: s.is_end_valid,
                is_valid: s.is_valid(),
                failure_reason: None,
            };
            if result.is_valid && is_better(&result, best_valid.as_ref()) {
                best_valid = Some(result.clone());
            }
            if is_better(&result, best_attempt.as_ref()) {
                best_attempt = Some(result);
            }
        }
    }

    if let Some(best) = best_valid {
        trace!(
            track = track.name(),
            start = best.start_point.t,
            end = best.end_point.t,
            score = best.total_score,
            "segment found"
        );
        return MatchOutcome::Valid(best);
    }

    let reason = match &best_attempt {
        Some(a) => format!(
            "end distance {:.1}m exceeds {:.1}m threshold",
            a.end_distance_m, config.max_distance_m
        ),
        None if start_candidates > 0 => format!(
            "no points within duration range {:.1}s..{:.1}s",
            min_len, max_len
        ),
        None if closest_start.is_finite() => format!(
            "start distance {:.1}m exceeds {:.1}m threshold",
            closest_start, threshold
        ),
        None if lead_in_rejections > 0 => format!(
            "no lead-in point within {:.2}s of the fade start",
            tolerance
        ),
        None => "no comparable start point".to_string(),
    };
    debug!(track = track.name(), %reason, "no valid segment");
    let best_attempt = best_attempt.map(|mut a| {
        a.failure_reason = Some(reason.clone());
        a
    });
    MatchOutcome::Invalid {
        reason,
        best_attempt,
    }
}

// Strictly lower score wins, so the earliest candidate keeps ties.
fn is_better(candidate: &MatchResult, current: Option<&MatchResult>) -> bool {
    match current {
        None => true,
        Some(c) => candidate.total_score < c.total_score,
    }
}
