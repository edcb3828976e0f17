//! Builds the extraction plan by walking round-robin across tracks.

use model::{
    ClipAssignment, ClipOrigin, ConfigError, GpsPoint, InputError, Rating, ScheduleConfig, Track,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geo::nearest_point;
use crate::matcher::{MatchOutcome, MatchRequest, Matcher, SearchWindow};
use crate::selection::{probe_index, transition, Selection, SelectionEvent};

/// Score given to clips taken without GPS validation.
pub const FALLBACK_SCORE: f64 = 1000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("master index {index} out of range for {count} tracks")]
    MasterOutOfRange { index: usize, count: usize },
    #[error("schedule exhausted after {produced} clips, {required} required")]
    Exhausted { produced: usize, required: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The reference timeline is fully covered.
    Completed,
    /// No track, fallback included, could extend the timeline.
    Exhausted,
    ClipLimit,
    AttemptLimit,
}

/// Mutable bookkeeping of one scheduling run.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduleState {
    pub clip_counter: usize,
    pub master_time_s: f64,
    /// Next unused second of each track, by track index.
    pub cursors: Vec<f64>,
    pub round_robin_index: usize,
    pub last_used_track: usize,
    pub previous_clip_end: Option<GpsPoint>,
    pub previous_clip_track: Option<usize>,
    pub previous_clip_end_time: Option<f64>,
    pub attempts: usize,
}

impl ScheduleState {
    pub fn new(tracks: &[Track], master: usize, round_robin_start: usize) -> Self {
        Self {
            clip_counter: 0,
            master_time_s: 0.0,
            cursors: tracks.iter().map(Track::min_time).collect(),
            round_robin_index: round_robin_start,
            last_used_track: master,
            previous_clip_end: None,
            previous_clip_track: None,
            previous_clip_end_time: None,
            attempts: 0,
        }
    }
}

/// Outcome of one run: the plan plus what the evaluator needs to rate it.
#[derive(Clone, Debug, PartialEq)]
pub struct Schedule {
    pub master: usize,
    pub clips: Vec<ClipAssignment>,
    /// Tracks skipped before each clip was found, parallel to `clips`.
    pub skips: Vec<usize>,
    pub stop: StopReason,
    pub attempts: usize,
}

impl Schedule {
    /// Clip counts per rating, best rating first.
    pub fn rating_counts(&self) -> Vec<(Rating, usize)> {
        [
            Rating::Excellent,
            Rating::Good,
            Rating::Fair,
            Rating::Poor,
            Rating::Unusable,
        ]
        .into_iter()
        .map(|r| (r, self.clips.iter().filter(|c| c.rating == r).count()))
        .collect()
    }
}

pub struct Scheduler<'a, M> {
    tracks: &'a [Track],
    config: &'a ScheduleConfig,
    matcher: &'a M,
}

impl<'a, M: Matcher> Scheduler<'a, M> {
    pub fn new(
        tracks: &'a [Track],
        config: &'a ScheduleConfig,
        matcher: &'a M,
    ) -> Result<Self, ScheduleError> {
        if tracks.is_empty() {
            return Err(InputError::NoTracks.into());
        }
        config.validate()?;
        matcher.scoring().validate()?;
        Ok(Self {
            tracks,
            config,
            matcher,
        })
    }

    pub fn tracks(&self) -> &'a [Track] {
        self.tracks
    }

    pub fn config(&self) -> &'a ScheduleConfig {
        self.config
    }

    /// Runs with `master` as the reference and as the first track probed,
    /// then applies the minimum clip count.
    pub fn plan(&self, master: usize) -> Result<Vec<ClipAssignment>, ScheduleError> {
        let schedule = self.run(master)?;
        if schedule.clips.len() < self.config.min_clips {
            return Err(ScheduleError::Exhausted {
                produced: schedule.clips.len(),
                required: self.config.min_clips,
            });
        }
        Ok(schedule.clips)
    }

    pub fn run(&self, master: usize) -> Result<Schedule, ScheduleError> {
        self.run_from(master, master)
    }

    pub fn run_from(&self, master: usize, round_robin_start: usize) -> Result<Schedule, ScheduleError> {
        let count = self.tracks.len();
        for index in [master, round_robin_start] {
            if index >= count {
                return Err(ScheduleError::MasterOutOfRange { index, count });
            }
        }
        let master_track = &self.tracks[master];
        let total = master_track.effective_max().floor();
        let clip = self.config.clip_length_s;
        let fade = self.config.fade_s;
        info!(
            master = master_track.name(),
            tracks = count,
            total_s = total,
            "scheduling clips"
        );

        let mut state = ScheduleState::new(self.tracks, master, round_robin_start);
        let mut clips = Vec::new();
        let mut skips = Vec::new();

        let stop = loop {
            if state.master_time_s >= total {
                break StopReason::Completed;
            }
            if clips.len() >= self.config.max_clips {
                break StopReason::ClipLimit;
            }
            let Some(selection) = self.select(&mut state, master_track, total) else {
                break StopReason::AttemptLimit;
            };
            let (clip_assignment, clip_skips) = match selection {
                Selection::Found {
                    track,
                    result,
                    skips,
                } => {
                    let start = result.start_point.t;
                    let end = result.end_point.t;
                    let assignment = self.assignment(
                        &state,
                        track,
                        start,
                        end - start,
                        result.rating,
                        result.total_score,
                        ClipOrigin::Matched,
                    );
                    state.cursors[track] = end;
                    state.round_robin_index = (track + 1) % count;
                    state.previous_clip_end = Some(result.end_point);
                    state.previous_clip_end_time = Some(end);
                    state.last_used_track = track;
                    state.previous_clip_track = Some(track);
                    (assignment, skips)
                }
                Selection::Fallback { track, skips } => {
                    let source = &self.tracks[track];
                    let cursor = state.cursors[track];
                    if cursor + clip > source.effective_max() {
                        let done = transition(
                            Selection::Fallback { track, skips },
                            SelectionEvent::FallbackUnavailable,
                            count,
                            track,
                        );
                        debug_assert_eq!(done, Selection::Exhausted);
                        info!(
                            track = source.name(),
                            cursor,
                            clips = clips.len(),
                            "no track can extend the timeline"
                        );
                        break StopReason::Exhausted;
                    }
                    warn!(
                        track = source.name(),
                        cursor,
                        clip = state.clip_counter,
                        previous_track = ?state.previous_clip_track,
                        previous_end = ?state.previous_clip_end_time,
                        "no valid segment on any track, reusing last track"
                    );
                    let end = cursor + clip;
                    let assignment = self.assignment(
                        &state,
                        track,
                        cursor,
                        clip,
                        Rating::Unusable,
                        FALLBACK_SCORE,
                        ClipOrigin::Fallback,
                    );
                    state.cursors[track] = end;
                    state.previous_clip_end = nearest_point(source.points(), end).ok().copied();
                    state.previous_clip_end_time = Some(end);
                    state.last_used_track = track;
                    state.previous_clip_track = Some(track);
                    (assignment, skips)
                }
                Selection::Exhausted => break StopReason::Exhausted,
                Selection::Seeking { .. } => break StopReason::AttemptLimit,
            };

            debug!(
                clip = state.clip_counter,
                track = %clip_assignment.track_name,
                start = clip_assignment.extract_start_s,
                duration = clip_assignment.extract_duration_s,
                rating = %clip_assignment.rating,
                skips = clip_skips,
                "clip scheduled"
            );
            clips.push(clip_assignment);
            skips.push(clip_skips);
            state.master_time_s += if state.clip_counter == 0 { clip } else { clip - fade };
            state.clip_counter += 1;
        };

        info!(
            master = master_track.name(),
            clips = clips.len(),
            attempts = state.attempts,
            stop = ?stop,
            "schedule finished"
        );
        Ok(Schedule {
            master,
            clips,
            skips,
            stop,
            attempts: state.attempts,
        })
    }

    /// Probes tracks for the next clip. `None` when the attempt budget runs out.
    fn select(&self, state: &mut ScheduleState, master_track: &Track, total: f64) -> Option<Selection> {
        let count = self.tracks.len();
        let clip = self.config.clip_length_s;
        let half = self.config.search_half_window_s;
        let master_points = master_track.points();

        let target_start = match state.previous_clip_end {
            Some(p) => p,
            None => *nearest_point(master_points, 0.0).ok()?,
        };
        let target_end =
            *nearest_point(master_points, (state.master_time_s + clip).min(total)).ok()?;
        let fade_overlap_s = if state.clip_counter == 0 { 0.0 } else { self.config.fade_s };

        let mut selection = Selection::start();
        while let Selection::Seeking { tried } = selection {
            let index = probe_index(state.round_robin_index, tried, count);
            let track = &self.tracks[index];
            let cursor = state.cursors[index];
            let expected = cursor.max(state.master_time_s);
            let window = SearchWindow::new(
                cursor.max(expected - half),
                track.effective_max().min(expected + half),
            );

            let event = if window.is_empty() {
                SelectionEvent::Rejected
            } else {
                if state.attempts >= self.config.max_attempts {
                    return None;
                }
                state.attempts += 1;
                let request = MatchRequest {
                    target_start,
                    target_end,
                    clip_duration_s: clip,
                    window,
                    fade_overlap_s,
                    master_end: Some(target_end),
                };
                match self.matcher.find_segment(track, &request) {
                    MatchOutcome::Valid(result) => SelectionEvent::Matched {
                        track: index,
                        result,
                    },
                    MatchOutcome::Invalid { reason, .. } => {
                        debug!(track = track.name(), %reason, "track skipped");
                        SelectionEvent::Rejected
                    }
                }
            };
            selection = transition(selection, event, count, state.last_used_track);
        }
        Some(selection)
    }

    /// Clip entry for a segment starting at `start`; clips after the first get
    /// up to `fade_s` of lead-in, never reaching before time zero.
    #[allow(clippy::too_many_arguments)]
    fn assignment(
        &self,
        state: &ScheduleState,
        track: usize,
        start: f64,
        duration: f64,
        rating: Rating,
        score: f64,
        origin: ClipOrigin,
    ) -> ClipAssignment {
        let lead_in = if state.clip_counter == 0 {
            0.0
        } else {
            self.config.fade_s.min(start).max(0.0)
        };
        let source = &self.tracks[track];
        ClipAssignment {
            track_id: source.id(),
            track_name: source.name().to_string(),
            track_index: track,
            extract_start_s: start - lead_in,
            extract_duration_s: duration + lead_in,
            rating,
            score,
            origin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::GpsMatcher;
    use approx::assert_relative_eq;
    use model::{ScoringConfig, TrackMeta};

    // ~1m of longitude at the equator
    const M: f64 = 0.000_009;

    fn make_track(name: &str, pts: &[(f64, f64, f64)]) -> Track {
        let pts = pts.iter().map(|&(t, lat, lon)| GpsPoint::new(t, lat, lon)).collect();
        Track::new(TrackMeta::new(name), pts).unwrap()
    }

    /// 10 m/s eastward along `lat`, one point per second.
    fn line_track(name: &str, times: impl Iterator<Item = u32>, lat: f64) -> Track {
        let pts: Vec<(f64, f64, f64)> = times
            .map(|i| (i as f64, lat, i as f64 * 10.0 * M))
            .collect();
        make_track(name, &pts)
    }

    fn config(clip: f64, fade: f64) -> ScheduleConfig {
        ScheduleConfig {
            clip_length_s: clip,
            fade_s: fade,
            ..ScheduleConfig::default()
        }
    }

    fn two_identical_tracks() -> Vec<Track> {
        let pts = [(0.0, 0.0, 0.0), (5.0, 0.0, 0.001), (10.0, 0.0, 0.002)];
        vec![make_track("A", &pts), make_track("B", &pts)]
    }

    #[test]
    fn identical_tracks_alternate_with_excellent_clips() {
        let tracks = two_identical_tracks();
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let scheduler = Scheduler::new(&tracks, &cfg, &matcher).unwrap();
        let schedule = scheduler.run(0).unwrap();

        assert!(schedule.clips.len() >= 2);
        for (i, c) in schedule.clips.iter().enumerate() {
            assert_eq!(c.track_index, i % 2, "clip {i}");
            assert_eq!(c.rating, Rating::Excellent);
            assert_eq!(c.origin, ClipOrigin::Matched);
        }
        let (a, b) = (&schedule.clips[0], &schedule.clips[1]);
        assert_eq!(a.track_name, "A");
        assert_relative_eq!(a.extract_start_s, 0.0);
        assert_relative_eq!(a.extract_duration_s, 5.0);
        // segment 5..10 plus one second of lead-in for the crossfade
        assert_eq!(b.track_name, "B");
        assert_relative_eq!(b.extract_start_s, 4.0);
        assert_relative_eq!(b.extract_duration_s, 6.0);
        assert_eq!(schedule.skips, vec![0; schedule.clips.len()]);

        let plan = scheduler.plan(0).unwrap();
        assert_eq!(plan, schedule.clips);
    }

    #[test]
    fn scheduling_is_deterministic() {
        let tracks = vec![
            line_track("A", 0..=60, 0.0),
            line_track("B", 0..=60, 0.0),
            line_track("C", 0..=60, 0.0),
        ];
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let scheduler = Scheduler::new(&tracks, &cfg, &matcher).unwrap();
        assert_eq!(scheduler.run(1).unwrap(), scheduler.run(1).unwrap());
    }

    #[test]
    fn three_tracks_round_robin_along_one_path() {
        let tracks = vec![
            line_track("A", 0..=60, 0.0),
            line_track("B", 0..=60, 0.0),
            line_track("C", 0..=60, 0.0),
        ];
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let schedule = Scheduler::new(&tracks, &cfg, &matcher).unwrap().run(0).unwrap();

        assert_eq!(schedule.clips.len(), 14);
        assert_eq!(schedule.stop, StopReason::Exhausted);
        for (i, c) in schedule.clips.iter().enumerate() {
            assert_eq!(c.track_index, i % 3);
            assert_eq!(c.rating, Rating::Excellent);
            assert!(c.extract_start_s >= 0.0);
            assert!(c.extract_duration_s >= 0.5);
        }
        for pair in schedule.clips.windows(2) {
            let previous_end = pair[0].extract_start_s + pair[0].extract_duration_s;
            assert!(pair[1].extract_start_s <= previous_end + cfg.fade_s + 1e-9);
        }
        assert_relative_eq!(schedule.clips[1].extract_start_s, 5.0);
        assert_relative_eq!(schedule.clips[1].extract_duration_s, 5.0);
        assert_relative_eq!(schedule.clips[2].extract_start_s, 10.0);
        assert_relative_eq!(schedule.clips[2].extract_duration_s, 4.0);
        assert_eq!(
            schedule.rating_counts()[0],
            (Rating::Excellent, schedule.clips.len())
        );
    }

    #[test]
    fn divergent_track_is_skipped() {
        let tracks = vec![
            line_track("A", 0..=60, 0.0),
            line_track("far", 0..=60, 0.5),
        ];
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let schedule = Scheduler::new(&tracks, &cfg, &matcher).unwrap().run(0).unwrap();
        assert!(schedule.clips.len() > 2);
        assert!(schedule.clips.iter().all(|c| c.track_index == 0));
        assert_eq!(schedule.skips[0], 0);
        assert!(schedule.skips[1..].iter().all(|s| *s == 1));
    }

    #[test]
    fn falls_back_to_last_track_without_validation() {
        // A has no coverage between 12s and 40s
        let tracks = vec![
            line_track("A", (0..=12).chain(40..=60), 0.0),
            line_track("far", 0..=60, 0.5),
        ];
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let schedule = Scheduler::new(&tracks, &cfg, &matcher).unwrap().run(0).unwrap();

        assert_eq!(schedule.clips[1].origin, ClipOrigin::Matched);
        assert_eq!(schedule.skips[1], 1);
        let fallback = &schedule.clips[2];
        assert_eq!(fallback.origin, ClipOrigin::Fallback);
        assert_eq!(fallback.track_index, 0);
        assert_eq!(fallback.rating, Rating::Unusable);
        assert_relative_eq!(fallback.score, FALLBACK_SCORE);
        assert_relative_eq!(fallback.extract_start_s, 9.0);
        assert_relative_eq!(fallback.extract_duration_s, 6.0);
        assert_eq!(schedule.skips[2], 2);
    }

    #[test]
    fn track_shorter_than_a_clip_yields_nothing() {
        let tracks = vec![make_track(
            "short",
            &[(0.0, 0.0, 0.0), (1.0, 0.0, 10.0 * M), (2.0, 0.0, 20.0 * M)],
        )];
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let scheduler = Scheduler::new(&tracks, &cfg, &matcher).unwrap();
        let schedule = scheduler.run(0).unwrap();
        assert!(schedule.clips.is_empty());
        assert_eq!(schedule.stop, StopReason::Exhausted);
        assert_eq!(
            scheduler.plan(0),
            Err(ScheduleError::Exhausted {
                produced: 0,
                required: 2
            })
        );
    }

    #[test]
    fn safety_caps_stop_the_run() {
        let tracks = vec![line_track("A", 0..=60, 0.0), line_track("B", 0..=60, 0.0)];
        let matcher = GpsMatcher::default();

        let cfg = ScheduleConfig {
            max_clips: 3,
            ..config(5.0, 1.0)
        };
        let s = Scheduler::new(&tracks, &cfg, &matcher).unwrap().run(0).unwrap();
        assert_eq!(s.clips.len(), 3);
        assert_eq!(s.stop, StopReason::ClipLimit);

        let cfg = ScheduleConfig {
            max_attempts: 1,
            ..config(5.0, 1.0)
        };
        let s = Scheduler::new(&tracks, &cfg, &matcher).unwrap().run(0).unwrap();
        assert_eq!(s.clips.len(), 1);
        assert_eq!(s.attempts, 1);
        assert_eq!(s.stop, StopReason::AttemptLimit);
    }

    /// A matcher that skips its own validation must still be refused.
    struct Unchecked(ScoringConfig);

    impl Matcher for Unchecked {
        fn find_segment(&self, track: &Track, request: &MatchRequest) -> MatchOutcome {
            crate::matcher::find_segment(track, request, &self.0)
        }

        fn scoring(&self) -> &ScoringConfig {
            &self.0
        }
    }

    fn stationary_track() -> Track {
        let pts: Vec<(f64, f64, f64)> = (0..=20).map(|i| (i as f64, 0.0, 0.0)).collect();
        make_track("still", &pts)
    }

    #[test]
    fn invalid_scoring_is_refused() {
        let tracks = vec![stationary_track()];
        let cfg = config(5.0, 1.0);
        let matcher = Unchecked(ScoringConfig {
            min_duration_multiplier: 0.0,
            w_duration: 0.0,
            ..ScoringConfig::default()
        });
        assert!(matches!(
            Scheduler::new(&tracks, &cfg, &matcher),
            Err(ScheduleError::Config(ConfigError::DurationMultipliers { .. }))
        ));
    }

    #[test]
    fn stationary_track_never_yields_short_clips() {
        let tracks = vec![stationary_track()];
        let cfg = config(5.0, 1.0);
        let matcher = GpsMatcher::default();
        let schedule = Scheduler::new(&tracks, &cfg, &matcher).unwrap().run(0).unwrap();
        assert!(!schedule.clips.is_empty());
        for c in &schedule.clips {
            assert!(c.extract_duration_s >= 0.5, "{c:?}");
        }
    }

    #[test]
    fn rejects_bad_input() {
        let matcher = GpsMatcher::default();
        let cfg = ScheduleConfig::default();
        assert!(matches!(
            Scheduler::new(&[], &cfg, &matcher),
            Err(ScheduleError::Input(InputError::NoTracks))
        ));

        let tracks = two_identical_tracks();
        let scheduler = Scheduler::new(&tracks, &cfg, &matcher).unwrap();
        assert_eq!(
            scheduler.run(2),
            Err(ScheduleError::MasterOutOfRange { index: 2, count: 2 })
        );

        let bad = config(5.0, 6.0);
        assert!(matches!(
            Scheduler::new(&tracks, &bad, &matcher),
            Err(ScheduleError::Config(_))
        ));
    }
}
