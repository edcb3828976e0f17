use thiserror::Error;

/// Rejections raised while building tracks or assembling the track list.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("no tracks supplied")]
    NoTracks,
    #[error("track {track:?} has {points} points, at least {min} are required", min = crate::MIN_TRACK_POINTS)]
    TooFewPoints { track: String, points: usize },
    #[error("track {track:?} point {index}: {reason}")]
    InvalidPoint {
        track: String,
        index: usize,
        reason: String,
    },
    #[error("track {track:?} has invalid video duration {duration}")]
    InvalidDuration { track: String, duration: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{name} must be a finite value >= 0 (got {value})")]
    NegativeWeight { name: &'static str, value: f64 },
    #[error("max_distance_m must be positive (got {0})")]
    MaxDistance(f64),
    #[error("start_distance_multiplier must be in (0, 1] (got {0})")]
    StartMultiplier(f64),
    #[error("duration multipliers must satisfy 0 < min <= max (got {min}..{max})")]
    DurationMultipliers { min: f64, max: f64 },
    #[error("clip_length_s must be at least 1s (got {0})")]
    ClipLength(f64),
    #[error("fade_s must be in [0, clip_length_s) (got {fade} for clip {clip})")]
    Fade { fade: f64, clip: f64 },
    #[error("search_half_window_s must be positive (got {0})")]
    SearchWindow(f64),
    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),
}
