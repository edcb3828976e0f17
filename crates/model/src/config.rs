use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Which point of a candidate segment is compared against the target start.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonMode {
    /// Compare the point `fade` seconds before the candidate start and score
    /// the segment end against the reference path.
    #[default]
    FadeShifted,
    /// Compare the candidate start itself; no reference deviation term.
    Literal,
}

/// Weights and thresholds used to rate a candidate segment.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    pub w_start: f64,
    pub w_end: f64,
    pub w_duration: f64,
    pub w_master: f64,
    pub max_distance_m: f64,
    /// Scales `max_distance_m` down to the stricter start threshold.
    pub start_distance_multiplier: f64,
    pub min_duration_multiplier: f64,
    pub max_duration_multiplier: f64,
    pub comparison: ComparisonMode,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            w_start: 10.0,
            w_end: 2.0,
            w_duration: 0.5,
            w_master: 0.5,
            max_distance_m: 30.0,
            start_distance_multiplier: 0.6,
            min_duration_multiplier: 0.5,
            max_duration_multiplier: 2.0,
            comparison: ComparisonMode::FadeShifted,
        }
    }
}

impl ScoringConfig {
    pub fn start_threshold_m(&self) -> f64 {
        self.max_distance_m * self.start_distance_multiplier
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("w_start", self.w_start),
            ("w_end", self.w_end),
            ("w_duration", self.w_duration),
            ("w_master", self.w_master),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::NegativeWeight { name, value });
            }
        }
        if !(self.max_distance_m.is_finite() && self.max_distance_m > 0.0) {
            return Err(ConfigError::MaxDistance(self.max_distance_m));
        }
        let m = self.start_distance_multiplier;
        if !(m > 0.0 && m <= 1.0) {
            return Err(ConfigError::StartMultiplier(m));
        }
        let (min, max) = (self.min_duration_multiplier, self.max_duration_multiplier);
        if !(min > 0.0 && min <= max && max.is_finite()) {
            return Err(ConfigError::DurationMultipliers { min, max });
        }
        Ok(())
    }
}

/// Clip timing and the safety valves of one scheduling run.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub clip_length_s: f64,
    /// Overlap between consecutive clips, consumed by the crossfade.
    pub fade_s: f64,
    pub search_half_window_s: f64,
    pub max_clips: usize,
    pub max_attempts: usize,
    /// Plans shorter than this are reported as exhausted.
    pub min_clips: usize,
    /// Threads used when evaluating reference candidates.
    pub workers: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            clip_length_s: 5.0,
            fade_s: 1.0,
            search_half_window_s: 30.0,
            max_clips: 200,
            max_attempts: 500,
            min_clips: 2,
            workers: 4,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let clip = self.clip_length_s;
        if !(clip.is_finite() && clip >= 1.0) {
            return Err(ConfigError::ClipLength(clip));
        }
        if !(self.fade_s >= 0.0 && self.fade_s < clip) {
            return Err(ConfigError::Fade {
                fade: self.fade_s,
                clip,
            });
        }
        if !(self.search_half_window_s > 0.0) {
            return Err(ConfigError::SearchWindow(self.search_half_window_s));
        }
        if self.max_clips == 0 {
            return Err(ConfigError::ZeroLimit("max_clips"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroLimit("max_attempts"));
        }
        if self.workers == 0 {
            return Err(ConfigError::ZeroLimit("workers"));
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub scoring: ScoringConfig,
    pub schedule: ScheduleConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scoring.validate()?;
        self.schedule.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert_relative_eq!(ScoringConfig::default().start_threshold_m(), 18.0);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: EngineConfig =
            serde_json::from_str(r#"{"scoring":{"max_distance_m":25.0},"schedule":{"fade_s":0.5}}"#)
                .unwrap();
        assert_relative_eq!(cfg.scoring.max_distance_m, 25.0);
        assert_relative_eq!(cfg.scoring.w_start, 10.0);
        assert_relative_eq!(cfg.schedule.fade_s, 0.5);
        assert_eq!(cfg.schedule.max_clips, 200);
        assert_eq!(cfg.scoring.comparison, ComparisonMode::FadeShifted);
    }

    #[test]
    fn legacy_mode_parses() {
        let cfg: ScoringConfig = serde_json::from_str(r#"{"comparison":"literal"}"#).unwrap();
        assert_eq!(cfg.comparison, ComparisonMode::Literal);
    }

    #[test]
    fn rejects_fade_longer_than_clip() {
        let cfg = ScheduleConfig {
            fade_s: 5.0,
            ..ScheduleConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::Fade { .. })));
    }

    #[test]
    fn rejects_inverted_duration_range() {
        let cfg = ScoringConfig {
            min_duration_multiplier: 3.0,
            ..ScoringConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::DurationMultipliers { .. })
        ));
    }
}
