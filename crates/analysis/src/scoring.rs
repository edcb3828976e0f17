//! Folds distances and deviations into one comparable score.

use model::{Rating, ScoringConfig};

pub const EXCELLENT_BELOW: f64 = 60.0;
pub const GOOD_BELOW: f64 = 180.0;
pub const FAIR_BELOW: f64 = 350.0;

/// Raw measurements of one candidate segment.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub struct Deviations {
    pub start_distance_m: f64,
    pub end_distance_m: f64,
    pub duration_deviation_s: f64,
    pub master_deviation_m: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Score {
    pub total: f64,
    pub is_start_valid: bool,
    pub is_end_valid: bool,
    pub rating: Rating,
}

impl Score {
    pub fn is_valid(&self) -> bool {
        self.is_start_valid && self.is_end_valid
    }
}

pub fn score(d: &Deviations, config: &ScoringConfig) -> Score {
    let total = d.start_distance_m * config.w_start
        + d.end_distance_m * config.w_end
        + d.duration_deviation_s * config.w_duration
        + d.master_deviation_m * config.w_master;
    let is_start_valid = d.start_distance_m <= config.start_threshold_m();
    let is_end_valid = d.end_distance_m <= config.max_distance_m;
    Score {
        total,
        is_start_valid,
        is_end_valid,
        rating: rate(total, is_start_valid && is_end_valid),
    }
}

pub fn rate(total: f64, is_valid: bool) -> Rating {
    if !is_valid {
        Rating::Unusable
    } else if total < EXCELLENT_BELOW {
        Rating::Excellent
    } else if total < GOOD_BELOW {
        Rating::Good
    } else if total < FAIR_BELOW {
        Rating::Fair
    } else {
        Rating::Poor
    }
}
