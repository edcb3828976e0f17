use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod config;
mod error;

pub use config::*;
pub use error::*;

/// Fewest points a track may carry.
pub const MIN_TRACK_POINTS: usize = 3;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GpsPoint {
    /// Seconds from the start of the source video.
    pub t: f64,
    pub lat: f64,
    pub lon: f64,
}

impl GpsPoint {
    pub fn new(t: f64, lat: f64, lon: f64) -> Self {
        Self { t, lat, lon }
    }

    fn check(&self) -> Result<(), String> {
        if !self.t.is_finite() || self.t < 0.0 {
            return Err(format!("time {} is not a finite value >= 0", self.t));
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(format!("latitude {} outside [-90, 90]", self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(format!("longitude {} outside [-180, 180]", self.lon));
        }
        Ok(())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TrackMeta {
    pub name: String,
    /// Length of the source video as reported by the media prober.
    #[serde(default)]
    pub video_duration_s: Option<f64>,
}

impl TrackMeta {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            video_duration_s: None,
        }
    }

    pub fn with_video_duration(mut self, seconds: f64) -> Self {
        self.video_duration_s = Some(seconds);
        self
    }
}

/// GPS trace of one source video. Points are sorted by time and validated
/// on construction; a track never changes afterwards.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(try_from = "TrackRecord", into = "TrackRecord")]
pub struct Track {
    id: Uuid,
    meta: TrackMeta,
    points: Vec<GpsPoint>,
    sample_interval_s: f64,
}

#[derive(Clone, Serialize, Deserialize)]
struct TrackRecord {
    #[serde(with = "uuid::serde::simple")]
    id: Uuid,
    meta: TrackMeta,
    #[serde(default)]
    points: Vec<GpsPoint>,
}

impl TryFrom<TrackRecord> for Track {
    type Error = InputError;

    fn try_from(r: TrackRecord) -> Result<Self, Self::Error> {
        Track::with_id(r.id, r.meta, r.points)
    }
}

impl From<Track> for TrackRecord {
    fn from(t: Track) -> Self {
        TrackRecord {
            id: t.id,
            meta: t.meta,
            points: t.points,
        }
    }
}

impl Track {
    pub fn new(meta: TrackMeta, points: Vec<GpsPoint>) -> Result<Self, InputError> {
        Self::with_id(Uuid::new_v4(), meta, points)
    }

    pub fn with_id(id: Uuid, meta: TrackMeta, mut points: Vec<GpsPoint>) -> Result<Self, InputError> {
        if points.len() < MIN_TRACK_POINTS {
            return Err(InputError::TooFewPoints {
                track: meta.name,
                points: points.len(),
            });
        }
        for (index, p) in points.iter().enumerate() {
            p.check().map_err(|reason| InputError::InvalidPoint {
                track: meta.name.clone(),
                index,
                reason,
            })?;
        }
        if let Some(d) = meta.video_duration_s {
            if !d.is_finite() || d <= 0.0 {
                return Err(InputError::InvalidDuration {
                    track: meta.name,
                    duration: d,
                });
            }
        }
        // stable, so equal timestamps keep their recorded order
        points.sort_by(|a, b| a.t.total_cmp(&b.t));
        let sample_interval_s = median_interval(&points);
        Ok(Self {
            id,
            meta,
            points,
            sample_interval_s,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn meta(&self) -> &TrackMeta {
        &self.meta
    }

    pub fn points(&self) -> &[GpsPoint] {
        &self.points
    }

    pub fn min_time(&self) -> f64 {
        self.points[0].t
    }

    pub fn max_time(&self) -> f64 {
        self.points[self.points.len() - 1].t
    }

    pub fn duration(&self) -> f64 {
        self.max_time() - self.min_time()
    }

    /// Where GPS coverage or the video itself ends, whichever comes first.
    pub fn effective_max(&self) -> f64 {
        match self.meta.video_duration_s {
            Some(d) => d.min(self.max_time()),
            None => self.max_time(),
        }
    }

    /// Median spacing between distinct consecutive timestamps.
    pub fn sample_interval_s(&self) -> f64 {
        self.sample_interval_s
    }
}

fn median_interval(points: &[GpsPoint]) -> f64 {
    let mut gaps: Vec<f64> = points
        .windows(2)
        .map(|w| w[1].t - w[0].t)
        .filter(|d| *d > 0.0)
        .collect();
    if gaps.is_empty() {
        return 0.0;
    }
    gaps.sort_by(f64::total_cmp);
    let mid = gaps.len() / 2;
    if gaps.len() % 2 == 0 {
        (gaps[mid - 1] + gaps[mid]) / 2.0
    } else {
        gaps[mid]
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
    Unusable,
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rating::Excellent => "excellent",
            Rating::Good => "good",
            Rating::Fair => "fair",
            Rating::Poor => "poor",
            Rating::Unusable => "unusable",
        };
        f.write_str(s)
    }
}

/// One scored candidate segment.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MatchResult {
    /// First point of the segment proper.
    pub start_point: GpsPoint,
    /// Point actually compared with the target start; differs from
    /// `start_point` when a fade lead-in is checked.
    pub comparison_point: GpsPoint,
    pub end_point: GpsPoint,
    pub start_distance_m: f64,
    pub end_distance_m: f64,
    pub duration_deviation_s: f64,
    pub master_deviation_m: f64,
    pub total_score: f64,
    pub rating: Rating,
    pub is_start_valid: bool,
    pub is_end_valid: bool,
    pub is_valid: bool,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClipOrigin {
    Matched,
    /// Taken from the last used track without GPS validation.
    Fallback,
}

/// One entry of the extraction plan handed to the cutter.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct ClipAssignment {
    #[serde(with = "uuid::serde::simple")]
    pub track_id: Uuid,
    pub track_name: String,
    pub track_index: usize,
    pub extract_start_s: f64,
    pub extract_duration_s: f64,
    pub rating: Rating,
    pub score: f64,
    pub origin: ClipOrigin,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct MasterCandidateResult {
    #[serde(with = "uuid::serde::simple")]
    pub track_id: Uuid,
    pub track_name: String,
    pub track_index: usize,
    pub clips_extracted: usize,
    pub average_clip_score: f64,
    pub skip_penalty: f64,
    pub total_score: f64,
    pub excellent_count: usize,
    pub good_count: usize,
}
