//! Great-circle distance and time lookups over GPS traces.

use model::GpsPoint;
use thiserror::Error;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeoError {
    #[error("track has no points")]
    EmptyTrack,
}

/// Haversine distance in meters. NaN inputs yield NaN.
pub fn distance_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // rounding can push `a` just past 1 for antipodal pairs
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

pub fn point_distance_m(a: &GpsPoint, b: &GpsPoint) -> f64 {
    distance_m(a.lat, a.lon, b.lat, b.lon)
}

/// Point whose time is closest to `target_time`; the earliest wins ties.
pub fn nearest_point(points: &[GpsPoint], target_time: f64) -> Result<&GpsPoint, GeoError> {
    let mut best = points.first().ok_or(GeoError::EmptyTrack)?;
    let mut bd = f64::INFINITY;
    for p in points {
        let dd = (p.t - target_time).abs();
        if dd < bd {
            bd = dd;
            best = p;
        }
    }
    Ok(best)
}

/// Same answer as [`nearest_point`] for time-sorted points, by bisection.
pub(crate) fn nearest_index_sorted(points: &[GpsPoint], target_time: f64) -> Result<usize, GeoError> {
    if points.is_empty() {
        return Err(GeoError::EmptyTrack);
    }
    let right = points.partition_point(|p| p.t < target_time);
    if right == 0 {
        return Ok(0);
    }
    let left_t = points[right - 1].t;
    let first_left = points.partition_point(|p| p.t < left_t);
    if right == points.len() {
        return Ok(first_left);
    }
    if (points[right].t - target_time).abs() < (left_t - target_time).abs() {
        Ok(right)
    } else {
        Ok(first_left)
    }
}
