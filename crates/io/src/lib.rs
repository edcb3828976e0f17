use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::{fs::File, path::Path};
use serde::{Serialize, Deserialize};
use tracing::info;
use model::*;
use analysis::Evaluation;

/// Reads `track,t,lat,lon[,video_duration]` rows into one track per name,
/// in order of first appearance.
pub fn import_tracks_csv(path: &Path) -> Result<Vec<Track>> {
    let mut rdr = csv::Reader::from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut order: Vec<(TrackMeta, Vec<GpsPoint>)> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();
    for (line, rec) in rdr.deserialize().enumerate() {
        let r: TrackCsvRow = rec.with_context(|| format!("{} row {}", path.display(), line + 1))?;
        let i = *by_name.entry(r.track.clone()).or_insert_with(|| {
            order.push((TrackMeta::new(r.track.clone()), vec![]));
            order.len() - 1
        });
        let (meta, points) = &mut order[i];
        if let Some(d) = r.video_duration {
            meta.video_duration_s = Some(d);
        }
        points.push(GpsPoint::new(r.t, r.lat, r.lon));
    }
    let mut tracks = Vec::with_capacity(order.len());
    for (meta, points) in order {
        tracks.push(Track::new(meta, points)?);
    }
    if tracks.is_empty() {
        return Err(InputError::NoTracks).with_context(|| path.display().to_string());
    }
    info!(path = %path.display(), tracks = tracks.len(), "imported tracks");
    Ok(tracks)
}

pub fn import_tracks_ndjson(path: &Path) -> Result<Vec<Track>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut tracks = vec![];
    for (line, s) in rdr.lines().enumerate() {
        let s = s?;
        if s.trim().is_empty() { continue; }
        let t: Track = serde_json::from_str(&s)
            .with_context(|| format!("{} line {}", path.display(), line + 1))?;
        tracks.push(t);
    }
    if tracks.is_empty() {
        return Err(InputError::NoTracks).with_context(|| path.display().to_string());
    }
    info!(path = %path.display(), tracks = tracks.len(), "imported tracks");
    Ok(tracks)
}

pub fn export_tracks_ndjson(tracks: &[Track], path: &Path) -> Result<()> {
    write_ndjson(tracks, path)
}

/// Extraction plan for the cutter, one clip per row in playback order.
pub fn export_plan_csv(clips: &[ClipAssignment], path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    for (i, c) in clips.iter().enumerate() {
        w.serialize(PlanRow {
            clip: i,
            track: &c.track_name,
            track_id: c.track_id.simple().to_string(),
            start_s: c.extract_start_s,
            duration_s: c.extract_duration_s,
            rating: c.rating,
            score: c.score,
            origin: c.origin,
        })?;
    }
    w.flush()?;
    info!(path = %path.display(), clips = clips.len(), "wrote plan");
    Ok(())
}

pub fn export_plan_ndjson(clips: &[ClipAssignment], path: &Path) -> Result<()> {
    write_ndjson(clips, path)
}

pub fn import_plan_ndjson(path: &Path) -> Result<Vec<ClipAssignment>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut clips = vec![];
    for line in BufReader::new(f).lines() {
        let s = line?;
        if s.trim().is_empty() { continue; }
        clips.push(serde_json::from_str(&s)?);
    }
    Ok(clips)
}

/// Candidate references, ranked ones first, then the unusable ones unranked.
pub fn export_ranking_csv(eval: &Evaluation, path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    let ranked = eval.ranked.iter().enumerate().map(|(i, r)| (Some(i + 1), r));
    let unusable = eval.unusable.iter().map(|r| (None, r));
    for (rank, r) in ranked.chain(unusable) {
        w.serialize(RankingRow {
            rank,
            track: &r.track_name,
            clips: r.clips_extracted,
            average_clip_score: r.average_clip_score,
            skip_penalty: r.skip_penalty,
            total_score: r.total_score,
            excellent: r.excellent_count,
            good: r.good_count,
        })?;
    }
    w.flush()?;
    info!(path = %path.display(), candidates = eval.ranked.len() + eval.unusable.len(), "wrote ranking");
    Ok(())
}

/// Reads a JSON engine configuration; absent fields keep their defaults.
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let s = std::fs::read_to_string(path)
        .with_context(|| format!("read {}", path.display()))?;
    let cfg: EngineConfig = serde_json::from_str(&s)
        .with_context(|| format!("parse {}", path.display()))?;
    cfg.validate().with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

fn write_ndjson<T: Serialize>(items: &[T], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for item in items {
        let s = serde_json::to_string(item)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Deserialize)]
struct TrackCsvRow {
    track: String,
    t: f64, lat: f64, lon: f64,
    #[serde(default)]
    video_duration: Option<f64>,
}

#[derive(Serialize)]
struct PlanRow<'a> {
    clip: usize, track: &'a str, track_id: String,
    start_s: f64, duration_s: f64,
    rating: Rating, score: f64, origin: ClipOrigin,
}

#[derive(Serialize)]
struct RankingRow<'a> {
    rank: Option<usize>, track: &'a str, clips: usize,
    average_clip_score: f64, skip_penalty: f64, total_score: f64,
    excellent: usize, good: usize,
}
