//! Ranks each track by how well it works as the reference path.

use model::{MasterCandidateResult, Rating, Track};
use serde::Serialize;
use tracing::{info, warn};

use crate::matcher::Matcher;
use crate::scheduler::{Schedule, ScheduleError, Scheduler};

/// Added per extra track skipped to find a clip.
pub const SKIP_PENALTY: f64 = 100.0;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Evaluation {
    /// Usable candidates, best (lowest total score) first.
    pub ranked: Vec<MasterCandidateResult>,
    /// Candidates that produced no clips at all.
    pub unusable: Vec<MasterCandidateResult>,
}

impl Evaluation {
    pub fn recommended(&self) -> Option<&MasterCandidateResult> {
        self.ranked.first()
    }
}

/// `Σ max(0, skips - 1) * SKIP_PENALTY`
pub fn skip_penalty(skips: &[usize]) -> f64 {
    skips
        .iter()
        .map(|s| s.saturating_sub(1) as f64 * SKIP_PENALTY)
        .sum()
}

pub fn summarize(track: &Track, index: usize, schedule: &Schedule) -> MasterCandidateResult {
    let n = schedule.clips.len();
    let average = if n > 0 {
        schedule.clips.iter().map(|c| c.score).sum::<f64>() / n as f64
    } else {
        0.0
    };
    let penalty = skip_penalty(&schedule.skips);
    let count = |r: Rating| schedule.clips.iter().filter(|c| c.rating == r).count();
    MasterCandidateResult {
        track_id: track.id(),
        track_name: track.name().to_string(),
        track_index: index,
        clips_extracted: n,
        average_clip_score: average,
        skip_penalty: penalty,
        total_score: average + penalty,
        excellent_count: count(Rating::Excellent),
        good_count: count(Rating::Good),
    }
}

/// Splits off candidates without clips and sorts the rest by total score.
/// Equal scores keep track order.
pub fn rank(results: Vec<MasterCandidateResult>) -> Evaluation {
    let (mut ranked, mut unusable): (Vec<_>, Vec<_>) =
        results.into_iter().partition(|r| r.clips_extracted > 0);
    ranked.sort_by(|a, b| {
        a.total_score
            .total_cmp(&b.total_score)
            .then(a.track_index.cmp(&b.track_index))
    });
    unusable.sort_by_key(|r| r.track_index);
    Evaluation { ranked, unusable }
}

pub struct MasterEvaluator<'a, M> {
    scheduler: Scheduler<'a, M>,
}

impl<'a, M: Matcher + Sync> MasterEvaluator<'a, M> {
    pub fn new(scheduler: Scheduler<'a, M>) -> Self {
        Self { scheduler }
    }

    /// Evaluates every track as a reference candidate.
    pub fn evaluate(&self) -> Result<Evaluation, ScheduleError> {
        let all: Vec<usize> = (0..self.scheduler.tracks().len()).collect();
        self.evaluate_candidates(&all)
    }

    /// Each candidate runs on its own schedule state, spread over the
    /// configured number of worker threads.
    pub fn evaluate_candidates(&self, candidates: &[usize]) -> Result<Evaluation, ScheduleError> {
        let tracks = self.scheduler.tracks();
        let workers = self.scheduler.config().workers.clamp(1, candidates.len().max(1));

        let (job_tx, job_rx) = crossbeam_channel::unbounded::<usize>();
        let (res_tx, res_rx) = crossbeam_channel::unbounded();
        for &c in candidates {
            let _ = job_tx.send(c);
        }
        drop(job_tx);

        std::thread::scope(|s| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let res_tx = res_tx.clone();
                let scheduler = &self.scheduler;
                s.spawn(move || {
                    for m in job_rx.iter() {
                        let _ = res_tx.send((m, scheduler.run(m)));
                    }
                });
            }
        });
        drop(res_tx);

        let mut runs: Vec<(usize, Result<Schedule, ScheduleError>)> = res_rx.iter().collect();
        runs.sort_by_key(|(m, _)| *m);

        let mut results = Vec::with_capacity(runs.len());
        for (m, run) in runs {
            let schedule = run?;
            let result = summarize(&tracks[m], m, &schedule);
            if result.clips_extracted == 0 {
                warn!(candidate = %result.track_name, "candidate produced no clips");
            } else {
                info!(
                    candidate = %result.track_name,
                    clips = result.clips_extracted,
                    average = result.average_clip_score,
                    penalty = result.skip_penalty,
                    total = result.total_score,
                    "candidate evaluated"
                );
            }
            results.push(result);
        }
        let evaluation = rank(results);
        if let Some(best) = evaluation.recommended() {
            info!(master = %best.track_name, total = best.total_score, "recommended reference");
        }
        Ok(evaluation)
    }
}
