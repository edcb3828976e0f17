//! Memoization of segment searches, shared across evaluation workers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use model::{GpsPoint, ScoringConfig, Track};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::matcher::{MatchOutcome, MatchRequest, Matcher};

/// Every input of a search, by exact bit pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct MatchKey {
    track: Uuid,
    target_start: [u64; 2],
    target_end: [u64; 2],
    clip_duration: u64,
    window: [u64; 2],
    fade: u64,
    master_end: Option<[u64; 2]>,
}

fn coords(p: &GpsPoint) -> [u64; 2] {
    [p.lat.to_bits(), p.lon.to_bits()]
}

impl MatchKey {
    fn new(track: &Track, r: &MatchRequest) -> Self {
        Self {
            track: track.id(),
            target_start: coords(&r.target_start),
            target_end: coords(&r.target_end),
            clip_duration: r.clip_duration_s.to_bits(),
            window: [r.window.start.to_bits(), r.window.end.to_bits()],
            fade: r.fade_overlap_s.to_bits(),
            master_end: r.master_end.as_ref().map(coords),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Wraps a matcher and remembers its answers. A cache is only valid for the
/// scoring configuration of the matcher it wraps.
pub struct CachedMatcher<M> {
    inner: M,
    entries: RwLock<HashMap<MatchKey, MatchOutcome>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<M: Matcher> CachedMatcher<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

impl<M: Matcher> Matcher for CachedMatcher<M> {
    fn find_segment(&self, track: &Track, request: &MatchRequest) -> MatchOutcome {
        let key = MatchKey::new(track, request);
        if let Some(hit) = self.entries.read().get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return hit.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let outcome = self.inner.find_segment(track, request);
        self.entries.write().insert(key, outcome.clone());
        outcome
    }

    fn scoring(&self) -> &ScoringConfig {
        self.inner.scoring()
    }
}
