//! Picks, clip by clip, the source track whose GPS trace best continues a
//! running path, and ranks tracks by how well they serve as that path's
//! reference.

pub mod cache;
pub mod evaluator;
pub mod geo;
pub mod matcher;
pub mod scheduler;
pub mod scoring;
pub mod selection;

pub use cache::{CacheStats, CachedMatcher};
pub use evaluator::{rank, skip_penalty, summarize, Evaluation, MasterEvaluator, SKIP_PENALTY};
pub use geo::{distance_m, nearest_point, point_distance_m, GeoError, EARTH_RADIUS_M};
pub use matcher::{find_segment, GpsMatcher, MatchOutcome, MatchRequest, Matcher, SearchWindow};
pub use scheduler::{Schedule, ScheduleError, ScheduleState, Scheduler, StopReason, FALLBACK_SCORE};
pub use scoring::{rate, score, Deviations, Score};
pub use selection::{transition, Selection, SelectionEvent};
