//! Scoring and stage-lock engine for a tournament prediction pool.

pub mod config;
pub mod leaderboard;
pub mod match_score;
pub mod model;
pub mod outcome;
pub mod pool;
pub mod records;
pub mod stage_clock;
pub mod standings_export;
pub mod store;
pub mod top4_score;

pub use leaderboard::{StandingsRow, TieBreak, compute_standings};
pub use match_score::score_match;
pub use outcome::{OutcomeCode, classify};
pub use pool::{EntryError, PoolService, PredictionEntry, Snapshot};
pub use stage_clock::is_editable;
pub use top4_score::{PointsMatrix, score_top4};
