use crate::model::structures::{
    board::BoardId,
    game::GameId,
    rating::Rating
};
use serde::Serialize;
use strum_macros::Display;

/// Result of a single `recalculate` call. Not-ready is a normal outcome,
/// never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RecalcOutcome {
    /// The game was already clean; nothing was read beyond the game itself.
    AlreadyClean,
    /// An ancestor game is still dirty; nothing was written.
    NotReady { blocked_by: GameId },
    /// Posteriors were recomputed and the game is now clean.
    Recalculated {
        /// Memberships whose stored posterior changed
        updated: usize,
        /// Successor games marked dirty as a consequence
        dirtied: Vec<GameId>
    }
}

impl RecalcOutcome {
    pub fn made_progress(&self) -> bool {
        matches!(self, RecalcOutcome::Recalculated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub board_id: BoardId,
    pub games: usize,
    pub memberships: usize
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettleSummary {
    pub board_id: BoardId,
    pub passes: usize,
    pub recalculated: usize,
    pub deferred: usize,
    pub remaining_dirty: usize
}

impl SettleSummary {
    pub fn new(board_id: BoardId) -> Self {
        SettleSummary {
            board_id,
            passes: 0,
            recalculated: 0,
            deferred: 0,
            remaining_dirty: 0
        }
    }

    pub fn is_settled(&self) -> bool {
        self.remaining_dirty == 0
    }
}

/// A derived rating together with whether it is proven consistent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingState {
    /// None only when the deciding posterior has not been computed yet
    pub rating: Option<Rating>,
    pub settled: bool
}
