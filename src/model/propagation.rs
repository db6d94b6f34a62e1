//! Dirty propagation.
//!
//! A game's priors are never stored; they resolve through each participant's
//! nearest earlier membership. When a mutation changes what that lookup
//! returns, the game on the other end must be recalculated. These helpers
//! find and flag exactly those games, one hop from the change.

use crate::{
    database::store::Timeline,
    error::StoreError,
    model::structures::{
        board::{BoardId, ParticipantId},
        game::GameId
    }
};
use chrono::{DateTime, FixedOffset};
use itertools::Itertools;
use tracing::debug;

/// The games whose prior for any of `participants` currently resolves
/// through the instant `timestamp`: each participant's nearest-later game.
///
/// Returned ids are sorted and unique.
pub async fn successors<T: Timeline>(
    tx: &mut T,
    board_id: BoardId,
    participants: impl IntoIterator<Item = ParticipantId> + Send,
    timestamp: DateTime<FixedOffset>
) -> Result<Vec<GameId>, StoreError> {
    let mut games = Vec::new();
    for participant_id in participants {
        if let Some(next) = tx.nearest_later_membership(board_id, participant_id, timestamp).await? {
            games.push(next.game_id);
        }
    }

    Ok(games.into_iter().sorted().dedup().collect())
}

/// Flags `games` dirty. Flags only ever move from clean to dirty here, so
/// concurrent callers flagging the same game agree on the result.
pub async fn mark_dirty<T: Timeline>(tx: &mut T, games: &[GameId]) -> Result<(), StoreError> {
    if games.is_empty() {
        return Ok(());
    }

    debug!("Marking {} game(s) dirty: {:?}", games.len(), games);
    tx.mark_dirty(games).await
}

/// Merges groups of game ids into one sorted, duplicate-free list.
pub fn merge(groups: impl IntoIterator<Item = Vec<GameId>>) -> Vec<GameId> {
    groups.into_iter().flatten().sorted().dedup().collect()
}
