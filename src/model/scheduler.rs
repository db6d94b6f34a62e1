use crate::{
    database::store::{Timeline, TimelineStore},
    error::Error,
    model::{
        engine::{load_board, RatingEngine},
        rating_model::RatingModel,
        structures::{
            board::BoardId,
            game::GameId,
            outcome::{RecalcOutcome, SettleSummary}
        }
    },
    utils::progress_utils::progress_bar
};
use futures::future::try_join_all;
use tracing::{debug, info, warn};

impl<S: TimelineStore, M: RatingModel> RatingEngine<S, M> {
    /// Drives the board to quiescence: each pass recalculates the board's
    /// dirty games in ascending timestamp order, and passes repeat until no
    /// game is dirty or `max_passes` runs out.
    ///
    /// The first error aborts the board. Games committed before it stay
    /// committed.
    pub async fn settle_board(&self, board_id: BoardId, max_passes: Option<usize>) -> Result<SettleSummary, Error> {
        let board = {
            let mut tx = self.store().begin().await?;
            load_board(&mut tx, board_id).await?
        };
        let mut summary = SettleSummary::new(board_id);

        loop {
            let dirty = self.dirty_games(board_id).await?;
            summary.remaining_dirty = dirty.len();

            if dirty.is_empty() || max_passes.is_some_and(|max| summary.passes >= max) {
                break;
            }

            summary.passes += 1;
            let bar = progress_bar(
                dirty.len() as u64,
                format!("Settling board '{}' (pass {})", board.name, summary.passes)
            );

            let mut progressed = 0;
            for game_id in dirty {
                match self.recalculate(game_id).await? {
                    RecalcOutcome::Recalculated { .. } => progressed += 1,
                    RecalcOutcome::NotReady { blocked_by } => {
                        debug!("Deferring game {} until game {} is clean", game_id, blocked_by);
                        summary.deferred += 1;
                    }
                    RecalcOutcome::AlreadyClean => {}
                }

                if let Some(bar) = &bar {
                    bar.inc(1);
                }
            }

            if let Some(bar) = bar {
                bar.finish();
            }

            summary.recalculated += progressed;
            if progressed == 0 {
                warn!("Board {} made no progress in pass {}", board_id, summary.passes);
                summary.remaining_dirty = self.dirty_games(board_id).await?.len();
                break;
            }
        }

        if summary.is_settled() {
            info!(
                "Settled board {} in {} pass(es), {} game(s) recalculated",
                board_id, summary.passes, summary.recalculated
            );
        } else {
            warn!(
                "Board {} still has {} dirty game(s) after {} pass(es)",
                board_id, summary.remaining_dirty, summary.passes
            );
        }

        Ok(summary)
    }

    /// Settles every board concurrently. Boards share no games, so they never
    /// wait on each other.
    pub async fn settle_all(&self, max_passes: Option<usize>) -> Result<Vec<SettleSummary>, Error> {
        let boards = self.boards().await?;

        try_join_all(boards.iter().map(|board| self.settle_board(board.id, max_passes))).await
    }

    /// The board's dirty games in ascending timestamp order.
    pub async fn dirty_games(&self, board_id: BoardId) -> Result<Vec<GameId>, Error> {
        let mut tx = self.store().begin().await?;

        Ok(tx.dirty_games(board_id).await?)
    }
}
