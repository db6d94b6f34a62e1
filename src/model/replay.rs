use std::collections::{HashMap, HashSet};

use crate::{
    database::store::{Timeline, TimelineStore},
    error::{Error, ModelError},
    model::{
        engine::{ensure_on_board, load_board, RatingEngine},
        rating_model::{RatedPlayer, RatedTeam, RatingModel},
        structures::{
            board::{BoardId, ParticipantId},
            game::MembershipId,
            outcome::ReplaySummary,
            rating::Rating
        }
    },
    utils::progress_utils::progress_bar
};
use futures::future::try_join_all;
use indexmap::IndexMap;
use tracing::info;

impl<S: TimelineStore, M: RatingModel> RatingEngine<S, M> {
    /// Recomputes the board's entire history from the default prior, in
    /// ascending timestamp order, overwriting every stored posterior and
    /// leaving every game clean.
    ///
    /// Produces the same posteriors as recalculating dirty games until none
    /// remain.
    pub async fn replay(&self, board_id: BoardId) -> Result<ReplaySummary, Error> {
        let mut tx = self.store().begin().await?;
        let board = load_board(&mut tx, board_id).await?;
        let default_prior = board.params.default_rating();
        let games = tx.games_by_time(board_id).await?;

        let bar = progress_bar(games.len() as u64, format!("Replaying board '{}'", board.name));

        let mut current: HashMap<ParticipantId, Rating> = HashMap::new();
        let mut checked: HashSet<ParticipantId> = HashSet::new();
        let mut updates: Vec<(MembershipId, Rating)> = Vec::new();

        for game in &games {
            let mut teams = Vec::with_capacity(game.teams.len());
            for team in &game.teams {
                let mut players = IndexMap::with_capacity(team.members.len());
                for member in &team.members {
                    if checked.insert(member.participant_id) {
                        ensure_on_board(&mut tx, game, member.participant_id).await?;
                    }

                    let prior = current.get(&member.participant_id).copied().unwrap_or(default_prior);
                    players.insert(
                        member.participant_id,
                        RatedPlayer {
                            prior,
                            weight: member.weight
                        }
                    );
                }

                teams.push(RatedTeam {
                    rank: team.rank,
                    players
                });
            }

            let posteriors = self.model().rate(&teams, &board.params)?;
            for member in game.memberships() {
                let posterior = *posteriors
                    .get(&member.participant_id)
                    .ok_or(ModelError::MissingParticipant(member.participant_id))?;

                current.insert(member.participant_id, posterior);
                updates.push((member.id, posterior));
            }

            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }

        let ids: Vec<_> = games.iter().map(|g| g.id).collect();
        tx.write_posteriors(&updates).await?;
        tx.mark_clean(&ids).await?;
        tx.commit().await?;

        if let Some(bar) = bar {
            bar.finish();
        }

        info!(
            "Replayed board {}: {} game(s), {} membership(s)",
            board_id,
            games.len(),
            updates.len()
        );

        Ok(ReplaySummary {
            board_id,
            games: games.len(),
            memberships: updates.len()
        })
    }

    /// Replays every board concurrently.
    pub async fn replay_all(&self) -> Result<Vec<ReplaySummary>, Error> {
        let boards = self.boards().await?;

        try_join_all(boards.iter().map(|board| self.replay(board.id))).await
    }
}
