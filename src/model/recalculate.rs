use crate::{
    database::store::{Timeline, TimelineStore},
    error::{Error, InvariantViolation, ModelError},
    model::{
        engine::{ensure_on_board, load_board, load_game, RatingEngine},
        propagation::{self, successors},
        rating_model::{RatedPlayer, RatedTeam, RatingModel},
        structures::{
            game::{GameId, MembershipId},
            outcome::RecalcOutcome,
            rating::Rating
        }
    }
};
use indexmap::IndexMap;
use tracing::{debug, error, trace};

impl<S: TimelineStore, M: RatingModel> RatingEngine<S, M> {
    /// # Recalculation
    ///
    /// Recomputes one dirty game and advances the dirty frontier by at most
    /// one hop.
    ///
    /// Steps:
    /// 1. A clean game is left untouched and reported as such.
    /// 2. Each participant's prior resolves through their nearest earlier
    ///     membership. If that membership's game is dirty, nothing is written
    ///     and the game is reported as not ready.
    /// 3. All teams are rated in one joint model call.
    /// 4. Only posteriors that differ from the stored value are written, and
    ///     only those participants' next games are flagged. Unchanged ratings
    ///     stop propagating here.
    /// 5. The game is marked clean.
    ///
    /// Everything happens in a single transaction which is only committed
    /// when the game was recalculated.
    pub async fn recalculate(&self, game_id: GameId) -> Result<RecalcOutcome, Error> {
        let mut tx = self.store().begin().await?;
        let outcome = self.recalculate_in(&mut tx, game_id).await?;
        trace!("Game {}: {}", game_id, outcome);

        if outcome.made_progress() {
            tx.commit().await?;
        }

        Ok(outcome)
    }

    async fn recalculate_in(&self, tx: &mut S::Tx, game_id: GameId) -> Result<RecalcOutcome, Error> {
        let game = load_game(tx, game_id).await?;

        if !game.dirty {
            if let Some(m) = game.memberships().find(|m| m.posterior.is_none()) {
                let violation = InvariantViolation::NullPosterior {
                    membership: m.id,
                    game: game.id
                };
                error!("{}", violation);
                return Err(violation.into());
            }

            return Ok(RecalcOutcome::AlreadyClean);
        }

        let board = load_board(tx, game.board_id).await?;
        let default_prior = board.params.default_rating();

        let mut teams = Vec::with_capacity(game.teams.len());
        for team in &game.teams {
            let mut players = IndexMap::with_capacity(team.members.len());

            for member in &team.members {
                ensure_on_board(tx, &game, member.participant_id).await?;

                let prior = match tx
                    .nearest_earlier_membership(game.board_id, member.participant_id, game.timestamp)
                    .await?
                {
                    None => default_prior,
                    Some(earlier) if earlier.game_dirty => {
                        debug!(
                            "Game {} is not ready: participant {} waits on game {}",
                            game.id, member.participant_id, earlier.game_id
                        );
                        return Ok(RecalcOutcome::NotReady {
                            blocked_by: earlier.game_id
                        });
                    }
                    Some(earlier) => match earlier.posterior {
                        Some(posterior) => posterior,
                        None => {
                            let violation = InvariantViolation::NullPosterior {
                                membership: earlier.membership_id,
                                game: earlier.game_id
                            };
                            error!("{}", violation);
                            return Err(violation.into());
                        }
                    }
                };

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

        let mut updates: Vec<(MembershipId, Rating)> = Vec::new();
        let mut changed = Vec::new();
        for member in game.memberships() {
            let posterior = *posteriors
                .get(&member.participant_id)
                .ok_or(ModelError::MissingParticipant(member.participant_id))?;

            if member.posterior == Some(posterior) {
                continue;
            }

            updates.push((member.id, posterior));
            changed.push(member.participant_id);
        }

        let dirtied = successors(tx, game.board_id, changed, game.timestamp).await?;
        tx.write_posteriors(&updates).await?;
        propagation::mark_dirty(tx, &dirtied).await?;
        tx.mark_clean(&[game.id]).await?;

        debug!(
            "Recalculated game {}: {} posterior(s) changed, {} successor(s) marked dirty",
            game.id,
            updates.len(),
            dirtied.len()
        );

        Ok(RecalcOutcome::Recalculated {
            updated: updates.len(),
            dirtied
        })
    }
}
