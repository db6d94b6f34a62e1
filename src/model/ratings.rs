use crate::{
    database::store::{Timeline, TimelineStore},
    error::{Error, InvariantViolation},
    model::{
        engine::{load_board, load_game, RatingEngine},
        rating_model::RatingModel,
        structures::{
            board::{Participant, ParticipantId},
            game::{Game, GameId, LinkedMembership},
            outcome::RatingState,
            rating::Rating
        }
    }
};
use chrono::{DateTime, FixedOffset};

/// Derived-rating queries. A participant's rating is never stored; it is
/// always the posterior of a membership, or the board default before the
/// participant's first game.
impl<S: TimelineStore, M: RatingModel> RatingEngine<S, M> {
    pub async fn game(&self, id: GameId) -> Result<Game, Error> {
        let mut tx = self.store().begin().await?;

        load_game(&mut tx, id).await
    }

    pub async fn participant(&self, id: ParticipantId) -> Result<Participant, Error> {
        let mut tx = self.store().begin().await?;

        tx.participant(id).await?.ok_or_else(|| Error::not_found("participant", id))
    }

    /// The prior a game at `timestamp` would use for this participant. It is
    /// only settled when every earlier game of the participant is clean.
    pub async fn prior_at(&self, participant_id: ParticipantId, timestamp: DateTime<FixedOffset>) -> Result<RatingState, Error> {
        let mut tx = self.store().begin().await?;
        let participant = tx
            .participant(participant_id)
            .await?
            .ok_or_else(|| Error::not_found("participant", participant_id))?;
        let board = load_board(&mut tx, participant.board_id).await?;

        let earlier: Vec<LinkedMembership> = tx
            .participant_history(board.id, participant_id)
            .await?
            .into_iter()
            .take_while(|m| m.timestamp < timestamp)
            .collect();

        settled_state(&earlier, || board.params.default_rating())
    }

    /// The posterior of the participant's latest membership. It is only
    /// settled when none of the participant's games are dirty.
    pub async fn current_rating(&self, participant_id: ParticipantId) -> Result<RatingState, Error> {
        let mut tx = self.store().begin().await?;
        let participant = tx
            .participant(participant_id)
            .await?
            .ok_or_else(|| Error::not_found("participant", participant_id))?;
        let board = load_board(&mut tx, participant.board_id).await?;

        let history = tx.participant_history(board.id, participant_id).await?;

        settled_state(&history, || board.params.default_rating())
    }

    /// The participant's memberships in ascending timestamp order.
    pub async fn rating_history(&self, participant_id: ParticipantId) -> Result<Vec<LinkedMembership>, Error> {
        let mut tx = self.store().begin().await?;
        let participant = tx
            .participant(participant_id)
            .await?
            .ok_or_else(|| Error::not_found("participant", participant_id))?;

        Ok(tx.participant_history(participant.board_id, participant_id).await?)
    }
}

/// The latest posterior of an ascending run of memberships, settled only if
/// none of their games are dirty.
fn settled_state(history: &[LinkedMembership], default: impl FnOnce() -> Rating) -> Result<RatingState, Error> {
    let mut state = state_of(history.last(), default)?;
    state.settled = history.iter().all(|m| !m.game_dirty);

    Ok(state)
}

fn state_of(membership: Option<&LinkedMembership>, default: impl FnOnce() -> Rating) -> Result<RatingState, Error> {
    let Some(m) = membership else {
        return Ok(RatingState {
            rating: Some(default()),
            settled: true
        });
    };

    if !m.game_dirty && m.posterior.is_none() {
        return Err(InvariantViolation::NullPosterior {
            membership: m.membership_id,
            game: m.game_id
        }
        .into());
    }

    Ok(RatingState {
        rating: m.posterior,
        settled: !m.game_dirty
    })
}
