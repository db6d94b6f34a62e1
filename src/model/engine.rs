use crate::{
    database::store::{Timeline, TimelineStore},
    error::{Error, InvariantViolation},
    model::{
        rating_model::{PlackettLuceModel, RatingModel},
        structures::{
            board::{Board, BoardId, ParticipantId},
            game::Game
        }
    }
};
use tracing::error;

/// Owns the timeline store and the rating model, and exposes every operation
/// on a board's history: mutations, recalculation, replay, settling and
/// rating queries.
///
/// Each public operation runs in exactly one store transaction and either
/// commits all of its writes or none of them.
pub struct RatingEngine<S, M = PlackettLuceModel> {
    store: S,
    model: M
}

impl<S: TimelineStore> RatingEngine<S> {
    pub fn with_default_model(store: S) -> RatingEngine<S> {
        RatingEngine::new(store, PlackettLuceModel::default())
    }
}

impl<S: TimelineStore, M: RatingModel> RatingEngine<S, M> {
    pub fn new(store: S, model: M) -> RatingEngine<S, M> {
        RatingEngine { store, model }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub async fn boards(&self) -> Result<Vec<Board>, Error> {
        let mut tx = self.store.begin().await?;

        Ok(tx.boards().await?)
    }
}

pub(crate) async fn load_board<T: Timeline>(tx: &mut T, id: BoardId) -> Result<Board, Error> {
    tx.board(id).await?.ok_or_else(|| Error::not_found("board", id))
}

pub(crate) async fn load_game<T: Timeline>(tx: &mut T, id: i32) -> Result<Game, Error> {
    tx.game(id).await?.ok_or_else(|| Error::not_found("game", id))
}

/// Fails with an invariant violation if a stored game references a
/// participant that does not belong to the game's board.
pub(crate) async fn ensure_on_board<T: Timeline>(
    tx: &mut T,
    game: &Game,
    participant_id: ParticipantId
) -> Result<(), Error> {
    let on_board = tx
        .participant(participant_id)
        .await?
        .is_some_and(|p| p.board_id == game.board_id);

    if on_board {
        return Ok(());
    }

    let violation = InvariantViolation::ForeignParticipant {
        participant: participant_id,
        game: game.id,
        board: game.board_id
    };
    error!("{}", violation);

    Err(violation.into())
}
