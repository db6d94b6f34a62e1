use crate::{
    database::store::{Timeline, TimelineStore},
    error::{Error, ValidationError},
    model::{
        engine::{load_board, load_game, RatingEngine},
        propagation::{self, merge, successors},
        rating_model::RatingModel,
        structures::{
            board::{Board, BoardId, BoardParams, Participant, ParticipantId},
            game::{GameEdit, GameId, NewGame, NewMember, Team}
        },
        validation::{
            has_ties, normalize_teams, normalize_timestamp, normalized_ranks, validate_composition, validate_params,
            validate_weight
        }
    }
};
use chrono::{DateTime, FixedOffset};
use tracing::info;

/// Mutations of a board's history. Each one validates everything before it
/// writes, flags the games whose priors it changes, and commits as a unit.
impl<S: TimelineStore, M: RatingModel> RatingEngine<S, M> {
    pub async fn create_board(&self, name: &str, params: BoardParams) -> Result<Board, Error> {
        validate_params(&params)?;

        let mut tx = self.store().begin().await?;
        if tx.board_by_name(name).await?.is_some() {
            return Err(ValidationError::BoardExists(name.to_string()).into());
        }

        let id = tx.insert_board(name, &params).await?;
        tx.commit().await?;

        info!("Created board {} '{}'", id, name);
        Ok(Board {
            id,
            name: name.to_string(),
            params
        })
    }

    pub async fn add_participant(&self, board_id: BoardId, name: &str) -> Result<Participant, Error> {
        let mut tx = self.store().begin().await?;
        load_board(&mut tx, board_id).await?;

        if tx.participant_by_name(board_id, name).await?.is_some() {
            return Err(ValidationError::ParticipantExists(name.to_string()).into());
        }

        let id = tx.insert_participant(board_id, name).await?;
        tx.commit().await?;

        Ok(Participant {
            id,
            board_id,
            name: name.to_string()
        })
    }

    /// Replaces a board's parameters, returning how many games were flagged.
    ///
    /// The default prior is locked once the board has games. Any change to a
    /// value the rating model consumes flags every game on the board.
    pub async fn update_board_params(&self, board_id: BoardId, params: BoardParams) -> Result<usize, Error> {
        validate_params(&params)?;

        let mut tx = self.store().begin().await?;
        let board = load_board(&mut tx, board_id).await?;
        let has_games = tx.game_count(board_id).await? > 0;

        if has_games && board.params.prior_differs(&params) {
            return Err(ValidationError::PriorLocked.into());
        }

        if has_games && board.params.allows_ties() && !params.allows_ties() {
            for game in tx.games_by_time(board_id).await? {
                if has_ties(game.teams.iter().map(|t| t.rank)) {
                    return Err(ValidationError::TiesPresent(game.id).into());
                }
            }
        }

        tx.update_board_params(board_id, &params).await?;

        let dirtied = if board.params.rating_tunables_differ(&params) {
            tx.mark_board_dirty(board_id).await?
        } else {
            0
        };
        tx.commit().await?;

        info!("Updated parameters of board {}, {} game(s) marked dirty", board_id, dirtied);
        Ok(dirtied)
    }

    /// Inserts a game anywhere in the board's history. The new game starts
    /// dirty, and so does each participant's previously-next game.
    pub async fn create_game(&self, board_id: BoardId, mut game: NewGame) -> Result<GameId, Error> {
        game.timestamp = normalize_timestamp(game.timestamp);
        let mut tx = self.store().begin().await?;
        let board = load_board(&mut tx, board_id).await?;

        let teams = normalize_teams(game.teams);
        validate_composition(&board.params, &teams)?;
        ensure_free(&mut tx, board_id, game.timestamp).await?;

        let participants: Vec<ParticipantId> = teams
            .iter()
            .flat_map(|t| t.members.iter().map(|m| m.participant_id))
            .collect();
        for participant_id in &participants {
            ensure_member(&mut tx, board_id, *participant_id).await?;
        }

        let dirtied = successors(&mut tx, board_id, participants, game.timestamp).await?;
        let normalized = NewGame {
            timestamp: game.timestamp,
            teams
        };
        let id = tx.insert_game(board_id, &normalized).await?;
        propagation::mark_dirty(&mut tx, &dirtied).await?;
        tx.commit().await?;

        info!(
            "Created game {} on board {} at {}, {} successor(s) marked dirty",
            id,
            board_id,
            game.timestamp,
            dirtied.len()
        );
        Ok(id)
    }

    /// Removes a game, returning the successor games that were flagged.
    pub async fn delete_game(&self, game_id: GameId) -> Result<Vec<GameId>, Error> {
        let mut tx = self.store().begin().await?;
        let game = load_game(&mut tx, game_id).await?;

        let dirtied = successors(&mut tx, game.board_id, game.participant_ids(), game.timestamp).await?;
        tx.delete_game(game_id).await?;
        propagation::mark_dirty(&mut tx, &dirtied).await?;
        tx.commit().await?;

        info!("Deleted game {}, {} successor(s) marked dirty", game_id, dirtied.len());
        Ok(dirtied)
    }

    /// Changes a game's composition. The game is flagged, and when a
    /// participant joins or leaves, so is that participant's next game.
    /// Returns every flagged game, the edited one included.
    pub async fn edit_game(&self, game_id: GameId, edit: GameEdit) -> Result<Vec<GameId>, Error> {
        let mut tx = self.store().begin().await?;
        let game = load_game(&mut tx, game_id).await?;
        let board = load_board(&mut tx, game.board_id).await?;
        let mut composition = game.composition();

        match edit {
            GameEdit::AddMember {
                team_id,
                participant_id,
                weight
            } => {
                let index = team_index(&game.teams, team_id)?;
                if game.membership_of(participant_id).is_some() {
                    return Err(ValidationError::DuplicateParticipant(participant_id).into());
                }
                ensure_member(&mut tx, game.board_id, participant_id).await?;

                composition[index].members.push(NewMember { participant_id, weight });
                validate_composition(&board.params, &composition)?;

                tx.insert_membership(team_id, participant_id, weight).await?;
            }
            GameEdit::RemoveMember { participant_id } => {
                let membership = game
                    .membership_of(participant_id)
                    .ok_or(ValidationError::NotInGame(participant_id))?;

                for team in composition.iter_mut() {
                    team.members.retain(|m| m.participant_id != participant_id);
                }
                validate_composition(&board.params, &composition)?;

                tx.delete_membership(membership.id).await?;
            }
            GameEdit::SetWeight { participant_id, weight } => {
                let membership = game
                    .membership_of(participant_id)
                    .ok_or(ValidationError::NotInGame(participant_id))?;
                validate_weight(weight)?;

                tx.set_weight(membership.id, weight).await?;
            }
            GameEdit::SetRank { team_id, rank } => {
                let index = team_index(&game.teams, team_id)?;
                composition[index].rank = rank;

                let ranks = normalized_ranks(&composition.iter().map(|t| t.rank).collect::<Vec<_>>());
                for (team, rank) in composition.iter_mut().zip(&ranks) {
                    team.rank = *rank;
                }
                validate_composition(&board.params, &composition)?;

                for (team, rank) in game.teams.iter().zip(ranks) {
                    if team.rank != rank {
                        tx.set_team_rank(team.id, rank).await?;
                    }
                }
            }
        }

        let moved = match edit.moved_participant() {
            Some(participant_id) => successors(&mut tx, game.board_id, [participant_id], game.timestamp).await?,
            None => Vec::new()
        };
        let dirtied = merge([vec![game_id], moved]);
        propagation::mark_dirty(&mut tx, &dirtied).await?;
        tx.commit().await?;

        info!("Edited game {} ({:?}), {} game(s) marked dirty", game_id, edit, dirtied.len());
        Ok(dirtied)
    }

    /// Moves a game to another instant: a removal at the old position and an
    /// insertion at the new one. Returns every flagged game.
    pub async fn reschedule_game(&self, game_id: GameId, timestamp: DateTime<FixedOffset>) -> Result<Vec<GameId>, Error> {
        let timestamp = normalize_timestamp(timestamp);
        let mut tx = self.store().begin().await?;
        let game = load_game(&mut tx, game_id).await?;

        if game.timestamp == timestamp {
            return Ok(Vec::new());
        }
        ensure_free(&mut tx, game.board_id, timestamp).await?;

        let participants = game.participant_ids();
        let before = successors(&mut tx, game.board_id, participants.clone(), game.timestamp).await?;
        tx.set_game_timestamp(game_id, timestamp).await?;
        let after = successors(&mut tx, game.board_id, participants, timestamp).await?;

        let dirtied = merge([vec![game_id], before, after]);
        propagation::mark_dirty(&mut tx, &dirtied).await?;
        tx.commit().await?;

        info!(
            "Moved game {} from {} to {}, {} game(s) marked dirty",
            game_id,
            game.timestamp,
            timestamp,
            dirtied.len()
        );
        Ok(dirtied)
    }
}

async fn ensure_free<T: Timeline>(tx: &mut T, board_id: BoardId, timestamp: DateTime<FixedOffset>) -> Result<(), Error> {
    match tx.game_at(board_id, timestamp).await? {
        Some(_) => Err(ValidationError::TimestampTaken(timestamp).into()),
        None => Ok(())
    }
}

async fn ensure_member<T: Timeline>(tx: &mut T, board_id: BoardId, participant_id: ParticipantId) -> Result<(), Error> {
    match tx.participant(participant_id).await? {
        None => Err(ValidationError::UnknownParticipant(participant_id).into()),
        Some(p) if p.board_id != board_id => Err(ValidationError::ParticipantNotOnBoard {
            participant: participant_id,
            board: board_id
        }
        .into()),
        Some(_) => Ok(())
    }
}

fn team_index(teams: &[Team], team_id: i32) -> Result<usize, ValidationError> {
    teams
        .iter()
        .position(|t| t.id == team_id)
        .ok_or(ValidationError::UnknownTeam(team_id))
}
