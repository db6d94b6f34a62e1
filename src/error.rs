use crate::model::structures::{
    board::{BoardId, ParticipantId},
    game::{GameId, MembershipId, TeamId}
};
use chrono::{DateTime, FixedOffset};
use thiserror::Error;

/// A mutation was rejected before anything was persisted.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Games on this board must have at least {min} teams, got {actual}")]
    TooFewTeams { min: u32, actual: usize },

    #[error("Games on this board must have at most {max} teams, got {actual}")]
    TooManyTeams { max: u32, actual: usize },

    #[error("Teams on this board must have at least {min} players, got {actual}")]
    TooFewPlayers { min: u32, actual: usize },

    #[error("Teams on this board must have at most {max} players, got {actual}")]
    TooManyPlayers { max: u32, actual: usize },

    #[error("No ties are allowed on this board")]
    TiesNotAllowed,

    #[error("Weight must be between 0 and 1, got {0}")]
    WeightOutOfRange(f64),

    #[error("Participant {0} appears more than once in the game")]
    DuplicateParticipant(ParticipantId),

    #[error("Participant {0} does not exist")]
    UnknownParticipant(ParticipantId),

    #[error("Participant {participant} is not a member of board {board}")]
    ParticipantNotOnBoard { participant: ParticipantId, board: BoardId },

    #[error("Participant {0} is not part of this game")]
    NotInGame(ParticipantId),

    #[error("Team {0} is not part of this game")]
    UnknownTeam(TeamId),

    #[error("A game already exists on this board at {0}")]
    TimestampTaken(DateTime<FixedOffset>),

    #[error("A board named '{0}' already exists")]
    BoardExists(String),

    #[error("A participant named '{0}' already exists on this board")]
    ParticipantExists(String),

    #[error("Draw probability must be within [0, 1], got {0}")]
    DrawProbabilityOutOfRange(f64),

    #[error("Parameter {name} must be {requirement}, got {value}")]
    InvalidParameter {
        name: &'static str,
        requirement: &'static str,
        value: f64
    },

    #[error("Team count bounds are invalid: min {min}, max {max:?}")]
    InvalidTeamBounds { min: u32, max: Option<u32> },

    #[error("Player count bounds are invalid: min {min}, max {max:?}")]
    InvalidPlayerBounds { min: u32, max: Option<u32> },

    #[error("The default prior cannot change once the board has games")]
    PriorLocked,

    #[error("Draw probability cannot be 0 while game {0} contains tied ranks")]
    TiesPresent(GameId)
}

/// Stored data contradicts the history invariants. Never repaired silently.
#[derive(Debug, Error, PartialEq)]
pub enum InvariantViolation {
    #[error("Membership {membership} of clean game {game} has no posterior")]
    NullPosterior { membership: MembershipId, game: GameId },

    #[error("Participant {participant} in game {game} is not a member of board {board}")]
    ForeignParticipant {
        participant: ParticipantId,
        game: GameId,
        board: BoardId
    }
}

/// The rating model failed; the caller commits nothing.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Expected {expected} rated entries, the model returned {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("The model produced a non-finite rating for participant {0}")]
    NonFinite(ParticipantId),

    #[error("The model returned no rating for participant {0}")]
    MissingParticipant(ParticipantId)
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("{entity} {id} does not exist")]
    Missing { entity: &'static str, id: i32 },

    #[error("Transaction is already closed")]
    Closed
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantViolation),

    #[error("Rating model failure: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i32 }
}

impl Error {
    pub fn not_found(entity: &'static str, id: i32) -> Self {
        Error::NotFound { entity, id }
    }
}
