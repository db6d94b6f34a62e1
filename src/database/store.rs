use crate::{
    error::StoreError,
    model::structures::{
        board::{Board, BoardId, BoardParams, Participant, ParticipantId},
        game::{Game, GameId, LinkedMembership, MembershipId, NewGame, TeamId},
        rating::Rating
    }
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

/// Shared storage for boards and their timelines.
///
/// Every unit of work runs inside one transaction obtained from [`begin`].
/// A transaction is all-or-nothing: nothing it wrote is visible to others
/// until [`Timeline::commit`], and dropping it without committing discards
/// everything.
///
/// [`begin`]: TimelineStore::begin
#[async_trait]
pub trait TimelineStore: Send + Sync {
    type Tx: Timeline;

    async fn begin(&self) -> Result<Self::Tx, StoreError>;
}

/// Operations available inside a single store transaction.
///
/// Neighbour lookups are strict: `nearest_earlier_membership` only considers
/// games with a smaller timestamp, `nearest_later_membership` only larger.
#[async_trait]
pub trait Timeline: Send + Sized {
    async fn boards(&mut self) -> Result<Vec<Board>, StoreError>;

    async fn board(&mut self, id: BoardId) -> Result<Option<Board>, StoreError>;

    async fn board_by_name(&mut self, name: &str) -> Result<Option<Board>, StoreError>;

    async fn insert_board(&mut self, name: &str, params: &BoardParams) -> Result<BoardId, StoreError>;

    async fn update_board_params(&mut self, id: BoardId, params: &BoardParams) -> Result<(), StoreError>;

    async fn participant(&mut self, id: ParticipantId) -> Result<Option<Participant>, StoreError>;

    async fn participant_by_name(
        &mut self,
        board_id: BoardId,
        name: &str
    ) -> Result<Option<Participant>, StoreError>;

    async fn insert_participant(&mut self, board_id: BoardId, name: &str) -> Result<ParticipantId, StoreError>;

    async fn game(&mut self, id: GameId) -> Result<Option<Game>, StoreError>;

    async fn game_at(
        &mut self,
        board_id: BoardId,
        timestamp: DateTime<FixedOffset>
    ) -> Result<Option<GameId>, StoreError>;

    async fn game_count(&mut self, board_id: BoardId) -> Result<usize, StoreError>;

    /// Every game on the board in ascending timestamp order.
    async fn games_by_time(&mut self, board_id: BoardId) -> Result<Vec<Game>, StoreError>;

    /// Ids of the board's dirty games in ascending timestamp order.
    async fn dirty_games(&mut self, board_id: BoardId) -> Result<Vec<GameId>, StoreError>;

    async fn nearest_earlier_membership(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId,
        timestamp: DateTime<FixedOffset>
    ) -> Result<Option<LinkedMembership>, StoreError>;

    async fn nearest_later_membership(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId,
        timestamp: DateTime<FixedOffset>
    ) -> Result<Option<LinkedMembership>, StoreError>;

    /// All of the participant's memberships in ascending timestamp order.
    async fn participant_history(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId
    ) -> Result<Vec<LinkedMembership>, StoreError>;

    /// Inserts a dirty game whose memberships all have null posteriors.
    async fn insert_game(&mut self, board_id: BoardId, game: &NewGame) -> Result<GameId, StoreError>;

    /// Removes the game with its teams and memberships.
    async fn delete_game(&mut self, id: GameId) -> Result<(), StoreError>;

    async fn set_game_timestamp(&mut self, id: GameId, timestamp: DateTime<FixedOffset>) -> Result<(), StoreError>;

    async fn insert_membership(
        &mut self,
        team_id: TeamId,
        participant_id: ParticipantId,
        weight: f64
    ) -> Result<MembershipId, StoreError>;

    async fn delete_membership(&mut self, id: MembershipId) -> Result<(), StoreError>;

    async fn set_weight(&mut self, id: MembershipId, weight: f64) -> Result<(), StoreError>;

    async fn set_team_rank(&mut self, team_id: TeamId, rank: u32) -> Result<(), StoreError>;

    async fn write_posteriors(&mut self, updates: &[(MembershipId, Rating)]) -> Result<(), StoreError>;

    /// Sets the dirty flag. Only ever moves a flag from false to true.
    async fn mark_dirty(&mut self, games: &[GameId]) -> Result<(), StoreError>;

    /// Marks every game on the board dirty, returning how many there are.
    async fn mark_board_dirty(&mut self, board_id: BoardId) -> Result<usize, StoreError>;

    async fn mark_clean(&mut self, games: &[GameId]) -> Result<(), StoreError>;

    async fn commit(self) -> Result<(), StoreError>;
}
