use crate::{
    database::store::{Timeline, TimelineStore},
    error::StoreError,
    model::structures::{
        board::{Board, BoardId, BoardParams, Participant, ParticipantId},
        game::{Game, GameId, LinkedMembership, Membership, MembershipId, NewGame, Team, TeamId},
        rating::Rating
    }
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
    ops::Bound::{Excluded, Unbounded},
    sync::Arc
};
use tokio::sync::{Mutex, OwnedMutexGuard};

type Timestamp = DateTime<FixedOffset>;

#[derive(Debug, Clone)]
struct GameRow {
    board_id: BoardId,
    timestamp: Timestamp,
    dirty: bool,
    teams: Vec<TeamId>
}

#[derive(Debug, Clone)]
struct TeamRow {
    game_id: GameId,
    rank: u32,
    members: Vec<MembershipId>
}

#[derive(Debug, Clone)]
struct MembershipRow {
    team_id: TeamId,
    participant_id: ParticipantId,
    weight: f64,
    posterior: Option<Rating>
}

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i32,
    boards: BTreeMap<BoardId, Board>,
    participants: HashMap<ParticipantId, Participant>,
    games: HashMap<GameId, GameRow>,
    teams: HashMap<TeamId, TeamRow>,
    memberships: HashMap<MembershipId, MembershipRow>,
    // board -> timestamp -> game
    board_timelines: HashMap<BoardId, BTreeMap<Timestamp, GameId>>,
    // (board, participant) -> timestamp -> membership
    participant_timelines: HashMap<(BoardId, ParticipantId), BTreeMap<Timestamp, MembershipId>>
}

/// A prior value, recorded before a transaction overwrote it.
#[derive(Debug)]
enum Undo {
    LastId(i32),
    Board(BoardId, Option<Board>),
    Participant(ParticipantId, Option<Participant>),
    Game(GameId, Option<GameRow>),
    Team(TeamId, Option<TeamRow>),
    Membership(MembershipId, Option<MembershipRow>),
    BoardSlot(BoardId, Timestamp, Option<GameId>),
    ParticipantSlot((BoardId, ParticipantId), Timestamp, Option<MembershipId>)
}

/// Sets or clears one entry, returning what was there before.
trait Table<K, V> {
    fn put(&mut self, key: K, value: Option<V>) -> Option<V>;
}

impl<K: Hash + Eq, V> Table<K, V> for HashMap<K, V> {
    fn put(&mut self, key: K, value: Option<V>) -> Option<V> {
        match value {
            Some(value) => self.insert(key, value),
            None => self.remove(&key)
        }
    }
}

impl<K: Ord, V> Table<K, V> for BTreeMap<K, V> {
    fn put(&mut self, key: K, value: Option<V>) -> Option<V> {
        match value {
            Some(value) => self.insert(key, value),
            None => self.remove(&key)
        }
    }
}

impl MemoryState {
    fn game_row(&self, id: GameId) -> Result<&GameRow, StoreError> {
        self.games.get(&id).ok_or(StoreError::Missing { entity: "game", id })
    }

    fn team_row(&self, id: TeamId) -> Result<&TeamRow, StoreError> {
        self.teams.get(&id).ok_or(StoreError::Missing { entity: "team", id })
    }

    fn membership_row(&self, id: MembershipId) -> Result<&MembershipRow, StoreError> {
        self.memberships.get(&id).ok_or(StoreError::Missing { entity: "membership", id })
    }

    fn assemble_game(&self, id: GameId) -> Option<Game> {
        let row = self.games.get(&id)?;
        let teams = row
            .teams
            .iter()
            .filter_map(|team_id| {
                let team = self.teams.get(team_id)?;
                let members = team
                    .members
                    .iter()
                    .filter_map(|membership_id| {
                        let m = self.memberships.get(membership_id)?;
                        Some(Membership {
                            id: *membership_id,
                            team_id: *team_id,
                            participant_id: m.participant_id,
                            weight: m.weight,
                            posterior: m.posterior
                        })
                    })
                    .collect();

                Some(Team {
                    id: *team_id,
                    game_id: id,
                    rank: team.rank,
                    members
                })
            })
            .collect();

        Some(Game {
            id,
            board_id: row.board_id,
            timestamp: row.timestamp,
            dirty: row.dirty,
            teams
        })
    }

    fn linked(&self, membership_id: MembershipId) -> Option<LinkedMembership> {
        let m = self.memberships.get(&membership_id)?;
        let game_id = self.teams.get(&m.team_id)?.game_id;
        let game = self.games.get(&game_id)?;

        Some(LinkedMembership {
            membership_id,
            participant_id: m.participant_id,
            game_id,
            timestamp: game.timestamp,
            game_dirty: game.dirty,
            weight: m.weight,
            posterior: m.posterior
        })
    }

    fn timeline(&self, board_id: BoardId, participant_id: ParticipantId) -> Option<&BTreeMap<Timestamp, MembershipId>> {
        self.participant_timelines.get(&(board_id, participant_id))
    }

    fn restore(&mut self, entry: Undo) {
        match entry {
            Undo::LastId(id) => self.last_id = id,
            Undo::Board(id, old) => {
                self.boards.put(id, old);
            }
            Undo::Participant(id, old) => {
                self.participants.put(id, old);
            }
            Undo::Game(id, old) => {
                self.games.put(id, old);
            }
            Undo::Team(id, old) => {
                self.teams.put(id, old);
            }
            Undo::Membership(id, old) => {
                self.memberships.put(id, old);
            }
            Undo::BoardSlot(board_id, at, old) => {
                self.board_timelines.entry(board_id).or_default().put(at, old);
            }
            Undo::ParticipantSlot(key, at, old) => {
                self.participant_timelines.entry(key).or_default().put(at, old);
            }
        }
    }
}

/// A [`TimelineStore`] kept entirely in memory.
///
/// A transaction holds the store lock for its whole lifetime and writes the
/// shared state in place, journaling the value each write replaced. Dropping
/// the transaction replays the journal backwards; committing discards it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryTx {
    state: OwnedMutexGuard<MemoryState>,
    undo: Vec<Undo>
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        while let Some(entry) = self.undo.pop() {
            self.state.restore(entry);
        }
    }
}

impl MemoryTx {
    fn next_id(&mut self) -> i32 {
        self.undo.push(Undo::LastId(self.state.last_id));
        self.state.last_id += 1;
        self.state.last_id
    }

    fn put_board(&mut self, id: BoardId, row: Option<Board>) {
        let old = self.state.boards.put(id, row);
        self.undo.push(Undo::Board(id, old));
    }

    fn put_participant(&mut self, id: ParticipantId, row: Option<Participant>) {
        let old = self.state.participants.put(id, row);
        self.undo.push(Undo::Participant(id, old));
    }

    fn put_game(&mut self, id: GameId, row: Option<GameRow>) {
        let old = self.state.games.put(id, row);
        self.undo.push(Undo::Game(id, old));
    }

    fn put_team(&mut self, id: TeamId, row: Option<TeamRow>) {
        let old = self.state.teams.put(id, row);
        self.undo.push(Undo::Team(id, old));
    }

    fn put_membership(&mut self, id: MembershipId, row: Option<MembershipRow>) {
        let old = self.state.memberships.put(id, row);
        self.undo.push(Undo::Membership(id, old));
    }

    fn put_board_slot(&mut self, board_id: BoardId, at: Timestamp, game_id: Option<GameId>) {
        let old = self.state.board_timelines.entry(board_id).or_default().put(at, game_id);
        self.undo.push(Undo::BoardSlot(board_id, at, old));
    }

    fn put_participant_slot(&mut self, key: (BoardId, ParticipantId), at: Timestamp, membership_id: Option<MembershipId>) {
        let old = self.state.participant_timelines.entry(key).or_default().put(at, membership_id);
        self.undo.push(Undo::ParticipantSlot(key, at, old));
    }

    fn update_game(&mut self, id: GameId, f: impl FnOnce(&mut GameRow)) -> Result<(), StoreError> {
        let mut row = self.state.game_row(id)?.clone();
        f(&mut row);
        self.put_game(id, Some(row));

        Ok(())
    }

    fn update_team(&mut self, id: TeamId, f: impl FnOnce(&mut TeamRow)) -> Result<(), StoreError> {
        let mut row = self.state.team_row(id)?.clone();
        f(&mut row);
        self.put_team(id, Some(row));

        Ok(())
    }

    fn update_membership(&mut self, id: MembershipId, f: impl FnOnce(&mut MembershipRow)) -> Result<(), StoreError> {
        let mut row = self.state.membership_row(id)?.clone();
        f(&mut row);
        self.put_membership(id, Some(row));

        Ok(())
    }

    /// Board and timestamp of the game a team belongs to.
    fn team_position(&self, team_id: TeamId) -> Result<(BoardId, Timestamp), StoreError> {
        let game = self.state.game_row(self.state.team_row(team_id)?.game_id)?;

        Ok((game.board_id, game.timestamp))
    }

    fn add_membership(&mut self, team_id: TeamId, participant_id: ParticipantId, weight: f64) -> Result<MembershipId, StoreError> {
        let (board_id, timestamp) = self.team_position(team_id)?;

        let id = self.next_id();
        self.put_membership(
            id,
            Some(MembershipRow {
                team_id,
                participant_id,
                weight,
                posterior: None
            })
        );
        self.update_team(team_id, |team| team.members.push(id))?;
        self.put_participant_slot((board_id, participant_id), timestamp, Some(id));

        Ok(id)
    }

    fn remove_membership(&mut self, id: MembershipId) -> Result<(), StoreError> {
        let row = self.state.membership_row(id)?.clone();
        let (board_id, timestamp) = self.team_position(row.team_id)?;

        self.put_membership(id, None);
        self.update_team(row.team_id, |team| team.members.retain(|m| *m != id))?;
        self.put_participant_slot((board_id, row.participant_id), timestamp, None);

        Ok(())
    }
}

#[async_trait]
impl TimelineStore for MemoryStore {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let state = Arc::clone(&self.state).lock_owned().await;

        Ok(MemoryTx {
            state,
            undo: Vec::new()
        })
    }
}

#[async_trait]
impl Timeline for MemoryTx {
    async fn boards(&mut self) -> Result<Vec<Board>, StoreError> {
        Ok(self.state.boards.values().cloned().collect())
    }

    async fn board(&mut self, id: BoardId) -> Result<Option<Board>, StoreError> {
        Ok(self.state.boards.get(&id).cloned())
    }

    async fn board_by_name(&mut self, name: &str) -> Result<Option<Board>, StoreError> {
        Ok(self.state.boards.values().find(|b| b.name == name).cloned())
    }

    async fn insert_board(&mut self, name: &str, params: &BoardParams) -> Result<BoardId, StoreError> {
        let id = self.next_id();
        self.put_board(
            id,
            Some(Board {
                id,
                name: name.to_string(),
                params: params.clone()
            })
        );

        Ok(id)
    }

    async fn update_board_params(&mut self, id: BoardId, params: &BoardParams) -> Result<(), StoreError> {
        let mut board = self
            .state
            .boards
            .get(&id)
            .cloned()
            .ok_or(StoreError::Missing { entity: "board", id })?;
        board.params = params.clone();
        self.put_board(id, Some(board));

        Ok(())
    }

    async fn participant(&mut self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        Ok(self.state.participants.get(&id).cloned())
    }

    async fn participant_by_name(
        &mut self,
        board_id: BoardId,
        name: &str
    ) -> Result<Option<Participant>, StoreError> {
        Ok(self
            .state
            .participants
            .values()
            .find(|p| p.board_id == board_id && p.name == name)
            .cloned())
    }

    async fn insert_participant(&mut self, board_id: BoardId, name: &str) -> Result<ParticipantId, StoreError> {
        let id = self.next_id();
        self.put_participant(
            id,
            Some(Participant {
                id,
                board_id,
                name: name.to_string()
            })
        );

        Ok(id)
    }

    async fn game(&mut self, id: GameId) -> Result<Option<Game>, StoreError> {
        Ok(self.state.assemble_game(id))
    }

    async fn game_at(&mut self, board_id: BoardId, timestamp: Timestamp) -> Result<Option<GameId>, StoreError> {
        Ok(self
            .state
            .board_timelines
            .get(&board_id)
            .and_then(|timeline| timeline.get(&timestamp))
            .copied())
    }

    async fn game_count(&mut self, board_id: BoardId) -> Result<usize, StoreError> {
        Ok(self.state.board_timelines.get(&board_id).map_or(0, |t| t.len()))
    }

    async fn games_by_time(&mut self, board_id: BoardId) -> Result<Vec<Game>, StoreError> {
        let Some(timeline) = self.state.board_timelines.get(&board_id) else {
            return Ok(Vec::new());
        };

        Ok(timeline
            .values()
            .filter_map(|id| self.state.assemble_game(*id))
            .collect())
    }

    async fn dirty_games(&mut self, board_id: BoardId) -> Result<Vec<GameId>, StoreError> {
        let Some(timeline) = self.state.board_timelines.get(&board_id) else {
            return Ok(Vec::new());
        };

        Ok(timeline
            .values()
            .filter(|id| self.state.games.get(id).is_some_and(|g| g.dirty))
            .copied()
            .collect())
    }

    async fn nearest_earlier_membership(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId,
        timestamp: Timestamp
    ) -> Result<Option<LinkedMembership>, StoreError> {
        Ok(self
            .state
            .timeline(board_id, participant_id)
            .and_then(|timeline| timeline.range(..timestamp).next_back())
            .and_then(|(_, id)| self.state.linked(*id)))
    }

    async fn nearest_later_membership(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId,
        timestamp: Timestamp
    ) -> Result<Option<LinkedMembership>, StoreError> {
        Ok(self
            .state
            .timeline(board_id, participant_id)
            .and_then(|timeline| timeline.range((Excluded(timestamp), Unbounded)).next())
            .and_then(|(_, id)| self.state.linked(*id)))
    }

    async fn participant_history(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId
    ) -> Result<Vec<LinkedMembership>, StoreError> {
        Ok(self
            .state
            .timeline(board_id, participant_id)
            .map(|timeline| timeline.values().filter_map(|id| self.state.linked(*id)).collect())
            .unwrap_or_default())
    }

    async fn insert_game(&mut self, board_id: BoardId, game: &NewGame) -> Result<GameId, StoreError> {
        let game_id = self.next_id();
        self.put_game(
            game_id,
            Some(GameRow {
                board_id,
                timestamp: game.timestamp,
                dirty: true,
                teams: Vec::with_capacity(game.teams.len())
            })
        );
        self.put_board_slot(board_id, game.timestamp, Some(game_id));

        for team in &game.teams {
            let team_id = self.next_id();
            self.put_team(
                team_id,
                Some(TeamRow {
                    game_id,
                    rank: team.rank,
                    members: Vec::with_capacity(team.members.len())
                })
            );
            self.update_game(game_id, |g| g.teams.push(team_id))?;

            for member in &team.members {
                self.add_membership(team_id, member.participant_id, member.weight)?;
            }
        }

        Ok(game_id)
    }

    async fn delete_game(&mut self, id: GameId) -> Result<(), StoreError> {
        let row = self.state.game_row(id)?.clone();

        for team_id in &row.teams {
            let members = self.state.team_row(*team_id)?.members.clone();
            for membership_id in members {
                self.remove_membership(membership_id)?;
            }
            self.put_team(*team_id, None);
        }

        self.put_board_slot(row.board_id, row.timestamp, None);
        self.put_game(id, None);

        Ok(())
    }

    async fn set_game_timestamp(&mut self, id: GameId, timestamp: Timestamp) -> Result<(), StoreError> {
        let row = self.state.game_row(id)?.clone();
        let mut moved = Vec::new();
        for team_id in &row.teams {
            for membership_id in &self.state.team_row(*team_id)?.members {
                let participant_id = self.state.membership_row(*membership_id)?.participant_id;
                moved.push((participant_id, *membership_id));
            }
        }

        for (participant_id, membership_id) in moved {
            let key = (row.board_id, participant_id);
            self.put_participant_slot(key, row.timestamp, None);
            self.put_participant_slot(key, timestamp, Some(membership_id));
        }

        self.put_board_slot(row.board_id, row.timestamp, None);
        self.put_board_slot(row.board_id, timestamp, Some(id));
        self.update_game(id, |g| g.timestamp = timestamp)
    }

    async fn insert_membership(
        &mut self,
        team_id: TeamId,
        participant_id: ParticipantId,
        weight: f64
    ) -> Result<MembershipId, StoreError> {
        self.add_membership(team_id, participant_id, weight)
    }

    async fn delete_membership(&mut self, id: MembershipId) -> Result<(), StoreError> {
        self.remove_membership(id)
    }

    async fn set_weight(&mut self, id: MembershipId, weight: f64) -> Result<(), StoreError> {
        self.update_membership(id, |m| m.weight = weight)
    }

    async fn set_team_rank(&mut self, team_id: TeamId, rank: u32) -> Result<(), StoreError> {
        self.update_team(team_id, |t| t.rank = rank)
    }

    async fn write_posteriors(&mut self, updates: &[(MembershipId, Rating)]) -> Result<(), StoreError> {
        for (id, rating) in updates {
            self.update_membership(*id, |m| m.posterior = Some(*rating))?;
        }

        Ok(())
    }

    async fn mark_dirty(&mut self, games: &[GameId]) -> Result<(), StoreError> {
        for id in games {
            self.update_game(*id, |g| g.dirty = true)?;
        }

        Ok(())
    }

    async fn mark_board_dirty(&mut self, board_id: BoardId) -> Result<usize, StoreError> {
        let games: Vec<GameId> = self
            .state
            .board_timelines
            .get(&board_id)
            .map(|timeline| timeline.values().copied().collect())
            .unwrap_or_default();

        for id in &games {
            self.update_game(*id, |g| g.dirty = true)?;
        }

        Ok(games.len())
    }

    async fn mark_clean(&mut self, games: &[GameId]) -> Result<(), StoreError> {
        for id in games {
            self.update_game(*id, |g| g.dirty = false)?;
        }

        Ok(())
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        self.undo.clear();

        Ok(())
    }
}
