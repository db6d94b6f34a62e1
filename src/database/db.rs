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
use indexmap::IndexMap;
use postgres_types::ToSql;
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{Mutex, OwnedMutexGuard}
};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

const SCHEMA: &str = include_str!("schema.sql");

const GAME_SELECT: &str = "
    SELECT g.id AS game_id, g.board_id, g.played_at, g.dirty,
           t.id AS team_id, t.rank,
           m.id AS membership_id, m.participant_id, m.weight, m.mu, m.sigma
    FROM games g
             LEFT JOIN teams t ON t.game_id = g.id
             LEFT JOIN memberships m ON m.team_id = t.id";

const LINKED_SELECT: &str = "
    SELECT m.id AS membership_id, m.participant_id, m.weight, m.mu, m.sigma,
           g.id AS game_id, g.played_at, g.dirty
    FROM memberships m
             JOIN games g ON g.id = m.game_id";

/// PostgreSQL timeline store. Units of work are serialised on one
/// connection, each inside a `SERIALIZABLE` transaction.
#[derive(Clone)]
pub struct DbClient {
    client: Arc<Mutex<Client>>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, tokio_postgres::Error> {
        let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

        // Spawn the connection object to run in the background
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("connection error: {}", e);
            }
        });

        Ok(DbClient {
            client: Arc::new(Mutex::new(client))
        })
    }

    /// Creates any missing tables and indexes.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Applying schema...");
        self.client.lock().await.batch_execute(SCHEMA).await?;

        Ok(())
    }
}

#[async_trait]
impl TimelineStore for DbClient {
    type Tx = PgTx;

    async fn begin(&self) -> Result<PgTx, StoreError> {
        let client = self.client.clone().lock_owned().await;
        client.batch_execute("BEGIN ISOLATION LEVEL SERIALIZABLE").await?;

        Ok(PgTx { client: Some(client) })
    }
}

/// An open transaction. Dropping it without [`Timeline::commit`] rolls it
/// back before the connection is handed to the next transaction.
pub struct PgTx {
    client: Option<OwnedMutexGuard<Client>>
}

impl Drop for PgTx {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        error!("Failed to roll back transaction: {}", e);
                    }
                });
            }
            Err(_) => error!("Transaction dropped outside of a runtime and could not be rolled back")
        }
    }
}

impl PgTx {
    fn client(&self) -> Result<&Client, StoreError> {
        self.client.as_deref().ok_or(StoreError::Closed)
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<u64, StoreError> {
        Ok(self.client()?.execute(sql, params).await?)
    }

    async fn execute_one(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
        entity: &'static str,
        id: i32
    ) -> Result<(), StoreError> {
        match self.execute(sql, params).await? {
            0 => Err(StoreError::Missing { entity, id }),
            _ => Ok(())
        }
    }

    async fn games_where(&self, filter: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Game>, StoreError> {
        let sql = format!("{} WHERE {} ORDER BY g.played_at, t.id, m.id", GAME_SELECT, filter);
        let rows = self.client()?.query(sql.as_str(), params).await?;

        Ok(assemble_games(&rows))
    }

    async fn linked_where(
        &self,
        filter: &str,
        order: &str,
        params: &[&(dyn ToSql + Sync)]
    ) -> Result<Vec<LinkedMembership>, StoreError> {
        let sql = format!("{} WHERE {} ORDER BY g.played_at {}", LINKED_SELECT, filter, order);
        let rows = self.client()?.query(sql.as_str(), params).await?;

        Ok(rows.iter().map(linked_from_row).collect())
    }

    async fn set_dirty(&self, games: &[GameId], dirty: bool) -> Result<(), StoreError> {
        if games.is_empty() {
            return Ok(());
        }

        self.execute("UPDATE games SET dirty = $2 WHERE id = ANY($1)", &[&games, &dirty])
            .await?;

        Ok(())
    }
}

#[async_trait]
impl Timeline for PgTx {
    async fn boards(&mut self) -> Result<Vec<Board>, StoreError> {
        let rows = self.client()?.query("SELECT * FROM boards ORDER BY id", &[]).await?;

        Ok(rows.iter().map(board_from_row).collect())
    }

    async fn board(&mut self, id: BoardId) -> Result<Option<Board>, StoreError> {
        let row = self
            .client()?
            .query_opt("SELECT * FROM boards WHERE id = $1", &[&id])
            .await?;

        Ok(row.as_ref().map(board_from_row))
    }

    async fn board_by_name(&mut self, name: &str) -> Result<Option<Board>, StoreError> {
        let row = self
            .client()?
            .query_opt("SELECT * FROM boards WHERE name = $1", &[&name])
            .await?;

        Ok(row.as_ref().map(board_from_row))
    }

    async fn insert_board(&mut self, name: &str, params: &BoardParams) -> Result<BoardId, StoreError> {
        let bounds = BoundColumns::from(params);
        let row = self
            .client()?
            .query_one(
                "INSERT INTO boards (name, mu, sigma, beta, tau, draw_probability, min_teams, max_teams, \
                 min_players_per_team, max_players_per_team) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING id",
                &[
                    &name,
                    &params.mu,
                    &params.sigma,
                    &params.beta,
                    &params.tau,
                    &params.draw_probability,
                    &bounds.min_teams,
                    &bounds.max_teams,
                    &bounds.min_players_per_team,
                    &bounds.max_players_per_team
                ]
            )
            .await?;

        Ok(row.get("id"))
    }

    async fn update_board_params(&mut self, id: BoardId, params: &BoardParams) -> Result<(), StoreError> {
        let bounds = BoundColumns::from(params);
        self.execute_one(
            "UPDATE boards SET mu = $2, sigma = $3, beta = $4, tau = $5, draw_probability = $6, \
             min_teams = $7, max_teams = $8, min_players_per_team = $9, max_players_per_team = $10 \
             WHERE id = $1",
            &[
                &id,
                &params.mu,
                &params.sigma,
                &params.beta,
                &params.tau,
                &params.draw_probability,
                &bounds.min_teams,
                &bounds.max_teams,
                &bounds.min_players_per_team,
                &bounds.max_players_per_team
            ],
            "board",
            id
        )
        .await
    }

    async fn participant(&mut self, id: ParticipantId) -> Result<Option<Participant>, StoreError> {
        let row = self
            .client()?
            .query_opt("SELECT id, board_id, name FROM participants WHERE id = $1", &[&id])
            .await?;

        Ok(row.as_ref().map(participant_from_row))
    }

    async fn participant_by_name(
        &mut self,
        board_id: BoardId,
        name: &str
    ) -> Result<Option<Participant>, StoreError> {
        let row = self
            .client()?
            .query_opt(
                "SELECT id, board_id, name FROM participants WHERE board_id = $1 AND name = $2",
                &[&board_id, &name]
            )
            .await?;

        Ok(row.as_ref().map(participant_from_row))
    }

    async fn insert_participant(&mut self, board_id: BoardId, name: &str) -> Result<ParticipantId, StoreError> {
        let row = self
            .client()?
            .query_one(
                "INSERT INTO participants (board_id, name) VALUES ($1, $2) RETURNING id",
                &[&board_id, &name]
            )
            .await?;

        Ok(row.get("id"))
    }

    async fn game(&mut self, id: GameId) -> Result<Option<Game>, StoreError> {
        Ok(self.games_where("g.id = $1", &[&id]).await?.into_iter().next())
    }

    async fn game_at(&mut self, board_id: BoardId, timestamp: DateTime<FixedOffset>) -> Result<Option<GameId>, StoreError> {
        let row = self
            .client()?
            .query_opt(
                "SELECT id FROM games WHERE board_id = $1 AND played_at = $2",
                &[&board_id, &timestamp]
            )
            .await?;

        Ok(row.map(|r| r.get("id")))
    }

    async fn game_count(&mut self, board_id: BoardId) -> Result<usize, StoreError> {
        let row = self
            .client()?
            .query_one("SELECT COUNT(*) AS n FROM games WHERE board_id = $1", &[&board_id])
            .await?;

        Ok(row.get::<_, i64>("n") as usize)
    }

    async fn games_by_time(&mut self, board_id: BoardId) -> Result<Vec<Game>, StoreError> {
        self.games_where("g.board_id = $1", &[&board_id]).await
    }

    async fn dirty_games(&mut self, board_id: BoardId) -> Result<Vec<GameId>, StoreError> {
        let rows = self
            .client()?
            .query(
                "SELECT id FROM games WHERE board_id = $1 AND dirty ORDER BY played_at",
                &[&board_id]
            )
            .await?;

        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn nearest_earlier_membership(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId,
        timestamp: DateTime<FixedOffset>
    ) -> Result<Option<LinkedMembership>, StoreError> {
        Ok(self
            .linked_where(
                "g.board_id = $1 AND m.participant_id = $2 AND g.played_at < $3",
                "DESC LIMIT 1",
                &[&board_id, &participant_id, &timestamp]
            )
            .await?
            .pop())
    }

    async fn nearest_later_membership(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId,
        timestamp: DateTime<FixedOffset>
    ) -> Result<Option<LinkedMembership>, StoreError> {
        Ok(self
            .linked_where(
                "g.board_id = $1 AND m.participant_id = $2 AND g.played_at > $3",
                "ASC LIMIT 1",
                &[&board_id, &participant_id, &timestamp]
            )
            .await?
            .pop())
    }

    async fn participant_history(
        &mut self,
        board_id: BoardId,
        participant_id: ParticipantId
    ) -> Result<Vec<LinkedMembership>, StoreError> {
        self.linked_where(
            "g.board_id = $1 AND m.participant_id = $2",
            "ASC",
            &[&board_id, &participant_id]
        )
        .await
    }

    async fn insert_game(&mut self, board_id: BoardId, game: &NewGame) -> Result<GameId, StoreError> {
        let client = self.client()?;
        let game_id: GameId = client
            .query_one(
                "INSERT INTO games (board_id, played_at, dirty) VALUES ($1, $2, TRUE) RETURNING id",
                &[&board_id, &game.timestamp]
            )
            .await?
            .get("id");

        let insert_team = client
            .prepare("INSERT INTO teams (game_id, rank) VALUES ($1, $2) RETURNING id")
            .await?;
        let insert_member = client
            .prepare("INSERT INTO memberships (team_id, game_id, participant_id, weight) VALUES ($1, $2, $3, $4)")
            .await?;

        for team in &game.teams {
            let rank = team.rank as i32;
            let team_id: TeamId = client.query_one(&insert_team, &[&game_id, &rank]).await?.get("id");

            for member in &team.members {
                client
                    .execute(&insert_member, &[&team_id, &game_id, &member.participant_id, &member.weight])
                    .await?;
            }
        }

        debug!("Inserted game {} with {} team(s)", game_id, game.teams.len());
        Ok(game_id)
    }

    async fn delete_game(&mut self, id: GameId) -> Result<(), StoreError> {
        self.execute_one("DELETE FROM games WHERE id = $1", &[&id], "game", id).await
    }

    async fn set_game_timestamp(&mut self, id: GameId, timestamp: DateTime<FixedOffset>) -> Result<(), StoreError> {
        self.execute_one(
            "UPDATE games SET played_at = $2 WHERE id = $1",
            &[&id, &timestamp],
            "game",
            id
        )
        .await
    }

    async fn insert_membership(
        &mut self,
        team_id: TeamId,
        participant_id: ParticipantId,
        weight: f64
    ) -> Result<MembershipId, StoreError> {
        let row = self
            .client()?
            .query_opt(
                "INSERT INTO memberships (team_id, game_id, participant_id, weight) \
                 SELECT t.id, t.game_id, $2, $3 FROM teams t WHERE t.id = $1 RETURNING id",
                &[&team_id, &participant_id, &weight]
            )
            .await?;

        row.map(|r| r.get("id")).ok_or(StoreError::Missing {
            entity: "team",
            id: team_id
        })
    }

    async fn delete_membership(&mut self, id: MembershipId) -> Result<(), StoreError> {
        self.execute_one("DELETE FROM memberships WHERE id = $1", &[&id], "membership", id)
            .await
    }

    async fn set_weight(&mut self, id: MembershipId, weight: f64) -> Result<(), StoreError> {
        self.execute_one(
            "UPDATE memberships SET weight = $2 WHERE id = $1",
            &[&id, &weight],
            "membership",
            id
        )
        .await
    }

    async fn set_team_rank(&mut self, team_id: TeamId, rank: u32) -> Result<(), StoreError> {
        let rank = rank as i32;
        self.execute_one(
            "UPDATE teams SET rank = $2 WHERE id = $1",
            &[&team_id, &rank],
            "team",
            team_id
        )
        .await
    }

    async fn write_posteriors(&mut self, updates: &[(MembershipId, Rating)]) -> Result<(), StoreError> {
        if updates.is_empty() {
            return Ok(());
        }

        let client = self.client()?;
        let statement = client
            .prepare("UPDATE memberships SET mu = $2, sigma = $3 WHERE id = $1")
            .await?;

        for (id, rating) in updates {
            if client.execute(&statement, &[id, &rating.mu, &rating.sigma]).await? == 0 {
                return Err(StoreError::Missing {
                    entity: "membership",
                    id: *id
                });
            }
        }

        Ok(())
    }

    async fn mark_dirty(&mut self, games: &[GameId]) -> Result<(), StoreError> {
        self.set_dirty(games, true).await
    }

    async fn mark_board_dirty(&mut self, board_id: BoardId) -> Result<usize, StoreError> {
        let n = self
            .execute("UPDATE games SET dirty = TRUE WHERE board_id = $1", &[&board_id])
            .await?;

        Ok(n as usize)
    }

    async fn mark_clean(&mut self, games: &[GameId]) -> Result<(), StoreError> {
        self.set_dirty(games, false).await
    }

    async fn commit(mut self) -> Result<(), StoreError> {
        let client = self.client.take().ok_or(StoreError::Closed)?;
        client.batch_execute("COMMIT").await?;

        Ok(())
    }
}

/// Count bounds as stored: `INTEGER` columns.
struct BoundColumns {
    min_teams: i32,
    max_teams: Option<i32>,
    min_players_per_team: i32,
    max_players_per_team: Option<i32>
}

impl From<&BoardParams> for BoundColumns {
    fn from(params: &BoardParams) -> Self {
        BoundColumns {
            min_teams: params.min_teams as i32,
            max_teams: params.max_teams.map(|n| n as i32),
            min_players_per_team: params.min_players_per_team as i32,
            max_players_per_team: params.max_players_per_team.map(|n| n as i32)
        }
    }
}

fn board_from_row(row: &Row) -> Board {
    Board {
        id: row.get("id"),
        name: row.get("name"),
        params: BoardParams {
            mu: row.get("mu"),
            sigma: row.get("sigma"),
            beta: row.get("beta"),
            tau: row.get("tau"),
            draw_probability: row.get("draw_probability"),
            min_teams: row.get::<_, i32>("min_teams") as u32,
            max_teams: row.get::<_, Option<i32>>("max_teams").map(|n| n as u32),
            min_players_per_team: row.get::<_, i32>("min_players_per_team") as u32,
            max_players_per_team: row.get::<_, Option<i32>>("max_players_per_team").map(|n| n as u32)
        }
    }
}

fn participant_from_row(row: &Row) -> Participant {
    Participant {
        id: row.get("id"),
        board_id: row.get("board_id"),
        name: row.get("name")
    }
}

fn posterior_from_row(row: &Row) -> Option<Rating> {
    match (row.get::<_, Option<f64>>("mu"), row.get::<_, Option<f64>>("sigma")) {
        (Some(mu), Some(sigma)) => Some(Rating::new(mu, sigma)),
        _ => None
    }
}

fn linked_from_row(row: &Row) -> LinkedMembership {
    LinkedMembership {
        membership_id: row.get("membership_id"),
        participant_id: row.get("participant_id"),
        game_id: row.get("game_id"),
        timestamp: row.get("played_at"),
        game_dirty: row.get("dirty"),
        weight: row.get("weight"),
        posterior: posterior_from_row(row)
    }
}

/// Folds joined game/team/membership rows back into games, keeping the
/// row order of each level.
fn assemble_games(rows: &[Row]) -> Vec<Game> {
    let mut games: IndexMap<GameId, (Game, IndexMap<TeamId, Team>)> = IndexMap::new();

    for row in rows {
        let game_id: GameId = row.get("game_id");
        let (_, teams) = games.entry(game_id).or_insert_with(|| {
            (
                Game {
                    id: game_id,
                    board_id: row.get("board_id"),
                    timestamp: row.get("played_at"),
                    dirty: row.get("dirty"),
                    teams: Vec::new()
                },
                IndexMap::new()
            )
        });

        let Some(team_id) = row.get::<_, Option<TeamId>>("team_id") else {
            continue;
        };
        let team = teams.entry(team_id).or_insert_with(|| Team {
            id: team_id,
            game_id,
            rank: row.get::<_, i32>("rank") as u32,
            members: Vec::new()
        });

        if let Some(membership_id) = row.get::<_, Option<MembershipId>>("membership_id") {
            team.members.push(Membership {
                id: membership_id,
                team_id,
                participant_id: row.get("participant_id"),
                weight: row.get("weight"),
                posterior: posterior_from_row(row)
            });
        }
    }

    games
        .into_values()
        .map(|(mut game, teams)| {
            game.teams = teams.into_values().collect();
            game
        })
        .collect()
}
