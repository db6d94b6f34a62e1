use crate::{
    database::store::{Timeline, TimelineStore},
    model::{
        engine::RatingEngine,
        rating_model::RatingModel,
        structures::{
            board::{BoardId, BoardParams, ParticipantId},
            game::{MembershipId, NewGame, NewMember, NewTeam},
            rating::Rating
        }
    }
};
use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use rand::{seq::SliceRandom, Rng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

/// Midnight UTC on 2024-01-01 plus `day` days. Negative days are allowed.
pub fn timestamp(day: i64) -> DateTime<FixedOffset> {
    let epoch = Utc
        .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid epoch");

    (epoch + Duration::days(day)).fixed_offset()
}

pub fn generate_member(participant_id: ParticipantId) -> NewMember {
    NewMember {
        participant_id,
        weight: 1.0
    }
}

/// A team of full-weight members.
pub fn generate_team(rank: u32, participants: &[ParticipantId]) -> NewTeam {
    NewTeam {
        rank,
        members: participants.iter().map(|id| generate_member(*id)).collect()
    }
}

/// A game from `(rank, participants)` pairs, every member at full weight.
pub fn generate_game(timestamp: DateTime<FixedOffset>, teams: Vec<(u32, Vec<ParticipantId>)>) -> NewGame {
    NewGame {
        timestamp,
        teams: teams
            .into_iter()
            .map(|(rank, participants)| generate_team(rank, &participants))
            .collect()
    }
}

/// A one-on-one game that `winner` wins.
pub fn generate_head_to_head(winner: ParticipantId, loser: ParticipantId, timestamp: DateTime<FixedOffset>) -> NewGame {
    generate_game(timestamp, vec![(0, vec![winner]), (1, vec![loser])])
}

/// Creates a board with default parameters and `n_participants` members.
pub async fn seed_board<S: TimelineStore, M: RatingModel>(
    engine: &RatingEngine<S, M>,
    name: &str,
    n_participants: usize
) -> (BoardId, Vec<ParticipantId>) {
    seed_board_with(engine, name, BoardParams::default(), n_participants).await
}

pub async fn seed_board_with<S: TimelineStore, M: RatingModel>(
    engine: &RatingEngine<S, M>,
    name: &str,
    params: BoardParams,
    n_participants: usize
) -> (BoardId, Vec<ParticipantId>) {
    let board = engine
        .create_board(name, params)
        .await
        .unwrap_or_else(|e| panic!("Failed to create board {}: {}", name, e));

    let mut participants = Vec::with_capacity(n_participants);
    for i in 0..n_participants {
        let participant = engine
            .add_participant(board.id, &format!("{}-player-{}", name, i))
            .await
            .unwrap_or_else(|e| panic!("Failed to add participant {}: {}", i, e));
        participants.push(participant.id);
    }

    (board.id, participants)
}

/// A random, valid game drawn from `participants`: two to four teams of one
/// to three members, random ranks (ties included) and a mix of weights.
pub fn random_game(rng: &mut ChaCha8Rng, participants: &[ParticipantId], timestamp: DateTime<FixedOffset>) -> NewGame {
    if participants.len() < 2 {
        panic!("At least two participants are needed for a game");
    }

    let mut pool = participants.to_vec();
    pool.shuffle(rng);

    let n_teams = rng.random_range(2..=pool.len().min(4));
    let mut teams: Vec<NewTeam> = (0..n_teams)
        .map(|_| NewTeam {
            rank: rng.random_range(0..n_teams as u32),
            members: Vec::new()
        })
        .collect();

    let n_players = rng.random_range(n_teams..=(n_teams * 3).min(pool.len()));
    for (i, participant_id) in pool.into_iter().take(n_players).enumerate() {
        let weight = match rng.random_range(0..4) {
            0 => 0.5,
            1 => rng.random_range(0.0..=1.0),
            _ => 1.0
        };

        teams[i % n_teams].members.push(NewMember { participant_id, weight });
    }

    NewGame { timestamp, teams }
}

/// Every stored posterior on the board, keyed by membership.
pub async fn posterior_snapshot<S: TimelineStore, M: RatingModel>(
    engine: &RatingEngine<S, M>,
    board_id: BoardId
) -> BTreeMap<MembershipId, Option<Rating>> {
    let mut tx = engine
        .store()
        .begin()
        .await
        .unwrap_or_else(|e| panic!("Failed to open transaction: {}", e));
    let games = tx
        .games_by_time(board_id)
        .await
        .unwrap_or_else(|e| panic!("Failed to read games: {}", e));

    games
        .iter()
        .flat_map(|g| g.memberships())
        .map(|m| (m.id, m.posterior))
        .collect()
}
