use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, SubsecRound};

use crate::{
    error::ValidationError,
    model::structures::{
        board::BoardParams,
        game::{NewMember, NewTeam}
    }
};

/// Checks a board's parameters before they are stored.
pub fn validate_params(params: &BoardParams) -> Result<(), ValidationError> {
    if !(0.0..=1.0).contains(&params.draw_probability) {
        return Err(ValidationError::DrawProbabilityOutOfRange(params.draw_probability));
    }

    positive("sigma", params.sigma)?;
    positive("beta", params.beta)?;

    if !params.mu.is_finite() {
        return Err(ValidationError::InvalidParameter {
            name: "mu",
            requirement: "finite",
            value: params.mu
        });
    }

    if !params.tau.is_finite() || params.tau < 0.0 {
        return Err(ValidationError::InvalidParameter {
            name: "tau",
            requirement: "finite and non-negative",
            value: params.tau
        });
    }

    if params.min_teams < 2 || params.max_teams.is_some_and(|max| max < params.min_teams) {
        return Err(ValidationError::InvalidTeamBounds {
            min: params.min_teams,
            max: params.max_teams
        });
    }

    if params.min_players_per_team < 1
        || params
            .max_players_per_team
            .is_some_and(|max| max < params.min_players_per_team)
    {
        return Err(ValidationError::InvalidPlayerBounds {
            min: params.min_players_per_team,
            max: params.max_players_per_team
        });
    }

    Ok(())
}

fn positive(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }

    Err(ValidationError::InvalidParameter {
        name,
        requirement: "finite and positive",
        value
    })
}

/// Checks the shape of a game against the board's bounds: team and player
/// counts, tie rules, weights, and that nobody appears twice.
///
/// Board membership of each participant needs the store and is checked by
/// the caller.
pub fn validate_composition(params: &BoardParams, teams: &[NewTeam]) -> Result<(), ValidationError> {
    let min_teams = params.min_teams.max(2);
    if teams.len() < min_teams as usize {
        return Err(ValidationError::TooFewTeams {
            min: min_teams,
            actual: teams.len()
        });
    }

    if let Some(max) = params.max_teams {
        if teams.len() > max as usize {
            return Err(ValidationError::TooManyTeams {
                max,
                actual: teams.len()
            });
        }
    }

    let min_players = params.min_players_per_team.max(1);
    for team in teams {
        if team.members.len() < min_players as usize {
            return Err(ValidationError::TooFewPlayers {
                min: min_players,
                actual: team.members.len()
            });
        }

        if let Some(max) = params.max_players_per_team {
            if team.members.len() > max as usize {
                return Err(ValidationError::TooManyPlayers {
                    max,
                    actual: team.members.len()
                });
            }
        }
    }

    if !params.allows_ties() && has_ties(teams.iter().map(|t| t.rank)) {
        return Err(ValidationError::TiesNotAllowed);
    }

    let mut seen = HashSet::new();
    for member in teams.iter().flat_map(|t| t.members.iter()) {
        validate_weight(member.weight)?;

        if !seen.insert(member.participant_id) {
            return Err(ValidationError::DuplicateParticipant(member.participant_id));
        }
    }

    Ok(())
}

/// Game instants are kept at microsecond precision, the finest a
/// `TIMESTAMPTZ` column stores.
pub fn normalize_timestamp(timestamp: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    timestamp.trunc_subsecs(6)
}

pub fn validate_weight(weight: f64) -> Result<(), ValidationError> {
    if (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(ValidationError::WeightOutOfRange(weight))
    }
}

pub fn has_ties(ranks: impl IntoIterator<Item = u32>) -> bool {
    let mut seen = HashSet::new();
    ranks.into_iter().any(|rank| !seen.insert(rank))
}

/// Competition ranking: each rank becomes the number of teams that placed
/// strictly better. Submitted ranks 3, 7, 7, 9 become 0, 1, 1, 3.
pub fn normalized_ranks(ranks: &[u32]) -> Vec<u32> {
    ranks
        .iter()
        .map(|rank| ranks.iter().filter(|other| *other < rank).count() as u32)
        .collect()
}

/// Sorts teams best-first and rewrites their ranks with [`normalized_ranks`].
pub fn normalize_teams(mut teams: Vec<NewTeam>) -> Vec<NewTeam> {
    teams.sort_by_key(|team| team.rank);
    let ranks = normalized_ranks(&teams.iter().map(|t| t.rank).collect::<Vec<_>>());

    for (team, rank) in teams.iter_mut().zip(ranks) {
        team.rank = rank;
    }

    teams
}

pub fn member(participant_id: i32, weight: f64) -> NewMember {
    NewMember { participant_id, weight }
}
