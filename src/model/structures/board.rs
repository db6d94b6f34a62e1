use crate::model::{constants, structures::rating::Rating};
use serde::{Deserialize, Serialize};

pub type BoardId = i32;
pub type ParticipantId = i32;

/// Model parameters and game-shape bounds for a board.
///
/// `mu` and `sigma` form the default prior and are locked once the board has
/// games. The remaining values are tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardParams {
    pub mu: f64,
    pub sigma: f64,
    /// Performance variance
    pub beta: f64,
    /// Rating drift applied to every prior before rating
    pub tau: f64,
    pub draw_probability: f64,
    pub min_teams: u32,
    pub max_teams: Option<u32>,
    pub min_players_per_team: u32,
    pub max_players_per_team: Option<u32>
}

impl Default for BoardParams {
    fn default() -> Self {
        BoardParams {
            mu: constants::MU,
            sigma: constants::SIGMA,
            beta: constants::BETA,
            tau: constants::TAU,
            draw_probability: constants::DRAW_PROBABILITY,
            min_teams: constants::MIN_TEAMS,
            max_teams: None,
            min_players_per_team: constants::MIN_PLAYERS_PER_TEAM,
            max_players_per_team: None
        }
    }
}

impl BoardParams {
    /// The prior used for a participant's first game on the board.
    pub fn default_rating(&self) -> Rating {
        Rating::new(self.mu, self.sigma)
    }

    pub fn allows_ties(&self) -> bool {
        self.draw_probability > 0.0
    }

    /// True if the default prior differs between the two parameter sets.
    pub fn prior_differs(&self, other: &BoardParams) -> bool {
        self.mu != other.mu || self.sigma != other.sigma
    }

    /// True if any value the rating model consumes differs.
    pub fn rating_tunables_differ(&self, other: &BoardParams) -> bool {
        self.beta != other.beta || self.tau != other.tau || self.draw_probability != other.draw_probability
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: BoardId,
    pub name: String,
    pub params: BoardParams
}

/// An identity scoped to a single board. Its rating is never stored here; it
/// is always derived from its memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub board_id: BoardId,
    pub name: String
}
