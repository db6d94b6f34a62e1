use std::collections::HashMap;

use indexmap::IndexMap;
use openskill::{
    model::{model::Model, plackett_luce::PlackettLuce},
    rating::{default_gamma, Rating as ModelRating}
};

use crate::{
    error::ModelError,
    model::{
        constants::KAPPA,
        structures::{
            board::{BoardParams, ParticipantId},
            rating::Rating
        }
    }
};

/// One participant's input to a rating computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatedPlayer {
    pub prior: Rating,
    pub weight: f64
}

/// One team's input to a rating computation.
#[derive(Debug, Clone, PartialEq)]
pub struct RatedTeam {
    pub rank: u32,
    pub players: IndexMap<ParticipantId, RatedPlayer>
}

/// The skill-update function. Given every team of a single game with its
/// rank and each participant's prior and weight, returns each participant's
/// posterior.
///
/// Implementations must be deterministic: identical teams and parameters
/// always produce bit-identical ratings. Incremental recalculation relies on
/// this to stop propagating once nothing changes.
pub trait RatingModel: Send + Sync {
    fn rate(&self, teams: &[RatedTeam], params: &BoardParams) -> Result<HashMap<ParticipantId, Rating>, ModelError>;
}

/// Plackett-Luce rating backed by `openskill`.
///
/// Priors are widened by the board's drift before rating. A participant's
/// weight scales how far they move from their prior towards the model's
/// output.
#[derive(Debug, Clone, Copy)]
pub struct PlackettLuceModel {
    pub kappa: f64
}

impl Default for PlackettLuceModel {
    fn default() -> Self {
        PlackettLuceModel { kappa: KAPPA }
    }
}

impl RatingModel for PlackettLuceModel {
    fn rate(&self, teams: &[RatedTeam], params: &BoardParams) -> Result<HashMap<ParticipantId, Rating>, ModelError> {
        let model = PlackettLuce::new(params.beta, self.kappa, default_gamma);

        let inputs: Vec<Vec<ModelRating>> = teams
            .iter()
            .map(|team| {
                team.players
                    .values()
                    .map(|player| {
                        let drifted = player.prior.with_drift(params.tau);
                        ModelRating {
                            mu: drifted.mu,
                            sigma: drifted.sigma
                        }
                    })
                    .collect()
            })
            .collect();
        let ranks: Vec<usize> = teams.iter().map(|team| team.rank as usize).collect();

        let outputs = model.rate(inputs, ranks);
        if outputs.len() != teams.len() {
            return Err(ModelError::ShapeMismatch {
                expected: teams.len(),
                actual: outputs.len()
            });
        }

        let mut posteriors = HashMap::new();
        for (team, output) in teams.iter().zip(outputs) {
            if output.len() != team.players.len() {
                return Err(ModelError::ShapeMismatch {
                    expected: team.players.len(),
                    actual: output.len()
                });
            }

            for ((participant_id, player), rated) in team.players.iter().zip(output) {
                let posterior = player
                    .prior
                    .interpolate(Rating::new(rated.mu, rated.sigma), player.weight);

                if !posterior.is_finite() {
                    return Err(ModelError::NonFinite(*participant_id));
                }

                posteriors.insert(*participant_id, posterior);
            }
        }

        Ok(posteriors)
    }
}
