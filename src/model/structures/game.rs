use crate::model::structures::{
    board::{BoardId, ParticipantId},
    rating::Rating
};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

pub type GameId = i32;
pub type TeamId = i32;
pub type MembershipId = i32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub board_id: BoardId,
    pub timestamp: DateTime<FixedOffset>,
    /// False guarantees every posterior below is consistent with its prior
    pub dirty: bool,
    pub teams: Vec<Team>
}

impl Game {
    pub fn memberships(&self) -> impl Iterator<Item = &Membership> {
        self.teams.iter().flat_map(|team| team.members.iter())
    }

    pub fn participant_ids(&self) -> Vec<ParticipantId> {
        self.memberships().map(|m| m.participant_id).collect()
    }

    pub fn membership_of(&self, participant_id: ParticipantId) -> Option<&Membership> {
        self.memberships().find(|m| m.participant_id == participant_id)
    }

    pub fn team(&self, team_id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }

    /// The game's current shape, in team order, as it would be submitted.
    pub fn composition(&self) -> Vec<NewTeam> {
        self.teams
            .iter()
            .map(|team| NewTeam {
                rank: team.rank,
                members: team
                    .members
                    .iter()
                    .map(|m| NewMember {
                        participant_id: m.participant_id,
                        weight: m.weight
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub game_id: GameId,
    /// Lower is better
    pub rank: u32,
    pub members: Vec<Membership>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MembershipId,
    pub team_id: TeamId,
    pub participant_id: ParticipantId,
    pub weight: f64,
    /// Null only while the owning game is dirty
    pub posterior: Option<Rating>
}

/// A membership as seen from a participant's timeline: the result of a
/// nearest-neighbour lookup, carrying what the caller needs about its game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedMembership {
    pub membership_id: MembershipId,
    pub participant_id: ParticipantId,
    pub game_id: GameId,
    pub timestamp: DateTime<FixedOffset>,
    pub game_dirty: bool,
    pub weight: f64,
    pub posterior: Option<Rating>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewGame {
    pub timestamp: DateTime<FixedOffset>,
    pub teams: Vec<NewTeam>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTeam {
    pub rank: u32,
    pub members: Vec<NewMember>
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewMember {
    pub participant_id: ParticipantId,
    pub weight: f64
}

/// A change to the composition of an existing game.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GameEdit {
    AddMember {
        team_id: TeamId,
        participant_id: ParticipantId,
        weight: f64
    },
    RemoveMember {
        participant_id: ParticipantId
    },
    SetWeight {
        participant_id: ParticipantId,
        weight: f64
    },
    SetRank {
        team_id: TeamId,
        rank: u32
    }
}

impl GameEdit {
    /// The participant whose own timeline gains or loses this game, if any.
    pub fn moved_participant(&self) -> Option<ParticipantId> {
        match self {
            GameEdit::AddMember { participant_id, .. } | GameEdit::RemoveMember { participant_id } => {
                Some(*participant_id)
            }
            GameEdit::SetWeight { .. } | GameEdit::SetRank { .. } => None
        }
    }
}
