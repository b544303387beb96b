use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Players per team unless configured otherwise.
pub const DEFAULT_TEAM_SIZE: usize = 6;

/// A present player as the balancer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: String,
    pub score: u32,
}

/// One team of a balancing run. Ids start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub skill_sum: u32,
    pub members: Vec<Seat>,
}

impl Team {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            skill_sum: 0,
            members: Vec::new(),
        }
    }

    pub fn push(&mut self, seat: Seat) {
        self.skill_sum += seat.score;
        self.members.push(seat);
    }
}

/// Result of one balancing run over the present players.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub team_size: usize,
    pub teams: Vec<Team>,
    pub bench: Vec<Seat>,
}

impl Balance {
    pub fn num_teams(&self) -> usize {
        self.teams.len()
    }

    /// Seated player id -> team id. Bench players are absent from the map.
    pub fn seated(&self) -> HashMap<&str, u32> {
        self.teams
            .iter()
            .flat_map(|team| {
                team.members
                    .iter()
                    .map(move |seat| (seat.player_id.as_str(), team.id))
            })
            .collect()
    }

    pub fn team_of(&self, player_id: &str) -> Option<u32> {
        self.teams
            .iter()
            .find(|team| team.members.iter().any(|seat| seat.player_id == player_id))
            .map(|team| team.id)
    }

    /// Heaviest minus lightest team skill sum; 0 without teams.
    pub fn skill_spread(&self) -> u32 {
        let max = self.teams.iter().map(|t| t.skill_sum).max().unwrap_or(0);
        let min = self.teams.iter().map(|t| t.skill_sum).min().unwrap_or(0);
        max - min
    }
}

/// Where a manual move sends a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamTarget {
    Team(u32),
    Bench,
}

impl TeamTarget {
    pub fn team_id(self) -> Option<u32> {
        match self {
            TeamTarget::Team(id) => Some(id),
            TeamTarget::Bench => None,
        }
    }
}

impl From<Option<u32>> for TeamTarget {
    fn from(team_id: Option<u32>) -> Self {
        team_id.map(TeamTarget::Team).unwrap_or(TeamTarget::Bench)
    }
}

/// Final per-player outcome handed to the assignment sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentEntry {
    pub player_id: String,
    pub team_id: Option<u32>,
}
