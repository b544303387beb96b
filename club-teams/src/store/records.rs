use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::{Attendance, Player};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub team_id: Option<u32>,
    /// Bumped on every write of this record.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub generated_at: Option<DateTime<Utc>>,
    pub generated_by: Option<String>,
    pub team_size: Option<usize>,
    pub num_teams: Option<usize>,
    pub cleared_at: Option<DateTime<Utc>>,
    pub cleared_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinRecord {
    pub count: u32,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prize {
    pub name: String,
    pub photo_url: String,
    pub storage_path: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    pub url: String,
    pub storage_path: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Everything the club keeps, as one document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClubState {
    /// Roster in creation order.
    pub players: Vec<Player>,
    pub attendance: Attendance,
    pub assignments: BTreeMap<String, AssignmentRecord>,
    pub session: SessionMeta,
    /// Month key (`YYYY-MM`) -> team id -> wins.
    pub wins: BTreeMap<String, BTreeMap<u32, WinRecord>>,
    pub prize: Prize,
    pub photos: Vec<Photo>,
}

impl ClubState {
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn team_of(&self, player_id: &str) -> Option<u32> {
        self.assignments
            .get(player_id)
            .and_then(|record| record.team_id)
    }

    pub fn wins_in(&self, month: &str, team_id: u32) -> u32 {
        self.wins
            .get(month)
            .and_then(|teams| teams.get(&team_id))
            .map(|record| record.count)
            .unwrap_or(0)
    }

    /// Writes an assignment, bumping the record's revision.
    pub fn set_assignment(
        &mut self,
        player_id: &str,
        team_id: Option<u32>,
        at: DateTime<Utc>,
        by: &str,
    ) -> u64 {
        let revision = self
            .assignments
            .get(player_id)
            .map(|record| record.revision + 1)
            .unwrap_or(1);
        self.assignments.insert(
            player_id.to_string(),
            AssignmentRecord {
                team_id,
                revision,
                updated_at: at,
                updated_by: by.to_string(),
            },
        );
        revision
    }
}
