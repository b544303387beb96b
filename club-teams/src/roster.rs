use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ordinal skill rating of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkillTier {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillTier {
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Beginner" => Some(SkillTier::Beginner),
            "Intermediate" => Some(SkillTier::Intermediate),
            "Advanced" => Some(SkillTier::Advanced),
            _ => None,
        }
    }

    pub fn score(self) -> u32 {
        match self {
            SkillTier::Beginner => 1,
            SkillTier::Intermediate => 2,
            SkillTier::Advanced => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SkillTier::Beginner => "Beginner",
            SkillTier::Intermediate => "Intermediate",
            SkillTier::Advanced => "Advanced",
        }
    }
}

/// Balancing score for a stored skill label. Unknown labels count as the
/// lowest tier instead of failing.
pub fn skill_score(label: &str) -> u32 {
    SkillTier::from_label(label).map(SkillTier::score).unwrap_or(1)
}

/// Highest score any label can map to.
pub const MAX_SKILL_SCORE: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub first: String,
    pub last: String,
    /// Skill label exactly as entered; see [`skill_score`].
    pub skill: String,
    #[serde(default)]
    pub photo_url: String,
    #[serde(default)]
    pub photo_storage_path: String,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl Player {
    pub fn new(first: String, last: String, skill: String, created_by: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            first,
            last,
            skill,
            photo_url: String::new(),
            photo_storage_path: String::new(),
            created_at: Utc::now(),
            created_by,
        }
    }

    pub fn score(&self) -> u32 {
        skill_score(&self.skill)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first, self.last)
    }

    /// Lowercased "last first", the roster's name ordering key.
    pub fn sort_key(&self) -> String {
        format!("{} {}", self.last, self.first).to_lowercase()
    }

    /// Two-letter initials for a placeholder avatar.
    pub fn initials(&self) -> String {
        let first = self.first.chars().next().unwrap_or('?');
        let last = self.last.chars().next().unwrap_or('?');
        format!("{}{}", first, last).to_uppercase()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub absent: bool,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

/// Player id -> attendance record. A player without a record is present.
pub type Attendance = BTreeMap<String, AttendanceRecord>;

pub fn is_absent(attendance: &Attendance, player_id: &str) -> bool {
    attendance
        .get(player_id)
        .map(|record| record.absent)
        .unwrap_or(false)
}

/// Players not marked absent, in roster order.
pub fn present_players<'a>(players: &'a [Player], attendance: &Attendance) -> Vec<&'a Player> {
    players
        .iter()
        .filter(|p| !is_absent(attendance, &p.id))
        .collect()
}

#[cfg(test)]
pub(crate) fn test_player(id: &str, skill: &str) -> Player {
    Player {
        id: id.to_string(),
        first: format!("First{}", id),
        last: format!("Last{}", id),
        skill: skill.to_string(),
        photo_url: String::new(),
        photo_storage_path: String::new(),
        created_at: Utc::now(),
        created_by: "test".to_string(),
    }
}
