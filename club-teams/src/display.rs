use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::roster::{is_absent, Player};
use crate::store::ClubState;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterRow {
    pub id: String,
    pub first: String,
    pub last: String,
    pub skill: String,
    pub initials: String,
    pub photo_url: String,
    pub absent: bool,
    pub team_id: Option<u32>,
}

/// Present players first, then by last and first name.
pub fn roster_view(state: &ClubState) -> Vec<RosterRow> {
    let mut players: Vec<&Player> = state.players.iter().collect();
    players.sort_by_cached_key(|p| (is_absent(&state.attendance, &p.id), p.sort_key()));

    players
        .into_iter()
        .map(|p| RosterRow {
            id: p.id.clone(),
            first: p.first.clone(),
            last: p.last.clone(),
            skill: p.skill.clone(),
            initials: p.initials(),
            photo_url: p.photo_url.clone(),
            absent: is_absent(&state.attendance, &p.id),
            team_id: state.team_of(&p.id),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberView {
    pub id: String,
    pub name: String,
    pub skill: String,
    pub score: u32,
    pub initials: String,
    pub photo_url: String,
}

impl MemberView {
    fn from_player(p: &Player) -> Self {
        Self {
            id: p.id.clone(),
            name: p.full_name(),
            skill: p.skill.clone(),
            score: p.score(),
            initials: p.initials(),
            photo_url: p.photo_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamView {
    pub id: u32,
    pub members: Vec<MemberView>,
    pub count: usize,
    pub skill_sum: u32,
    pub wins: u32,
    pub non_standard_size: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamsView {
    pub generated: bool,
    pub team_size: usize,
    pub month: String,
    pub teams: Vec<TeamView>,
    pub bench: Vec<MemberView>,
    pub non_standard_sizes: bool,
}

fn sort_members(members: &mut [MemberView]) {
    members.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

fn empty_team(state: &ClubState, month: &str, id: u32) -> TeamView {
    TeamView {
        id,
        members: Vec::new(),
        count: 0,
        skill_sum: 0,
        wins: state.wins_in(month, id),
        non_standard_size: false,
    }
}

/// Groups present players by their stored team. Absent players are left out.
///
/// Every assigned id gets a team. Empty teams are filled in from 1 up to the
/// highest assigned id, but never past the last generated team count or the
/// number of present players, so a team emptied by manual moves still shows
/// up while an arbitrary large id does not.
pub fn teams_view(state: &ClubState, team_size: usize, month: &str) -> TeamsView {
    let present: Vec<&Player> = state
        .players
        .iter()
        .filter(|p| !is_absent(&state.attendance, &p.id))
        .collect();

    let max_team = present
        .iter()
        .filter_map(|p| state.team_of(&p.id))
        .max()
        .unwrap_or(0);
    let fill_limit = state
        .session
        .num_teams
        .unwrap_or(0)
        .max(present.len());
    let fill_to = u32::try_from(fill_limit).unwrap_or(u32::MAX).min(max_team);

    let mut teams: BTreeMap<u32, TeamView> = (1..=fill_to)
        .map(|id| (id, empty_team(state, month, id)))
        .collect();
    let mut bench = Vec::new();

    for player in present {
        match state.team_of(&player.id) {
            Some(id) if id >= 1 => teams
                .entry(id)
                .or_insert_with(|| empty_team(state, month, id))
                .members
                .push(MemberView::from_player(player)),
            _ => bench.push(MemberView::from_player(player)),
        }
    }

    let mut teams: Vec<TeamView> = teams.into_values().collect();
    for team in &mut teams {
        sort_members(&mut team.members);
        team.count = team.members.len();
        team.skill_sum = team.members.iter().map(|m| m.score).sum();
        team.non_standard_size = team.count != team_size;
    }
    sort_members(&mut bench);

    let non_standard_sizes = teams.iter().any(|t| t.non_standard_size);

    TeamsView {
        generated: max_team > 0,
        team_size,
        month: month.to_string(),
        teams,
        bench,
        non_standard_sizes,
    }
}

fn team_header(team: &TeamView) -> String {
    format!(
        "Team {} ({} players, skill {}, wins {})",
        team.id, team.count, team.skill_sum, team.wins
    )
}

/// Writes the teams view as plain text, one player per line.
pub fn write_teams_to_file(view: &TeamsView, filename: &str) -> Result<()> {
    let mut file = File::create(filename)?;

    writeln!(file, "** Teams of {} **", view.team_size)?;
    if !view.generated {
        writeln!(file, "[NOT GENERATED]")?;
    }
    for team in &view.teams {
        writeln!(file, "{}", team_header(team))?;
        for member in &team.members {
            writeln!(file, "  {} [{}]", member.name, member.skill)?;
        }
    }
    writeln!(file, "Bench ({})", view.bench.len())?;
    for member in &view.bench {
        writeln!(file, "  {} [{}]", member.name, member.skill)?;
    }

    Ok(())
}

pub fn print_teams(view: &TeamsView) {
    println!("\n=== Teams of {} ===", view.team_size);
    if !view.generated {
        println!("Not enough present players for a single team.");
    }
    if view.non_standard_sizes {
        println!("⚠️  Some teams do not have {} players", view.team_size);
    }

    for team in &view.teams {
        println!("\n{}", team_header(team));
        for member in &team.members {
            println!("  - {} ({}, score {})", member.name, member.skill, member.score);
        }
    }

    println!("\nBench ({}):", view.bench.len());
    for member in &view.bench {
        println!("  - {} ({})", member.name, member.skill);
    }
}
