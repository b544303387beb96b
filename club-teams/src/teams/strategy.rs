//! Seating strategies: how the already-selected players are spread over the
//! teams of a balancing run.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::types::{Seat, Team};

/// Partitions exactly `num_teams * team_size` seated players into teams with
/// ids `1..=num_teams`, each holding `team_size` members.
pub trait SeatingStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn seat(&self, seated: Vec<Seat>, num_teams: usize, team_size: usize) -> Vec<Team>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    #[default]
    Greedy,
    Exact,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn SeatingStrategy> {
        match self {
            StrategyKind::Greedy => Box::new(Greedy),
            StrategyKind::Exact => Box::new(Exact::default()),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "greedy" => Ok(StrategyKind::Greedy),
            "exact" => Ok(StrategyKind::Exact),
            other => Err(format!(
                "Unknown balance strategy {:?} (expected \"greedy\" or \"exact\")",
                other
            )),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Greedy => write!(f, "greedy"),
            StrategyKind::Exact => write!(f, "exact"),
        }
    }
}

fn empty_teams(num_teams: usize) -> Vec<Team> {
    (1..=num_teams as u32).map(Team::new).collect()
}

/// Seats players in the given order into the non-full team with the lowest
/// skill sum (then fewest members, then lowest id), then repairs any spread
/// left above the largest single score.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl SeatingStrategy for Greedy {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn seat(&self, seated: Vec<Seat>, num_teams: usize, team_size: usize) -> Vec<Team> {
        let mut teams = empty_teams(num_teams);

        for seat in seated {
            let target = teams
                .iter_mut()
                .filter(|t| t.members.len() < team_size)
                .min_by_key(|t| (t.skill_sum, t.members.len(), t.id));

            match target {
                Some(team) => team.push(seat),
                None => {
                    tracing::warn!(
                        player_id = %seat.player_id,
                        "No team has a free seat; more players were seated than fit"
                    );
                }
            }
        }

        rebalance(&mut teams);
        teams
    }
}

/// Swaps the strongest member of the heaviest team with the weakest member of
/// the lightest team until the two sums are within the largest single score.
///
/// Team sizes never change. Each swap moves `d` points with `0 < d < spread`,
/// which strictly lowers the sum of squared team sums, so the loop ends.
pub(crate) fn rebalance(teams: &mut [Team]) {
    let max_score = teams
        .iter()
        .flat_map(|t| t.members.iter().map(|s| s.score))
        .max()
        .unwrap_or(0);

    loop {
        let heavy = match (0..teams.len()).max_by_key(|&i| teams[i].skill_sum) {
            Some(i) => i,
            None => return,
        };
        let light = match (0..teams.len()).min_by_key(|&i| teams[i].skill_sum) {
            Some(i) => i,
            None => return,
        };
        if teams[heavy].skill_sum - teams[light].skill_sum <= max_score {
            return;
        }

        let strongest = (0..teams[heavy].members.len())
            .max_by_key(|&i| teams[heavy].members[i].score);
        let weakest = (0..teams[light].members.len())
            .min_by_key(|&i| teams[light].members[i].score);
        let (Some(hi), Some(lo)) = (strongest, weakest) else {
            return;
        };

        let outgoing = teams[heavy].members[hi].clone();
        let incoming = teams[light].members[lo].clone();
        if outgoing.score <= incoming.score {
            return;
        }

        let delta = outgoing.score - incoming.score;
        teams[heavy].skill_sum -= delta;
        teams[light].skill_sum += delta;
        teams[heavy].members[hi] = incoming;
        teams[light].members[lo] = outgoing;
    }
}

/// Exhaustive search for the partition with the smallest spread. Only used
/// up to `max_players` seated players; larger runs fall back to [`Greedy`].
#[derive(Debug, Clone, Copy)]
pub struct Exact {
    pub max_players: usize,
}

impl Default for Exact {
    fn default() -> Self {
        Self { max_players: 12 }
    }
}

impl SeatingStrategy for Exact {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn seat(&self, mut seated: Vec<Seat>, num_teams: usize, team_size: usize) -> Vec<Team> {
        if num_teams < 2 || seated.len() > self.max_players {
            return Greedy.seat(seated, num_teams, team_size);
        }

        // Heavy players first prunes faster; the sort is stable so the
        // shuffled order still decides between equal scores.
        seated.sort_by(|a, b| b.score.cmp(&a.score));
        let scores: Vec<u32> = seated.iter().map(|s| s.score).collect();
        let total: u32 = scores.iter().sum();

        let mut search = ExactSearch {
            scores: &scores,
            team_size,
            floor: u32::from(total % num_teams as u32 != 0),
            sums: vec![0; num_teams],
            counts: vec![0; num_teams],
            current: vec![0; scores.len()],
            best: None,
        };
        search.run(0);

        let placement = match search.best {
            Some((_, placement)) => placement,
            None => return Greedy.seat(seated, num_teams, team_size),
        };

        let mut teams = empty_teams(num_teams);
        for (seat, team_index) in seated.into_iter().zip(placement) {
            teams[team_index].push(seat);
        }
        teams
    }
}

struct ExactSearch<'a> {
    scores: &'a [u32],
    team_size: usize,
    /// Smallest spread that is achievable at all; reaching it ends the search.
    floor: u32,
    sums: Vec<u32>,
    counts: Vec<usize>,
    current: Vec<usize>,
    best: Option<(u32, Vec<usize>)>,
}

impl ExactSearch<'_> {
    fn done(&self) -> bool {
        matches!(self.best, Some((spread, _)) if spread <= self.floor)
    }

    fn run(&mut self, index: usize) {
        if self.done() {
            return;
        }

        if index == self.scores.len() {
            let max = self.sums.iter().copied().max().unwrap_or(0);
            let min = self.sums.iter().copied().min().unwrap_or(0);
            let spread = max - min;
            if self.best.as_ref().map_or(true, |(best, _)| spread < *best) {
                self.best = Some((spread, self.current.clone()));
            }
            return;
        }

        let mut tried_empty = false;
        for team in 0..self.sums.len() {
            if self.counts[team] >= self.team_size {
                continue;
            }
            // Empty teams are interchangeable; trying one is enough.
            if self.counts[team] == 0 {
                if tried_empty {
                    continue;
                }
                tried_empty = true;
            }

            self.sums[team] += self.scores[index];
            self.counts[team] += 1;
            self.current[index] = team;

            self.run(index + 1);

            self.sums[team] -= self.scores[index];
            self.counts[team] -= 1;

            if self.done() {
                return;
            }
        }
    }
}
