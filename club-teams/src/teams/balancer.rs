use rand::Rng;

use super::strategy::{Greedy, SeatingStrategy};
use super::types::{Balance, Seat};
use crate::roster::Player;

/// In-place Fisher–Yates: for `i` from the end down to 1, swap with a
/// uniformly chosen index in `[0, i]`.
pub fn fisher_yates<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.gen_range(0..=i);
        items.swap(i, j);
    }
}

/// Splits the present players into `floor(n / team_size)` greedy-balanced
/// teams plus a bench. See [`balance_teams_with`].
pub fn balance_teams<'a, I, R>(players: I, team_size: usize, rng: &mut R) -> Balance
where
    I: IntoIterator<Item = &'a Player>,
    R: Rng + ?Sized,
{
    balance_teams_with(players, team_size, &Greedy, rng)
}

/// Balances present players into fixed-size teams.
///
/// Players are ordered by descending skill and then shuffled, so repeated
/// runs pick different benches and line-ups. The first
/// `num_teams * team_size` shuffled players are seated through `strategy`;
/// the rest form the bench. Too few players (or a `team_size` of 0) yields
/// no teams and everyone on the bench.
pub fn balance_teams_with<'a, I, R>(
    players: I,
    team_size: usize,
    strategy: &dyn SeatingStrategy,
    rng: &mut R,
) -> Balance
where
    I: IntoIterator<Item = &'a Player>,
    R: Rng + ?Sized,
{
    let mut ordered: Vec<Seat> = players
        .into_iter()
        .map(|p| Seat {
            player_id: p.id.clone(),
            score: p.score(),
        })
        .collect();

    let num_teams = if team_size == 0 {
        0
    } else {
        ordered.len() / team_size
    };
    let seats = num_teams * team_size;

    ordered.sort_by(|a, b| b.score.cmp(&a.score));
    fisher_yates(&mut ordered, rng);

    let bench = ordered.split_off(seats);
    let teams = if num_teams == 0 {
        Vec::new()
    } else {
        strategy.seat(ordered, num_teams, team_size)
    };

    let balance = Balance {
        team_size,
        teams,
        bench,
    };

    tracing::debug!(
        strategy = strategy.name(),
        num_teams = balance.num_teams(),
        bench = balance.bench.len(),
        spread = balance.skill_spread(),
        "Balanced teams"
    );

    balance
}
