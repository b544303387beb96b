use super::types::{AssignmentEntry, Balance};
use crate::roster::{is_absent, Attendance, Player};

/// One assignment per roster player, in roster order.
///
/// Absent players are always unassigned, whatever the balance or any earlier
/// assignment says. Present players keep the team the balance gave them, or
/// go to the bench when they were not seated.
pub fn reconcile(roster: &[Player], attendance: &Attendance, balance: &Balance) -> Vec<AssignmentEntry> {
    let seated = balance.seated();

    roster
        .iter()
        .map(|player| {
            let team_id = if is_absent(attendance, &player.id) {
                None
            } else {
                seated.get(player.id.as_str()).copied()
            };
            AssignmentEntry {
                player_id: player.id.clone(),
                team_id,
            }
        })
        .collect()
}
