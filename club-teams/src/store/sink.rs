use chrono::{DateTime, Utc};

use super::{Change, ClubState, Store};
use crate::error::Result;
use crate::roster::is_absent;
use crate::teams::AssignmentEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Generated { team_size: usize, num_teams: usize },
    Cleared,
}

/// A full replacement set of assignments, written together or not at all.
#[derive(Debug, Clone)]
pub struct AssignmentBatch {
    pub entries: Vec<AssignmentEntry>,
    pub kind: BatchKind,
    pub actor: String,
    pub at: DateTime<Utc>,
}

pub trait AssignmentSink {
    fn apply_assignments(&self, batch: AssignmentBatch) -> Result<()>;
}

/// Writes `batch` into `state`, checked against the state it lands on.
///
/// Entries for players no longer on the roster are dropped, and absent
/// players are written as unassigned whatever the entry says. Returns the
/// number of records written.
pub(crate) fn write_batch(state: &mut ClubState, batch: &AssignmentBatch) -> usize {
    let mut written = 0;
    for entry in &batch.entries {
        if state.player(&entry.player_id).is_none() {
            tracing::debug!(player_id = %entry.player_id, "Dropping assignment for removed player");
            continue;
        }
        let team_id = if is_absent(&state.attendance, &entry.player_id) {
            None
        } else {
            entry.team_id
        };
        state.set_assignment(&entry.player_id, team_id, batch.at, &batch.actor);
        written += 1;
    }

    match batch.kind {
        BatchKind::Generated {
            team_size,
            num_teams,
        } => {
            state.session.generated_at = Some(batch.at);
            state.session.generated_by = Some(batch.actor.clone());
            state.session.team_size = Some(team_size);
            state.session.num_teams = Some(num_teams);
        }
        BatchKind::Cleared => {
            state.session.cleared_at = Some(batch.at);
            state.session.cleared_by = Some(batch.actor.clone());
        }
    }
    written
}

impl AssignmentSink for Store {
    fn apply_assignments(&self, batch: AssignmentBatch) -> Result<()> {
        let written = self.commit(&[Change::Assignments, Change::Session], |state| {
            Ok(write_batch(state, &batch))
        })?;

        tracing::info!(
            entries = batch.entries.len(),
            written = written,
            kind = ?batch.kind,
            "Assignment batch applied"
        );
        Ok(())
    }
}
