//! Club commands. Every mutation goes through the store as one commit;
//! admin-only commands are refused before anything is touched.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Datelike, Local, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit;
use crate::blobs::BlobStore;
use crate::display::{roster_view, teams_view, RosterRow, TeamsView};
use crate::error::{AppError, Result};
use crate::roster::{present_players, AttendanceRecord, Player, SkillTier};
use crate::store::sink::write_batch;
use crate::store::{
    AssignmentBatch, AssignmentSink, BatchKind, Change, ClubState, Photo, Prize, Store,
    WinRecord,
};
use crate::teams::{balance_teams_with, reconcile, Balance, SeatingStrategy, StrategyKind, TeamTarget};

/// Who is asking: an anonymous per-client uid plus the admin capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub uid: String,
    pub is_admin: bool,
}

impl Actor {
    pub fn anonymous(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            is_admin: false,
        }
    }

    pub fn admin(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            is_admin: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPlayer {
    pub first: String,
    pub last: String,
    #[serde(default)]
    pub skill: String,
}

/// `YYYY-MM` key that win counters are grouped under.
pub fn month_key(date: NaiveDate) -> String {
    format!("{:04}-{:02}", date.year(), date.month())
}

pub fn current_month() -> String {
    month_key(Local::now().date_naive())
}

pub struct ClubService {
    store: Arc<Store>,
    blobs: Arc<dyn BlobStore>,
    team_size: usize,
    strategy: Box<dyn SeatingStrategy>,
    rng: Mutex<StdRng>,
}

impl ClubService {
    /// `seed` fixes the balancing randomness; `None` seeds from the OS.
    pub fn new(
        store: Arc<Store>,
        blobs: Arc<dyn BlobStore>,
        team_size: usize,
        strategy: StrategyKind,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            store,
            blobs,
            team_size,
            strategy: strategy.build(),
            rng: Mutex::new(rng),
        }
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn team_size(&self) -> usize {
        self.team_size
    }

    pub fn snapshot(&self) -> Arc<ClubState> {
        self.store.snapshot()
    }

    pub fn roster(&self) -> Vec<RosterRow> {
        roster_view(&self.store.snapshot())
    }

    pub fn teams(&self) -> TeamsView {
        teams_view(&self.store.snapshot(), self.team_size, &current_month())
    }

    fn require_admin(&self, actor: &Actor, action: &str) -> Result<()> {
        if actor.is_admin {
            Ok(())
        } else {
            audit::log_security_event(&actor.uid, "unauthorized", action);
            Err(AppError::Unauthorized)
        }
    }

    /// Removes a stored blob, logging instead of failing.
    fn discard_blob(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        if let Err(e) = self.blobs.delete(path) {
            tracing::warn!(path = path, error = %e, "Failed to delete stored photo; continuing");
        }
    }

    // ------------------------------------------------------------------
    // Teams
    // ------------------------------------------------------------------

    /// Balances the present players and writes an assignment for every
    /// roster player in one batch.
    ///
    /// Balancing runs inside the commit, so the roster and attendance it sees
    /// are the ones the batch is written against.
    pub fn generate_teams(&self, actor: &Actor) -> Result<Balance> {
        self.require_admin(actor, "generate_teams")?;

        let balance = self
            .store
            .commit(&[Change::Assignments, Change::Session], |state| {
                let present = present_players(&state.players, &state.attendance);
                let balance = {
                    let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
                    balance_teams_with(present, self.team_size, self.strategy.as_ref(), &mut *rng)
                };
                let entries = reconcile(&state.players, &state.attendance, &balance);

                write_batch(
                    state,
                    &AssignmentBatch {
                        entries,
                        kind: BatchKind::Generated {
                            team_size: self.team_size,
                            num_teams: balance.num_teams(),
                        },
                        actor: actor.uid.clone(),
                        at: Utc::now(),
                    },
                );
                Ok(balance)
            })?;

        audit::log_action(
            &actor.uid,
            "generate_teams",
            &format!(
                "{} teams, {} on bench, spread {}",
                balance.num_teams(),
                balance.bench.len(),
                balance.skill_spread()
            ),
        );
        Ok(balance)
    }

    /// Puts one player on a team or the bench. The target team is not checked.
    ///
    /// With `expected_revision` the move only applies if the stored record is
    /// still at that revision (0 when there is none yet). Returns the new
    /// revision.
    pub fn move_player(
        &self,
        actor: &Actor,
        player_id: &str,
        target: TeamTarget,
        expected_revision: Option<u64>,
    ) -> Result<u64> {
        self.require_admin(actor, "move_player")?;

        let revision = self.store.commit(&[Change::Assignments], |state| {
            if state.player(player_id).is_none() {
                return Err(AppError::not_found("Player", player_id));
            }
            if let Some(expected) = expected_revision {
                let actual = state
                    .assignments
                    .get(player_id)
                    .map(|record| record.revision)
                    .unwrap_or(0);
                if actual != expected {
                    return Err(AppError::Conflict {
                        player_id: player_id.to_string(),
                        expected,
                        actual,
                    });
                }
            }
            Ok(state.set_assignment(player_id, target.team_id(), Utc::now(), &actor.uid))
        })?;

        audit::log_action(&actor.uid, "move_player", &format!("{} -> {:?}", player_id, target));
        Ok(revision)
    }

    pub fn clear_assignments(&self, actor: &Actor) -> Result<()> {
        self.require_admin(actor, "clear_assignments")?;

        let snapshot = self.store.snapshot();
        let entries = snapshot
            .players
            .iter()
            .map(|p| crate::teams::AssignmentEntry {
                player_id: p.id.clone(),
                team_id: None,
            })
            .collect();

        self.store.apply_assignments(AssignmentBatch {
            entries,
            kind: BatchKind::Cleared,
            actor: actor.uid.clone(),
            at: Utc::now(),
        })?;

        audit::log_action(&actor.uid, "clear_assignments", "all players unassigned");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Wins
    // ------------------------------------------------------------------

    /// Adds one win (`delta` 1) or takes one away (`delta` -1) for a team this
    /// month. The count never goes below zero.
    pub fn adjust_wins(&self, actor: &Actor, team_id: u32, delta: i32) -> Result<u32> {
        self.require_admin(actor, "adjust_wins")?;
        if team_id == 0 {
            return Err(AppError::Validation("Team ids start at 1".to_string()));
        }
        if delta != 1 && delta != -1 {
            return Err(AppError::Validation(format!(
                "Wins change by 1 or -1, got {}",
                delta
            )));
        }

        let month = current_month();
        let count = self.store.commit(&[Change::Wins], |state| {
            let teams = state.wins.entry(month.clone()).or_default();
            let current = teams.get(&team_id).map(|r| r.count).unwrap_or(0);
            let next = if delta > 0 {
                current.saturating_add(1)
            } else {
                current.saturating_sub(1)
            };
            teams.insert(
                team_id,
                WinRecord {
                    count: next,
                    updated_at: Utc::now(),
                    updated_by: actor.uid.clone(),
                },
            );
            Ok(next)
        })?;

        audit::log_action(
            &actor.uid,
            "adjust_wins",
            &format!("team {} {:+} in {} -> {}", team_id, delta, month, count),
        );
        Ok(count)
    }

    pub fn reset_wins(&self, actor: &Actor) -> Result<()> {
        self.require_admin(actor, "reset_wins")?;

        let month = current_month();
        self.store.commit(&[Change::Wins], |state| {
            state.wins.remove(&month);
            Ok(())
        })?;

        audit::log_action(&actor.uid, "reset_wins", &month);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Roster & attendance
    // ------------------------------------------------------------------

    pub fn add_player(&self, actor: &Actor, new: NewPlayer, photo: Option<&[u8]>) -> Result<Player> {
        let first = new.first.trim().to_string();
        let last = new.last.trim().to_string();
        if first.is_empty() || last.is_empty() {
            return Err(AppError::Validation(
                "First and last name are required".to_string(),
            ));
        }
        let skill = match new.skill.trim() {
            "" => SkillTier::Beginner.label().to_string(),
            label => label.to_string(),
        };

        let mut player = Player::new(first, last, skill, actor.uid.clone());

        if let Some(bytes) = photo.filter(|b| !b.is_empty()) {
            let path = format!("playerPhotos/{}", Uuid::new_v4());
            player.photo_url = self.blobs.put(&path, bytes)?;
            player.photo_storage_path = path;
        }

        let stored = player.clone();
        if let Err(e) = self.store.commit(&[Change::Players], move |state| {
            state.players.push(stored);
            Ok(())
        }) {
            self.discard_blob(&player.photo_storage_path);
            return Err(e);
        }

        audit::log_action(&actor.uid, "add_player", &player.full_name());
        Ok(player)
    }

    pub fn set_player_photo(&self, actor: &Actor, player_id: &str, bytes: &[u8]) -> Result<Player> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Photo is empty".to_string()));
        }
        if self.store.snapshot().player(player_id).is_none() {
            return Err(AppError::not_found("Player", player_id));
        }

        let path = format!("playerPhotos/{}", Uuid::new_v4());
        let url = self.blobs.put(&path, bytes)?;

        let result = self.store.commit(&[Change::Players], |state| {
            let player = state
                .player_mut(player_id)
                .ok_or_else(|| AppError::not_found("Player", player_id))?;
            let previous = std::mem::replace(&mut player.photo_storage_path, path.clone());
            player.photo_url = url.clone();
            Ok((player.clone(), previous))
        });

        match result {
            Ok((player, previous)) => {
                self.discard_blob(&previous);
                audit::log_action(&actor.uid, "set_player_photo", player_id);
                Ok(player)
            }
            Err(e) => {
                self.discard_blob(&path);
                Err(e)
            }
        }
    }

    /// Removes the player with their attendance and assignment records.
    pub fn delete_player(&self, actor: &Actor, player_id: &str) -> Result<()> {
        self.require_admin(actor, "delete_player")?;

        // Blob goes only after the commit succeeds
        let photo_path = self.store.commit(
            &[Change::Players, Change::Attendance, Change::Assignments],
            |state| {
                let photo_path = state
                    .player(player_id)
                    .map(|p| p.photo_storage_path.clone())
                    .ok_or_else(|| AppError::not_found("Player", player_id))?;
                state.players.retain(|p| p.id != player_id);
                state.attendance.remove(player_id);
                state.assignments.remove(player_id);
                Ok(photo_path)
            },
        )?;
        self.discard_blob(&photo_path);

        audit::log_action(&actor.uid, "delete_player", player_id);
        Ok(())
    }

    pub fn set_absent(&self, actor: &Actor, player_id: &str, absent: bool) -> Result<()> {
        self.store.commit(&[Change::Attendance], |state| {
            if state.player(player_id).is_none() {
                return Err(AppError::not_found("Player", player_id));
            }
            state.attendance.insert(
                player_id.to_string(),
                AttendanceRecord {
                    absent,
                    updated_at: Utc::now(),
                    updated_by: actor.uid.clone(),
                },
            );
            Ok(())
        })?;

        tracing::info!(player_id = player_id, absent = absent, "Attendance updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Prize
    // ------------------------------------------------------------------

    /// Updates the prize. `None` keeps the current name; without a photo the
    /// current one stays.
    pub fn save_prize(&self, actor: &Actor, name: Option<&str>, photo: Option<&[u8]>) -> Result<Prize> {
        self.require_admin(actor, "save_prize")?;

        let stored = match photo.filter(|b| !b.is_empty()) {
            Some(bytes) => {
                let path = "prize/current".to_string();
                let url = self.blobs.put(&path, bytes)?;
                Some((url, path))
            }
            None => None,
        };

        let prize = self.store.commit(&[Change::Prize], |state| {
            let prize = &mut state.prize;
            if let Some(name) = name {
                prize.name = name.trim().to_string();
            }
            if let Some((url, path)) = stored {
                prize.photo_url = url;
                prize.storage_path = path;
            }
            prize.updated_at = Some(Utc::now());
            prize.updated_by = Some(actor.uid.clone());
            Ok(prize.clone())
        })?;

        audit::log_action(&actor.uid, "save_prize", &prize.name);
        Ok(prize)
    }

    /// Blanks the prize name and photo; the storage path is kept.
    pub fn clear_prize(&self, actor: &Actor) -> Result<()> {
        self.require_admin(actor, "clear_prize")?;

        self.store.commit(&[Change::Prize], |state| {
            state.prize.name.clear();
            state.prize.photo_url.clear();
            state.prize.updated_at = Some(Utc::now());
            state.prize.updated_by = Some(actor.uid.clone());
            Ok(())
        })?;

        audit::log_action(&actor.uid, "clear_prize", "");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Gallery
    // ------------------------------------------------------------------

    pub fn upload_photo(&self, actor: &Actor, bytes: &[u8]) -> Result<Photo> {
        if bytes.is_empty() {
            return Err(AppError::Validation("Select one or more photos.".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let storage_path = format!("gamePhotos/{}", id);
        let url = self.blobs.put(&storage_path, bytes)?;
        let photo = Photo {
            id,
            url,
            storage_path,
            created_at: Utc::now(),
            created_by: actor.uid.clone(),
        };

        let stored = photo.clone();
        if let Err(e) = self.store.commit(&[Change::Photos], move |state| {
            // Newest first.
            state.photos.insert(0, stored);
            Ok(())
        }) {
            self.discard_blob(&photo.storage_path);
            return Err(e);
        }

        audit::log_action(&actor.uid, "upload_photo", &photo.id);
        Ok(photo)
    }

    pub fn delete_photo(&self, actor: &Actor, photo_id: &str) -> Result<()> {
        self.require_admin(actor, "delete_photo")?;

        let storage_path = self.store.commit(&[Change::Photos], |state| {
            let index = state
                .photos
                .iter()
                .position(|p| p.id == photo_id)
                .ok_or_else(|| AppError::not_found("Photo", photo_id))?;
            Ok(state.photos.remove(index).storage_path)
        })?;
        self.discard_blob(&storage_path);

        audit::log_action(&actor.uid, "delete_photo", photo_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blobs::MemoryBlobStore;

    fn service() -> (ClubService, Arc<MemoryBlobStore>) {
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ClubService::new(
            Arc::new(Store::in_memory()),
            blobs.clone(),
            6,
            StrategyKind::Greedy,
            Some(42),
        );
        (service, blobs)
    }

    fn admin() -> Actor {
        Actor::admin("admin-uid")
    }

    fn guest() -> Actor {
        Actor::anonymous("guest-uid")
    }

    fn add(service: &ClubService, first: &str, skill: &str) -> Player {
        service
            .add_player(
                &guest(),
                NewPlayer {
                    first: first.to_string(),
                    last: "Tester".to_string(),
                    skill: skill.to_string(),
                },
                None,
            )
            .unwrap()
    }

    fn add_fourteen(service: &ClubService) -> Vec<Player> {
        let mut players = Vec::new();
        for i in 0..8 {
            players.push(add(service, &format!("B{}", i), "Beginner"));
        }
        for i in 0..4 {
            players.push(add(service, &format!("I{}", i), "Intermediate"));
        }
        for i in 0..2 {
            players.push(add(service, &format!("A{}", i), "Advanced"));
        }
        players
    }

    #[test]
    fn test_month_key() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(month_key(date), "2026-03");
    }

    #[test]
    fn test_generate_writes_every_player() {
        let (service, _) = service();
        let players = add_fourteen(&service);
        service.set_absent(&guest(), &players[0].id, true).unwrap();

        let balance = service.generate_teams(&admin()).unwrap();
        assert_eq!(balance.num_teams(), 2);
        assert_eq!(balance.bench.len(), 1);

        let state = service.snapshot();
        assert_eq!(state.assignments.len(), 14);
        assert_eq!(state.team_of(&players[0].id), None);
        let seated = state.assignments.values().filter(|r| r.team_id.is_some()).count();
        assert_eq!(seated, 12);
        assert_eq!(state.session.num_teams, Some(2));
        assert_eq!(state.session.team_size, Some(6));
    }

    #[test]
    fn test_absent_after_generation_is_cleared_on_regenerate() {
        let (service, _) = service();
        let players = add_fourteen(&service);
        service.generate_teams(&admin()).unwrap();

        let seated = players
            .iter()
            .find(|p| service.snapshot().team_of(&p.id).is_some())
            .unwrap()
            .clone();
        service.set_absent(&guest(), &seated.id, true).unwrap();
        service.generate_teams(&admin()).unwrap();

        assert_eq!(service.snapshot().team_of(&seated.id), None);
    }

    #[test]
    fn test_non_admin_cannot_mutate() {
        let (service, _) = service();
        let players = add_fourteen(&service);
        let before = service.snapshot();

        assert!(matches!(service.generate_teams(&guest()), Err(AppError::Unauthorized)));
        assert!(matches!(
            service.move_player(&guest(), &players[0].id, TeamTarget::Team(1), None),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(service.clear_assignments(&guest()), Err(AppError::Unauthorized)));
        assert!(matches!(service.adjust_wins(&guest(), 1, 1), Err(AppError::Unauthorized)));
        assert!(matches!(
            service.delete_player(&guest(), &players[0].id),
            Err(AppError::Unauthorized)
        ));

        assert_eq!(*service.snapshot(), *before);
    }

    #[test]
    fn test_move_player_without_team_validation() {
        let (service, _) = service();
        let players = add_fourteen(&service);

        let revision = service
            .move_player(&admin(), &players[3].id, TeamTarget::Team(9), None)
            .unwrap();
        assert_eq!(revision, 1);
        assert_eq!(service.snapshot().team_of(&players[3].id), Some(9));

        service
            .move_player(&admin(), &players[3].id, TeamTarget::Bench, None)
            .unwrap();
        assert_eq!(service.snapshot().team_of(&players[3].id), None);
    }

    #[test]
    fn test_move_player_expected_revision() {
        let (service, _) = service();
        let players = add_fourteen(&service);
        let id = &players[0].id;

        service.move_player(&admin(), id, TeamTarget::Team(1), Some(0)).unwrap();
        let stale = service.move_player(&admin(), id, TeamTarget::Team(2), Some(0));
        assert!(matches!(stale, Err(AppError::Conflict { actual: 1, .. })));
        assert_eq!(service.snapshot().team_of(id), Some(1));

        service.move_player(&admin(), id, TeamTarget::Team(2), Some(1)).unwrap();
        assert_eq!(service.snapshot().team_of(id), Some(2));
    }

    #[test]
    fn test_move_unknown_player() {
        let (service, _) = service();
        assert!(matches!(
            service.move_player(&admin(), "ghost", TeamTarget::Team(1), None),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_clear_assignments() {
        let (service, _) = service();
        add_fourteen(&service);
        service.generate_teams(&admin()).unwrap();
        service.clear_assignments(&admin()).unwrap();

        let state = service.snapshot();
        assert!(state.assignments.values().all(|r| r.team_id.is_none()));
        assert!(state.session.cleared_at.is_some());
    }

    #[test]
    fn test_wins_never_negative() {
        let (service, _) = service();
        assert_eq!(service.adjust_wins(&admin(), 1, -1).unwrap(), 0);
        assert_eq!(service.adjust_wins(&admin(), 1, 1).unwrap(), 1);
        assert_eq!(service.adjust_wins(&admin(), 1, 1).unwrap(), 2);
        assert_eq!(service.adjust_wins(&admin(), 1, -1).unwrap(), 1);
        assert_eq!(service.snapshot().wins_in(&current_month(), 1), 1);

        service.reset_wins(&admin()).unwrap();
        assert_eq!(service.snapshot().wins_in(&current_month(), 1), 0);
        assert!(matches!(service.adjust_wins(&admin(), 0, 1), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_wins_step_by_one_and_saturate() {
        let (service, _) = service();
        assert!(matches!(service.adjust_wins(&admin(), 1, 5), Err(AppError::Validation(_))));
        assert!(matches!(service.adjust_wins(&admin(), 1, 0), Err(AppError::Validation(_))));
        assert!(matches!(
            service.adjust_wins(&admin(), 1, i32::MIN),
            Err(AppError::Validation(_))
        ));

        let month = current_month();
        service
            .store()
            .commit(&[Change::Wins], |state| {
                state.wins.entry(month.clone()).or_default().insert(
                    2,
                    WinRecord {
                        count: u32::MAX,
                        updated_at: Utc::now(),
                        updated_by: "admin".to_string(),
                    },
                );
                Ok(())
            })
            .unwrap();

        assert_eq!(service.adjust_wins(&admin(), 2, 1).unwrap(), u32::MAX);
        assert_eq!(service.adjust_wins(&admin(), 2, -1).unwrap(), u32::MAX - 1);
    }

    #[test]
    fn test_failed_delete_keeps_photos() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let blobs = Arc::new(MemoryBlobStore::new());
        let service = ClubService::new(
            Arc::new(Store::open(data_dir.join("club.json")).unwrap()),
            blobs.clone(),
            6,
            StrategyKind::Greedy,
            Some(1),
        );

        let player = service
            .add_player(
                &guest(),
                NewPlayer {
                    first: "Keep".to_string(),
                    last: "Me".to_string(),
                    skill: "Beginner".to_string(),
                },
                Some(b"jpg"),
            )
            .unwrap();
        let photo = service.upload_photo(&guest(), b"game").unwrap();

        std::fs::remove_dir_all(&data_dir).unwrap();

        assert!(matches!(
            service.delete_player(&admin(), &player.id),
            Err(AppError::PersistenceFailure(_))
        ));
        assert!(matches!(
            service.delete_photo(&admin(), &photo.id),
            Err(AppError::PersistenceFailure(_))
        ));

        let state = service.snapshot();
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.photos.len(), 1);
        assert_eq!(blobs.get(&player.photo_storage_path), Some(b"jpg".to_vec()));
        assert_eq!(blobs.get(&photo.storage_path), Some(b"game".to_vec()));
    }

    #[test]
    fn test_generate_sees_latest_attendance() {
        let (service, _) = service();
        let players = add_fourteen(&service);
        service.generate_teams(&admin()).unwrap();

        for player in players.iter().take(3) {
            service.set_absent(&guest(), &player.id, true).unwrap();
        }
        service.generate_teams(&admin()).unwrap();

        let state = service.snapshot();
        for player in players.iter().take(3) {
            assert_eq!(state.team_of(&player.id), None);
        }
        // 11 present: one team of 6, five on the bench.
        let seated = state.assignments.values().filter(|r| r.team_id.is_some()).count();
        assert_eq!(seated, 6);
    }

    #[test]
    fn test_add_player_validation_and_defaults() {
        let (service, blobs) = service();
        let missing = service.add_player(
            &guest(),
            NewPlayer {
                first: "  ".to_string(),
                last: "X".to_string(),
                skill: String::new(),
            },
            None,
        );
        assert!(matches!(missing, Err(AppError::Validation(_))));

        let player = service
            .add_player(
                &guest(),
                NewPlayer {
                    first: " Ada ".to_string(),
                    last: "Lovelace".to_string(),
                    skill: String::new(),
                },
                Some(b"png"),
            )
            .unwrap();
        assert_eq!(player.first, "Ada");
        assert_eq!(player.skill, "Beginner");
        assert!(player.photo_storage_path.starts_with("playerPhotos/"));
        assert_eq!(blobs.get(&player.photo_storage_path), Some(b"png".to_vec()));
        assert_eq!(player.created_by, "guest-uid");
    }

    #[test]
    fn test_delete_player_cleans_up() {
        let (service, blobs) = service();
        let player = service
            .add_player(
                &guest(),
                NewPlayer {
                    first: "Del".to_string(),
                    last: "Me".to_string(),
                    skill: "Advanced".to_string(),
                },
                Some(b"jpg"),
            )
            .unwrap();
        service.set_absent(&guest(), &player.id, true).unwrap();
        service
            .move_player(&admin(), &player.id, TeamTarget::Team(1), None)
            .unwrap();

        service.delete_player(&admin(), &player.id).unwrap();

        let state = service.snapshot();
        assert!(state.players.is_empty());
        assert!(state.attendance.is_empty());
        assert!(state.assignments.is_empty());
        assert!(blobs.is_empty());
    }

    #[test]
    fn test_delete_player_ignores_missing_blob() {
        let (service, blobs) = service();
        let player = service
            .add_player(
                &guest(),
                NewPlayer {
                    first: "Gone".to_string(),
                    last: "Photo".to_string(),
                    skill: "Beginner".to_string(),
                },
                Some(b"jpg"),
            )
            .unwrap();
        blobs.delete(&player.photo_storage_path).unwrap();

        service.delete_player(&admin(), &player.id).unwrap();
        assert!(service.snapshot().players.is_empty());
    }

    #[test]
    fn test_set_player_photo_replaces_blob() {
        let (service, blobs) = service();
        let player = add(&service, "Pic", "Beginner");

        let first = service.set_player_photo(&guest(), &player.id, b"one").unwrap();
        let second = service.set_player_photo(&guest(), &player.id, b"two").unwrap();

        assert_ne!(first.photo_storage_path, second.photo_storage_path);
        assert_eq!(blobs.get(&first.photo_storage_path), None);
        assert_eq!(blobs.get(&second.photo_storage_path), Some(b"two".to_vec()));
        assert!(matches!(
            service.set_player_photo(&guest(), "ghost", b"x"),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_prize_save_and_clear() {
        let (service, blobs) = service();

        let prize = service
            .save_prize(&admin(), Some(" Golden Ball "), Some(b"gold"))
            .unwrap();
        assert_eq!(prize.name, "Golden Ball");
        assert_eq!(prize.storage_path, "prize/current");
        assert_eq!(blobs.get("prize/current"), Some(b"gold".to_vec()));

        let renamed = service.save_prize(&admin(), Some("Silver Ball"), None).unwrap();
        assert_eq!(renamed.photo_url, prize.photo_url);

        service.clear_prize(&admin()).unwrap();
        let state = service.snapshot();
        assert!(state.prize.name.is_empty());
        assert!(state.prize.photo_url.is_empty());
        assert_eq!(state.prize.storage_path, "prize/current");

        assert!(matches!(
            service.save_prize(&guest(), Some("x"), None),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn test_gallery_upload_and_delete() {
        let (service, blobs) = service();

        let older = service.upload_photo(&guest(), b"first").unwrap();
        let newer = service.upload_photo(&guest(), b"second").unwrap();
        let ids: Vec<String> = service.snapshot().photos.iter().map(|p| p.id.clone()).collect();
        assert_eq!(ids, vec![newer.id.clone(), older.id.clone()]);

        assert!(matches!(service.upload_photo(&guest(), b""), Err(AppError::Validation(_))));
        assert!(matches!(
            service.delete_photo(&guest(), &older.id),
            Err(AppError::Unauthorized)
        ));

        service.delete_photo(&admin(), &older.id).unwrap();
        assert_eq!(service.snapshot().photos.len(), 1);
        assert_eq!(blobs.len(), 1);
        assert!(matches!(
            service.delete_photo(&admin(), &older.id),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_seeded_service_is_reproducible() {
        let run = || {
            let (service, _) = service();
            let players = add_fourteen(&service);
            let balance = service.generate_teams(&admin()).unwrap();
            // Ids are random per run; compare by roster position instead.
            let mut positions: Vec<(u32, usize)> = balance
                .teams
                .iter()
                .flat_map(|t| {
                    let players = &players;
                    t.members.iter().map(move |s| {
                        (t.id, players.iter().position(|p| p.id == s.player_id).unwrap())
                    })
                })
                .collect();
            positions.sort();
            positions
        };
        assert_eq!(run(), run());
    }
}
