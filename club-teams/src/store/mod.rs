//! Club state container.
//!
//! Readers take immutable snapshots; writers go through [`Store::commit`],
//! which applies a mutation to a copy, persists the whole document and only
//! then publishes it. Every successful commit is announced on a broadcast
//! channel so live views can refresh.

pub mod records;
pub mod sink;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{AppError, Result};

pub use records::{AssignmentRecord, ClubState, Photo, Prize, SessionMeta, WinRecord};
pub use sink::{AssignmentBatch, AssignmentSink, BatchKind};

const EVENT_CAPACITY: usize = 64;

/// Which part of the state a commit touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Change {
    Players,
    Attendance,
    Assignments,
    Session,
    Wins,
    Prize,
    Photos,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreEvent {
    pub revision: u64,
    pub changes: Vec<Change>,
}

struct Inner {
    state: Arc<ClubState>,
    revision: u64,
}

pub struct Store {
    inner: RwLock<Inner>,
    path: Option<PathBuf>,
    events: broadcast::Sender<StoreEvent>,
}

impl Store {
    /// A store that lives only in memory.
    pub fn in_memory() -> Self {
        Self::with_state(ClubState::default(), None)
    }

    /// Loads the document at `path`, or starts empty if it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).map_err(|e| {
                AppError::PersistenceFailure(format!(
                    "Failed to parse {}: {}",
                    path.display(),
                    e
                ))
            })?
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            ClubState::default()
        };

        tracing::info!(
            path = %path.display(),
            players = state.players.len(),
            "Club store opened"
        );

        Ok(Self::with_state(state, Some(path)))
    }

    fn with_state(state: ClubState, path: Option<PathBuf>) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(Inner {
                state: Arc::new(state),
                revision: 0,
            }),
            path,
            events,
        }
    }

    pub fn snapshot(&self) -> Arc<ClubState> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .clone()
    }

    pub fn revision(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .revision
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    /// Applies `mutate` atomically.
    ///
    /// If `mutate` fails or the document cannot be written, neither memory nor
    /// disk changes and no event is sent.
    pub fn commit<T, F>(&self, changes: &[Change], mutate: F) -> Result<T>
    where
        F: FnOnce(&mut ClubState) -> Result<T>,
    {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let mut next = ClubState::clone(&inner.state);
        let output = mutate(&mut next)?;

        if let Some(path) = &self.path {
            persist(path, &next)?;
        }

        inner.state = Arc::new(next);
        inner.revision += 1;
        let event = StoreEvent {
            revision: inner.revision,
            changes: changes.to_vec(),
        };
        drop(inner);

        tracing::debug!(revision = event.revision, changes = ?event.changes, "Committed");
        // No subscribers is fine.
        let _ = self.events.send(event);

        Ok(output)
    }
}

/// Writes to a sibling temp file and renames it over the target.
fn persist(path: &Path, state: &ClubState) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(state)
        .map_err(|e| AppError::PersistenceFailure(format!("Failed to encode state: {}", e)))?;

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, &bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
