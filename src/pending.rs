//! Pending-reference buffer: updates observed before their parent ship.
//!
//! Pages arrive newest-first, so an update is frequently seen before the
//! ship it belongs to. Unresolved updates are parked here, keyed by
//! `(author_id, ship_name)`, and drained the moment the matching ship is
//! parsed — in the same cycle or any later one. The buffer is backed by
//! `pending.json` in the data directory so a restart loses nothing.
//!
//! Access is scoped: [`PendingStore::with`] loads the file, runs the caller's
//! closure, and writes the buffer back only when the closure succeeds. A
//! cycle that aborts mid-way leaves the file exactly as it found it, so an
//! update drained into a unit of work that never commits is not lost.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::{fs, io};

use serde::{Deserialize, Serialize};

use crate::model::Update;

/// Errors touching the durable buffer. These are operator-fatal: silently
/// dropping the buffer would lose in-flight update references.
#[derive(Debug, thiserror::Error)]
pub enum PendingError {
    #[error("I/O error on pending buffer: {0}")]
    Io(#[from] io::Error),

    #[error("pending buffer is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, PendingError>;

/// In-memory pending map: `author_id -> ship_name -> updates`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingBuffer {
    entries: BTreeMap<String, BTreeMap<String, Vec<Update>>>,
}

impl PendingBuffer {
    /// Updates parked for `(author_id, ship_name)`, empty if none.
    pub fn lookup(&self, author_id: &str, ship_name: &str) -> &[Update] {
        self.entries
            .get(author_id)
            .and_then(|ships| ships.get(ship_name))
            .map_or(&[], Vec::as_slice)
    }

    /// Parks an update for a ship that hasn't been observed yet.
    pub fn append(&mut self, author_id: &str, ship_name: &str, update: Update) {
        self.entries
            .entry(author_id.to_string())
            .or_default()
            .entry(ship_name.to_string())
            .or_default()
            .push(update);
    }

    /// Returns and clears the updates parked for `(author_id, ship_name)`.
    pub fn drain(&mut self, author_id: &str, ship_name: &str) -> Vec<Update> {
        let Some(ships) = self.entries.get_mut(author_id) else {
            return Vec::new();
        };
        let drained = ships.remove(ship_name).unwrap_or_default();
        if ships.is_empty() {
            self.entries.remove(author_id);
        }
        drained
    }

    /// True when no updates are parked anywhere.
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|ships| ships.values().all(Vec::is_empty))
    }

    /// Iterates over all parked entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &[Update])> {
        self.entries.iter().flat_map(|(author, ships)| {
            ships
                .iter()
                .map(move |(ship, updates)| (author.as_str(), ship.as_str(), updates.as_slice()))
        })
    }

    /// Drops entries that hold no updates, so they don't accrete on disk.
    fn prune(&mut self) {
        for ships in self.entries.values_mut() {
            ships.retain(|_, updates| !updates.is_empty());
        }
        self.entries.retain(|_, ships| !ships.is_empty());
    }
}

/// Durable backing for the pending buffer.
pub struct PendingStore {
    path: PathBuf,
}

impl PendingStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the buffer from disk. A missing file is a valid empty buffer.
    pub fn load(&self) -> Result<PendingBuffer> {
        let json = match fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(PendingBuffer::default());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Writes the buffer back, pruning empty entries first.
    pub fn save(&self, buffer: &PendingBuffer) -> Result<()> {
        let mut pruned = buffer.clone();
        pruned.prune();
        let json = serde_json::to_string_pretty(&pruned)?;
        fs::write(&self.path, json)?;
        Ok(())
    }

    /// Scoped acquisition: load, run, write back on success.
    ///
    /// When the closure fails, the file is left as it was at load time —
    /// drains and appends made by the failed unit of work are discarded,
    /// never persisted.
    pub fn with<T, E>(
        &self,
        f: impl FnOnce(&mut PendingBuffer) -> core::result::Result<T, E>,
    ) -> core::result::Result<T, E>
    where
        E: From<PendingError>,
    {
        let mut buffer = self.load()?;
        let value = f(&mut buffer)?;
        self.save(&buffer)?;
        Ok(value)
    }
}
