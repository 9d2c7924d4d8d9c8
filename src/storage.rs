//! Catalog persistence: one `SQLite` row per author.
//!
//! The ship list (with embedded updates) is stored as a JSON document in the
//! `ships` column, mirroring the document-oriented layout the rest of the
//! engine works with. Multi-author writes go through one transaction: either
//! every affected author is written or none is.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::Connection;

use crate::model::{Author, Ship};
use crate::reconcile::merge_into;

/// Errors that can occur during catalog operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("author not found: {0}")]
    AuthorNotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored ship document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// How `sync` treats an author that already has a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Push new ships and new updates onto the stored list without touching
    /// entries that gained nothing. Routine incremental polls use this.
    Append,

    /// Overwrite the stored ship list wholesale. Used after a reconciliation
    /// pass that may have removed duplicates.
    Replace,
}

/// What one `sync` call did, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

/// SQLite-backed author catalog.
pub struct Catalog {
    conn: Connection,
}

impl Catalog {
    /// Opens (creating if needed) the catalog database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS authors (
                 id    TEXT PRIMARY KEY,
                 name  TEXT NOT NULL,
                 ships TEXT NOT NULL
             )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Loads every author, ordered by id.
    pub fn load_authors(&self) -> Result<Vec<Author>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, ships FROM authors ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut authors = Vec::new();
        for row in rows {
            let (id, name, ships_json) = row?;
            authors.push(Author {
                id,
                name,
                ships: serde_json::from_str(&ships_json)?,
            });
        }
        Ok(authors)
    }

    /// Loads a single author.
    pub fn get_author(&self, id: &str) -> Result<Author> {
        let row = self
            .conn
            .query_row(
                "SELECT name, ships FROM authors WHERE id = ?1",
                [id],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    StorageError::AuthorNotFound(id.to_string())
                }
                other => other.into(),
            })?;
        let (name, ships_json) = row;
        Ok(Author {
            id: id.to_string(),
            name,
            ships: serde_json::from_str(&ships_json)?,
        })
    }

    /// Commits the given authors in one transaction.
    ///
    /// Authors without a row are inserted; authors with one are written
    /// according to `mode`. A failure anywhere rolls the whole batch back,
    /// leaving the catalog exactly as it was.
    pub fn sync(&mut self, authors: &BTreeMap<String, Author>, mode: SyncMode) -> Result<SyncReport> {
        let tx = self.conn.transaction()?;
        let mut report = SyncReport::default();

        for (id, author) in authors {
            let stored: Option<String> = tx
                .query_row("SELECT ships FROM authors WHERE id = ?1", [id], |row| {
                    row.get(0)
                })
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;

            match stored {
                None => {
                    tx.execute(
                        "INSERT INTO authors (id, name, ships) VALUES (?1, ?2, ?3)",
                        rusqlite::params![id, &author.name, serde_json::to_string(&author.ships)?],
                    )?;
                    report.inserted += 1;
                }
                Some(ships_json) => {
                    let ships = match mode {
                        SyncMode::Replace => author.ships.clone(),
                        SyncMode::Append => {
                            let mut stored_ships: Vec<Ship> = serde_json::from_str(&ships_json)?;
                            if !merge_into(&mut stored_ships, &author.ships) {
                                report.unchanged += 1;
                                continue;
                            }
                            stored_ships
                        }
                    };
                    tx.execute(
                        "UPDATE authors SET ships = ?1 WHERE id = ?2",
                        rusqlite::params![serde_json::to_string(&ships)?, id],
                    )?;
                    report.updated += 1;
                }
            }
        }

        tx.commit()?;
        Ok(report)
    }
}
