//! Ship and update documents: what an author has built and how it grew.

use serde::{Deserialize, Serialize};

/// An incremental progress report attached to a ship.
///
/// Identity for dedup purposes is `description`: two updates with equal
/// descriptions are the same observation, whatever their hours say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub description: String,

    /// Hours spent on this increment. Stored signed so corrupt documents
    /// carrying negative values are detectable rather than silently wrapped.
    pub hours: i64,
}

/// A submitted project, identified by name within one author's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ship {
    pub name: String,

    // URLs from the announcement.
    pub repo: String,
    pub demo: String,
    pub preview: String,

    /// Cumulative effort. When `updates` is non-empty this must equal the
    /// sum of the updates' hours — reconciliation enforces that, not the
    /// parser.
    pub hours: i64,

    #[serde(default)]
    pub updates: Vec<Update>,
}
