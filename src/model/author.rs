//! Author records: one per catalog row.

use serde::{Deserialize, Serialize};

use super::Ship;

/// An author and their ships. `id` is the opaque external identity from the
/// chat platform; `name` is the resolved display name, possibly empty when
/// profile lookup was unavailable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub ships: Vec<Ship>,
}
