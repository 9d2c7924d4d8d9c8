//! Parsed facts: the structured output of the record parser.

use super::{Ship, Update};

/// A new ship announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipFact {
    pub author_id: String,
    pub name: String,
    pub repo: String,
    pub demo: String,
    pub preview: String,
    pub hours: i64,
}

/// A progress report referencing a ship by name. The named ship may not have
/// been observed yet — pages arrive newest-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateFact {
    pub author_id: String,
    pub ship_name: String,
    pub description: String,
    pub hours: i64,
}

/// One message's worth of structured information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fact {
    Ship(ShipFact),
    Update(UpdateFact),
}

impl ShipFact {
    /// Builds the ship document, attaching any updates resolved from the
    /// pending buffer.
    pub fn into_ship(self, updates: Vec<Update>) -> Ship {
        Ship {
            name: self.name,
            repo: self.repo,
            demo: self.demo,
            preview: self.preview,
            hours: self.hours,
            updates,
        }
    }
}

impl UpdateFact {
    pub fn into_update(self) -> Update {
        Update {
            description: self.description,
            hours: self.hours,
        }
    }
}
