//! Batch aggregator: folds parsed facts into a per-author working set.
//!
//! Pages are scanned newest-first, so an update usually precedes the ship it
//! belongs to. Resolution is explicit and two-phase: a ship fact drains the
//! pending buffer for its name; an update fact attaches directly when its
//! ship is already in the working set and is parked in the buffer otherwise,
//! to be resolved by a later page — or a later cycle entirely.
//!
//! The working set tolerates transient same-name duplicates; reconciliation
//! is the only place dedup happens.

use std::collections::BTreeMap;

use crate::model::{Fact, Ship};
use crate::pending::PendingBuffer;

/// Per-author ship lists accumulated across the pages of one cycle.
#[derive(Debug, Default)]
pub struct WorkingSet {
    authors: BTreeMap<String, Vec<Ship>>,
}

impl WorkingSet {
    /// Folds one page's worth of facts into the working set.
    pub fn absorb(&mut self, facts: impl IntoIterator<Item = Fact>, pending: &mut PendingBuffer) {
        for fact in facts {
            self.absorb_fact(fact, pending);
        }
    }

    fn absorb_fact(&mut self, fact: Fact, pending: &mut PendingBuffer) {
        match fact {
            Fact::Ship(ship) => {
                let drained = pending.drain(&ship.author_id, &ship.name);
                let author = ship.author_id.clone();
                // Same-name duplicates stay side by side here; reconciliation
                // merges them without dropping either copy's updates.
                self.authors
                    .entry(author)
                    .or_default()
                    .push(ship.into_ship(drained));
            }
            Fact::Update(update) => {
                let known = self
                    .authors
                    .get_mut(&update.author_id)
                    .and_then(|ships| ships.iter_mut().find(|s| s.name == update.ship_name));
                match known {
                    Some(ship) => ship.updates.push(update.into_update()),
                    None => {
                        let author_id = update.author_id.clone();
                        let ship_name = update.ship_name.clone();
                        pending.append(&author_id, &ship_name, update.into_update());
                    }
                }
            }
        }
    }

    /// Adds a ship directly, bypassing fact resolution. Used for parked
    /// updates resolved against ships already persisted by earlier cycles.
    pub fn push_ship(&mut self, author_id: &str, ship: Ship) {
        self.authors.entry(author_id.to_string()).or_default().push(ship);
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }

    pub fn authors(&self) -> &BTreeMap<String, Vec<Ship>> {
        &self.authors
    }

    pub fn into_authors(self) -> BTreeMap<String, Vec<Ship>> {
        self.authors
    }
}
