//! Reconciliation: canonicalize a per-author ship collection.
//!
//! Pure and idempotent — `reconcile(reconcile(x)) == reconcile(x)`. Input
//! may be freshly aggregated, freshly loaded from storage, or a mix; output
//! is the canonical form:
//!
//! 1. Ships are grouped by name; a group's updates are unioned in
//!    first-appearance order.
//! 2. Updates are deduplicated by description. When duplicates disagree on
//!    hours, the larger value wins — unlike "most recently seen" it does not
//!    depend on page order or redelivery, which keeps the pass idempotent.
//! 3. A ship with updates gets `hours` recomputed as the sum of its updates'
//!    hours; a ship with none keeps its parsed figure.

use std::collections::{BTreeMap, HashMap};

use crate::model::{Ship, Update};

/// Malformed input is reported, never coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconcileError {
    #[error("negative hours ({hours}) on \"{ship}\" for author {author_id}")]
    NegativeHours {
        author_id: String,
        ship: String,
        hours: i64,
    },
}

pub type Result<T> = core::result::Result<T, ReconcileError>;

/// Canonicalizes every author's ship list.
pub fn reconcile(authors: &BTreeMap<String, Vec<Ship>>) -> Result<BTreeMap<String, Vec<Ship>>> {
    authors
        .iter()
        .map(|(author_id, ships)| Ok((author_id.clone(), reconcile_ships(author_id, ships)?)))
        .collect()
}

/// Canonicalizes one author's ship list. Ship order follows first
/// appearance of each name.
pub fn reconcile_ships(author_id: &str, ships: &[Ship]) -> Result<Vec<Ship>> {
    validate(author_id, ships)?;

    let mut canonical: Vec<Ship> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for ship in ships {
        match by_name.get(&ship.name) {
            Some(&i) => {
                for update in &ship.updates {
                    absorb_update(&mut canonical[i].updates, update);
                }
            }
            None => {
                by_name.insert(ship.name.clone(), canonical.len());
                let mut first = ship.clone();
                let mut updates = Vec::new();
                for update in &first.updates {
                    absorb_update(&mut updates, update);
                }
                first.updates = updates;
                canonical.push(first);
            }
        }
    }

    for ship in &mut canonical {
        if !ship.updates.is_empty() {
            ship.hours = ship.updates.iter().map(|u| u.hours).sum();
        }
    }

    Ok(canonical)
}

/// Append-mode merge: folds `incoming` (canonical) into `existing` without
/// touching entries that gained nothing. Returns whether anything changed.
///
/// New names are appended; existing ships only gain updates with unseen
/// descriptions (hours resummed when they do). This is what makes
/// re-observing the same announcement across overlapping poll windows a
/// no-op.
pub fn merge_into(existing: &mut Vec<Ship>, incoming: &[Ship]) -> bool {
    let mut changed = false;

    for ship in incoming {
        match existing.iter_mut().find(|s| s.name == ship.name) {
            Some(current) => {
                let mut gained = false;
                for update in &ship.updates {
                    if absorb_update(&mut current.updates, update) {
                        gained = true;
                    }
                }
                if gained {
                    current.hours = current.updates.iter().map(|u| u.hours).sum();
                    changed = true;
                }
            }
            None => {
                existing.push(ship.clone());
                changed = true;
            }
        }
    }

    changed
}

/// Folds one update into a deduplicated list. Returns whether the list
/// changed: a new description, or a larger hours figure for a known one.
fn absorb_update(updates: &mut Vec<Update>, update: &Update) -> bool {
    match updates.iter_mut().find(|u| u.description == update.description) {
        Some(current) => {
            if update.hours > current.hours {
                current.hours = update.hours;
                true
            } else {
                false
            }
        }
        None => {
            updates.push(update.clone());
            true
        }
    }
}

fn validate(author_id: &str, ships: &[Ship]) -> Result<()> {
    for ship in ships {
        let negative = std::iter::once(ship.hours)
            .chain(ship.updates.iter().map(|u| u.hours))
            .find(|&h| h < 0);
        if let Some(hours) = negative {
            return Err(ReconcileError::NegativeHours {
                author_id: author_id.to_string(),
                ship: ship.name.clone(),
                hours,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(description: &str, hours: i64) -> Update {
        Update {
            description: description.into(),
            hours,
        }
    }

    fn ship(name: &str, hours: i64, updates: Vec<Update>) -> Ship {
        Ship {
            name: name.into(),
            repo: format!("https://git.example/{name}"),
            demo: format!("https://demo.example/{name}"),
            preview: String::new(),
            hours,
            updates,
        }
    }

    #[test]
    fn merges_duplicate_ship_names() {
        let ships = vec![
            ship("Boat", 5, vec![update("polish", 2)]),
            ship("Raft", 3, vec![]),
            ship("Boat", 5, vec![update("rigging", 4)]),
        ];

        let canonical = reconcile_ships("U1", &ships).unwrap();
        assert_eq!(canonical.len(), 2);
        assert_eq!(canonical[0].name, "Boat");
        assert_eq!(canonical[0].updates.len(), 2);
        assert_eq!(canonical[1].name, "Raft");
    }

    #[test]
    fn dedups_updates_keeping_larger_hours() {
        let ships = vec![ship(
            "Boat",
            5,
            vec![update("polish", 2), update("polish", 7), update("polish", 3)],
        )];

        let canonical = reconcile_ships("U1", &ships).unwrap();
        assert_eq!(canonical[0].updates, [update("polish", 7)]);
        assert_eq!(canonical[0].hours, 7);
    }

    #[test]
    fn hours_resummed_when_updates_present() {
        let ships = vec![ship("Boat", 99, vec![update("polish", 2), update("rigging", 4)])];

        let canonical = reconcile_ships("U1", &ships).unwrap();
        assert_eq!(canonical[0].hours, 6);
    }

    #[test]
    fn hours_preserved_without_updates() {
        let ships = vec![ship("Boat", 5, vec![])];

        let canonical = reconcile_ships("U1", &ships).unwrap();
        assert_eq!(canonical[0].hours, 5);
    }

    #[test]
    fn idempotent() {
        let mut authors = BTreeMap::new();
        authors.insert(
            "U1".to_string(),
            vec![
                ship("Boat", 5, vec![update("polish", 2), update("polish", 7)]),
                ship("Boat", 5, vec![update("rigging", 1)]),
                ship("Raft", 3, vec![]),
            ],
        );

        let once = reconcile(&authors).unwrap();
        let twice = reconcile(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn negative_hours_reported() {
        let ships = vec![ship("Boat", 5, vec![update("polish", -2)])];

        let err = reconcile_ships("U1", &ships).unwrap_err();
        assert_eq!(
            err,
            ReconcileError::NegativeHours {
                author_id: "U1".into(),
                ship: "Boat".into(),
                hours: -2,
            }
        );
    }

    #[test]
    fn merge_into_ignores_redelivered_ship() {
        let mut existing = vec![ship("Raft", 3, vec![])];
        let changed = merge_into(&mut existing, &[ship("Raft", 3, vec![])]);

        assert!(!changed);
        assert_eq!(existing.len(), 1);
    }

    #[test]
    fn merge_into_appends_new_ship_and_updates() {
        let mut existing = vec![ship("Raft", 3, vec![])];
        let incoming = vec![
            ship("Raft", 2, vec![update("sail", 2)]),
            ship("Boat", 5, vec![]),
        ];

        let changed = merge_into(&mut existing, &incoming);
        assert!(changed);
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[0].updates, [update("sail", 2)]);
        assert_eq!(existing[0].hours, 2);
        assert_eq!(existing[1].name, "Boat");
    }

    #[test]
    fn merge_into_skips_known_descriptions() {
        let mut existing = vec![ship("Raft", 2, vec![update("sail", 2)])];
        let incoming = vec![ship("Raft", 2, vec![update("sail", 2)])];

        assert!(!merge_into(&mut existing, &incoming));
        assert_eq!(existing[0].updates.len(), 1);
    }
}
