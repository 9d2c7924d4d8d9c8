//! Core data model for Archipelago.
//!
//! Ships, updates, and authors are the catalog documents persisted per
//! author; facts and raw messages are the ingestion-side shapes that feed
//! them.

mod author;
mod fact;
mod message;
mod ship;

pub use author::Author;
pub use fact::{Fact, ShipFact, UpdateFact};
pub use message::{Page, RawMessage};
pub use ship::{Ship, Update};
