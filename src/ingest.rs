//! Poll driver: one ingestion cycle from channel history to catalog.
//!
//! A cycle retrieves pages newest-first over a bounded window, feeds each
//! page through the parser and aggregator, reconciles the result, and
//! commits it in one transaction. The pending buffer is held under scoped
//! acquisition for the whole cycle — through the storage commit — and its
//! write-back only happens once that commit succeeds, so an abort anywhere
//! leaves both the catalog and the buffer as they were.
//!
//! Cycles never overlap: the engine runs them on `&mut self`, and the
//! surrounding scheduler (the `watch` command, or one-shot CLI invocations)
//! is strictly sequential.

use std::collections::{BTreeMap, HashMap};

use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::aggregate::WorkingSet;
use crate::model::{Author, Ship};
use crate::parse::parse_message;
use crate::pending::{PendingError, PendingStore};
use crate::reconcile::{ReconcileError, reconcile};
use crate::source::{MessageSource, ProfileLookup, SourceError};
use crate::storage::{Catalog, StorageError, SyncMode, SyncReport};

/// Everything that can fail an ingestion cycle. Parse rejections are not
/// here — they are skipped per message, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("upstream retrieval failed: {0}")]
    Source(#[from] SourceError),

    #[error(transparent)]
    Pending(#[from] PendingError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T> = core::result::Result<T, IngestError>;

/// The upstream source rejects pages larger than this.
pub const MAX_PAGE_SIZE: usize = 999;

/// Tunables for the poll driver.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Channel to poll.
    pub channel: String,

    /// User id of the herald bot whose messages carry announcements.
    /// Everything else on the channel is skipped unparsed.
    pub herald: String,

    /// Records per page, clamped to [`MAX_PAGE_SIZE`].
    pub page_size: usize,

    /// Parsed-fact budget for one incremental cycle.
    pub budget: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            channel: String::new(),
            herald: String::new(),
            page_size: MAX_PAGE_SIZE,
            budget: 10_000,
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Facts parsed across all pages.
    pub facts: usize,

    /// Messages skipped as non-conforming.
    pub rejected: usize,

    /// Pages retrieved.
    pub pages: usize,

    /// Cursor to resume from when the cycle stopped on budget.
    pub next_cursor: Option<String>,

    /// True when the source ran out of history (or signalled early exit)
    /// rather than the budget running out.
    pub exhausted: bool,

    pub sync: SyncReport,
}

/// Totals across a bulk load.
#[derive(Debug, Clone, Copy, Default)]
pub struct BulkReport {
    pub cycles: usize,
    pub facts: usize,
}

/// The ingestion engine: poll driver plus its collaborators and the
/// display-name cache, all explicit state — nothing process-wide.
pub struct Engine<S, P> {
    source: S,
    profiles: P,
    catalog: Catalog,
    pending: PendingStore,
    settings: Settings,
    names: HashMap<String, String>,
}

impl<S: MessageSource, P: ProfileLookup> Engine<S, P> {
    pub fn new(
        source: S,
        profiles: P,
        catalog: Catalog,
        pending: PendingStore,
        mut settings: Settings,
    ) -> Self {
        settings.page_size = settings.page_size.clamp(1, MAX_PAGE_SIZE);
        Self {
            source,
            profiles,
            catalog,
            pending,
            settings,
            names: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Runs one poll-aggregate-reconcile-sync cycle over `[oldest, now)`.
    ///
    /// Idempotent when re-invoked with overlapping windows: reconciliation
    /// and append-mode sync absorb re-observed records.
    pub fn run_incremental_cycle(&mut self, oldest: Timestamp) -> Result<CycleReport> {
        let budget = self.settings.budget;
        self.cycle(oldest, None, budget)
    }

    /// Historical backfill: repeated cycles until `limit` facts are
    /// processed or the source is exhausted. Each cycle commits on its own,
    /// so an abort keeps everything loaded so far.
    pub fn bulk_load(&mut self, limit: usize, oldest: Timestamp) -> Result<BulkReport> {
        let mut report = BulkReport::default();
        let mut remaining = limit;
        let mut cursor: Option<String> = None;

        while remaining > 0 {
            let per_cycle = remaining.min(self.settings.budget);
            let cycle = self.cycle(oldest, cursor.take(), per_cycle)?;
            report.cycles += 1;
            report.facts += cycle.facts;
            remaining = remaining.saturating_sub(cycle.facts);

            if cycle.exhausted || cycle.next_cursor.is_none() {
                break;
            }
            cursor = cycle.next_cursor;
        }

        info!(cycles = report.cycles, facts = report.facts, "bulk load finished");
        Ok(report)
    }

    /// Re-runs reconciliation over persisted state and writes it back.
    /// Touches storage only — never the pending buffer — so it may run
    /// alongside a scheduled cycle.
    pub fn force_cleanup(&mut self) -> Result<SyncReport> {
        force_cleanup(&mut self.catalog)
    }

    fn cycle(
        &mut self,
        oldest: Timestamp,
        cursor: Option<String>,
        budget: usize,
    ) -> Result<CycleReport> {
        let settings = self.settings.clone();
        let source = &mut self.source;
        let catalog = &mut self.catalog;
        let profiles = &mut self.profiles;
        let names = &mut self.names;

        // Everything that can fail runs inside the buffer scope: drains are
        // only written back once the catalog transaction has committed.
        self.pending.with(|pending| -> Result<CycleReport> {
            let mut working = WorkingSet::default();
            let mut facts = 0;
            let mut rejected = 0;
            let mut pages = 0;
            let mut cursor = cursor;
            let mut exhausted = false;

            loop {
                let page = source.fetch_page(
                    &settings.channel,
                    oldest,
                    cursor.as_deref(),
                    settings.page_size,
                )?;
                pages += 1;

                let mut page_facts = Vec::new();
                for message in &page.messages {
                    if message.author_id != settings.herald {
                        continue;
                    }
                    match parse_message(message) {
                        Ok(fact) => page_facts.push(fact),
                        Err(rejection) => {
                            rejected += 1;
                            warn!(%rejection, "skipping non-conforming message");
                        }
                    }
                }

                let count = page_facts.len();
                working.absorb(page_facts, pending);
                facts += count;
                debug!(
                    page = pages,
                    messages = page.messages.len(),
                    facts = count,
                    "page aggregated"
                );

                // A page with no herald facts is the source's early-exit
                // signal; no cursor means the history ran out.
                if page.next_cursor.is_none() || count == 0 {
                    exhausted = true;
                    cursor = None;
                    break;
                }
                cursor = page.next_cursor;
                if facts >= budget {
                    break;
                }
            }

            // Parked updates whose ship was persisted by an earlier cycle
            // resolve against the catalog instead of waiting for the ship
            // to be re-observed.
            let parked: Vec<(String, String)> = pending
                .iter()
                .map(|(author, ship, _)| (author.to_string(), ship.to_string()))
                .collect();
            for (author_id, ship_name) in parked {
                let stored = match catalog.get_author(&author_id) {
                    Ok(author) => author,
                    Err(StorageError::AuthorNotFound(_)) => continue,
                    Err(e) => return Err(e.into()),
                };
                if stored.ships.iter().any(|s| s.name == ship_name) {
                    let updates = pending.drain(&author_id, &ship_name);
                    let hours = updates.iter().map(|u| u.hours).sum();
                    working.push_ship(
                        &author_id,
                        Ship {
                            name: ship_name,
                            repo: String::new(),
                            demo: String::new(),
                            preview: String::new(),
                            hours,
                            updates,
                        },
                    );
                }
            }

            let canonical = reconcile(&working.into_authors())?;
            let mut batch = BTreeMap::new();
            for (id, ships) in canonical {
                let name = match catalog.get_author(&id) {
                    Ok(stored) => stored.name,
                    Err(StorageError::AuthorNotFound(_)) => resolve_name(profiles, names, &id),
                    Err(e) => return Err(e.into()),
                };
                batch.insert(id.clone(), Author { id, name, ships });
            }

            let sync = catalog.sync(&batch, SyncMode::Append)?;
            info!(
                facts,
                rejected,
                pages,
                inserted = sync.inserted,
                updated = sync.updated,
                unchanged = sync.unchanged,
                "cycle committed"
            );

            Ok(CycleReport {
                facts,
                rejected,
                pages,
                next_cursor: cursor,
                exhausted,
                sync,
            })
        })
    }
}

/// Display name for a newly discovered author, cached per engine.
/// Lookup failures degrade to an empty name.
fn resolve_name<P: ProfileLookup>(
    profiles: &mut P,
    names: &mut HashMap<String, String>,
    author_id: &str,
) -> String {
    if let Some(name) = names.get(author_id) {
        return name.clone();
    }
    let name = match profiles.display_name(author_id) {
        Ok(name) => name,
        Err(e) => {
            warn!(author_id, error = %e, "profile lookup failed; using empty name");
            String::new()
        }
    };
    names.insert(author_id.to_string(), name.clone());
    name
}

/// Loads every persisted author, reconciles, and writes back in replace
/// mode. The manual recovery path for catalogs that accumulated duplicates.
pub fn force_cleanup(catalog: &mut Catalog) -> Result<SyncReport> {
    let authors = catalog.load_authors()?;
    let ships: BTreeMap<String, Vec<Ship>> = authors
        .iter()
        .map(|a| (a.id.clone(), a.ships.clone()))
        .collect();
    let canonical = reconcile(&ships)?;

    let batch: BTreeMap<String, Author> = authors
        .into_iter()
        .map(|mut author| {
            author.ships = canonical[&author.id].clone();
            (author.id.clone(), author)
        })
        .collect();

    let report = catalog.sync(&batch, SyncMode::Replace)?;
    info!(authors = batch.len(), "cleanup written back");
    Ok(report)
}
