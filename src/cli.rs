//! CLI interface for Archipelago.
//!
//! Each subcommand is non-interactive: arguments in, structured output out.
//! Ingestion commands read a channel export (JSONL, one raw message per
//! line) — the live HTTP source sits outside this binary and produces the
//! export. Catalog data goes to stdout; human summaries go to stderr.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, thread};

use clap::{Parser, Subcommand};
use jiff::{SignedDuration, Timestamp};

use crate::config::Config;
use crate::ingest::{self, CycleReport, Engine, IngestError, Settings};
use crate::pending::PendingStore;
use crate::source::{ExportSource, NoProfiles};
use crate::storage::Catalog;

/// Archipelago — a catalog of ships, reconstructed from channel history.
#[derive(Debug, Parser)]
#[command(name = "archipelago")]
pub struct Cli {
    /// Data directory holding the catalog database and pending buffer.
    /// Defaults to `data-dir` from the config, then `~/.archipelago/`.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one incremental cycle: poll, aggregate, reconcile, sync.
    ///
    /// Safe to re-run over overlapping windows — re-observed records
    /// deduplicate.
    Sync {
        /// Channel export to ingest (JSONL, newest first).
        #[arg(long)]
        export: PathBuf,

        /// Start of the window, Unix seconds.
        /// Defaults to now minus the configured poll interval.
        #[arg(long)]
        oldest: Option<i64>,
    },

    /// Backfill history until a record budget is exhausted.
    ///
    /// Commits cycle by cycle, so an interrupted backfill keeps everything
    /// loaded so far.
    Backfill {
        /// Channel export to ingest (JSONL, newest first).
        #[arg(long)]
        export: PathBuf,

        /// Stop after this many parsed records.
        #[arg(long, default_value_t = 10_000)]
        limit: usize,

        /// Start of the window, Unix seconds. Zero means all of history.
        #[arg(long, default_value_t = 0)]
        oldest: i64,
    },

    /// Run incremental cycles on the configured interval until interrupted.
    Watch {
        /// Channel export to ingest (JSONL, newest first).
        #[arg(long)]
        export: PathBuf,
    },

    /// Reconcile persisted state and write it back, removing duplicates.
    /// Touches storage only; never the pending buffer.
    Cleanup,

    /// List catalog authors.
    Authors,

    /// Print one author's ships as JSON.
    Show {
        /// Author id.
        id: String,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config) -> Result<(), String> {
    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(dir) => dir,
        None => config.data_dir()?,
    };
    fs::create_dir_all(&data_dir)
        .map_err(|e| format!("failed to create {}: {e}", data_dir.display()))?;

    let catalog = Catalog::open(&data_dir.join("catalog.sqlite"))
        .map_err(|e| format!("failed to open catalog: {e}"))?;

    match cli.command {
        Command::Sync { export, oldest } => {
            let engine = build_engine(config, catalog, &data_dir, &export)?;
            cmd_sync(config, engine, oldest)
        }
        Command::Backfill {
            export,
            limit,
            oldest,
        } => {
            let engine = build_engine(config, catalog, &data_dir, &export)?;
            cmd_backfill(engine, limit, oldest)
        }
        Command::Watch { export } => {
            let engine = build_engine(config, catalog, &data_dir, &export)?;
            cmd_watch(config, engine)
        }
        Command::Cleanup => cmd_cleanup(catalog),
        Command::Authors => cmd_authors(&catalog),
        Command::Show { id } => cmd_show(&catalog, &id),
    }
}

fn build_engine(
    config: &Config,
    catalog: Catalog,
    data_dir: &Path,
    export: &Path,
) -> Result<Engine<ExportSource, NoProfiles>, String> {
    config.require_ingest()?;
    let source = ExportSource::open(export)
        .map_err(|e| format!("failed to read export {}: {e}", export.display()))?;
    let pending = PendingStore::new(data_dir.join("pending.json"));
    Ok(Engine::new(
        source,
        NoProfiles,
        catalog,
        pending,
        Settings {
            channel: config.channel.clone(),
            herald: config.herald.clone(),
            page_size: config.page_size,
            budget: config.message_budget,
        },
    ))
}

fn cmd_sync(
    config: &Config,
    mut engine: Engine<ExportSource, NoProfiles>,
    oldest: Option<i64>,
) -> Result<(), String> {
    let oldest = match oldest {
        Some(seconds) => timestamp(seconds)?,
        None => window_start(config)?,
    };

    let report = engine
        .run_incremental_cycle(oldest)
        .map_err(|e| format!("cycle failed: {e}"))?;
    eprintln!("{}", describe_cycle(&report));
    Ok(())
}

fn cmd_backfill(
    mut engine: Engine<ExportSource, NoProfiles>,
    limit: usize,
    oldest: i64,
) -> Result<(), String> {
    let oldest = timestamp(oldest)?;
    let report = engine
        .bulk_load(limit, oldest)
        .map_err(|e| format!("backfill failed: {e}"))?;
    eprintln!(
        "Backfill done: {} records across {} cycle(s)",
        report.facts, report.cycles
    );
    Ok(())
}

fn cmd_watch(config: &Config, mut engine: Engine<ExportSource, NoProfiles>) -> Result<(), String> {
    let interval = Duration::from_secs(60 * u64::from(config.poll_interval_minutes));
    loop {
        match engine.run_incremental_cycle(window_start(config)?) {
            Ok(report) => eprintln!("{}", describe_cycle(&report)),
            // Buffer failures need an operator; anything else retries on the
            // next tick with an overlapping window.
            Err(IngestError::Pending(e)) => {
                return Err(format!("pending buffer failure: {e}"));
            }
            Err(e) => eprintln!("Cycle failed ({e}); retrying next interval"),
        }
        thread::sleep(interval);
    }
}

fn cmd_cleanup(mut catalog: Catalog) -> Result<(), String> {
    let report = ingest::force_cleanup(&mut catalog).map_err(|e| format!("cleanup failed: {e}"))?;
    eprintln!(
        "Cleanup done: {} author(s) rewritten, {} unchanged",
        report.updated + report.inserted,
        report.unchanged
    );
    Ok(())
}

fn cmd_authors(catalog: &Catalog) -> Result<(), String> {
    let authors = catalog
        .load_authors()
        .map_err(|e| format!("failed to list authors: {e}"))?;

    if authors.is_empty() {
        println!("No authors");
        return Ok(());
    }

    for author in &authors {
        println!(
            "{}  [{} ship(s)]  {}",
            author.id,
            author.ships.len(),
            author.name
        );
    }
    Ok(())
}

fn cmd_show(catalog: &Catalog, id: &str) -> Result<(), String> {
    let author = catalog
        .get_author(id)
        .map_err(|e| format!("failed to load author: {e}"))?;
    let json = serde_json::to_string_pretty(&author)
        .map_err(|e| format!("failed to serialize author: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Start of the default incremental window: now minus the poll interval.
fn window_start(config: &Config) -> Result<Timestamp, String> {
    let span = SignedDuration::from_secs(60 * i64::from(config.poll_interval_minutes));
    Timestamp::now()
        .checked_sub(span)
        .map_err(|e| format!("bad poll window: {e}"))
}

fn timestamp(seconds: i64) -> Result<Timestamp, String> {
    Timestamp::new(seconds, 0).map_err(|e| format!("bad timestamp {seconds}: {e}"))
}

fn describe_cycle(report: &CycleReport) -> String {
    format!(
        "Cycle done: {} record(s) over {} page(s) ({} rejected); {} author(s) added, {} updated, {} unchanged",
        report.facts,
        report.pages,
        report.rejected,
        report.sync.inserted,
        report.sync.updated,
        report.sync.unchanged
    )
}
