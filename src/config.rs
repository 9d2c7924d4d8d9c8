//! Archipelago configuration.
//!
//! Loaded from `~/.archipelago/config.toml`. The channel and herald ids have
//! no sensible defaults, so ingestion refuses to run without them — with
//! instructions rather than a silent fallback. Inspection commands touch
//! neither, so a missing file is fine for those.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

fn default_page_size() -> usize {
    crate::ingest::MAX_PAGE_SIZE
}

fn default_budget() -> usize {
    10_000
}

fn default_interval_minutes() -> u32 {
    30
}

/// Archipelago configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Channel whose history carries the ship announcements.
    /// Required for ingestion commands.
    #[serde(default)]
    pub channel: String,

    /// User id of the herald bot; only its messages are parsed.
    /// Required for ingestion commands.
    #[serde(default)]
    pub herald: String,

    /// Records per history page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Parsed-record budget for one incremental cycle.
    #[serde(default = "default_budget")]
    pub message_budget: usize,

    /// Minutes between cycles under `watch`, and the default window width
    /// for `sync`.
    #[serde(default = "default_interval_minutes")]
    pub poll_interval_minutes: u32,

    /// Where the catalog database and pending buffer live.
    /// Defaults to `~/.archipelago/`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel: String::new(),
            herald: String::new(),
            page_size: default_page_size(),
            message_budget: default_budget(),
            poll_interval_minutes: default_interval_minutes(),
            data_dir: None,
        }
    }
}

impl Config {
    /// Load config from `~/.archipelago/config.toml`.
    /// A missing file yields the defaults; an unreadable or invalid one is
    /// an error.
    pub fn load() -> Result<Self, String> {
        let path = Self::path().ok_or("could not determine home directory")?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// Ingestion needs a channel to poll and a herald to filter on;
    /// inspection commands need neither.
    pub fn require_ingest(&self) -> Result<(), String> {
        if self.channel.is_empty() || self.herald.is_empty() {
            let path = Self::path().map_or_else(
                || "~/.archipelago/config.toml".to_string(),
                |p| p.display().to_string(),
            );
            return Err(format!(
                "channel and herald must be configured for ingestion\n\
                 Add to {path}:\n\n\
                 channel = \"C07UA18MXBJ\"\n\
                 herald = \"U07NGBJUDRD\""
            ));
        }
        Ok(())
    }

    /// The config file path: `~/.archipelago/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".archipelago").join("config.toml"))
    }

    /// The resolved data directory.
    pub fn data_dir(&self) -> Result<PathBuf, String> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::home_dir()
                .map(|h| h.join(".archipelago"))
                .ok_or_else(|| "could not determine home directory".to_string()),
        }
    }
}
