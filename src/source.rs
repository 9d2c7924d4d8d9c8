//! Upstream collaborators, behind traits.
//!
//! The engine only ever sees [`MessageSource`] and [`ProfileLookup`]; the
//! real chat HTTP client and identity provider live outside this crate.
//! [`ExportSource`] is the concrete source the CLI drives: a newest-first
//! JSONL export of the channel, one raw message per line.

use std::path::Path;
use std::{fs, io};

use jiff::Timestamp;

use crate::model::{Page, RawMessage};

/// Errors from the upstream source. Any of these aborts the current cycle;
/// the next cycle's overlapping window recovers the lost ground.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed export record: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, SourceError>;

/// Paginated access to a channel's history, newest-first.
pub trait MessageSource {
    /// Fetches one page of messages posted at or after `oldest`.
    ///
    /// `cursor` is the opaque continuation token from the previous page;
    /// `None` starts from the newest message. `limit` caps the page size.
    fn fetch_page(
        &mut self,
        channel: &str,
        oldest: Timestamp,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page>;
}

/// Display-name resolution for newly discovered authors.
///
/// Failures are non-fatal; the engine degrades to an empty name.
pub trait ProfileLookup {
    fn display_name(&mut self, author_id: &str) -> Result<String>;
}

/// The degraded profile lookup: every author gets an empty name.
pub struct NoProfiles;

impl ProfileLookup for NoProfiles {
    fn display_name(&mut self, _author_id: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// A channel export on disk, serving pages the way the live source would.
///
/// The export is JSONL, one [`RawMessage`] per line. Messages are served
/// newest-first regardless of file order; the continuation cursor is an
/// offset into the sorted list. The `channel` argument is ignored — an
/// export file is a single channel by construction.
pub struct ExportSource {
    messages: Vec<RawMessage>,
}

impl ExportSource {
    /// Reads a channel export from the given JSONL file.
    pub fn open(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let mut messages = Vec::new();
        for line in contents.lines() {
            if !line.is_empty() {
                messages.push(serde_json::from_str::<RawMessage>(line)?);
            }
        }
        messages.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Ok(Self { messages })
    }

    /// Builds a source from already-sorted messages (newest first).
    pub fn from_messages(mut messages: Vec<RawMessage>) -> Self {
        messages.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
        Self { messages }
    }
}

impl MessageSource for ExportSource {
    fn fetch_page(
        &mut self,
        _channel: &str,
        oldest: Timestamp,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<Page> {
        let offset = match cursor {
            None => 0,
            Some(c) => c
                .parse::<usize>()
                .map_err(|_| SourceError::Retrieval(format!("bad cursor: {c}")))?,
        };

        // Messages are newest-first, so the window ends at the first message
        // older than the bound.
        let in_window = self
            .messages
            .iter()
            .take_while(|m| m.posted_at >= oldest)
            .count();

        let end = in_window.min(offset.saturating_add(limit));
        let page = self
            .messages
            .get(offset..end)
            .unwrap_or_default()
            .to_vec();

        let next_cursor = (end < in_window).then(|| end.to_string());
        Ok(Page {
            messages: page,
            next_cursor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(author: &str, body: &str, at_second: i64) -> RawMessage {
        RawMessage {
            author_id: author.into(),
            body: body.into(),
            image_urls: vec![],
            posted_at: Timestamp::new(at_second, 0).unwrap(),
        }
    }

    fn sample_source() -> ExportSource {
        ExportSource::from_messages(vec![
            message("U1", "oldest", 100),
            message("U2", "middle", 200),
            message("U3", "newest", 300),
        ])
    }

    #[test]
    fn serves_newest_first() {
        let mut source = sample_source();
        let page = source
            .fetch_page("C1", Timestamp::new(0, 0).unwrap(), None, 10)
            .unwrap();

        assert_eq!(page.messages.len(), 3);
        assert_eq!(page.messages[0].body, "newest");
        assert_eq!(page.messages[2].body, "oldest");
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn paginates_with_cursor() {
        let mut source = sample_source();
        let oldest = Timestamp::new(0, 0).unwrap();

        let first = source.fetch_page("C1", oldest, None, 2).unwrap();
        assert_eq!(first.messages.len(), 2);
        let cursor = first.next_cursor.expect("more pages remain");

        let second = source.fetch_page("C1", oldest, Some(&cursor), 2).unwrap();
        assert_eq!(second.messages.len(), 1);
        assert_eq!(second.messages[0].body, "oldest");
        assert!(second.next_cursor.is_none());
    }

    #[test]
    fn respects_oldest_bound() {
        let mut source = sample_source();
        let page = source
            .fetch_page("C1", Timestamp::new(150, 0).unwrap(), None, 10)
            .unwrap();

        assert_eq!(page.messages.len(), 2);
        assert!(page.messages.iter().all(|m| m.body != "oldest"));
    }

    #[test]
    fn bad_cursor_is_a_retrieval_error() {
        let mut source = sample_source();
        let err = source
            .fetch_page("C1", Timestamp::new(0, 0).unwrap(), Some("not a number"), 10)
            .unwrap_err();
        assert!(matches!(err, SourceError::Retrieval(_)));
    }

    #[test]
    fn open_reads_jsonl_export() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("export.jsonl");
        let lines = [
            serde_json::to_string(&message("U1", "a", 100)).unwrap(),
            serde_json::to_string(&message("U2", "b", 300)).unwrap(),
        ];
        fs::write(&path, lines.join("\n")).unwrap();

        let mut source = ExportSource::open(&path).unwrap();
        let page = source
            .fetch_page("C1", Timestamp::new(0, 0).unwrap(), None, 10)
            .unwrap();
        assert_eq!(page.messages[0].body, "b");
    }
}
