//! Raw message shapes as delivered by the upstream source.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// One message from the channel, as the source collaborator hands it over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    /// Who posted the message — for ship announcements this is the herald
    /// bot, not the ship's author.
    pub author_id: String,

    /// Free-text payload; the record parser's sole input besides images.
    pub body: String,

    /// Attachment/preview image URLs, in message order.
    #[serde(default)]
    pub image_urls: Vec<String>,

    /// When the message was posted.
    pub posted_at: Timestamp,
}

/// One page of messages plus the continuation cursor, newest-first.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub messages: Vec<RawMessage>,
    pub next_cursor: Option<String>,
}
