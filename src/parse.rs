//! Record parser: one raw message in, one tagged fact out.
//!
//! Ship announcements follow a fixed template posted by the herald bot:
//!
//! ```text
//! *_SHIPS AHOY!!_*
//! *Sea Glass* _(Update 2)_
//! By <@U042AUTHOR> | <https://repo|Repo> | <https://demo|Demo>
//! Made in 3 hours _(8 in total)_
//!
//! _Update Description:_ Added the tide tables
//! ```
//!
//! The update suffix lines are absent on a first announcement. Anything that
//! doesn't match the template is rejected; the caller skips rejected
//! messages without failing the cycle.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{Fact, RawMessage, ShipFact, UpdateFact};

/// Why a message failed to parse. Expected and frequent — most channel
/// traffic is not a ship announcement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("missing announcement marker")]
    MissingMarker,

    #[error("body does not match the announcement template")]
    BodyMismatch,

    #[error("unparseable hours figure: {0}")]
    BadHours(String),
}

pub type Result<T> = core::result::Result<T, Rejection>;

/// Literal first line of every ship announcement.
const MARKER: &str = "*_SHIPS AHOY!!_*";

/// Grammar of the announcement body after the marker line. The optional tail
/// (running total + description) is what distinguishes an update from a
/// fresh ship.
static BODY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\A\*(.*)\*(?: _\(Update \d+\)_)?\nBy <@(\w+)> \| <(.*)\|Repo> \| <(.*)\|Demo>\nMade in (\d+) hours?(?: _\(\d+ in total\)_\n\n_Update Description:_ (.+))?",
    )
    .expect("announcement grammar is valid")
});

/// Parses one raw message into a fact.
///
/// Pure: no side effects, no state. The fact's `author_id` comes from the
/// `<@...>` reference in the body — the envelope author is the herald.
pub fn parse_message(message: &RawMessage) -> Result<Fact> {
    let rest = message
        .body
        .strip_prefix(MARKER)
        .and_then(|r| r.strip_prefix('\n'))
        .ok_or(Rejection::MissingMarker)?;

    let captures = BODY.captures(rest).ok_or(Rejection::BodyMismatch)?;

    let name = captures[1].to_string();
    let author_id = captures[2].to_string();
    let repo = captures[3].to_string();
    let demo = captures[4].to_string();
    let hours: i64 = captures[5]
        .parse()
        .map_err(|_| Rejection::BadHours(captures[5].to_string()))?;

    match captures.get(6) {
        Some(description) => Ok(Fact::Update(UpdateFact {
            author_id,
            ship_name: name,
            description: description.as_str().to_string(),
            hours,
        })),
        None => Ok(Fact::Ship(ShipFact {
            author_id,
            name,
            repo,
            demo,
            preview: message.image_urls.first().cloned().unwrap_or_default(),
            hours,
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;

    fn message(body: &str) -> RawMessage {
        RawMessage {
            author_id: "UHERALD".into(),
            body: body.into(),
            image_urls: vec![],
            posted_at: Timestamp::now(),
        }
    }

    fn ship_body() -> String {
        format!(
            "{MARKER}\n*Sea Glass*\nBy <@U042AUTHOR> | <https://git.example/sea|Repo> | <https://sea.example|Demo>\nMade in 5 hours"
        )
    }

    fn update_body() -> String {
        format!(
            "{MARKER}\n*Sea Glass* _(Update 2)_\nBy <@U042AUTHOR> | <https://git.example/sea|Repo> | <https://sea.example|Demo>\nMade in 3 hours _(8 in total)_\n\n_Update Description:_ Added the tide tables"
        )
    }

    #[test]
    fn parses_ship_announcement() {
        let mut msg = message(&ship_body());
        msg.image_urls = vec!["https://img.example/preview.png".into()];

        let fact = parse_message(&msg).unwrap();
        let Fact::Ship(ship) = fact else {
            panic!("expected a ship fact");
        };

        assert_eq!(ship.author_id, "U042AUTHOR");
        assert_eq!(ship.name, "Sea Glass");
        assert_eq!(ship.repo, "https://git.example/sea");
        assert_eq!(ship.demo, "https://sea.example");
        assert_eq!(ship.preview, "https://img.example/preview.png");
        assert_eq!(ship.hours, 5);
    }

    #[test]
    fn parses_update_announcement() {
        let fact = parse_message(&message(&update_body())).unwrap();
        let Fact::Update(update) = fact else {
            panic!("expected an update fact");
        };

        assert_eq!(update.author_id, "U042AUTHOR");
        assert_eq!(update.ship_name, "Sea Glass");
        assert_eq!(update.description, "Added the tide tables");
        assert_eq!(update.hours, 3);
    }

    #[test]
    fn ship_without_preview_gets_empty_url() {
        let fact = parse_message(&message(&ship_body())).unwrap();
        let Fact::Ship(ship) = fact else {
            panic!("expected a ship fact");
        };
        assert_eq!(ship.preview, "");
    }

    #[test]
    fn singular_hour_is_accepted() {
        let body = format!(
            "{MARKER}\n*Dinghy*\nBy <@U1> | <r|Repo> | <d|Demo>\nMade in 1 hour"
        );
        let fact = parse_message(&message(&body)).unwrap();
        let Fact::Ship(ship) = fact else {
            panic!("expected a ship fact");
        };
        assert_eq!(ship.hours, 1);
    }

    #[test]
    fn rejects_missing_marker() {
        let err = parse_message(&message("just chatting about ships")).unwrap_err();
        assert_eq!(err, Rejection::MissingMarker);
    }

    #[test]
    fn rejects_malformed_body() {
        let body = format!("{MARKER}\n*Sea Glass*\nno author line here");
        let err = parse_message(&message(&body)).unwrap_err();
        assert_eq!(err, Rejection::BodyMismatch);
    }

    #[test]
    fn rejects_overflowing_hours() {
        let body = format!(
            "{MARKER}\n*Sea Glass*\nBy <@U1> | <r|Repo> | <d|Demo>\nMade in 99999999999999999999 hours"
        );
        let err = parse_message(&message(&body)).unwrap_err();
        assert!(matches!(err, Rejection::BadHours(_)));
    }
}
