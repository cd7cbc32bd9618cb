//! Wire-message types for tile requests and editor callbacks.
//!
//! All messages are single text lines of space-separated tokens. Tile
//! requests use `key=value` pairs; callbacks are positional.
//!
//! | Module         | Messages                                              |
//! |----------------|-------------------------------------------------------|
//! | `tile`         | `tile …`, `tilecombine …`                             |
//! | `callback`     | `callback <view\|all> <type> <payload>`               |
//! | `invalidation` | `callback … 0 x, y, w, h, part`, `invalidatetiles: …` |

pub mod callback;
pub mod invalidation;
pub mod tile;

use std::fmt;

use crate::error::{Result, TileError};
use crate::flags::MessageKinds;

pub use callback::{CallbackEvent, CallbackIdentity, CallbackTarget};
pub use invalidation::{InvalidationEvent, Rect};
pub use tile::{TileCombined, TileDesc, TileKey};

// ── QueueMessage ─────────────────────────────────────────────────

/// A parsed inbound message, ready to be put on a
/// [`RequestQueue`](crate::queue::RequestQueue).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueMessage {
    /// A single tile request.
    Tile(TileDesc),
    /// Several same-sized tiles of one view and part.
    TileCombine(TileCombined),
    /// An editor state callback.
    Callback(CallbackEvent),
    /// A dirty rectangle (or whole part).
    Invalidation(InvalidationEvent),
    /// Any other line; never coalesced.
    Other(String),
}

impl QueueMessage {
    /// Classify and parse one wire line.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        match first_token(line) {
            "" => Err(TileError::InvalidMessage("empty message".into())),
            "tile" | "tile:" => Ok(QueueMessage::Tile(TileDesc::parse(line)?)),
            "tilecombine" | "tilecombine:" => {
                Ok(QueueMessage::TileCombine(TileCombined::parse(line)?))
            }
            "invalidatetiles:" => Ok(QueueMessage::Invalidation(InvalidationEvent::parse(line)?)),
            "callback" => {
                let event = CallbackEvent::parse(line)?;
                if event.kind == callback::kind::INVALIDATE_TILES {
                    Ok(QueueMessage::Invalidation(
                        InvalidationEvent::from_callback(&event)?,
                    ))
                } else {
                    Ok(QueueMessage::Callback(event))
                }
            }
            _ => Ok(QueueMessage::Other(line.to_string())),
        }
    }

    /// The filter bit this message falls under.
    pub fn kind(&self) -> MessageKinds {
        match self {
            QueueMessage::Tile(_) | QueueMessage::TileCombine(_) => MessageKinds::TILES,
            QueueMessage::Callback(_) => MessageKinds::CALLBACKS,
            QueueMessage::Invalidation(_) => MessageKinds::INVALIDATIONS,
            QueueMessage::Other(_) => MessageKinds::OTHER,
        }
    }
}

impl fmt::Display for QueueMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueMessage::Tile(t) => f.write_str(&t.serialize("tile")),
            QueueMessage::TileCombine(c) => f.write_str(&c.serialize("tilecombine")),
            QueueMessage::Callback(c) => write!(f, "{c}"),
            QueueMessage::Invalidation(i) => write!(f, "{i}"),
            QueueMessage::Other(s) => f.write_str(s),
        }
    }
}

// ── Token helpers ────────────────────────────────────────────────

/// First whitespace-delimited token of `line`, or `""`.
pub fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}

/// Iterate the `key=value` tokens of a line, skipping anything else.
pub(crate) fn pairs(line: &str) -> impl Iterator<Item = (&str, &str)> {
    line.split_whitespace().filter_map(|tok| tok.split_once('='))
}

pub(crate) fn parse_int<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| TileError::BadArgument {
        field,
        value: value.to_string(),
    })
}

pub(crate) fn parse_list<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<Vec<T>> {
    value
        .split(',')
        .filter(|s| !s.is_empty())
        .map(|s| parse_int(field, s))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────
