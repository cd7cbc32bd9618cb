//! Outbound per-consumer queue that keeps only the newest copy of each
//! logical message.
//!
//! A slow client never sees stale tiles or cursor positions pile up: a
//! message whose [`Coalesce::identity`] matches a pending one overwrites
//! it in its original slot.

use std::collections::VecDeque;
use std::hash::Hash;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use crate::message::Message;
use crate::protocol::{TileCombined, TileDesc, TileKey};

/// Items that know which pending item they supersede.
pub trait Coalesce {
    type Identity: Eq + Hash + Clone + Send;

    fn identity(&self) -> Self::Identity;
}

// ── Message identity ─────────────────────────────────────────────

/// Coalescing identity of an outbound [`Message`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageIdentity {
    /// `tile:` response; versions and wire ids are ignored.
    Tile(TileKey),
    /// `tilecombine:` response, one key per tile in order.
    TileCombine(Vec<TileKey>),
    /// `invalidateviewcursor:` for the given `viewId`.
    ViewCursor(String),
    /// `progress:` value updates.
    ProgressValue,
    /// Everything else: only byte-identical messages match.
    Verbatim(Bytes),
}

impl Coalesce for Message {
    type Identity = MessageIdentity;

    fn identity(&self) -> MessageIdentity {
        let header = self.first_line();
        let parsed = match self.first_token() {
            "tile:" => TileDesc::parse(header).ok().map(|t| MessageIdentity::Tile(t.key())),
            "tilecombine:" => TileCombined::parse(header).ok().map(|c| {
                MessageIdentity::TileCombine(c.tiles().iter().map(TileDesc::key).collect())
            }),
            "invalidateviewcursor:" => {
                json_field(header, "viewId").map(MessageIdentity::ViewCursor)
            }
            "progress:" => json_field(header, "id")
                .filter(|id| id == "setvalue")
                .map(|_| MessageIdentity::ProgressValue),
            _ => None,
        };
        parsed.unwrap_or_else(|| MessageIdentity::Verbatim(self.as_bytes().clone()))
    }
}

/// String form of `field` in the JSON object following the first token.
fn json_field(header: &str, field: &str) -> Option<String> {
    let (_, body) = header.split_once(char::is_whitespace)?;
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    json.get(field).map(|v| match v {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

// ── SenderQueue ──────────────────────────────────────────────────

pub struct SenderQueue<T: Coalesce> {
    items: Mutex<VecDeque<(T::Identity, T)>>,
    notify: Notify,
}

impl<T: Coalesce> Default for SenderQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Coalesce> SenderQueue<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Queue `item`, replacing a pending item with the same identity in
    /// place. Returns `true` when an item was replaced.
    pub fn enqueue(&self, item: T) -> bool {
        let identity = item.identity();
        let replaced = {
            let mut items = self.items.lock();
            match items.iter_mut().find(|(id, _)| *id == identity) {
                Some(slot) => {
                    slot.1 = item;
                    true
                }
                None => {
                    items.push_back((identity, item));
                    false
                }
            }
        };
        if replaced {
            trace!("coalesced outbound message");
        }
        self.notify.notify_one();
        replaced
    }

    /// Pop the oldest slot, if any.
    pub fn dequeue(&self) -> Option<T> {
        self.items.lock().pop_front().map(|(_, item)| item)
    }

    /// Wait for the next item.
    pub async fn dequeue_async(&self) -> T {
        loop {
            if let Some(item) = self.dequeue() {
                return item;
            }
            self.notify.notified().await;
        }
    }

    /// Number of distinct identities pending.
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    pub fn clear(&self) {
        self.items.lock().clear();
    }
}

// ── Tests ────────────────────────────────────────────────────────
