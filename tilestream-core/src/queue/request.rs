//! Inbound request queue with coalescing and cursor-aware tile order.
//!
//! Entries are kept in one ordered list. Coalescing happens on `put`:
//!
//! | Entry         | Rule                                                      |
//! |---------------|-----------------------------------------------------------|
//! | tile          | same [`TileKey`](crate::protocol::TileKey) replaces in place |
//! | preview tile  | appended                                                  |
//! | regular tile  | slotted right after a preview at the head, else appended  |
//! | invalidation  | touching same-row rectangles merge; `EMPTY` clears the part |
//! | callback      | same identity replaces in place                           |
//! | anything else | appended                                                  |
//!
//! Ordering happens on `get`: the head entry decides. Non-tiles and
//! previews come out alone. For a regular tile the leading run of
//! regular tiles is ranked by cursor recency, and the winner takes every
//! nearby queued tile with it as one `tilecombine`.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use crate::error::{Result, TileError};
use crate::flags::MessageKinds;
use crate::protocol::{
    CallbackEvent, InvalidationEvent, QueueMessage, Rect, TileCombined, TileDesc,
};
use crate::queue::cursor::CursorState;

/// One stored entry. Combined requests never reach this level.
#[derive(Debug, Clone)]
enum Entry {
    Tile(TileDesc),
    Callback(CallbackEvent),
    Invalidation(InvalidationEvent),
    Other(String),
}

impl Entry {
    fn regular_tile(&self) -> Option<&TileDesc> {
        match self {
            Entry::Tile(t) if !t.is_preview() => Some(t),
            _ => None,
        }
    }

    fn into_message(self) -> QueueMessage {
        match self {
            Entry::Tile(t) => QueueMessage::Tile(t),
            Entry::Callback(c) => QueueMessage::Callback(c),
            Entry::Invalidation(i) => QueueMessage::Invalidation(i),
            Entry::Other(s) => QueueMessage::Other(s),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    entries: VecDeque<Entry>,
    cursors: CursorState,
}

// ── RequestQueue ─────────────────────────────────────────────────

/// Thread-safe, self-deduplicating queue of pending requests.
///
/// `put` and cursor updates may run on an I/O thread while a worker is
/// blocked in [`get`](Self::get).
pub struct RequestQueue {
    state: Mutex<State>,
    available: Condvar,
    kinds: MessageKinds,
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestQueue {
    /// A queue accepting every message kind.
    pub fn new() -> Self {
        Self::with_kinds(MessageKinds::ALL)
    }

    /// A queue accepting only `kinds`.
    pub fn with_kinds(kinds: MessageKinds) -> Self {
        Self {
            state: Mutex::new(State::default()),
            available: Condvar::new(),
            kinds,
        }
    }

    pub fn kinds(&self) -> MessageKinds {
        self.kinds
    }

    // ── Put ──────────────────────────────────────────────────────

    /// Parse and enqueue one wire line.
    pub fn put(&self, line: &str) -> Result<()> {
        let message = QueueMessage::parse(line)?;
        if !self.kinds.intersects(message.kind()) {
            return Err(TileError::UnsupportedMessage(
                crate::protocol::first_token(line).to_string(),
            ));
        }
        self.put_message(message);
        Ok(())
    }

    /// Enqueue an already parsed message. Kinds this queue does not
    /// accept are dropped.
    pub fn put_message(&self, message: QueueMessage) {
        if !self.kinds.intersects(message.kind()) {
            warn!(kind = ?message.kind(), "dropping message kind this queue does not accept");
            return;
        }
        {
            let mut state = self.state.lock();
            let entries = &mut state.entries;
            match message {
                QueueMessage::Tile(tile) => put_tile(entries, tile),
                QueueMessage::TileCombine(combined) => {
                    for tile in combined.into_tiles() {
                        put_tile(entries, tile);
                    }
                }
                QueueMessage::Invalidation(event) => put_invalidation(entries, event),
                QueueMessage::Callback(event) => put_callback(entries, event),
                QueueMessage::Other(line) => entries.push_back(Entry::Other(line)),
            }
        }
        self.available.notify_one();
    }

    // ── Cursors ──────────────────────────────────────────────────

    /// Record where a view's cursor is. Affects the next `get`.
    pub fn update_cursor_position(
        &self,
        view_id: i32,
        part: i32,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) {
        trace!(view_id, part, x, y, width, height, "cursor moved");
        self.state
            .lock()
            .cursors
            .update(view_id, part, Rect::new(x, y, width, height));
    }

    /// Forget a view's cursor.
    pub fn remove_cursor_position(&self, view_id: i32) {
        self.state.lock().cursors.remove(view_id);
    }

    /// Drop every queued tile of `view_id`; returns how many went.
    pub fn cancel_tiles(&self, view_id: i32) -> usize {
        let mut state = self.state.lock();
        let before = state.entries.len();
        state
            .entries
            .retain(|e| !matches!(e, Entry::Tile(t) if t.view_id == view_id));
        let removed = before - state.entries.len();
        if removed > 0 {
            trace!(view_id, removed, "cancelled queued tiles");
        }
        removed
    }

    // ── Get ──────────────────────────────────────────────────────

    /// Block until a message is available and take it.
    pub fn get(&self) -> QueueMessage {
        let mut state = self.state.lock();
        loop {
            if let Some(message) = take_next(&mut state) {
                return message;
            }
            self.available.wait(&mut state);
        }
    }

    /// Take the next message if there is one.
    pub fn try_get(&self) -> Option<QueueMessage> {
        take_next(&mut self.state.lock())
    }

    /// Wait up to `timeout` for the next message.
    pub fn get_timeout(&self, timeout: Duration) -> Option<QueueMessage> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        loop {
            if let Some(message) = take_next(&mut state) {
                return Some(message);
            }
            if self.available.wait_until(&mut state, deadline).timed_out() {
                return take_next(&mut state);
            }
        }
    }

    // ── Inspection ───────────────────────────────────────────────

    /// Number of stored entries; each tile of a combined request counts.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn tile_count(&self) -> usize {
        self.state
            .lock()
            .entries
            .iter()
            .filter(|e| matches!(e, Entry::Tile(_)))
            .count()
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    /// Human-readable listing of the queue, one entry per line.
    pub fn dump_state(&self) -> String {
        let state = self.state.lock();
        let mut out = format!(
            "RequestQueue: {} entries, cursor views {:?}\n",
            state.entries.len(),
            state.cursors.views()
        );
        for (i, entry) in state.entries.iter().enumerate() {
            let line = match entry {
                Entry::Tile(t) => t.serialize("tile"),
                Entry::Callback(c) => c.to_string(),
                Entry::Invalidation(ev) => ev.to_string(),
                Entry::Other(s) => s.clone(),
            };
            let _ = writeln!(out, "  [{i}] {line}");
        }
        out
    }
}

// ── Coalescing ───────────────────────────────────────────────────

fn put_tile(entries: &mut VecDeque<Entry>, tile: TileDesc) {
    let key = tile.key();
    if let Some(slot) = entries
        .iter_mut()
        .find(|e| matches!(e, Entry::Tile(t) if t.key() == key))
    {
        trace!(x = tile.tile_x, y = tile.tile_y, "replacing queued tile");
        *slot = Entry::Tile(tile);
        return;
    }

    let head_is_preview = matches!(entries.front(), Some(Entry::Tile(t)) if t.is_preview());
    if !tile.is_preview() && head_is_preview {
        entries.insert(1, Entry::Tile(tile));
    } else {
        entries.push_back(Entry::Tile(tile));
    }
}

fn put_invalidation(entries: &mut VecDeque<Entry>, event: InvalidationEvent) {
    let Some(rect) = event.rect else {
        entries.retain(|e| !matches!(e, Entry::Invalidation(i) if i.same_scope(&event)));
        entries.push_back(Entry::Invalidation(event));
        return;
    };

    for entry in entries.iter_mut() {
        if let Entry::Invalidation(queued) = entry
            && queued.same_scope(&event)
            && let Some(existing) = queued.rect
            && existing.joins_horizontally(&rect)
        {
            queued.rect = Some(existing.union(&rect));
            trace!(part = event.part, rect = ?queued.rect, "merged invalidation");
            return;
        }
    }
    entries.push_back(Entry::Invalidation(event));
}

fn put_callback(entries: &mut VecDeque<Entry>, event: CallbackEvent) {
    if let Some(identity) = event.identity()
        && let Some(slot) = entries.iter_mut().find(
            |e| matches!(e, Entry::Callback(c) if c.identity().as_ref() == Some(&identity)),
        )
    {
        *slot = Entry::Callback(event);
        return;
    }
    entries.push_back(Entry::Callback(event));
}

// ── Selection ────────────────────────────────────────────────────

fn take_next(state: &mut State) -> Option<QueueMessage> {
    let head = state.entries.front()?;
    if head.regular_tile().is_none() {
        return state.entries.pop_front().map(Entry::into_message);
    }

    let chosen = prioritized_index(state);
    let Some(Entry::Tile(first)) = state.entries.remove(chosen) else {
        return None;
    };

    let mut tiles = vec![first];
    let mut i = 0;
    while i < state.entries.len() {
        let near = state.entries[i]
            .regular_tile()
            .is_some_and(|t| tiles[0].is_near(t));
        if near {
            if let Some(Entry::Tile(t)) = state.entries.remove(i) {
                tiles.push(t);
            }
        } else {
            i += 1;
        }
    }

    trace!(
        combined = tiles.len(),
        remaining = state.entries.len(),
        "took tiles off the queue"
    );
    Some(match tiles.len() {
        1 => QueueMessage::Tile(tiles.remove(0)),
        _ => QueueMessage::TileCombine(TileCombined::from_checked(tiles)),
    })
}

/// Index of the best regular tile in the leading run of regular tiles.
/// Stopping at the first non-tile keeps callbacks from starving.
fn prioritized_index(state: &State) -> usize {
    let max_rank = state.cursors.max_rank();
    let mut best: Option<usize> = None;
    let mut chosen = 0;
    for (i, entry) in state.entries.iter().enumerate() {
        let Some(tile) = entry.regular_tile() else {
            break;
        };
        let rank = state.cursors.rank(tile);
        if i == 0 || rank > best {
            best = rank;
            chosen = i;
            if rank.is_some() && rank == max_rank {
                break;
            }
        }
    }
    chosen
}

// ── Tests ────────────────────────────────────────────────────────
