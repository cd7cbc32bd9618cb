//! Per-view cursor positions and their recency order.

use std::collections::HashMap;

use crate::protocol::{Rect, TileDesc};

/// Last known cursor rectangle of one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorPosition {
    pub part: i32,
    pub rect: Rect,
    /// Value of the global touch counter at the last update.
    pub touched: u64,
}

/// Cursor table shared by every view of a document.
///
/// Views are ranked by how recently their cursor moved: the view
/// touched last has the highest rank.
#[derive(Debug, Default)]
pub struct CursorState {
    positions: HashMap<i32, CursorPosition>,
    /// View ids, least recently touched first.
    order: Vec<i32>,
    counter: u64,
}

impl CursorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cursor move and make `view_id` the most recent view.
    pub fn update(&mut self, view_id: i32, part: i32, rect: Rect) {
        self.counter += 1;
        self.positions.insert(
            view_id,
            CursorPosition {
                part,
                rect,
                touched: self.counter,
            },
        );
        self.order.retain(|v| *v != view_id);
        self.order.push(view_id);
    }

    /// Forget a view, e.g. once it disconnects.
    pub fn remove(&mut self, view_id: i32) -> bool {
        self.order.retain(|v| *v != view_id);
        self.positions.remove(&view_id).is_some()
    }

    pub fn get(&self, view_id: i32) -> Option<&CursorPosition> {
        self.positions.get(&view_id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Highest rank a tile can get.
    pub fn max_rank(&self) -> Option<usize> {
        self.order.len().checked_sub(1)
    }

    /// Rank of the most recently touched cursor lying on `tile`, or
    /// `None` when no cursor touches it.
    pub fn rank(&self, tile: &TileDesc) -> Option<usize> {
        let area = tile.rect();
        self.order.iter().enumerate().rev().find_map(|(rank, view)| {
            let pos = self.positions.get(view)?;
            (pos.part == tile.part && pos.rect.intersects(&area)).then_some(rank)
        })
    }

    /// View ids from least to most recently touched.
    pub fn views(&self) -> &[i32] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_at(y: i32) -> TileDesc {
        TileDesc::new(0, 0, 256, 256, 0, y, 3840, 3840)
    }

    #[test]
    fn latest_update_moves_view_to_front() {
        let mut cursors = CursorState::new();
        for view in [0, 2, 1, 3, 2, 3] {
            cursors.update(view, 0, Rect::new(0, 0, 10, 100));
        }
        assert_eq!(cursors.views(), &[0, 1, 2, 3]);
        assert_eq!(cursors.get(3).unwrap().touched, 6);
    }

    #[test]
    fn rank_uses_most_recent_intersecting_cursor() {
        let mut cursors = CursorState::new();
        cursors.update(0, 0, Rect::new(0, 0, 10, 100));
        cursors.update(1, 0, Rect::new(0, 7680, 10, 100));

        assert_eq!(cursors.rank(&tile_at(0)), Some(0));
        assert_eq!(cursors.rank(&tile_at(7680)), Some(1));
        assert_eq!(cursors.rank(&tile_at(253440)), None);

        cursors.update(0, 0, Rect::new(0, 7680, 10, 100));
        assert_eq!(cursors.rank(&tile_at(7680)), Some(1));
        assert_eq!(cursors.rank(&tile_at(0)), None);
    }

    #[test]
    fn other_parts_do_not_rank() {
        let mut cursors = CursorState::new();
        cursors.update(0, 1, Rect::new(0, 0, 10, 100));
        assert_eq!(cursors.rank(&tile_at(0)), None);
    }

    #[test]
    fn removed_views_stop_ranking() {
        let mut cursors = CursorState::new();
        cursors.update(4, 0, Rect::new(0, 0, 10, 100));
        assert!(cursors.remove(4));
        assert!(!cursors.remove(4));
        assert!(cursors.is_empty());
        assert_eq!(cursors.max_rank(), None);
        assert_eq!(cursors.rank(&tile_at(0)), None);
    }
}
