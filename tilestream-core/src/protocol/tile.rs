//! Tile request descriptors.
//!
//! A [`TileDesc`] is one tile at one position; a [`TileCombined`] is a
//! batch of same-sized tiles of one view and part that differ only in
//! position. The request queue stores descriptors individually and
//! re-combines them when they are taken off the queue.

use std::fmt::Write as _;

use crate::error::{Result, TileError};
use crate::protocol::invalidation::Rect;
use crate::protocol::{pairs, parse_int, parse_list};

/// Widest horizontal spread, in tiles, of one combined paint.
pub const MAX_COMBINE_COLUMNS: i32 = 16;

// ── TileKey ──────────────────────────────────────────────────────

/// Identity of one tile: everything except version and wire ids.
///
/// Two requests for the same key are the same tile; the later one
/// replaces the earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub view_id: i32,
    pub part: i32,
    pub edit_mode: i32,
    pub width: i32,
    pub height: i32,
    pub tile_x: i32,
    pub tile_y: i32,
    pub tile_width: i32,
    pub tile_height: i32,
    pub preview_id: Option<i32>,
}

// ── TileDesc ─────────────────────────────────────────────────────

/// A single tile request or response header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileDesc {
    /// Canonical view the tile is rendered for.
    pub view_id: i32,
    /// Page, sheet or slide index.
    pub part: i32,
    /// Edit mode (e.g. master-page editing); 0 for normal.
    pub edit_mode: i32,
    /// Output width in pixels.
    pub width: i32,
    /// Output height in pixels.
    pub height: i32,
    /// Left edge in document units.
    pub tile_x: i32,
    /// Top edge in document units.
    pub tile_y: i32,
    /// Width in document units.
    pub tile_width: i32,
    /// Height in document units.
    pub tile_height: i32,
    /// Client-side version tag, -1 when unknown.
    pub version: i32,
    /// Wire id the client currently holds; 0 forces a keyframe.
    pub old_wire_id: u32,
    /// Wire id of this rendering.
    pub wire_id: u32,
    /// Payload size in bytes (responses only).
    pub img_size: u32,
    /// Thumbnail id; present only for preview requests.
    pub preview_id: Option<i32>,
}

impl TileDesc {
    /// Build a regular tile with default version and ids.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        view_id: i32,
        part: i32,
        width: i32,
        height: i32,
        tile_x: i32,
        tile_y: i32,
        tile_width: i32,
        tile_height: i32,
    ) -> Self {
        Self {
            view_id,
            part,
            edit_mode: 0,
            width,
            height,
            tile_x,
            tile_y,
            tile_width,
            tile_height,
            version: -1,
            old_wire_id: 0,
            wire_id: 0,
            img_size: 0,
            preview_id: None,
        }
    }

    /// Parse a `tile …` line. The leading command token is ignored.
    pub fn parse(line: &str) -> Result<Self> {
        let mut view_id = 0;
        let mut part = None;
        let mut edit_mode = 0;
        let mut width = None;
        let mut height = None;
        let mut tile_x = None;
        let mut tile_y = None;
        let mut tile_width = None;
        let mut tile_height = None;
        let mut version = -1;
        let mut old_wire_id = 0;
        let mut wire_id = 0;
        let mut img_size = 0;
        let mut preview_id = None;

        for (key, value) in pairs(line) {
            match key {
                "nviewid" => view_id = parse_int("nviewid", value)?,
                "part" => part = Some(parse_int("part", value)?),
                "mode" => edit_mode = parse_int("mode", value)?,
                "width" => width = Some(parse_int("width", value)?),
                "height" => height = Some(parse_int("height", value)?),
                "tileposx" => tile_x = Some(parse_int("tileposx", value)?),
                "tileposy" => tile_y = Some(parse_int("tileposy", value)?),
                "tilewidth" => tile_width = Some(parse_int("tilewidth", value)?),
                "tileheight" => tile_height = Some(parse_int("tileheight", value)?),
                "ver" => version = parse_int("ver", value)?,
                "oldwid" => old_wire_id = parse_int("oldwid", value)?,
                "wid" => wire_id = parse_int("wid", value)?,
                "imgsize" => img_size = parse_int("imgsize", value)?,
                "id" => preview_id = Some(parse_int("id", value)?),
                _ => {}
            }
        }

        let desc = Self {
            view_id,
            part: part.ok_or(TileError::MissingField("part"))?,
            edit_mode,
            width: width.ok_or(TileError::MissingField("width"))?,
            height: height.ok_or(TileError::MissingField("height"))?,
            tile_x: tile_x.ok_or(TileError::MissingField("tileposx"))?,
            tile_y: tile_y.ok_or(TileError::MissingField("tileposy"))?,
            tile_width: tile_width.ok_or(TileError::MissingField("tilewidth"))?,
            tile_height: tile_height.ok_or(TileError::MissingField("tileheight"))?,
            version,
            old_wire_id,
            wire_id,
            img_size,
            preview_id,
        };
        desc.validate()?;
        Ok(desc)
    }

    fn validate(&self) -> Result<()> {
        let checks: [(&'static str, i32, bool); 7] = [
            ("part", self.part, self.part >= 0),
            ("width", self.width, self.width > 0),
            ("height", self.height, self.height > 0),
            ("tileposx", self.tile_x, self.tile_x >= 0),
            ("tileposy", self.tile_y, self.tile_y >= 0),
            ("tilewidth", self.tile_width, self.tile_width > 0),
            ("tileheight", self.tile_height, self.tile_height > 0),
        ];
        for (field, value, ok) in checks {
            if !ok {
                return Err(TileError::BadArgument {
                    field,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Coalescing identity of this tile.
    pub fn key(&self) -> TileKey {
        TileKey {
            view_id: self.view_id,
            part: self.part,
            edit_mode: self.edit_mode,
            width: self.width,
            height: self.height,
            tile_x: self.tile_x,
            tile_y: self.tile_y,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            preview_id: self.preview_id,
        }
    }

    pub fn is_preview(&self) -> bool {
        self.preview_id.is_some()
    }

    /// Area covered, in document units.
    pub fn rect(&self) -> Rect {
        Rect::new(self.tile_x, self.tile_y, self.tile_width, self.tile_height)
    }

    /// Whether `other` can share a `tilecombine` batch with this tile.
    pub fn can_combine(&self, other: &TileDesc) -> bool {
        !self.is_preview()
            && !other.is_preview()
            && self.view_id == other.view_id
            && self.part == other.part
            && self.edit_mode == other.edit_mode
            && self.width == other.width
            && self.height == other.height
            && self.tile_width == other.tile_width
            && self.tile_height == other.tile_height
    }

    /// Whether `other` is close enough to be rendered in the same paint
    /// call: combinable, on a touching row band, and at most
    /// [`MAX_COMBINE_COLUMNS`] grid columns away.
    pub fn is_near(&self, other: &TileDesc) -> bool {
        if !self.can_combine(other) {
            return false;
        }
        let (mine, theirs) = (self.rect(), other.rect());
        let same_row = theirs.bottom() >= mine.y && theirs.y <= mine.bottom();
        let tile_width = self.tile_width.max(1);
        let columns = self.tile_x / tile_width - other.tile_x / tile_width;
        same_row && columns.abs() <= MAX_COMBINE_COLUMNS
    }

    /// Render as a wire line starting with `prefix` (e.g. `tile:`).
    pub fn serialize(&self, prefix: &str) -> String {
        let mut out = format!(
            "{prefix} nviewid={} part={} width={} height={} tileposx={} tileposy={} \
             tilewidth={} tileheight={} oldwid={} wid={} ver={}",
            self.view_id,
            self.part,
            self.width,
            self.height,
            self.tile_x,
            self.tile_y,
            self.tile_width,
            self.tile_height,
            self.old_wire_id,
            self.wire_id,
            self.version,
        );
        if let Some(id) = self.preview_id {
            let _ = write!(out, " id={id}");
        }
        if self.img_size > 0 {
            let _ = write!(out, " imgsize={}", self.img_size);
        }
        if self.edit_mode != 0 {
            let _ = write!(out, " mode={}", self.edit_mode);
        }
        out
    }
}

// ── TileCombined ─────────────────────────────────────────────────

/// An ordered batch of combinable tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCombined {
    tiles: Vec<TileDesc>,
}

impl TileCombined {
    /// Wrap a non-empty list of mutually combinable tiles.
    pub fn new(tiles: Vec<TileDesc>) -> Result<Self> {
        let Some(first) = tiles.first() else {
            return Err(TileError::InvalidMessage("empty tilecombine".into()));
        };
        if let Some(bad) = tiles.iter().skip(1).find(|t| !first.can_combine(t)) {
            return Err(TileError::InvalidMessage(format!(
                "tile at {},{} cannot be combined",
                bad.tile_x, bad.tile_y
            )));
        }
        Ok(Self { tiles })
    }

    /// Wrap tiles the caller already checked with [`TileDesc::can_combine`].
    pub(crate) fn from_checked(tiles: Vec<TileDesc>) -> Self {
        debug_assert!(tiles.windows(2).all(|w| w[0].can_combine(&w[1])));
        Self { tiles }
    }

    /// Parse a `tilecombine …` line.
    pub fn parse(line: &str) -> Result<Self> {
        let mut view_id = 0;
        let mut part = None;
        let mut edit_mode = 0;
        let mut width = None;
        let mut height = None;
        let mut tile_width = None;
        let mut tile_height = None;
        let mut xs: Option<Vec<i32>> = None;
        let mut ys: Option<Vec<i32>> = None;
        let mut versions: Option<Vec<i32>> = None;
        let mut old_wids: Option<Vec<u32>> = None;
        let mut wids: Option<Vec<u32>> = None;
        let mut img_sizes: Option<Vec<u32>> = None;

        for (key, value) in pairs(line) {
            match key {
                "nviewid" => view_id = parse_int("nviewid", value)?,
                "part" => part = Some(parse_int("part", value)?),
                "mode" => edit_mode = parse_int("mode", value)?,
                "width" => width = Some(parse_int("width", value)?),
                "height" => height = Some(parse_int("height", value)?),
                "tilewidth" => tile_width = Some(parse_int("tilewidth", value)?),
                "tileheight" => tile_height = Some(parse_int("tileheight", value)?),
                "tileposx" => xs = Some(parse_list("tileposx", value)?),
                "tileposy" => ys = Some(parse_list("tileposy", value)?),
                "ver" => versions = Some(parse_list("ver", value)?),
                "oldwid" => old_wids = Some(parse_list("oldwid", value)?),
                "wid" => wids = Some(parse_list("wid", value)?),
                "imgsize" => img_sizes = Some(parse_list("imgsize", value)?),
                _ => {}
            }
        }

        let xs = xs.ok_or(TileError::MissingField("tileposx"))?;
        let ys = ys.ok_or(TileError::MissingField("tileposy"))?;
        let n = xs.len();
        let lists = [
            ("tileposy", Some(ys.len())),
            ("ver", versions.as_ref().map(Vec::len)),
            ("oldwid", old_wids.as_ref().map(Vec::len)),
            ("wid", wids.as_ref().map(Vec::len)),
            ("imgsize", img_sizes.as_ref().map(Vec::len)),
        ];
        for (field, len) in lists {
            if let Some(len) = len {
                if len != n {
                    return Err(TileError::BadArgument {
                        field,
                        value: format!("{len} entries, expected {n}"),
                    });
                }
            }
        }

        let part = part.ok_or(TileError::MissingField("part"))?;
        let width = width.ok_or(TileError::MissingField("width"))?;
        let height = height.ok_or(TileError::MissingField("height"))?;
        let tile_width = tile_width.ok_or(TileError::MissingField("tilewidth"))?;
        let tile_height = tile_height.ok_or(TileError::MissingField("tileheight"))?;

        let mut tiles = Vec::with_capacity(n);
        for i in 0..n {
            let tile = TileDesc {
                view_id,
                part,
                edit_mode,
                width,
                height,
                tile_x: xs[i],
                tile_y: ys[i],
                tile_width,
                tile_height,
                version: versions.as_ref().map_or(-1, |v| v[i]),
                old_wire_id: old_wids.as_ref().map_or(0, |v| v[i]),
                wire_id: wids.as_ref().map_or(0, |v| v[i]),
                img_size: img_sizes.as_ref().map_or(0, |v| v[i]),
                preview_id: None,
            };
            tile.validate()?;
            tiles.push(tile);
        }
        Self::new(tiles)
    }

    pub fn tiles(&self) -> &[TileDesc] {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut [TileDesc] {
        &mut self.tiles
    }

    pub fn into_tiles(self) -> Vec<TileDesc> {
        self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Whether two entries share a position.
    pub fn has_duplicates(&self) -> bool {
        let mut seen = std::collections::HashSet::new();
        !self.tiles.iter().all(|t| seen.insert((t.tile_x, t.tile_y)))
    }

    /// Render as a wire line starting with `prefix`.
    pub fn serialize(&self, prefix: &str) -> String {
        let first = &self.tiles[0];
        let list = |f: &dyn Fn(&TileDesc) -> String| {
            self.tiles.iter().map(f).collect::<Vec<_>>().join(",")
        };
        let mut out = format!(
            "{prefix} nviewid={} part={} width={} height={} tileposx={} tileposy={} \
             imgsize={} tilewidth={} tileheight={} ver={} oldwid={} wid={}",
            first.view_id,
            first.part,
            first.width,
            first.height,
            list(&|t| t.tile_x.to_string()),
            list(&|t| t.tile_y.to_string()),
            list(&|t| t.img_size.to_string()),
            first.tile_width,
            first.tile_height,
            list(&|t| t.version.to_string()),
            list(&|t| t.old_wire_id.to_string()),
            list(&|t| t.wire_id.to_string()),
        );
        if first.edit_mode != 0 {
            let _ = write!(out, " mode={}", first.edit_mode);
        }
        out
    }
}

// ── Tests ────────────────────────────────────────────────────────
