//! Row-diff delta encoding between successive renderings of a tile.
//!
//! A patch turns the bitmap the client already holds into the new one.
//! Unchanged rows cost nothing; rows that moved (scrolling) become row
//! copies; everything else becomes runs of replacement pixels.
//!
//! ```text
//! 'D' zstd( op* 't' )        op = 'c' count src dst
//!                                | 'd' row col len  pixel{len}
//! 'D'                        tile unchanged
//! ```
//!
//! Rows, columns and lengths are single bytes, so tiles larger than
//! 256×256 are never diffed. [`DeltaCodec`] keeps the latest bitmap of
//! every tile location so the next rendering can be diffed against it.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::DELTA_ENTRIES_PER_SESSION;
use crate::error::{Result, TileError};
use crate::protocol::TileDesc;
use crate::render::png::encode_png;
use crate::render::types::{BYTES_PER_PIXEL, PixelBuffer, TileMode, to_straight_alpha};

/// Largest width or height that can be diffed.
pub const MAX_DELTA_DIMENSION: u32 = 256;

/// zstd level for patches: speed over ratio.
const COMPRESSION_LEVEL: i32 = -3;

/// Longest pixel run in one op.
const MAX_RUN: usize = 254;

/// Runs are padded to at least this many pixels.
const MIN_RUN: usize = 3;

const TAG_DELTA: u8 = b'D';
const OP_COPY: u8 = b'c';
const OP_DIFF: u8 = b'd';
const OP_END: u8 = b't';

// ── DeltaBitmap ──────────────────────────────────────────────────

/// A bitmap with a checksum per row for fast row matching.
#[derive(Debug, Clone)]
pub struct DeltaBitmap {
    width: u32,
    height: u32,
    pixels: PixelBuffer,
    row_hashes: Vec<u64>,
}

impl DeltaBitmap {
    pub fn new(pixels: PixelBuffer) -> Self {
        let row_hashes = (0..pixels.height())
            .map(|y| row_hash(pixels.row(y)))
            .collect();
        Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
            row_hashes,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    /// Whether this bitmap fits the byte-sized patch coordinates.
    pub fn is_compliant(&self) -> bool {
        self.width <= MAX_DELTA_DIMENSION && self.height <= MAX_DELTA_DIMENSION
    }

    fn row_matches(&self, y: u32, other: &DeltaBitmap, other_y: u32) -> bool {
        self.row_hashes[y as usize] == other.row_hashes[other_y as usize]
            && self.pixels.row(y) == other.pixels.row(other_y)
    }
}

fn row_hash(row: &[u8]) -> u64 {
    let digest = blake3::hash(row);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest.as_bytes()[..8]);
    u64::from_le_bytes(bytes)
}

// ── DeltaOp / Patch ──────────────────────────────────────────────

/// One step of a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOp {
    /// Copy `count` consecutive rows of the previous bitmap from `src`
    /// to `dst`.
    RowCopy { count: u8, src: u8, dst: u8 },
    /// Replace pixels of `row` starting at `col` with `pixels`
    /// (RGBA, `pixels.len() / 4` pixels).
    PixelRun { row: u8, col: u8, pixels: Vec<u8> },
}

/// An ordered list of [`DeltaOp`]s. An empty patch means "unchanged".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Patch {
    ops: Vec<DeltaOp>,
}

impl Patch {
    pub fn ops(&self) -> &[DeltaOp] {
        &self.ops
    }

    pub fn is_unchanged(&self) -> bool {
        self.ops.is_empty()
    }

    /// Raw op stream, `'t'`-terminated, before compression.
    fn op_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for op in &self.ops {
            match op {
                DeltaOp::RowCopy { count, src, dst } => {
                    out.extend_from_slice(&[OP_COPY, *count, *src, *dst]);
                }
                DeltaOp::PixelRun { row, col, pixels } => {
                    let len = (pixels.len() / BYTES_PER_PIXEL) as u8;
                    out.extend_from_slice(&[OP_DIFF, *row, *col, len]);
                    out.extend_from_slice(pixels);
                }
            }
        }
        out.push(OP_END);
        out
    }

    /// Serialise to the wire form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        if self.is_unchanged() {
            return Ok(vec![TAG_DELTA]);
        }
        let raw = self.op_bytes();
        let compressed = zstd::bulk::compress(&raw, COMPRESSION_LEVEL)
            .map_err(|e| TileError::Compression(e.to_string()))?;
        trace!("compressed delta of {} bytes to {}", raw.len(), compressed.len());

        let mut out = Vec::with_capacity(compressed.len() + 1);
        out.push(TAG_DELTA);
        out.extend_from_slice(&compressed);
        Ok(out)
    }

    /// Parse the wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes.split_first() {
            Some((&TAG_DELTA, [])) => return Ok(Patch::default()),
            Some((&TAG_DELTA, _)) => {}
            _ => return Err(TileError::CorruptPatch("missing delta tag")),
        }
        let raw = zstd::stream::decode_all(&bytes[1..])
            .map_err(|e| TileError::Compression(e.to_string()))?;

        let mut ops = Vec::new();
        let mut pos = 0;
        loop {
            let Some(&tag) = raw.get(pos) else {
                return Err(TileError::CorruptPatch("unterminated op stream"));
            };
            match tag {
                OP_END => break,
                OP_COPY => {
                    let args = raw
                        .get(pos + 1..pos + 4)
                        .ok_or(TileError::CorruptPatch("short copy op"))?;
                    ops.push(DeltaOp::RowCopy {
                        count: args[0],
                        src: args[1],
                        dst: args[2],
                    });
                    pos += 4;
                }
                OP_DIFF => {
                    let args = raw
                        .get(pos + 1..pos + 4)
                        .ok_or(TileError::CorruptPatch("short diff op"))?;
                    let (row, col, len) = (args[0], args[1], args[2] as usize);
                    let start = pos + 4;
                    let end = start + len * BYTES_PER_PIXEL;
                    let pixels = raw
                        .get(start..end)
                        .ok_or(TileError::CorruptPatch("short pixel run"))?
                        .to_vec();
                    ops.push(DeltaOp::PixelRun { row, col, pixels });
                    pos = end;
                }
                _ => return Err(TileError::CorruptPatch("unknown opcode")),
            }
        }
        Ok(Patch { ops })
    }

    /// Apply to `previous`, producing the bitmap the patch was built from.
    pub fn apply(&self, previous: &PixelBuffer) -> Result<PixelBuffer> {
        let (width, height) = (previous.width(), previous.height());
        let mut out = previous.clone();
        for op in &self.ops {
            match op {
                DeltaOp::RowCopy { count, src, dst } => {
                    let (count, src, dst) = (*count as u32, *src as u32, *dst as u32);
                    if src + count > height || dst + count > height {
                        return Err(TileError::CorruptPatch("row copy out of range"));
                    }
                    for i in 0..count {
                        out.row_mut(dst + i).copy_from_slice(previous.row(src + i));
                    }
                }
                DeltaOp::PixelRun { row, col, pixels } => {
                    let (row, col) = (*row as u32, *col as u32);
                    let len = (pixels.len() / BYTES_PER_PIXEL) as u32;
                    if row >= height || col + len > width {
                        return Err(TileError::CorruptPatch("pixel run out of range"));
                    }
                    let start = col as usize * BYTES_PER_PIXEL;
                    out.row_mut(row)[start..start + pixels.len()].copy_from_slice(pixels);
                }
            }
        }
        Ok(out)
    }
}

// ── Diffing ──────────────────────────────────────────────────────

/// Build a patch turning `previous` into `current`.
///
/// Returns `None` when the bitmaps differ in size or exceed
/// [`MAX_DELTA_DIMENSION`]; the caller should send a full image.
pub fn try_delta(previous: &DeltaBitmap, current: &DeltaBitmap) -> Option<Patch> {
    match diff(previous, current) {
        Ok(patch) => Some(patch),
        Err(e @ TileError::TileTooLarge { .. }) => {
            trace!("no delta: {e}");
            None
        }
        Err(e) => {
            debug!("no delta: {e}");
            None
        }
    }
}

/// Like [`try_delta`], reporting why no patch could be built.
pub fn diff(previous: &DeltaBitmap, current: &DeltaBitmap) -> Result<Patch> {
    if previous.width != current.width || previous.height != current.height {
        return Err(TileError::DimensionMismatch {
            prev_width: previous.width,
            prev_height: previous.height,
            width: current.width,
            height: current.height,
        });
    }
    if !current.is_compliant() {
        return Err(TileError::TileTooLarge {
            width: current.width,
            height: current.height,
        });
    }

    let height = current.height;
    let mut ops: Vec<DeltaOp> = Vec::new();
    let mut last_copy: Option<usize> = None;
    let mut match_offset: i64 = 0;

    for y in 0..height {
        if previous.row_matches(y, current, y) {
            continue;
        }

        let found = (0..height)
            .map(|yn| (y as i64 + match_offset + yn as i64).rem_euclid(height as i64) as u32)
            .find(|&m| previous.row_matches(m, current, y));

        if let Some(m) = found {
            if let Some(DeltaOp::RowCopy { count, src, dst }) = last_copy.map(|i| &mut ops[i]) {
                let n = *count as u32;
                if *src as u32 + n == m && *dst as u32 + n == y && *src as u32 + n + 1 < height {
                    *count += 1;
                    continue;
                }
            }
            match_offset = m as i64 - y as i64;
            last_copy = Some(ops.len());
            ops.push(DeltaOp::RowCopy {
                count: 1,
                src: m as u8,
                dst: y as u8,
            });
            continue;
        }

        diff_row(previous.pixels.row(y), current.pixels.row(y), y as u8, &mut ops);
    }

    Ok(Patch { ops })
}

/// Emit pixel runs for the differing stretches of one row.
fn diff_row(old: &[u8], cur: &[u8], row: u8, ops: &mut Vec<DeltaOp>) {
    let width = cur.len() / BYTES_PER_PIXEL;
    let px = |buf: &[u8], x: usize| -> [u8; 4] {
        let o = x * BYTES_PER_PIXEL;
        [buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]
    };

    let mut x = 0;
    while x < width {
        while x < width && px(old, x) == px(cur, x) {
            x += 1;
        }
        let mut run = 0;
        while x + run < width
            && (px(old, x + run) != px(cur, x + run) || run < MIN_RUN)
            && run < MAX_RUN
        {
            run += 1;
        }
        if run > 0 {
            let start = x * BYTES_PER_PIXEL;
            ops.push(DeltaOp::PixelRun {
                row,
                col: x as u8,
                pixels: cur[start..start + run * BYTES_PER_PIXEL].to_vec(),
            });
            x += run;
        }
    }
}

// ── TileLocation ─────────────────────────────────────────────────

/// Cache key: where a tile sits, independent of its versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileLocation {
    pub left: i32,
    pub top: i32,
    pub size: i32,
    pub part: i32,
    pub edit_mode: i32,
    pub view_id: i32,
}

impl From<&TileDesc> for TileLocation {
    fn from(tile: &TileDesc) -> Self {
        Self {
            left: tile.tile_x,
            top: tile.tile_y,
            size: tile.tile_width,
            part: tile.part,
            edit_mode: tile.edit_mode,
            view_id: tile.view_id,
        }
    }
}

// ── EncodedTile ──────────────────────────────────────────────────

/// Payload of one rendered tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTile {
    pub data: Vec<u8>,
    /// `true` for a patch, `false` for a full PNG keyframe.
    pub is_delta: bool,
}

// ── DeltaCodec ───────────────────────────────────────────────────

struct CacheEntry {
    wire_id: u32,
    bitmap: Arc<DeltaBitmap>,
}

struct CacheState {
    entries: HashMap<TileLocation, CacheEntry>,
    max_entries: usize,
}

/// Per-document bitmap cache and encoder front-end.
///
/// One instance is shared by every tile of a rendering context; it must
/// never be shared between unrelated documents.
pub struct DeltaCodec {
    state: Mutex<CacheState>,
}

impl Default for DeltaCodec {
    fn default() -> Self {
        Self::new(DELTA_ENTRIES_PER_SESSION)
    }
}

impl DeltaCodec {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                max_entries: max_entries.max(1),
            }),
        }
    }

    /// Encode `tile` as a delta against the cached bitmap at `location`
    /// when one exists and `force_keyframe` is false, otherwise as PNG.
    /// The new bitmap replaces the cache entry either way.
    pub fn compress_or_delta(
        &self,
        tile: PixelBuffer,
        location: TileLocation,
        wire_id: u32,
        force_keyframe: bool,
        mode: TileMode,
    ) -> Result<EncodedTile> {
        let straight = to_straight_alpha(tile, mode);
        let current = Arc::new(DeltaBitmap::new(straight));

        if !current.is_compliant() {
            trace!(
                "bad size {}x{} for deltas; sending keyframe",
                current.width, current.height
            );
            return Ok(EncodedTile {
                data: encode_png(current.pixels(), TileMode::StraightAlpha)?,
                is_delta: false,
            });
        }

        let previous = self.state.lock().entries.insert(
            location,
            CacheEntry {
                wire_id,
                bitmap: Arc::clone(&current),
            },
        );

        if !force_keyframe {
            if let Some(patch) = previous.and_then(|prev| try_delta(&prev.bitmap, &current)) {
                trace!(
                    "delta for {:?} with {} ops at wid {wire_id}",
                    location,
                    patch.ops().len()
                );
                return Ok(EncodedTile {
                    data: patch.encode()?,
                    is_delta: true,
                });
            }
        }

        Ok(EncodedTile {
            data: encode_png(current.pixels(), TileMode::StraightAlpha)?,
            is_delta: false,
        })
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_entries(&self) -> usize {
        self.state.lock().max_entries
    }

    /// When over the bound, drop the oldest entries (lowest wire id)
    /// until three quarters of the bound remain.
    pub fn rebalance(&self) {
        let mut state = self.state.lock();
        let max = state.max_entries;
        if state.entries.len() <= max {
            return;
        }
        let to_remove = state.entries.len() - max * 3 / 4;
        let mut by_age: Vec<(u32, TileLocation)> = state
            .entries
            .iter()
            .map(|(loc, e)| (e.wire_id, *loc))
            .collect();
        by_age.sort_unstable_by_key(|(wid, _)| *wid);
        for (_, loc) in by_age.into_iter().take(to_remove) {
            state.entries.remove(&loc);
        }
        debug!("rebalanced delta cache to {} entries", state.entries.len());
    }

    /// Size the cache for `count` sessions and rebalance.
    pub fn set_session_count(&self, count: usize) {
        self.state.lock().max_entries = count.max(1) * DELTA_ENTRIES_PER_SESSION;
        self.rebalance();
    }

    /// Forget every cached bitmap; the next rendering of each tile will
    /// be a keyframe.
    pub fn drop_cache(&self) {
        self.state.lock().entries.clear();
    }

    /// Human-readable cache summary.
    pub fn dump_state(&self) -> String {
        let state = self.state.lock();
        let mut out = format!(
            "delta cache with {} entries vs. max {}\n",
            state.entries.len(),
            state.max_entries
        );
        for (loc, entry) in &state.entries {
            let _ = writeln!(
                out,
                "\t{},{},{},{} wid: {}",
                loc.size, loc.part, loc.left, loc.top, entry.wire_id
            );
        }
        out
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn striped(width: u32, height: u32, seed: u8) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = (y as u8).wrapping_mul(7).wrapping_add(seed);
                buf.set_pixel(x, y, [v, v ^ 0x55, x as u8, 255]);
            }
        }
        buf
    }

    fn bitmap(buf: &PixelBuffer) -> DeltaBitmap {
        DeltaBitmap::new(buf.clone())
    }

    fn loc(left: i32) -> TileLocation {
        TileLocation {
            left,
            top: 0,
            size: 3840,
            part: 0,
            edit_mode: 0,
            view_id: 0,
        }
    }

    #[test]
    fn identical_bitmaps_give_empty_patch() {
        let a = striped(64, 64, 1);
        let patch = try_delta(&bitmap(&a), &bitmap(&a)).unwrap();
        assert!(patch.is_unchanged());
        assert_eq!(patch.encode().unwrap(), vec![b'D']);
    }

    #[test]
    fn size_mismatch_gives_none() {
        let a = striped(64, 64, 1);
        let b = striped(64, 32, 1);
        assert!(try_delta(&bitmap(&a), &bitmap(&b)).is_none());
    }

    #[test]
    fn oversize_gives_none() {
        let a = striped(300, 4, 1);
        assert!(try_delta(&bitmap(&a), &bitmap(&a)).is_none());
    }

    #[test]
    fn diff_reports_why_no_patch() {
        let a = striped(64, 64, 1);
        let b = striped(64, 32, 1);
        match diff(&bitmap(&a), &bitmap(&b)) {
            Err(TileError::DimensionMismatch {
                prev_height: 64,
                height: 32,
                ..
            }) => {}
            other => panic!("unexpected {other:?}"),
        }

        let wide = striped(300, 4, 1);
        assert!(matches!(
            diff(&bitmap(&wide), &bitmap(&wide)),
            Err(TileError::TileTooLarge { width: 300, height: 4 })
        ));
        assert!(diff(&bitmap(&a), &bitmap(&a)).unwrap().is_unchanged());
    }

    #[test]
    fn single_pixel_change_is_one_padded_run() {
        let a = striped(64, 16, 1);
        let mut b = a.clone();
        b.set_pixel(10, 5, [1, 2, 3, 4]);
        let patch = try_delta(&bitmap(&a), &bitmap(&b)).unwrap();
        assert_eq!(patch.ops().len(), 1);
        match &patch.ops()[0] {
            DeltaOp::PixelRun { row, col, pixels } => {
                assert_eq!((*row, *col), (5, 10));
                assert_eq!(pixels.len(), MIN_RUN * BYTES_PER_PIXEL);
            }
            other => panic!("unexpected op {other:?}"),
        }
        assert_eq!(patch.apply(&a).unwrap(), b);
    }

    #[test]
    fn scrolled_rows_become_one_copy() {
        let a = striped(32, 32, 3);
        // Scroll up by two rows; the last two rows are new content.
        let mut b = PixelBuffer::new(32, 32);
        for y in 0..30 {
            b.row_mut(y).copy_from_slice(a.row(y + 2));
        }
        for y in 30..32 {
            for x in 0..32 {
                b.set_pixel(x, y, [9, 9, 9, 255]);
            }
        }
        let patch = try_delta(&bitmap(&a), &bitmap(&b)).unwrap();
        assert_eq!(
            patch.ops()[0],
            DeltaOp::RowCopy {
                count: 29,
                src: 2,
                dst: 0
            }
        );
        assert_eq!(patch.apply(&a).unwrap(), b);
    }

    #[test]
    fn unchanged_rows_emit_nothing() {
        let a = striped(16, 16, 0);
        let mut b = a.clone();
        for x in 0..16 {
            b.set_pixel(x, 7, [200, 100, 50, 255]);
        }
        let patch = try_delta(&bitmap(&a), &bitmap(&b)).unwrap();
        assert!(patch.ops().iter().all(|op| matches!(
            op,
            DeltaOp::PixelRun { row: 7, .. }
        )));
    }

    #[test]
    fn wide_change_splits_at_max_run() {
        let a = PixelBuffer::filled(256, 1, [0, 0, 0, 255]);
        let b = PixelBuffer::filled(256, 1, [1, 1, 1, 255]);
        let patch = try_delta(&bitmap(&a), &bitmap(&b)).unwrap();
        assert_eq!(patch.ops().len(), 2);
        assert_eq!(patch.apply(&a).unwrap(), b);
    }

    #[test]
    fn encode_decode_preserves_ops() {
        let a = striped(48, 48, 2);
        let mut b = striped(48, 48, 5);
        b.row_mut(0).copy_from_slice(a.row(10));
        let patch = try_delta(&bitmap(&a), &bitmap(&b)).unwrap();
        let wire = patch.encode().unwrap();
        assert_eq!(wire[0], b'D');
        let decoded = Patch::decode(&wire).unwrap();
        assert_eq!(decoded, patch);
        assert_eq!(decoded.apply(&a).unwrap(), b);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(Patch::decode(b"").is_err());
        assert!(Patch::decode(b"Zabc").is_err());
        assert!(Patch::decode(b"Dnot-zstd").is_err());
    }

    #[test]
    fn apply_rejects_out_of_range() {
        let prev = PixelBuffer::new(4, 4);
        let patch = Patch {
            ops: vec![DeltaOp::RowCopy {
                count: 2,
                src: 3,
                dst: 0,
            }],
        };
        assert!(patch.apply(&prev).is_err());
    }

    #[test]
    fn codec_first_render_is_keyframe_then_delta() {
        let codec = DeltaCodec::new(8);
        let a = striped(32, 32, 1);
        let first = codec
            .compress_or_delta(a.clone(), loc(0), 1, false, TileMode::StraightAlpha)
            .unwrap();
        assert!(!first.is_delta);

        let mut b = a.clone();
        b.set_pixel(0, 0, [0, 0, 0, 0]);
        let second = codec
            .compress_or_delta(b.clone(), loc(0), 2, false, TileMode::StraightAlpha)
            .unwrap();
        assert!(second.is_delta);
        let patch = Patch::decode(&second.data).unwrap();
        assert_eq!(patch.apply(&a).unwrap(), b);
    }

    #[test]
    fn forced_keyframe_still_updates_cache() {
        let codec = DeltaCodec::new(8);
        let a = striped(32, 32, 1);
        codec
            .compress_or_delta(a.clone(), loc(0), 1, false, TileMode::StraightAlpha)
            .unwrap();
        let forced = codec
            .compress_or_delta(a.clone(), loc(0), 2, true, TileMode::StraightAlpha)
            .unwrap();
        assert!(!forced.is_delta);
        let again = codec
            .compress_or_delta(a, loc(0), 3, false, TileMode::StraightAlpha)
            .unwrap();
        assert_eq!(again.data, vec![b'D']);
    }

    #[test]
    fn rebalance_drops_oldest_to_three_quarters() {
        let codec = DeltaCodec::new(4);
        let tile = striped(8, 8, 0);
        for i in 0..6 {
            codec
                .compress_or_delta(tile.clone(), loc(i * 100), i as u32 + 1, false, TileMode::StraightAlpha)
                .unwrap();
        }
        assert_eq!(codec.len(), 6);
        codec.rebalance();
        assert_eq!(codec.len(), 3);
        let dump = codec.dump_state();
        assert!(dump.contains("wid: 6"));
        assert!(!dump.contains("wid: 1\n"));
    }

    #[test]
    fn session_count_scales_bound() {
        let codec = DeltaCodec::new(1);
        codec.set_session_count(3);
        assert_eq!(codec.max_entries(), 3 * DELTA_ENTRIES_PER_SESSION);
        codec.set_session_count(0);
        assert_eq!(codec.max_entries(), DELTA_ENTRIES_PER_SESSION);
    }

    #[test]
    fn drop_cache_forces_keyframes() {
        let codec = DeltaCodec::new(8);
        let a = striped(16, 16, 0);
        codec
            .compress_or_delta(a.clone(), loc(0), 1, false, TileMode::StraightAlpha)
            .unwrap();
        codec.drop_cache();
        assert!(codec.is_empty());
        let next = codec
            .compress_or_delta(a, loc(0), 2, false, TileMode::StraightAlpha)
            .unwrap();
        assert!(!next.is_delta);
    }
}
