//! Batch rendering: one paint call per batch, parallel per-tile encoding.
//!
//! 1. Union the requested tile rectangles into one render area.
//! 2. Ask the [`RenderEngine`] to paint the area once.
//! 3. Blend the optional [`Overlay`] onto every tile offset.
//! 4. Encode every tile on the [`WorkerPool`]: delta or PNG for regular
//!    tiles, PNG for previews.
//! 5. Build a `tilecombine:` response (combined requests) or one `tile:`
//!    response per tile.
//! 6. Queue a delta-cache rebalance without waiting for it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::config::PipelineConfig;
use crate::error::{Result, TileError};
use crate::message::Message;
use crate::protocol::{Rect, TileCombined, TileDesc};
use crate::render::delta::{DeltaCodec, TileLocation};
use crate::render::engine::{PaintRequest, RenderEngine};
use crate::render::png::encode_png;
use crate::render::pool::WorkerPool;
use crate::render::types::PixelBuffer;
use crate::render::watermark::Overlay;

static NEXT_WIRE_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate the next process-wide wire id.
pub fn next_wire_id() -> u32 {
    NEXT_WIRE_ID.fetch_add(1, Ordering::Relaxed)
}

/// One encoded tile, waiting to be serialised.
struct RenderedTile {
    index: usize,
    desc: TileDesc,
    data: Vec<u8>,
}

// ── RenderPipeline ───────────────────────────────────────────────

pub struct RenderPipeline {
    engine: Arc<dyn RenderEngine>,
    codec: Arc<DeltaCodec>,
    pool: WorkerPool,
    overlay: Option<Arc<dyn Overlay>>,
    config: PipelineConfig,
}

impl RenderPipeline {
    pub fn new(engine: Arc<dyn RenderEngine>, config: PipelineConfig) -> Result<Self> {
        let pool = WorkerPool::new(config.effective_workers())?;
        Ok(Self {
            engine,
            codec: Arc::new(DeltaCodec::new(config.delta_cache_entries)),
            pool,
            overlay: None,
            config,
        })
    }

    /// Blend `overlay` onto every rendered tile.
    pub fn with_overlay(mut self, overlay: Arc<dyn Overlay>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    /// The delta cache shared by every tile of this document.
    pub fn codec(&self) -> &Arc<DeltaCodec> {
        &self.codec
    }

    pub fn worker_count(&self) -> usize {
        self.pool.size()
    }

    /// Render one tile; the result is a single `tile:` message.
    pub fn render_tile(&self, tile: &TileDesc) -> Result<Vec<Message>> {
        self.render(std::slice::from_ref(tile), false)
    }

    /// Render a batch; the result is one `tilecombine:` message.
    pub fn render_combined(&self, batch: &TileCombined) -> Result<Vec<Message>> {
        self.render(batch.tiles(), true)
    }

    fn render(&self, tiles: &[TileDesc], combined: bool) -> Result<Vec<Message>> {
        let Some(first) = tiles.first() else {
            return Ok(Vec::new());
        };
        let batch = TileCombined::new(tiles.to_vec())?;
        if batch.has_duplicates() {
            return Err(TileError::InvalidMessage(
                "tile batch contains duplicate positions".into(),
            ));
        }

        // ── Render area ──────────────────────────────────────────
        let area = tiles
            .iter()
            .map(TileDesc::rect)
            .reduce(|acc, r| acc.union(&r))
            .unwrap_or_default();
        let tiles_x = (area.width / first.tile_width) as u32;
        let tiles_y = (area.height / first.tile_height) as u32;
        let pixel_w = first.width as u32;
        let pixel_h = first.height as u32;
        let pixmap_w = tiles_x * pixel_w;
        let pixmap_h = tiles_y * pixel_h;
        if pixmap_w > self.config.large_pixmap_warning || pixmap_h > self.config.large_pixmap_warning
        {
            warn!("unusually large tile combine of size {pixmap_w}x{pixmap_h}");
        }

        // ── Paint ────────────────────────────────────────────────
        let start = Instant::now();
        let request = PaintRequest {
            area,
            pixel_width: pixmap_w,
            pixel_height: pixmap_h,
            part: first.part,
            edit_mode: first.edit_mode,
            view_id: first.view_id,
        };
        let mut pixmap = self.engine.paint(&request)?;
        if pixmap.width() != pixmap_w || pixmap.height() != pixmap_h {
            return Err(TileError::Render(format!(
                "engine painted {}x{}, expected {pixmap_w}x{pixmap_h}",
                pixmap.width(),
                pixmap.height()
            )));
        }
        debug!(
            "painted {} tiles at ({}, {}) {}x{} in {:?}",
            tiles.len(),
            area.x,
            area.y,
            area.width,
            area.height,
            start.elapsed()
        );

        let mode = self.engine.tile_mode();
        let offsets: Vec<(u32, u32)> = tiles
            .iter()
            .map(|t| tile_offset(t, &area, pixel_w, pixel_h))
            .collect();

        if let Some(overlay) = &self.overlay {
            for &(x, y) in &offsets {
                overlay.blend(&mut pixmap, x, y, pixel_w, pixel_h, mode);
            }
        }

        // ── Encode ───────────────────────────────────────────────
        let pixmap = Arc::new(pixmap);
        let output: Arc<Mutex<Vec<RenderedTile>>> =
            Arc::new(Mutex::new(Vec::with_capacity(tiles.len())));
        let use_deltas = self.config.enable_deltas;

        let mut jobs = Vec::with_capacity(tiles.len());
        for (index, (tile, &(off_x, off_y))) in tiles.iter().zip(&offsets).enumerate() {
            let force_keyframe = tile.old_wire_id == 0;
            let wire_id = next_wire_id();
            trace!(
                "queued tile #{index} at ({off_x}, {off_y}) wid {wire_id}{}",
                if force_keyframe { ", keyframe" } else { "" }
            );

            let pixmap = Arc::clone(&pixmap);
            let codec = Arc::clone(&self.codec);
            let output = Arc::clone(&output);
            let tile = tile.clone();
            jobs.push(move || -> Result<()> {
                let sub = pixmap.sub_image(off_x, off_y, pixel_w, pixel_h)?;
                let data = if use_deltas && !tile.is_preview() {
                    codec
                        .compress_or_delta(
                            sub,
                            TileLocation::from(&tile),
                            wire_id,
                            force_keyframe,
                            mode,
                        )?
                        .data
                } else {
                    encode_png(&sub, mode)?
                };

                let mut desc = tile;
                desc.wire_id = wire_id;
                desc.img_size = data.len() as u32;
                output.lock().push(RenderedTile { index, desc, data });
                Ok(())
            });
        }

        for (index, result) in self.pool.run_batch(jobs)?.into_iter().enumerate() {
            if let Err(e) = result {
                warn!(
                    "dropping tile at {},{}: {e}",
                    tiles[index].tile_x, tiles[index].tile_y
                );
            }
        }
        debug!("painted and encoded {} tiles in {:?}", tiles.len(), start.elapsed());

        let mut rendered = std::mem::take(&mut *output.lock());
        rendered.sort_by_key(|r| r.index);

        let messages = if rendered.is_empty() {
            Vec::new()
        } else if combined {
            let mut payload = Vec::with_capacity(rendered.iter().map(|r| r.data.len()).sum());
            let mut descs = Vec::with_capacity(rendered.len());
            for r in rendered {
                payload.extend_from_slice(&r.data);
                descs.push(r.desc);
            }
            let header = TileCombined::new(descs)?.serialize("tilecombine:");
            vec![Message::with_payload(&header, &payload)]
        } else {
            rendered
                .into_iter()
                .map(|r| Message::with_payload(&r.desc.serialize("tile:"), &r.data))
                .collect()
        };

        let codec = Arc::clone(&self.codec);
        if let Err(e) = self.pool.spawn_detached(move || codec.rebalance()) {
            warn!("could not queue delta rebalance: {e}");
        }

        Ok(messages)
    }
}

/// Pixel offset of `tile` inside the pixmap painted for `area`.
fn tile_offset(tile: &TileDesc, area: &Rect, pixel_w: u32, pixel_h: u32) -> (u32, u32) {
    let col = ((tile.tile_x - area.x) / tile.tile_width) as u32;
    let row = ((tile.tile_y - area.y) / tile.tile_height) as u32;
    (col * pixel_w, row * pixel_h)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::delta::Patch;
    use crate::render::types::TileMode;
    use std::sync::atomic::AtomicUsize;

    /// Paints each pixel from its document coordinate so tiles differ.
    struct GradientEngine {
        calls: AtomicUsize,
        shade: AtomicU32,
    }

    impl GradientEngine {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                shade: AtomicU32::new(0),
            }
        }
    }

    impl RenderEngine for GradientEngine {
        fn paint(&self, req: &PaintRequest) -> Result<PixelBuffer> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let shade = self.shade.load(Ordering::SeqCst) as u8;
            let mut buf = PixelBuffer::new(req.pixel_width, req.pixel_height);
            for y in 0..req.pixel_height {
                for x in 0..req.pixel_width {
                    buf.set_pixel(x, y, [x as u8, y as u8, shade, 255]);
                }
            }
            Ok(buf)
        }

        fn tile_mode(&self) -> TileMode {
            TileMode::StraightAlpha
        }
    }

    fn pipeline(engine: Arc<GradientEngine>) -> RenderPipeline {
        let config = PipelineConfig {
            worker_threads: 2,
            ..Default::default()
        };
        RenderPipeline::new(engine, config).unwrap()
    }

    fn tile(x: i32, y: i32) -> TileDesc {
        TileDesc::new(0, 0, 16, 16, x, y, 3840, 3840)
    }

    #[test]
    fn combined_batch_paints_once() {
        let engine = Arc::new(GradientEngine::new());
        let pipe = pipeline(Arc::clone(&engine));
        let batch = TileCombined::new(vec![tile(0, 0), tile(3840, 0), tile(0, 3840)]).unwrap();
        let out = pipe.render_combined(&batch).unwrap();

        assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first_token(), "tilecombine:");

        let header = TileCombined::parse(out[0].first_line()).unwrap();
        assert_eq!(header.len(), 3);
        let total: u32 = header.tiles().iter().map(|t| t.img_size).sum();
        assert_eq!(out[0].payload().len(), total as usize);
        assert_eq!(header.tiles()[1].tile_x, 3840);
        assert!(header.tiles().iter().all(|t| t.wire_id > 0));
    }

    #[test]
    fn single_tile_yields_tile_message() {
        let engine = Arc::new(GradientEngine::new());
        let pipe = pipeline(engine);
        let out = pipe.render_tile(&tile(3840, 3840)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].first_token(), "tile:");
        let desc = TileDesc::parse(out[0].first_line()).unwrap();
        assert_eq!(desc.img_size as usize, out[0].payload().len());
    }

    #[test]
    fn second_render_with_old_wid_is_delta() {
        let engine = Arc::new(GradientEngine::new());
        let pipe = pipeline(Arc::clone(&engine));
        let first = pipe.render_tile(&tile(0, 0)).unwrap();
        let first_desc = TileDesc::parse(first[0].first_line()).unwrap();

        engine.shade.store(9, Ordering::SeqCst);
        let mut again = tile(0, 0);
        again.old_wire_id = first_desc.wire_id;
        let second = pipe.render_tile(&again).unwrap();
        let payload = second[0].payload();
        assert_eq!(payload[0], b'D');
        assert!(Patch::decode(&payload).is_ok());

        let second_desc = TileDesc::parse(second[0].first_line()).unwrap();
        assert!(second_desc.wire_id > first_desc.wire_id);
    }

    #[test]
    fn zero_old_wid_forces_keyframe() {
        let engine = Arc::new(GradientEngine::new());
        let pipe = pipeline(engine);
        pipe.render_tile(&tile(0, 0)).unwrap();
        let out = pipe.render_tile(&tile(0, 0)).unwrap();
        assert_eq!(&out[0].payload()[1..4], b"PNG");
    }

    #[test]
    fn previews_are_always_png() {
        let engine = Arc::new(GradientEngine::new());
        let pipe = pipeline(engine);
        let mut preview = tile(0, 0);
        preview.preview_id = Some(1);
        preview.old_wire_id = 7;
        pipe.render_tile(&preview).unwrap();
        let out = pipe.render_tile(&preview).unwrap();
        assert_eq!(&out[0].payload()[1..4], b"PNG");
    }

    #[test]
    fn duplicate_positions_rejected() {
        let engine = Arc::new(GradientEngine::new());
        let pipe = pipeline(engine);
        let batch = TileCombined::new(vec![tile(0, 0), tile(0, 0)]).unwrap();
        assert!(pipe.render_combined(&batch).is_err());
    }

    #[test]
    fn offsets_follow_grid() {
        let area = Rect::new(3840, 0, 7680, 3840);
        assert_eq!(tile_offset(&tile(3840, 0), &area, 256, 256), (0, 0));
        assert_eq!(tile_offset(&tile(7680, 0), &area, 256, 256), (256, 0));
    }
}
