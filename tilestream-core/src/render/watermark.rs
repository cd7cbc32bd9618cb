//! Per-tile overlays applied to the painted area before encoding.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::render::types::{BYTES_PER_PIXEL, PixelBuffer, TileMode};

/// Something drawn on top of every tile of a painted area.
pub trait Overlay: Send + Sync {
    /// Blend onto the tile whose top-left pixel is `(offset_x, offset_y)`
    /// inside `area`.
    fn blend(
        &self,
        area: &mut PixelBuffer,
        offset_x: u32,
        offset_y: u32,
        tile_width: u32,
        tile_height: u32,
        mode: TileMode,
    );
}

// ── Watermark ────────────────────────────────────────────────────

/// A stamp bitmap alpha-blended at 80 % of the tile size, centred.
///
/// The stamp is premultiplied RGBA. Scaled copies are cached per
/// target size.
pub struct Watermark {
    stamp: PixelBuffer,
    opacity: f32,
    opaque_only: bool,
    scaled: Mutex<HashMap<(u32, u32), Arc<PixelBuffer>>>,
}

impl Watermark {
    pub fn new(stamp: PixelBuffer, opacity: f32) -> Self {
        Self {
            stamp,
            opacity: opacity.clamp(0.0, 1.0),
            opaque_only: true,
            scaled: Mutex::new(HashMap::new()),
        }
    }

    /// Also blend over translucent pixels (spreadsheets paint their
    /// grid on a transparent background).
    pub fn blend_translucent(mut self) -> Self {
        self.opaque_only = false;
        self
    }

    /// Nearest-neighbour scale of the stamp, with opacity applied.
    fn scaled(&self, width: u32, height: u32) -> Arc<PixelBuffer> {
        let mut cache = self.scaled.lock();
        if let Some(buf) = cache.get(&(width, height)) {
            return Arc::clone(buf);
        }
        let mut out = PixelBuffer::new(width, height);
        if self.stamp.width() > 0 && self.stamp.height() > 0 {
            for y in 0..height {
                let sy = y * self.stamp.height() / height.max(1);
                for x in 0..width {
                    let sx = x * self.stamp.width() / width.max(1);
                    let px = self.stamp.pixel(sx, sy);
                    let scale = |c: u8| (c as f32 * self.opacity).round() as u8;
                    out.set_pixel(x, y, [scale(px[0]), scale(px[1]), scale(px[2]), scale(px[3])]);
                }
            }
        }
        let out = Arc::new(out);
        cache.insert((width, height), Arc::clone(&out));
        out
    }
}

impl Overlay for Watermark {
    fn blend(
        &self,
        area: &mut PixelBuffer,
        offset_x: u32,
        offset_y: u32,
        tile_width: u32,
        tile_height: u32,
        mode: TileMode,
    ) {
        let width = tile_width * 4 / 5;
        let height = tile_height * 4 / 5;
        if width == 0 || height == 0 {
            return;
        }
        let stamp = self.scaled(width, height);
        let start_x = offset_x + (tile_width - width) / 2;
        let start_y = offset_y + (tile_height - height) / 2;
        let (area_w, area_h) = (area.width(), area.height());
        let stride = area.stride();
        let data = area.data_mut();

        for sy in 0..height {
            let ty = start_y + sy;
            if ty >= area_h {
                break;
            }
            for sx in 0..width {
                let tx = start_x + sx;
                if tx >= area_w {
                    break;
                }
                let o = ty as usize * stride + tx as usize * BYTES_PER_PIXEL;
                let dst = &mut data[o..o + BYTES_PER_PIXEL];
                if self.opaque_only && dst[3] != 255 {
                    continue;
                }
                over(dst, stamp.pixel(sx, sy), mode);
            }
        }
    }
}

/// Porter-Duff "over" of a premultiplied `src` onto `dst` stored in
/// `mode`.
fn over(dst: &mut [u8], src: [u8; 4], mode: TileMode) {
    let src_a = src[3] as f32 / 255.0;
    let dst_a = dst[3] as f32 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);
    match mode {
        TileMode::PremultipliedAlpha => {
            for c in 0..3 {
                dst[c] = (src[c] as f32 + dst[c] as f32 * (1.0 - src_a)).min(255.0) as u8;
            }
        }
        TileMode::StraightAlpha => {
            for c in 0..3 {
                dst[c] = if out_a > 0.0 {
                    let value = (src[c] as f32 + dst[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
                    value.round().min(255.0) as u8
                } else {
                    0
                };
            }
        }
    }
    dst[3] = (out_a * 255.0).round().min(255.0) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blends_centre_and_leaves_border() {
        let stamp = PixelBuffer::filled(4, 4, [128, 128, 128, 128]);
        let mark = Watermark::new(stamp, 1.0);
        let mut area = PixelBuffer::filled(20, 10, [0, 0, 0, 255]);
        mark.blend(&mut area, 10, 0, 10, 10, TileMode::PremultipliedAlpha);

        // 80 % of 10 is 8, centred: pixels 11..19 horizontally, 1..9 vertically.
        assert_eq!(area.pixel(10, 0), [0, 0, 0, 255]);
        assert_eq!(area.pixel(15, 5)[0], 128);
        // The first tile is untouched.
        assert_eq!(area.pixel(5, 5), [0, 0, 0, 255]);
    }

    #[test]
    fn skips_translucent_by_default() {
        let stamp = PixelBuffer::filled(2, 2, [255, 255, 255, 255]);
        let mut area = PixelBuffer::filled(10, 10, [0, 0, 0, 0]);
        Watermark::new(stamp.clone(), 1.0).blend(&mut area, 0, 0, 10, 10, TileMode::StraightAlpha);
        assert_eq!(area.pixel(5, 5), [0, 0, 0, 0]);

        Watermark::new(stamp, 1.0)
            .blend_translucent()
            .blend(&mut area, 0, 0, 10, 10, TileMode::StraightAlpha);
        assert_eq!(area.pixel(5, 5), [255, 255, 255, 255]);
    }

    #[test]
    fn straight_alpha_blend_unpremultiplies_result() {
        let stamp = PixelBuffer::filled(2, 2, [64, 64, 64, 128]);
        let mark = Watermark::new(stamp, 1.0).blend_translucent();

        let mut straight = PixelBuffer::filled(10, 10, [200, 0, 0, 128]);
        mark.blend(&mut straight, 0, 0, 10, 10, TileMode::StraightAlpha);
        assert_eq!(straight.pixel(5, 5), [152, 85, 85, 192]);

        let mut premultiplied = PixelBuffer::filled(10, 10, [100, 0, 0, 128]);
        mark.blend(&mut premultiplied, 0, 0, 10, 10, TileMode::PremultipliedAlpha);
        assert_eq!(premultiplied.pixel(5, 5), [113, 64, 64, 192]);
    }
}
