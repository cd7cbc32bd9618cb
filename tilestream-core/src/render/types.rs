//! Pixel buffers exchanged between the engine and the encoders.

use crate::error::{Result, TileError};

/// Bytes per pixel in every buffer handled here (RGBA).
pub const BYTES_PER_PIXEL: usize = 4;

// ── TileMode ─────────────────────────────────────────────────────

/// How the engine stores alpha in the buffers it paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileMode {
    /// Colour channels are independent of alpha.
    StraightAlpha,
    /// Colour channels are already multiplied by alpha; encoders must
    /// undo this before writing PNG or delta pixels.
    #[default]
    PremultipliedAlpha,
}

// ── PixelBuffer ──────────────────────────────────────────────────

/// A tightly packed RGBA bitmap: `height` rows of `width * 4` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// A fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * BYTES_PER_PIXEL],
        }
    }

    /// Wrap existing pixel data, checking its length.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(TileError::BadArgument {
                field: "pixels",
                value: format!("{} bytes for {width}x{height}", data.len()),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer filled with one RGBA colour.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let mut buf = Self::new(width, height);
        for px in buf.data.chunks_exact_mut(BYTES_PER_PIXEL) {
            px.copy_from_slice(&rgba);
        }
        buf
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Row stride in bytes.
    pub fn stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride();
        &self.data[start..start + self.stride()]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.stride();
        let start = y as usize * stride;
        &mut self.data[start..start + stride]
    }

    /// The RGBA bytes at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        let mut px = [0; 4];
        px.copy_from_slice(&self.data[offset..offset + BYTES_PER_PIXEL]);
        px
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let offset = y as usize * self.stride() + x as usize * BYTES_PER_PIXEL;
        self.data[offset..offset + BYTES_PER_PIXEL].copy_from_slice(&rgba);
    }

    /// Copy out the `width × height` region at `(x, y)`.
    pub fn sub_image(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelBuffer> {
        if x + width > self.width || y + height > self.height {
            return Err(TileError::BadArgument {
                field: "region",
                value: format!(
                    "{width}x{height}+{x}+{y} outside {}x{}",
                    self.width, self.height
                ),
            });
        }
        let mut out = PixelBuffer::new(width, height);
        let left = x as usize * BYTES_PER_PIXEL;
        let right = left + width as usize * BYTES_PER_PIXEL;
        for row in 0..height {
            out.row_mut(row)
                .copy_from_slice(&self.row(y + row)[left..right]);
        }
        Ok(out)
    }
}

// ── Alpha conversion ─────────────────────────────────────────────

/// Undo premultiplication in place: `c = (c * 255 + a / 2) / a`.
/// Fully transparent pixels become all zeros.
pub fn unpremultiply(data: &mut [u8]) {
    for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
        let alpha = px[3] as u32;
        match alpha {
            255 => {}
            0 => px.copy_from_slice(&[0, 0, 0, 0]),
            a => {
                for c in &mut px[..3] {
                    *c = ((*c as u32 * 255 + a / 2) / a).min(255) as u8;
                }
            }
        }
    }
}

/// Convert `buffer` into straight alpha according to `mode`.
pub fn to_straight_alpha(mut buffer: PixelBuffer, mode: TileMode) -> PixelBuffer {
    if mode == TileMode::PremultipliedAlpha {
        unpremultiply(buffer.data_mut());
    }
    buffer
}

// ── Tests ────────────────────────────────────────────────────────
