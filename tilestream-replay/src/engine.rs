//! Synthetic rendering engine standing in for a real document renderer.
//!
//! Pixels are a pure function of document position, part and the
//! current generation, so re-painting an unchanged area yields identical
//! tiles and [`SyntheticEngine::touch`] makes every later paint differ.

use std::sync::atomic::{AtomicU32, Ordering};

use tilestream_core::{PaintRequest, PixelBuffer, RenderEngine, Result, TileError, TileMode};

use crate::config::RenderConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Alternating squares of `size` document units.
    Checker { size: i32 },
    /// Colour ramps across the document.
    Gradient,
}

impl Pattern {
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        match config.pattern.as_str() {
            "checker" => Ok(Pattern::Checker {
                size: config.checker_size.max(1),
            }),
            "gradient" => Ok(Pattern::Gradient),
            other => Err(TileError::Other(format!("unknown pattern `{other}`"))),
        }
    }
}

pub struct SyntheticEngine {
    pattern: Pattern,
    mode: TileMode,
    generation: AtomicU32,
}

impl SyntheticEngine {
    pub fn new(pattern: Pattern, mode: TileMode) -> Self {
        Self {
            pattern,
            mode,
            generation: AtomicU32::new(0),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        let mode = if config.premultiplied {
            TileMode::PremultipliedAlpha
        } else {
            TileMode::StraightAlpha
        };
        Ok(Self::new(Pattern::from_config(config)?, mode))
    }

    /// Simulate an edit: every later paint differs from the previous one.
    pub fn touch(&self) -> u32 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn colour(&self, doc_x: i64, doc_y: i64, part: i32, generation: u32) -> [u8; 4] {
        let tint = (part as u8).wrapping_mul(40).wrapping_add(generation as u8);
        match self.pattern {
            Pattern::Checker { size } => {
                let size = size as i64;
                if (doc_x.div_euclid(size) + doc_y.div_euclid(size)) % 2 == 0 {
                    [230, 230, tint, 255]
                } else {
                    [40, 40, tint, 255]
                }
            }
            Pattern::Gradient => [(doc_x / 64) as u8, (doc_y / 64) as u8, tint, 255],
        }
    }
}

impl RenderEngine for SyntheticEngine {
    fn paint(&self, req: &PaintRequest) -> Result<PixelBuffer> {
        if req.pixel_width == 0 || req.pixel_height == 0 {
            return Err(TileError::Render("empty paint area".into()));
        }
        let generation = self.generation.load(Ordering::SeqCst);
        let mut buf = PixelBuffer::new(req.pixel_width, req.pixel_height);
        let scale_x = req.area.width as i64;
        let scale_y = req.area.height as i64;
        for y in 0..req.pixel_height {
            let doc_y = req.area.y as i64 + y as i64 * scale_y / req.pixel_height as i64;
            for x in 0..req.pixel_width {
                let doc_x = req.area.x as i64 + x as i64 * scale_x / req.pixel_width as i64;
                buf.set_pixel(x, y, self.colour(doc_x, doc_y, req.part, generation));
            }
        }
        Ok(buf)
    }

    fn tile_mode(&self) -> TileMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilestream_core::Rect;

    fn request(x: i32) -> PaintRequest {
        PaintRequest {
            area: Rect::new(x, 0, 3840, 3840),
            pixel_width: 16,
            pixel_height: 16,
            part: 0,
            edit_mode: 0,
            view_id: 0,
        }
    }

    #[test]
    fn same_area_paints_identically_until_touched() {
        let engine = SyntheticEngine::new(Pattern::Checker { size: 1920 }, TileMode::StraightAlpha);
        let a = engine.paint(&request(0)).unwrap();
        assert_eq!(a, engine.paint(&request(0)).unwrap());
        engine.touch();
        assert_ne!(a, engine.paint(&request(0)).unwrap());
    }

    #[test]
    fn checker_alternates_by_document_square() {
        let engine = SyntheticEngine::new(Pattern::Checker { size: 1920 }, TileMode::StraightAlpha);
        let buf = engine.paint(&request(0)).unwrap();
        assert_ne!(buf.pixel(0, 0), buf.pixel(8, 0));
        assert_eq!(buf.pixel(0, 0), buf.pixel(8, 8));
    }

    #[test]
    fn unknown_pattern_is_rejected() {
        let config = RenderConfig {
            pattern: "plaid".into(),
            ..Default::default()
        };
        assert!(Pattern::from_config(&config).is_err());
    }
}
