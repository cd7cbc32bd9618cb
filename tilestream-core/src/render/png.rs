//! Full-tile PNG encoding.

use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};

use crate::error::Result;
use crate::render::types::{PixelBuffer, TileMode, unpremultiply};

/// Encode `buffer` as an RGBA PNG, undoing premultiplication first when
/// `mode` says the engine painted premultiplied pixels.
pub fn encode_png(buffer: &PixelBuffer, mode: TileMode) -> Result<Vec<u8>> {
    let straight;
    let pixels = match mode {
        TileMode::StraightAlpha => buffer.data(),
        TileMode::PremultipliedAlpha => {
            let mut copy = buffer.data().to_vec();
            unpremultiply(&mut copy);
            straight = copy;
            &straight
        }
    };

    let mut out = Vec::with_capacity(pixels.len() / 4 + 64);
    PngEncoder::new(&mut out).write_image(
        pixels,
        buffer.width(),
        buffer.height(),
        ColorType::Rgba8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    #[test]
    fn produces_png_signature() {
        let buf = PixelBuffer::filled(16, 8, [255, 0, 0, 255]);
        let png = encode_png(&buf, TileMode::StraightAlpha).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn premultiplied_and_straight_agree_on_opaque() {
        let buf = PixelBuffer::filled(8, 8, [10, 20, 30, 255]);
        let a = encode_png(&buf, TileMode::StraightAlpha).unwrap();
        let b = encode_png(&buf, TileMode::PremultipliedAlpha).unwrap();
        assert_eq!(a, b);
    }
}
