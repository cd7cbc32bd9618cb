//! Boundary to the document rendering engine.

use crate::error::Result;
use crate::protocol::Rect;
use crate::render::types::{PixelBuffer, TileMode};

/// One paint call: a document-space area rendered into a pixmap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaintRequest {
    /// Area to paint, in document units.
    pub area: Rect,
    /// Output size in pixels.
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub part: i32,
    pub edit_mode: i32,
    pub view_id: i32,
}

/// The engine that paints documents. Implementations must be callable
/// from the service's blocking threads.
pub trait RenderEngine: Send + Sync {
    /// Paint `request.area` into a `pixel_width × pixel_height` buffer.
    fn paint(&self, request: &PaintRequest) -> Result<PixelBuffer>;

    /// Alpha layout of the buffers returned by [`paint`](Self::paint).
    fn tile_mode(&self) -> TileMode;
}
